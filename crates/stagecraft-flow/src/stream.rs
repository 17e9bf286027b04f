use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::disposable::Disposable;

/// One event on a [`Stream`]: a value, or the terminal end with an
/// optional error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent<T, E> {
    Value(T),
    End(Option<E>),
}

struct StreamCore<T, E> {
    listeners: RefCell<Vec<(u64, Rc<dyn Fn(&StreamEvent<T, E>)>)>>,
    next_id: RefCell<u64>,
    ended: RefCell<Option<Option<E>>>,
}

/// A multi-value channel that terminates with a single end event.
///
/// Values sent after the end are discarded; a listener subscribing after
/// the end immediately receives the terminal event.
pub struct Stream<T, E> {
    core: Rc<StreamCore<T, E>>,
}

/// The sending side of a [`Stream`].
pub struct StreamSender<T, E> {
    core: Rc<StreamCore<T, E>>,
}

impl<T: Clone + 'static, E: Clone + 'static> Stream<T, E> {
    pub fn channel() -> (Self, StreamSender<T, E>) {
        let core = Rc::new(StreamCore {
            listeners: RefCell::new(Vec::new()),
            next_id: RefCell::new(1),
            ended: RefCell::new(None),
        });
        (
            Self {
                core: Rc::clone(&core),
            },
            StreamSender { core },
        )
    }

    pub fn has_ended(&self) -> bool {
        self.core.ended.borrow().is_some()
    }

    pub fn subscribe(&self, f: impl Fn(&StreamEvent<T, E>) + 'static) -> StreamSubscription<T, E> {
        let ended = self.core.ended.borrow().clone();
        if let Some(error) = ended {
            f(&StreamEvent::End(error));
            return StreamSubscription {
                core: Weak::new(),
                id: 0,
            };
        }
        let listener: Rc<dyn Fn(&StreamEvent<T, E>)> = Rc::new(f);
        let id = {
            let mut next = self.core.next_id.borrow_mut();
            let id = *next;
            *next += 1;
            id
        };
        self.core.listeners.borrow_mut().push((id, listener));
        StreamSubscription {
            core: Rc::downgrade(&self.core),
            id,
        }
    }
}

impl<T: Clone + 'static, E: Clone + 'static> StreamSender<T, E> {
    pub fn send(&self, value: T) {
        if self.core.ended.borrow().is_some() {
            return;
        }
        self.deliver(&StreamEvent::Value(value));
    }

    /// Terminate the stream. Only the first end is delivered.
    pub fn end(&self, error: Option<E>) {
        {
            let mut ended = self.core.ended.borrow_mut();
            if ended.is_some() {
                return;
            }
            *ended = Some(error.clone());
        }
        self.deliver(&StreamEvent::End(error));
        self.core.listeners.borrow_mut().clear();
    }

    fn deliver(&self, event: &StreamEvent<T, E>) {
        let listeners: Vec<Rc<dyn Fn(&StreamEvent<T, E>)>> = self
            .core
            .listeners
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in listeners {
            listener(event);
        }
    }
}

impl<T, E> Clone for Stream<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T, E> Clone for StreamSender<T, E> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

/// Handle for removing a [`Stream`] listener.
pub struct StreamSubscription<T, E> {
    core: Weak<StreamCore<T, E>>,
    id: u64,
}

impl<T, E> Disposable for StreamSubscription<T, E> {
    fn dispose(&mut self) {
        if let Some(core) = self.core.upgrade() {
            core.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
        }
        self.core = Weak::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delivers_values_then_single_end() {
        let (stream, sender) = Stream::<i32, &'static str>::channel();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _sub = stream.subscribe(move |event| s.borrow_mut().push(event.clone()));
        sender.send(1);
        sender.end(Some("done"));
        sender.send(2);
        sender.end(None);
        assert_eq!(
            *seen.borrow(),
            vec![StreamEvent::Value(1), StreamEvent::End(Some("done"))]
        );
    }

    #[test]
    fn late_subscriber_sees_the_end() {
        let (stream, sender) = Stream::<i32, &'static str>::channel();
        sender.end(None);
        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        let _sub = stream.subscribe(move |event| s.borrow_mut().push(event.clone()));
        assert_eq!(*seen.borrow(), vec![StreamEvent::End(None)]);
    }
}
