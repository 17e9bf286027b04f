use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use crate::disposable::Disposable;

type Listener<T> = Box<dyn FnOnce(&T)>;

enum State<T> {
    Pending {
        listeners: Vec<(u64, Listener<T>)>,
        next_id: u64,
    },
    Done(T),
}

/// A single-shot broadcast value.
///
/// A future resolves at most once; every listener observes the same value.
/// Listeners registered after resolution fire immediately and
/// synchronously. Handles are cheap clones sharing one core.
pub struct Future<T> {
    core: Rc<RefCell<State<T>>>,
}

/// The resolving side of a [`Future`].
///
/// Resolution is exactly-once and first-caller-wins: the first `resolve`
/// delivers the value, every later call is a no-op.
pub struct Resolver<T> {
    core: Rc<RefCell<State<T>>>,
}

impl<T: Clone + 'static> Future<T> {
    pub fn pending() -> (Self, Resolver<T>) {
        let core = Rc::new(RefCell::new(State::Pending {
            listeners: Vec::new(),
            next_id: 1,
        }));
        (
            Self {
                core: Rc::clone(&core),
            },
            Resolver { core },
        )
    }

    /// An already-resolved future.
    pub fn ready(value: T) -> Self {
        Self {
            core: Rc::new(RefCell::new(State::Done(value))),
        }
    }

    /// A future that never resolves.
    pub fn never() -> Self {
        let (future, _) = Self::pending();
        future
    }

    pub fn is_resolved(&self) -> bool {
        matches!(&*self.core.borrow(), State::Done(_))
    }

    /// Whether two handles share the same underlying future.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    /// Register a listener for the resolved value.
    ///
    /// The returned [`Subscription`] unsubscribes when disposed; dropping
    /// it without disposing leaves the listener registered.
    pub fn on_result(&self, f: impl FnOnce(&T) + 'static) -> Subscription<T> {
        let mut state = self.core.borrow_mut();
        match &mut *state {
            State::Pending { listeners, next_id } => {
                let id = *next_id;
                *next_id += 1;
                listeners.push((id, Box::new(f)));
                Subscription {
                    core: Rc::downgrade(&self.core),
                    id,
                }
            }
            State::Done(value) => {
                let value = value.clone();
                drop(state);
                f(&value);
                Subscription {
                    core: Weak::new(),
                    id: 0,
                }
            }
        }
    }

    /// Resolve a new future with `f` applied to this future's value.
    pub fn map<U: Clone + 'static>(&self, f: impl FnOnce(T) -> U + 'static) -> Future<U> {
        let (future, resolver) = Future::pending();
        let _ = self.on_result(move |value| {
            resolver.resolve(f(value.clone()));
        });
        future
    }

    /// The first of two futures to resolve wins.
    pub fn select(a: &Future<T>, b: &Future<T>) -> Future<T> {
        let (future, resolver) = Future::pending();
        let first = resolver.clone();
        let _ = a.on_result(move |value| {
            first.resolve(value.clone());
        });
        let _ = b.on_result(move |value| {
            resolver.resolve(value.clone());
        });
        future
    }

    /// Resolve once every future has resolved, preserving order.
    pub fn join(futures: Vec<Future<T>>) -> Future<Vec<T>> {
        if futures.is_empty() {
            return Future::ready(Vec::new());
        }
        let (future, resolver) = Future::pending();
        let results: Rc<RefCell<Vec<Option<T>>>> =
            Rc::new(RefCell::new(vec![None; futures.len()]));
        let remaining = Rc::new(Cell::new(futures.len()));
        for (index, fut) in futures.iter().enumerate() {
            let results = Rc::clone(&results);
            let remaining = Rc::clone(&remaining);
            let resolver = resolver.clone();
            let _ = fut.on_result(move |value| {
                results.borrow_mut()[index] = Some(value.clone());
                remaining.set(remaining.get() - 1);
                if remaining.get() == 0 {
                    let collected = results
                        .borrow_mut()
                        .drain(..)
                        .map(|slot| slot.expect("joined future resolved without a value"))
                        .collect();
                    resolver.resolve(collected);
                }
            });
        }
        future
    }
}

impl<T: Clone + 'static> Resolver<T> {
    /// Deliver the value. Returns `false` if the future was already
    /// resolved and the value was discarded.
    pub fn resolve(&self, value: T) -> bool {
        let listeners = {
            let mut state = self.core.borrow_mut();
            match &mut *state {
                State::Done(_) => return false,
                State::Pending { listeners, .. } => {
                    let taken = std::mem::take(listeners);
                    *state = State::Done(value.clone());
                    taken
                }
            }
        };
        for (_, listener) in listeners {
            listener(&value);
        }
        true
    }
}

impl<T> Clone for Future<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T> Clone for Resolver<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

/// Handle for removing a [`Future`] listener.
pub struct Subscription<T> {
    core: Weak<RefCell<State<T>>>,
    id: u64,
}

impl<T> Disposable for Subscription<T> {
    fn dispose(&mut self) {
        if let Some(core) = self.core.upgrade() {
            if let State::Pending { listeners, .. } = &mut *core.borrow_mut() {
                listeners.retain(|(id, _)| *id != self.id);
            }
        }
        self.core = Weak::new();
    }
}
