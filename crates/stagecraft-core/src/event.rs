use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::thread_local;

use crate::error::PresentResult;

/// Identifies a presentable in lifecycle events: its debug title when one
/// was set, otherwise `Screen#<id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PresentableId(pub String);

impl fmt::Display for PresentableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lifecycle events emitted by the engine.
///
/// `DidDismiss` carries the debug-formatted business value on success, or
/// the error that ended the presentation.
#[derive(Debug, Clone)]
pub enum PresentationEvent {
    /// A modal presentation is blocked and will wait in the queue.
    WillEnqueue {
        presentable: PresentableId,
        from: PresentableId,
    },
    /// A queued modal presentation is unblocked and about to attach.
    WillDequeue {
        presentable: PresentableId,
        from: PresentableId,
    },
    /// A presentation is about to be attached.
    WillPresent {
        presentable: PresentableId,
        from: PresentableId,
        style: &'static str,
    },
    /// A presentation was cancelled and is about to be dismissed.
    DidCancel {
        presentable: PresentableId,
        from: PresentableId,
    },
    /// A presentation ended, with its result or the ending error.
    DidDismiss {
        presentable: PresentableId,
        from: PresentableId,
        result: PresentResult<String>,
    },
}

/// The process-wide event sink.
pub type EventHandler = Rc<dyn Fn(&PresentationEvent)>;

thread_local! {
    static HANDLER: RefCell<EventHandler> = RefCell::new(Rc::new(log_event));
}

/// Replace the event sink wholesale and return the previous handler.
///
/// The handler is replaced, never stacked: tests install a capturing
/// handler and restore the one they got back.
pub fn set_event_handler(handler: EventHandler) -> EventHandler {
    HANDLER.with(|slot| std::mem::replace(&mut *slot.borrow_mut(), handler))
}

pub(crate) fn emit(event: PresentationEvent) {
    let handler = HANDLER.with(|slot| Rc::clone(&slot.borrow()));
    handler(&event);
}

fn log_event(event: &PresentationEvent) {
    match event {
        PresentationEvent::WillEnqueue { presentable, from } => {
            tracing::info!(%presentable, %from, "will enqueue modal presentation");
        }
        PresentationEvent::WillDequeue { presentable, from } => {
            tracing::info!(%presentable, %from, "will dequeue modal presentation");
        }
        PresentationEvent::WillPresent {
            presentable,
            from,
            style,
        } => {
            tracing::info!(%presentable, %from, style, "will present");
        }
        PresentationEvent::DidCancel { presentable, from } => {
            tracing::info!(%presentable, %from, "did cancel presentation");
        }
        PresentationEvent::DidDismiss {
            presentable,
            from,
            result,
        } => match result {
            Ok(value) => {
                tracing::info!(%presentable, %from, %value, "did end presentation");
            }
            Err(error) => {
                tracing::info!(%presentable, %from, %error, "did end presentation");
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn handler_replacement_is_wholesale() {
        let count = Rc::new(Cell::new(0));
        let c = count.clone();
        let previous = set_event_handler(Rc::new(move |_| c.set(c.get() + 1)));
        emit(PresentationEvent::DidCancel {
            presentable: PresentableId("a".into()),
            from: PresentableId("b".into()),
        });
        let replaced = set_event_handler(previous);
        emit(PresentationEvent::DidCancel {
            presentable: PresentableId("a".into()),
            from: PresentableId("b".into()),
        });
        drop(replaced);
        assert_eq!(count.get(), 1);
    }
}
