use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::Rc;

use stagecraft_flow::{DisposeBag, Future, Resolver};

use crate::error::{PresentError, PresentResult};
use crate::event::{emit, PresentationEvent};
use crate::options::PresentationOptions;
use crate::screen::{ContainerResult, Dismisser, Screen};

type AffordanceFn = Box<dyn FnOnce(&DisposeBag) -> Future<PresentResult<()>>>;

struct ModalEntry {
    host: Screen,
    content: Screen,
    waited: bool,
    cancelled: Cell<bool>,
    attached: Cell<bool>,
    affordance: RefCell<Option<AffordanceFn>>,
    result: Resolver<PresentResult<()>>,
    // Gates the queue: resolves only once this entry's detach has finished
    // (or the entry was cancelled before attaching).
    unblocked: Future<PresentResult<()>>,
    bag: DisposeBag,
}

struct ModalHostInner {
    queue: RefCell<VecDeque<Rc<ModalEntry>>>,
    busy: Cell<bool>,
}

/// Serializes modal presentations per host screen: strictly FIFO, at most
/// one entry attached at a time, and the queue only advances once the
/// current entry's detach future resolves.
#[derive(Clone)]
pub(crate) struct ModalHost {
    inner: Rc<ModalHostInner>,
}

impl ModalHost {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(ModalHostInner {
                queue: RefCell::new(VecDeque::new()),
                busy: Cell::new(false),
            }),
        }
    }

    pub(crate) fn is_idle(&self) -> bool {
        !self.inner.busy.get() && self.inner.queue.borrow().is_empty()
    }

    fn enqueue(&self, entry: Rc<ModalEntry>) {
        self.inner.queue.borrow_mut().push_back(entry);
        self.advance();
    }

    fn advance(&self) {
        if self.inner.busy.get() {
            return;
        }
        let entry = match self.inner.queue.borrow_mut().pop_front() {
            Some(entry) => entry,
            None => return,
        };
        self.inner.busy.set(true);
        let blocker = Self::run(&entry);
        let host = self.clone();
        let _ = blocker.on_result(move |_| {
            entry.bag.dispose();
            host.inner.busy.set(false);
            host.advance();
        });
    }

    fn run(entry: &Rc<ModalEntry>) -> Future<PresentResult<()>> {
        if entry.cancelled.get() {
            entry.result.resolve(Err(PresentError::NotPossible));
            return Future::ready(Ok(()));
        }
        if entry.host.presented().is_some() {
            // Something attached outside the queue while this entry waited.
            entry.result.resolve(Err(PresentError::Blocked));
            return Future::ready(Ok(()));
        }
        if entry.waited {
            emit(PresentationEvent::WillDequeue {
                presentable: entry.content.presentation_id(),
                from: entry.host.presentation_id(),
            });
        }
        entry.host.attach_modal(&entry.content);
        entry.attached.set(true);
        let affordance = entry.affordance.borrow_mut().take();
        if let Some(affordance) = affordance {
            let watcher = affordance(&entry.bag);
            let result = entry.result.clone();
            let _ = watcher.on_result(move |outcome| {
                result.resolve(*outcome);
            });
        }
        entry.unblocked.clone()
    }
}

/// Attach `content` modally on `host`, queuing behind any presentation
/// already in flight.
///
/// `affordance` runs at attach time; the future it returns force-ends the
/// presentation when it resolves (a dismiss-control trigger surfaces as
/// `Err(Dismissed)`). `keep_alive` pins auxiliary objects, such as the
/// stack container content was embedded in, for the entry's lifetime.
pub(crate) fn present_queued(
    host: &Screen,
    content: Screen,
    options: PresentationOptions,
    keep_alive: Option<Box<dyn Any>>,
    affordance: impl FnOnce(&DisposeBag) -> Future<PresentResult<()>> + 'static,
) -> ContainerResult {
    let queue = host.modal_host();
    let blocked = host.presented().is_some() || !queue.is_idle();
    if blocked && options.contains(PresentationOptions::fail_on_block()) {
        return (Future::ready(Err(PresentError::Blocked)), Dismisser::noop());
    }

    if blocked {
        emit(PresentationEvent::WillEnqueue {
            presentable: content.presentation_id(),
            from: host.presentation_id(),
        });
    }

    let (result_future, result) = Future::pending();
    let (unblocked, unblock) = Future::pending();
    let bag = DisposeBag::new();
    if let Some(token) = keep_alive {
        bag.hold(token);
    }
    let entry = Rc::new(ModalEntry {
        host: host.clone(),
        content: content.clone(),
        waited: blocked,
        cancelled: Cell::new(false),
        attached: Cell::new(false),
        affordance: RefCell::new(Some(Box::new(affordance))),
        result,
        unblocked,
        bag,
    });

    let dismiss_entry = Rc::clone(&entry);
    let host_screen = host.clone();
    let dismisser = Dismisser::new(move || {
        if !dismiss_entry.attached.get() {
            // Still queued: mark cancelled so the queue skips it at its turn.
            dismiss_entry.cancelled.set(true);
            unblock.resolve(Ok(()));
            return Future::ready(Ok(()));
        }
        let detach = host_screen.dismiss_modal(&dismiss_entry.content);
        let _ = detach.on_result(move |outcome| {
            unblock.resolve(*outcome);
        });
        detach
    });

    queue.enqueue(entry);
    (result_future, dismisser)
}
