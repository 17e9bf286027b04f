//! Test harness utilities for the Stagecraft presentation engine.
//!
//! The engine runs on a cooperative turn queue and talks to the hierarchy
//! through narrow seams; these helpers drive both by hand:
//!
//! - [`TestLoop`] installs a [`RunLoop`] and runs turns manually.
//! - [`EventLog`] captures the lifecycle event sink and restores the
//!   previous handler on drop.
//! - [`RecordingDriver`] commits stack transitions synchronously while
//!   recording every apply; [`DeferredDriver`] withholds commits to
//!   simulate transitions that are still animating.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use stagecraft_core::{
    set_event_handler, CommitFn, EventHandler, PresentationEvent, Screen, ScreenId, StackDriver,
};
use stagecraft_flow::{LoopGuard, RunLoop};

/// A manually driven run loop, installed as the thread's current loop for
/// the lifetime of this value.
pub struct TestLoop {
    run_loop: RunLoop,
    _guard: LoopGuard,
}

impl TestLoop {
    pub fn new() -> Self {
        let run_loop = RunLoop::new();
        let guard = run_loop.install();
        Self {
            run_loop,
            _guard: guard,
        }
    }

    /// Run one turn; returns the number of tasks run.
    pub fn turn(&self) -> usize {
        self.run_loop.turn()
    }

    /// Run turns until the loop goes idle; returns the number of turns.
    pub fn run_until_idle(&self) -> usize {
        let mut turns = 0;
        while !self.run_loop.is_idle() {
            self.run_loop.turn();
            turns += 1;
            assert!(turns < 1000, "run loop failed to go idle");
        }
        turns
    }

    pub fn handle(&self) -> RunLoop {
        self.run_loop.clone()
    }
}

impl Default for TestLoop {
    fn default() -> Self {
        Self::new()
    }
}

/// Captures lifecycle events as compact strings, restoring the previous
/// handler on drop.
pub struct EventLog {
    events: Rc<RefCell<Vec<String>>>,
    previous: RefCell<Option<EventHandler>>,
}

impl EventLog {
    pub fn install() -> Self {
        let events: Rc<RefCell<Vec<String>>> = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&events);
        let previous = set_event_handler(Rc::new(move |event| {
            sink.borrow_mut().push(format_event(event));
        }));
        Self {
            events,
            previous: RefCell::new(Some(previous)),
        }
    }

    /// Drain the captured events.
    pub fn take(&self) -> Vec<String> {
        self.events.borrow_mut().drain(..).collect()
    }

    /// The captured events, left in place.
    pub fn snapshot(&self) -> Vec<String> {
        self.events.borrow().clone()
    }
}

impl Drop for EventLog {
    fn drop(&mut self) {
        if let Some(previous) = self.previous.borrow_mut().take() {
            let _ = set_event_handler(previous);
        }
    }
}

fn format_event(event: &PresentationEvent) -> String {
    match event {
        PresentationEvent::WillEnqueue { presentable, from } => {
            format!("will-enqueue {presentable} from {from}")
        }
        PresentationEvent::WillDequeue { presentable, from } => {
            format!("will-dequeue {presentable} from {from}")
        }
        PresentationEvent::WillPresent {
            presentable,
            from,
            style,
        } => format!("will-present {presentable} from {from} style={style}"),
        PresentationEvent::DidCancel { presentable, from } => {
            format!("did-cancel {presentable} from {from}")
        }
        PresentationEvent::DidDismiss {
            presentable,
            from,
            result,
        } => match result {
            Ok(value) => format!("did-dismiss {presentable} from {from} ok={value}"),
            Err(error) => format!("did-dismiss {presentable} from {from} err={error}"),
        },
    }
}

/// Stack driver that commits synchronously and records each apply as
/// `(screen ids, animated)`.
pub struct RecordingDriver {
    applies: RefCell<Vec<(Vec<ScreenId>, bool)>>,
}

impl RecordingDriver {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            applies: RefCell::new(Vec::new()),
        })
    }

    pub fn applies(&self) -> Vec<(Vec<ScreenId>, bool)> {
        self.applies.borrow().clone()
    }
}

impl StackDriver for RecordingDriver {
    fn apply(&self, target: Vec<Screen>, animated: bool, commit: CommitFn) {
        self.applies
            .borrow_mut()
            .push((target.iter().map(Screen::id).collect(), animated));
        commit(target);
    }
}

/// Stack driver that withholds commits until [`settle`](Self::settle) is
/// called, simulating transitions that are still animating. While commits
/// are queued the driver reports a transition in flight.
pub struct DeferredDriver {
    queued: RefCell<Vec<(Vec<Screen>, bool, CommitFn)>>,
    transitioning: Cell<bool>,
}

impl DeferredDriver {
    pub fn new() -> Rc<Self> {
        Rc::new(Self {
            queued: RefCell::new(Vec::new()),
            transitioning: Cell::new(false),
        })
    }

    /// Force the in-flight-transition report regardless of queued commits.
    pub fn set_transitioning(&self, value: bool) {
        self.transitioning.set(value);
    }

    pub fn queued_applies(&self) -> usize {
        self.queued.borrow().len()
    }

    /// The animated flag of each queued apply, oldest first.
    pub fn animated_applies(&self) -> Vec<bool> {
        self.queued
            .borrow()
            .iter()
            .map(|(_, animated, _)| *animated)
            .collect()
    }

    /// Land every queued commit, in order.
    pub fn settle(&self) {
        let queued = self.queued.borrow_mut().drain(..).collect::<Vec<_>>();
        for (target, _, commit) in queued {
            commit(target);
        }
    }
}

impl StackDriver for DeferredDriver {
    fn is_transitioning(&self) -> bool {
        self.transitioning.get() || !self.queued.borrow().is_empty()
    }

    fn apply(&self, target: Vec<Screen>, animated: bool, commit: CommitFn) {
        self.queued.borrow_mut().push((target, animated, commit));
    }
}
