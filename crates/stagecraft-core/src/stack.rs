use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use stagecraft_flow::{run_loop, DisposeBag, Disposer, Future};
use tracing::warn;

use crate::error::{PresentError, PresentResult};
use crate::options::PresentationOptions;
use crate::screen::{
    ContainerResult, DismissControl, DismissHost, Dismisser, PresentingContainer, Screen, ScreenId,
    ScreenKind,
};

/// How many turns a transition may take to land before the remaining
/// requests are failed with a diagnostic.
const MAX_SETTLE_RETRIES: u32 = 8;

type CompletionCell = RefCell<Option<Box<dyn FnOnce(PresentResult<()>)>>>;

struct PushPop {
    screen: Screen,
    popping: bool,
    animated: bool,
    no_coalesce: bool,
    // The queue's non-owning side; the strong side lives in `bag`. A
    // failed upgrade means the request was cancelled and completing is a
    // no-op.
    completion: Weak<CompletionCell>,
    bag: DisposeBag,
}

impl PushPop {
    fn new(
        screen: Screen,
        popping: bool,
        options: PresentationOptions,
        on_complete: Box<dyn FnOnce(PresentResult<()>)>,
    ) -> Rc<Self> {
        let cell: Rc<CompletionCell> = Rc::new(RefCell::new(Some(on_complete)));
        let completion = Rc::downgrade(&cell);
        let bag = DisposeBag::new();
        bag.hold(Box::new(cell));
        Rc::new(Self {
            screen,
            popping,
            animated: options.animated(),
            no_coalesce: options.contains(PresentationOptions::disable_push_pop_coalescing()),
            completion,
            bag,
        })
    }

    fn complete(&self, result: PresentResult<()>) {
        if let Some(cell) = self.completion.upgrade() {
            let callback = cell.borrow_mut().take();
            if let Some(f) = callback {
                f(result);
            }
        }
    }
}

pub type CommitFn = Box<dyn FnOnce(Vec<Screen>)>;

/// Applies a computed screen order to the real hierarchy.
///
/// The engine computes target orders; a driver owns the toolkit's actual
/// transition timing and calls `commit` once the hierarchy reflects the
/// target. The default driver lands every change synchronously; tests
/// substitute one that holds commits back to simulate running animations.
pub trait StackDriver {
    /// Whether a transition is currently in flight.
    fn is_transitioning(&self) -> bool {
        false
    }

    /// Apply `target`, calling `commit` once the hierarchy reflects it.
    fn apply(&self, target: Vec<Screen>, animated: bool, commit: CommitFn);
}

/// Driver that lands every change synchronously.
#[derive(Debug, Default)]
pub struct ImmediateDriver;

impl StackDriver for ImmediateDriver {
    fn apply(&self, target: Vec<Screen>, _animated: bool, commit: CommitFn) {
        commit(target);
    }
}

/// A stack-based container with same-turn push/pop coalescing.
///
/// Requests issued within one turn are batched into a single hierarchy
/// mutation; a pop of content whose push has not been flushed cancels the
/// push outright, and both complete as successful no-ops. Settled pops
/// complete immediately; settled pushes complete when the screen is later
/// popped, which is how a pushed presentation learns that it ended.
pub struct StackContainer {
    weak_self: Weak<StackContainer>,
    screen: Screen,
    driver: Rc<dyn StackDriver>,
    current: RefCell<Vec<Screen>>,
    pending: RefCell<Vec<Rc<PushPop>>>,
    pop_listeners: RefCell<IndexMap<ScreenId, Vec<Rc<PushPop>>>>,
    process_scheduled: Cell<bool>,
    retries: Cell<u32>,
}

impl StackContainer {
    pub fn new() -> Rc<Self> {
        Self::with_driver(Rc::new(ImmediateDriver))
    }

    pub fn with_driver(driver: Rc<dyn StackDriver>) -> Rc<Self> {
        let container = Rc::new_cyclic(|weak_self: &Weak<StackContainer>| Self {
            weak_self: weak_self.clone(),
            screen: Screen::with_kind(ScreenKind::Stack),
            driver,
            current: RefCell::new(Vec::new()),
            pending: RefCell::new(Vec::new()),
            pop_listeners: RefCell::new(IndexMap::new()),
            process_scheduled: Cell::new(false),
            retries: Cell::new(0),
        });
        let presenter: Rc<dyn PresentingContainer> = container.clone();
        container.screen.attach_presenter(&presenter);
        let host: Rc<dyn DismissHost> = container.clone();
        container.screen.attach_dismiss_host(&host);
        container
    }

    /// The screen representing this container in the hierarchy.
    pub fn screen(&self) -> Screen {
        self.screen.clone()
    }

    /// The currently attached screens, bottom to top.
    pub fn screens(&self) -> Vec<Screen> {
        self.current.borrow().clone()
    }

    /// Push `screen`. The future resolves `Ok` once the screen is later
    /// popped, or `Err(AlreadyPresented)` for duplicate content.
    pub fn push(&self, screen: Screen, options: PresentationOptions) -> Future<PresentResult<()>> {
        let (future, resolver) = Future::pending();
        let request = PushPop::new(
            screen,
            false,
            options,
            Box::new(move |result| {
                resolver.resolve(result);
            }),
        );
        self.append(request);
        future
    }

    /// Pop `screen`. The future resolves `Ok` once the pop has settled;
    /// pops of content that is not attached settle as no-ops.
    pub fn pop(&self, screen: Screen, options: PresentationOptions) -> Future<PresentResult<()>> {
        let (future, resolver) = Future::pending();
        let request = PushPop::new(
            screen,
            true,
            options,
            Box::new(move |_| {
                resolver.resolve(Ok(()));
            }),
        );
        self.append(request);
        future
    }

    fn append(&self, request: Rc<PushPop>) {
        if request.popping {
            let cancelled_push = {
                let mut pending = self.pending.borrow_mut();
                pending
                    .iter()
                    .position(|p| !p.popping && p.screen == request.screen)
                    .map(|pos| pending.remove(pos))
            };
            if let Some(push) = cancelled_push {
                // Same-turn push/pop cancel out: neither touches the
                // hierarchy, both complete as successful no-ops.
                push.complete(Ok(()));
                request.complete(Ok(()));
                return;
            }
        }
        self.pending.borrow_mut().push(Rc::clone(&request));
        // Coalescing the very first attach would show an empty container
        // for a turn, so an otherwise-settled empty stack processes at
        // once, as does any request that opts out of coalescing.
        if request.no_coalesce || self.current.borrow().is_empty() {
            self.process();
        } else {
            self.schedule_process();
        }
    }

    fn schedule_process(&self) {
        if self.process_scheduled.replace(true) {
            return;
        }
        let weak = self.weak_self.clone();
        run_loop::post(move || {
            if let Some(stack) = weak.upgrade() {
                stack.process_scheduled.set(false);
                stack.process();
            }
        });
    }

    fn process(&self) {
        // Defensive snapshot: completion callbacks may re-enter and append
        // further requests while this batch is applied.
        let batch: Vec<Rc<PushPop>> = self.pending.borrow().clone();
        if batch.is_empty() {
            return;
        }
        let current = self.current.borrow().clone();
        let mut target = current.clone();
        let mut animated = false;
        let mut duplicates = Vec::new();
        for request in &batch {
            animated = animated || request.animated;
            if request.popping {
                if let Some(pos) = target.iter().position(|s| *s == request.screen) {
                    target.remove(pos);
                }
            } else if target.contains(&request.screen) {
                duplicates.push(Rc::clone(request));
            } else {
                target.push(request.screen.clone());
            }
        }
        if !duplicates.is_empty() {
            self.pending
                .borrow_mut()
                .retain(|p| !duplicates.iter().any(|d| Rc::ptr_eq(p, d)));
            for request in duplicates {
                request.complete(Err(PresentError::AlreadyPresented));
            }
        }

        // Net-transition animation: no-op transitions never animate, a pop
        // animates only when the revealed screen is already attached, and a
        // push only when the stack starts non-empty.
        if target == current {
            animated = false;
        } else if target.len() < current.len() {
            animated = animated && target.last().map(|s| current.contains(s)).unwrap_or(false);
        } else {
            animated = animated && !current.is_empty();
        }
        if self.driver.is_transitioning() {
            // Fold the change into the in-flight transition rather than
            // starting a second animated one.
            animated = false;
        }

        let weak = self.weak_self.clone();
        self.driver.apply(
            target.clone(),
            animated,
            Box::new(move |applied| {
                if let Some(stack) = weak.upgrade() {
                    stack.commit(applied);
                }
            }),
        );
        self.finalize(target);
    }

    /// Classify pending requests against the attached hierarchy: settled
    /// pops complete, settled pushes move to the pop-listener table.
    fn settle_pending(&self) {
        let current = self.current.borrow().clone();
        let batch: Vec<Rc<PushPop>> = self.pending.borrow().clone();
        let mut settled = Vec::new();
        for request in &batch {
            let attached = current.contains(&request.screen);
            if request.popping != attached {
                settled.push(Rc::clone(request));
            }
        }
        self.pending
            .borrow_mut()
            .retain(|p| !settled.iter().any(|s| Rc::ptr_eq(p, s)));
        for request in settled {
            if request.popping {
                request.complete(Ok(()));
            } else {
                // Settled pushes complete when their screen is popped.
                self.pop_listeners
                    .borrow_mut()
                    .entry(request.screen.id())
                    .or_default()
                    .push(request);
            }
        }
    }

    fn finalize(&self, target: Vec<Screen>) {
        self.settle_pending();

        if *self.current.borrow() == target {
            self.retries.set(0);
            return;
        }
        // The hierarchy has not landed yet; retry next turn, bounded.
        let attempts = self.retries.get() + 1;
        if attempts > MAX_SETTLE_RETRIES {
            self.retries.set(0);
            let stuck: Vec<Rc<PushPop>> = self.pending.borrow_mut().drain(..).collect();
            warn!(
                stack = %self.screen.presentation_id(),
                stuck = stuck.len(),
                "stack transition never settled; failing pending requests"
            );
            for request in stuck {
                request.complete(Err(PresentError::NotPossible));
            }
            return;
        }
        self.retries.set(attempts);
        let weak = self.weak_self.clone();
        run_loop::post(move || {
            if let Some(stack) = weak.upgrade() {
                // Settle what the landed transition attached before
                // recomputing, so a now-attached push is not mistaken for
                // a duplicate.
                stack.settle_pending();
                if stack.pending.borrow().is_empty() {
                    stack.retries.set(0);
                } else {
                    stack.process();
                }
            }
        });
    }

    fn commit(&self, screens: Vec<Screen>) {
        let old = std::mem::replace(&mut *self.current.borrow_mut(), screens.clone());
        for removed in old.iter().filter(|s| !screens.contains(s)) {
            removed.set_parent(None);
            let waiters = self.pop_listeners.borrow_mut().shift_remove(&removed.id());
            if let Some(waiters) = waiters {
                for request in waiters {
                    request.complete(Ok(()));
                }
            }
        }
        for added in screens.iter().filter(|s| !old.contains(s)) {
            added.set_parent(Some(&self.screen));
        }
    }
}

impl PresentingContainer for StackContainer {
    fn present(&self, content: Screen, options: PresentationOptions) -> ContainerResult {
        let (triggered, installation) = content.install_dismiss_control();
        let dismissed = triggered.map(|()| Err(PresentError::Dismissed));
        let push_result = self.push(content.clone(), options).map(|result| match result {
            // The container popped the screen: the presentation ended.
            Ok(()) => Err(PresentError::Dismissed),
            Err(e) => Err(e),
        });
        let result = Future::select(&dismissed, &push_result);
        // Keep the affordance installed until the presentation ends.
        let _ = result.on_result(move |_| drop(installation));

        let stack = self
            .weak_self
            .upgrade()
            .expect("stack container outlives its own call");
        let dismisser = Dismisser::new(move || {
            let mut pops = Vec::new();
            if options.contains(PresentationOptions::auto_pop()) {
                pops.push(stack.pop(content.clone(), options));
            }
            if options.contains(PresentationOptions::auto_pop_successors()) {
                let screens = stack.screens();
                if let Some(pos) = screens.iter().position(|s| *s == content) {
                    for successor in &screens[pos + 1..] {
                        pops.push(stack.pop(successor.clone(), options));
                    }
                }
            }
            Future::join(pops).map(|results| {
                results
                    .into_iter()
                    .collect::<PresentResult<Vec<()>>>()
                    .map(|_| ())
            })
        });
        (result, dismisser)
    }
}

impl DismissHost for StackContainer {
    fn install_dismiss_control(&self, control: &DismissControl) -> Disposer {
        // Forward to the bottom screen, the one whose bar carries controls.
        let first = self.current.borrow().first().cloned();
        match first {
            Some(first) => first.install_control_default(control),
            None => self.screen.install_control_default(control),
        }
    }
}

impl fmt::Debug for StackContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackContainer")
            .field("screen", &self.screen)
            .field("depth", &self.current.borrow().len())
            .field("pending", &self.pending.borrow().len())
            .finish()
    }
}
