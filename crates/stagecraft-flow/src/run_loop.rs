use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;
use std::thread_local;

struct LoopInner {
    queue: RefCell<VecDeque<Box<dyn FnOnce()>>>,
}

/// The cooperative turn queue of the UI thread.
///
/// "Defer to the next turn" means posting a task here. A turn runs exactly
/// the tasks that were queued when it started; tasks posted while a turn
/// runs belong to the following turn. There is no blocking anywhere.
#[derive(Clone)]
pub struct RunLoop {
    inner: Rc<LoopInner>,
}

impl RunLoop {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(LoopInner {
                queue: RefCell::new(VecDeque::new()),
            }),
        }
    }

    /// Queue `task` for the next turn.
    pub fn post(&self, task: impl FnOnce() + 'static) {
        self.inner.queue.borrow_mut().push_back(Box::new(task));
    }

    /// Run one turn: every task queued before this call, in order.
    /// Returns the number of tasks run.
    pub fn turn(&self) -> usize {
        let count = self.inner.queue.borrow().len();
        for _ in 0..count {
            let task = self.inner.queue.borrow_mut().pop_front();
            match task {
                Some(task) => task(),
                None => break,
            }
        }
        count
    }

    pub fn is_idle(&self) -> bool {
        self.inner.queue.borrow().is_empty()
    }

    /// Make this the thread's current loop until the guard drops.
    pub fn install(&self) -> LoopGuard {
        CURRENT.with(|stack| stack.borrow_mut().push(self.clone()));
        LoopGuard { _private: () }
    }
}

impl Default for RunLoop {
    fn default() -> Self {
        Self::new()
    }
}

thread_local! {
    static CURRENT: RefCell<Vec<RunLoop>> = RefCell::new(Vec::new());
}

/// Restores the previously installed loop when dropped.
pub struct LoopGuard {
    _private: (),
}

impl Drop for LoopGuard {
    fn drop(&mut self) {
        CURRENT.with(|stack| {
            stack.borrow_mut().pop();
        });
    }
}

/// Post `task` to the current loop, or run it inline when no loop is
/// installed (headless use without an event loop degrades to immediate
/// execution).
pub fn post(task: impl FnOnce() + 'static) {
    let current = CURRENT.with(|stack| stack.borrow().last().cloned());
    match current {
        Some(run_loop) => run_loop.post(task),
        None => task(),
    }
}
