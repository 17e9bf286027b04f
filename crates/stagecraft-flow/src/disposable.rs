use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// A resource that can be released explicitly.
///
/// Disposal must be idempotent: the first call releases, later calls are
/// no-ops.
pub trait Disposable {
    fn dispose(&mut self);
}

/// A one-shot cleanup closure.
pub struct Disposer(Option<Box<dyn FnOnce()>>);

impl Disposer {
    pub fn new(f: impl FnOnce() + 'static) -> Self {
        Self(Some(Box::new(f)))
    }

    /// A disposer that does nothing, for code paths with nothing to release.
    pub fn empty() -> Self {
        Self(None)
    }
}

impl Disposable for Disposer {
    fn dispose(&mut self) {
        if let Some(f) = self.0.take() {
            f();
        }
    }
}

impl Drop for Disposer {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct BagInner {
    disposed: Cell<bool>,
    items: RefCell<Vec<Box<dyn Disposable>>>,
    // Keep-alive storage for listener Rcs and other opaque tokens whose
    // lifetime must match the bag's.
    tokens: RefCell<Vec<Box<dyn Any>>>,
}

impl BagInner {
    fn drain(&self) {
        // Snapshot before disposing: a disposal callback may re-enter the
        // bag and add or dispose further items.
        loop {
            let mut batch = {
                let mut items = self.items.borrow_mut();
                if items.is_empty() {
                    break;
                }
                std::mem::take(&mut *items)
            };
            for item in batch.iter_mut() {
                item.dispose();
            }
        }
        self.tokens.borrow_mut().clear();
    }
}

impl Drop for BagInner {
    fn drop(&mut self) {
        if !self.disposed.replace(true) {
            self.drain();
        }
    }
}

/// A collection of disposables released together.
///
/// Bags are cheap handles: cloning shares the same underlying collection.
/// Once a bag has been disposed, anything added later is disposed
/// immediately. The last handle disposes the bag on drop.
pub struct DisposeBag {
    inner: Rc<BagInner>,
}

impl DisposeBag {
    pub fn new() -> Self {
        Self {
            inner: Rc::new(BagInner {
                disposed: Cell::new(false),
                items: RefCell::new(Vec::new()),
                tokens: RefCell::new(Vec::new()),
            }),
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.disposed.get()
    }

    /// Add a disposable to be released when the bag is disposed.
    pub fn insert(&self, mut disposable: impl Disposable + 'static) {
        if self.inner.disposed.get() {
            disposable.dispose();
            return;
        }
        self.inner.items.borrow_mut().push(Box::new(disposable));
    }

    /// Add a cleanup closure to run when the bag is disposed.
    pub fn on_dispose(&self, f: impl FnOnce() + 'static) {
        self.insert(Disposer::new(f));
    }

    /// Keep an opaque token alive for the lifetime of the bag.
    ///
    /// Used to own the strong side of weakly-held callbacks: the bag owns
    /// the `Rc`, whoever holds the matching `Weak` treats a failed upgrade
    /// as "already cancelled".
    pub fn hold(&self, token: Box<dyn Any>) {
        if self.inner.disposed.get() {
            return;
        }
        self.inner.tokens.borrow_mut().push(token);
    }

    /// Release everything in the bag. Idempotent.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        self.inner.drain();
    }
}

impl Default for DisposeBag {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DisposeBag {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Disposable for DisposeBag {
    fn dispose(&mut self) {
        DisposeBag::dispose(self);
    }
}
