use std::cell::RefCell;
use std::rc::{Rc, Weak};

struct SignalCore<T> {
    value: RefCell<T>,
    listeners: RefCell<Vec<Weak<dyn Fn(&T)>>>,
}

impl<T: Clone> SignalCore<T> {
    fn notify(&self) {
        // Snapshot both the value and the upgraded listeners before calling
        // out: a listener may set the signal again or subscribe reentrantly.
        let value = self.value.borrow().clone();
        let listeners: Vec<Rc<dyn Fn(&T)>> = {
            let mut listeners = self.listeners.borrow_mut();
            listeners.retain(|weak| weak.strong_count() > 0);
            listeners.iter().filter_map(Weak::upgrade).collect()
        };
        for listener in listeners {
            listener(&value);
        }
    }
}

/// Read handle for a current value that can be observed over time.
///
/// Listeners are held weakly: the subscriber keeps the `Rc` listener alive,
/// normally inside a `DisposeBag`, and a dropped listener silently
/// unsubscribes.
pub struct ReadSignal<T>(Rc<SignalCore<T>>);

/// Read/write handle. Unlike a deduplicating state cell, every `set`
/// notifies, including sets of an equal value — selection tracking depends
/// on observing each collection update.
pub struct ReadWriteSignal<T>(Rc<SignalCore<T>>);

impl<T: Clone + 'static> ReadSignal<T> {
    pub fn get(&self) -> T {
        self.0.value.borrow().clone()
    }

    /// Borrow the current value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.0.value.borrow())
    }

    /// Subscribe to updates. The listener is held weakly; keep the `Rc`
    /// alive for as long as updates should flow.
    pub fn subscribe(&self, listener: Rc<dyn Fn(&T)>) {
        self.0.listeners.borrow_mut().push(Rc::downgrade(&listener));
    }
}

impl<T: Clone + 'static> ReadWriteSignal<T> {
    pub fn new(initial: T) -> Self {
        Self(Rc::new(SignalCore {
            value: RefCell::new(initial),
            listeners: RefCell::new(Vec::new()),
        }))
    }

    pub fn get(&self) -> T {
        self.0.value.borrow().clone()
    }

    /// Replace the value and notify every live listener.
    pub fn set(&self, value: T) {
        *self.0.value.borrow_mut() = value;
        self.0.notify();
    }

    pub fn subscribe(&self, listener: Rc<dyn Fn(&T)>) {
        self.0.listeners.borrow_mut().push(Rc::downgrade(&listener));
    }

    pub fn read_only(&self) -> ReadSignal<T> {
        ReadSignal(Rc::clone(&self.0))
    }
}

impl<T> Clone for ReadSignal<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}

impl<T> Clone for ReadWriteSignal<T> {
    fn clone(&self) -> Self {
        Self(Rc::clone(&self.0))
    }
}
