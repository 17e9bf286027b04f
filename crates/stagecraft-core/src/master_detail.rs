use std::cell::{Cell, RefCell};
use std::rc::Rc;

use stagecraft_flow::{Disposable, DisposeBag, Disposer, ReadSignal, ReadWriteSignal};

use crate::options::PresentationOptions;
use crate::presentation::{AnyPresentable, Presentation};
use crate::screen::Screen;
use crate::selection::{IndexAndElement, KeepSelection};

type DetailHook<T> = Box<dyn Fn(Option<IndexAndElement<T>>) -> Box<dyn Disposable>>;

struct MdInner<T: Clone + 'static> {
    keep: KeepSelection<T>,
    is_collapsed: ReadSignal<Option<bool>>,
    is_same: Rc<dyn Fn(&T, &T) -> bool>,
    needs_update: Rc<dyn Fn(&T, &T) -> bool>,
    current: RefCell<Option<IndexAndElement<T>>>,
    changed: ReadWriteSignal<Option<IndexAndElement<T>>>,
    is_selecting: Cell<bool>,
    hook: RefCell<Option<DetailHook<T>>>,
    detail: RefCell<Option<Box<dyn Disposable>>>,
    sub_bag: RefCell<DisposeBag>,
    bag: DisposeBag,
}

/// Maintains the detail selection of a master/detail layout.
///
/// Wraps a [`KeepSelection`] and a collapsed tri-state (`None` = unknown,
/// treated as collapsed) and decides when detail content must be
/// (re-)presented: expanded layouts track every selection change, while
/// collapsed layouts ignore pure position shifts and only react when the
/// selected identity changes or disappears.
pub struct MasterDetailSelection<T: Clone + 'static> {
    inner: Rc<MdInner<T>>,
}

impl<T: Clone + 'static> MasterDetailSelection<T> {
    pub fn new(
        elements: ReadSignal<Vec<T>>,
        is_same: impl Fn(&T, &T) -> bool + 'static,
        is_collapsed: ReadSignal<Option<bool>>,
    ) -> Self {
        Self::with_needs_update(elements, is_same, |_, _| false, is_collapsed)
    }

    /// `needs_update` decides, for an unchanged identity, whether the
    /// element's content changed enough to require fresh detail.
    pub fn with_needs_update(
        elements: ReadSignal<Vec<T>>,
        is_same: impl Fn(&T, &T) -> bool + 'static,
        needs_update: impl Fn(&T, &T) -> bool + 'static,
        is_collapsed: ReadSignal<Option<bool>>,
    ) -> Self {
        let is_same: Rc<dyn Fn(&T, &T) -> bool> = Rc::new(is_same);
        let keep = KeepSelection::new(elements, {
            let is_same = Rc::clone(&is_same);
            move |a, b| is_same(a, b)
        });
        let inner = Rc::new(MdInner {
            keep,
            is_collapsed: is_collapsed.clone(),
            is_same,
            needs_update: Rc::new(needs_update),
            current: RefCell::new(None),
            changed: ReadWriteSignal::new(None),
            is_selecting: Cell::new(false),
            hook: RefCell::new(None),
            detail: RefCell::new(None),
            sub_bag: RefCell::new(DisposeBag::new()),
            bag: DisposeBag::new(),
        });
        let weak = Rc::downgrade(&inner);
        let listener: Rc<dyn Fn(&Option<bool>)> = Rc::new(move |collapsed| {
            if let Some(inner) = weak.upgrade() {
                MdInner::on_collapsed(&inner, *collapsed);
            }
        });
        is_collapsed.subscribe(Rc::clone(&listener));
        inner.bag.hold(Box::new(listener));
        MdInner::on_collapsed(&inner, is_collapsed.get());
        Self { inner }
    }

    pub fn current(&self) -> Option<IndexAndElement<T>> {
        self.inner.current.borrow().clone()
    }

    /// Signals whenever the detail selection is re-decided.
    pub fn signal(&self) -> ReadSignal<Option<IndexAndElement<T>>> {
        self.inner.changed.read_only()
    }

    pub fn elements(&self) -> Vec<T> {
        self.inner.keep.elements()
    }

    pub fn elements_signal(&self) -> ReadSignal<Vec<T>> {
        self.inner.keep.elements_signal()
    }

    pub fn is_collapsed(&self) -> Option<bool> {
        self.inner.is_collapsed.get()
    }

    /// Select `index`. Selecting the already-selected index is a no-op.
    pub fn select(&self, index: usize) {
        if Some(index) == self.current().map(|(i, _)| i) {
            return;
        }
        let element = self.inner.keep.elements()[index].clone();
        *self.inner.current.borrow_mut() = Some((index, element));
        self.inner.is_selecting.set(true);
        self.inner.keep.select(index);
        self.inner.is_selecting.set(false);
    }

    /// Clear the selection. Deselecting while unselected is a no-op.
    pub fn deselect(&self) {
        MdInner::deselect(&self.inner);
    }

    /// Step to the element before the current one, if any.
    pub fn select_previous(&self) -> bool {
        if let Some((_, element)) = self.current() {
            if let Some(index) = self.inner.keep.index_before(&element) {
                self.select(index);
                return true;
            }
        }
        false
    }

    /// Step to the element after the current one, if any.
    pub fn select_next(&self) -> bool {
        if let Some((_, element)) = self.current() {
            if let Some(index) = self.inner.keep.index_after(&element) {
                self.select(index);
                return true;
            }
        }
        false
    }

    /// Install the present-detail side effect.
    ///
    /// Whatever the previous call to `hook` returned is disposed before
    /// the next call. The hook is called immediately with the current
    /// value (or `None` while collapsed). The returned disposer uninstalls
    /// the hook and tears down the last detail.
    pub fn set_present_detail(
        &self,
        hook: impl Fn(Option<IndexAndElement<T>>) -> Box<dyn Disposable> + 'static,
    ) -> Disposer {
        *self.inner.hook.borrow_mut() = Some(Box::new(hook));
        let initial = if self.inner.is_collapsed.get() == Some(false) {
            self.current()
        } else {
            None
        };
        MdInner::call_detail(&self.inner, initial);
        let weak = Rc::downgrade(&self.inner);
        Disposer::new(move || {
            if let Some(inner) = weak.upgrade() {
                *inner.hook.borrow_mut() = None;
                let detail = inner.detail.borrow_mut().take();
                if let Some(mut detail) = detail {
                    detail.dispose();
                }
            }
        })
    }

    /// Present detail content on `origin` whenever the selection requires
    /// it, dismissing the previously presented detail first.
    ///
    /// The presentation gets `auto_pop_self_and_successors` added to its
    /// options; when the user dismisses a collapsed detail themselves, the
    /// selection is cleared.
    pub fn present_detail_on(
        &self,
        origin: &Screen,
        make: impl Fn(Option<IndexAndElement<T>>) -> Option<Presentation<AnyPresentable<DisposeBag>>>
            + 'static,
    ) -> Disposer {
        let origin = origin.clone();
        let weak = Rc::downgrade(&self.inner);
        let generation = Rc::new(Cell::new(0u64));
        self.set_present_detail(move |value| {
            let inner = match weak.upgrade() {
                Some(inner) => inner,
                None => return Box::new(Disposer::empty()),
            };
            if inner.is_collapsed.get() != Some(false) && value.is_none() {
                return Box::new(Disposer::empty());
            }
            let presentation = match make(value) {
                Some(presentation) => presentation,
                None => return Box::new(Disposer::empty()),
            };
            let generation = Rc::clone(&generation);
            let stamp = generation.get() + 1;
            generation.set(stamp);
            let options = presentation.options | PresentationOptions::auto_pop_self_and_successors();
            let weak = weak.clone();
            let presentation = presentation.with_options(options).on_dismiss(move || {
                // A newer detail replaced this one; its dismissal is not a
                // user action.
                if generation.get() != stamp {
                    return;
                }
                if let Some(inner) = weak.upgrade() {
                    if inner.is_collapsed.get() != Some(false) {
                        MdInner::deselect(&inner);
                    }
                }
            });
            let handle = origin.present_disposable(presentation);
            Box::new(handle.abort_handle())
        })
    }
}

impl<T: Clone + 'static> MdInner<T> {
    fn on_collapsed(inner: &Rc<Self>, collapsed: Option<bool>) {
        // Restart the selection subscription under the new collapse state.
        let old = inner.sub_bag.replace(DisposeBag::new());
        old.dispose();
        let events = Rc::new(Cell::new(0u64));
        let weak = Rc::downgrade(inner);
        let counter = Rc::clone(&events);
        let listener: Rc<dyn Fn(&Option<IndexAndElement<T>>)> = Rc::new(move |value| {
            if let Some(inner) = weak.upgrade() {
                let n = counter.get();
                counter.set(n + 1);
                MdInner::on_selection(&inner, collapsed, value.clone(), n > 0);
            }
        });
        inner.keep.signal().subscribe(Rc::clone(&listener));
        inner.sub_bag.borrow().hold(Box::new(listener));
        // Replay the current value as a non-update; real signals count.
        events.set(1);
        MdInner::on_selection(inner, collapsed, inner.keep.current(), false);
    }

    fn on_selection(
        inner: &Rc<Self>,
        collapsed: Option<bool>,
        new: Option<IndexAndElement<T>>,
        index_was_updated: bool,
    ) {
        let index = new.as_ref().map(|(i, _)| *i);
        let element_did_update = match (&new, &*inner.current.borrow()) {
            (Some((_, n)), Some((_, c))) => !(inner.is_same)(c, n),
            _ => true,
        };
        let prev = inner.current.borrow().clone();
        let prev_index = prev.as_ref().map(|(i, _)| *i);
        let expanded = collapsed == Some(false);

        // Ordered decision table; the arm order is load-bearing.
        if !index_was_updated && index == prev_index {
            return;
        }
        if expanded {
            *inner.current.borrow_mut() = new.clone();
        } else if index.is_none() {
            *inner.current.borrow_mut() = None;
        } else if index_was_updated && element_did_update {
            // A different identity landed under a collapsed selection:
            // force the detail to collapse away.
            *inner.current.borrow_mut() = None;
        }
        // Collapsed with an unchanged identity keeps the previous value.

        let current = inner.current.borrow().clone();
        inner.changed.set(current.clone());

        let element_content_did_change = index_was_updated
            && !element_did_update
            && match (&prev, &current) {
                (Some((_, p)), Some((_, c))) => (inner.needs_update)(p, c),
                _ => false,
            };
        let should_present = inner.is_selecting.get()
            || (index_was_updated && prev_index.is_some() && current.is_none())
            || ((expanded || current.is_some())
                && (element_did_update || element_content_did_change));
        if should_present {
            MdInner::call_detail(inner, current);
        }
    }

    fn call_detail(inner: &Rc<Self>, value: Option<IndexAndElement<T>>) {
        // Release the borrow before disposing: tearing down a detail can
        // re-enter the selection.
        let previous = inner.detail.borrow_mut().take();
        if let Some(mut previous) = previous {
            previous.dispose();
        }
        let hook = inner.hook.borrow_mut().take();
        if let Some(hook) = hook {
            let disposable = hook(value);
            *inner.detail.borrow_mut() = Some(disposable);
            let mut slot = inner.hook.borrow_mut();
            if slot.is_none() {
                *slot = Some(hook);
            }
        }
    }

    fn deselect(inner: &Rc<Self>) {
        if inner.current.borrow().is_none() {
            return;
        }
        *inner.current.borrow_mut() = None;
        MdInner::call_detail(inner, None);
        inner.changed.set(None);
    }
}

impl<T: Clone + 'static> Clone for MasterDetailSelection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}
