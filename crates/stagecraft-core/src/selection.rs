use std::cell::RefCell;
use std::rc::Rc;

use stagecraft_flow::{DisposeBag, ReadSignal, ReadWriteSignal};

/// The selected position and the element at it.
pub type IndexAndElement<T> = (usize, T);

struct KeepInner<T: Clone + 'static> {
    current: ReadWriteSignal<Option<IndexAndElement<T>>>,
    elements: ReadSignal<Vec<T>>,
    previous: RefCell<Vec<T>>,
    is_same: Rc<dyn Fn(&T, &T) -> bool>,
    bag: DisposeBag,
}

/// Keeps a selection valid while the backing collection changes.
///
/// Elements are recognized by a caller-supplied identity predicate, never
/// by position: when the selected element moves, the selection follows it;
/// when it disappears, the selection falls forward to the next surviving
/// old neighbor, then backward, then to the start, then to none.
pub struct KeepSelection<T: Clone + 'static> {
    inner: Rc<KeepInner<T>>,
}

impl<T: Clone + 'static> KeepSelection<T> {
    pub fn new(elements: ReadSignal<Vec<T>>, is_same: impl Fn(&T, &T) -> bool + 'static) -> Self {
        let inner = Rc::new(KeepInner {
            current: ReadWriteSignal::new(None),
            elements: elements.clone(),
            previous: RefCell::new(Vec::new()),
            is_same: Rc::new(is_same),
            bag: DisposeBag::new(),
        });
        KeepInner::reselect(&inner, &elements.get());
        let weak = Rc::downgrade(&inner);
        let listener: Rc<dyn Fn(&Vec<T>)> = Rc::new(move |new_elements| {
            if let Some(inner) = weak.upgrade() {
                KeepInner::reselect(&inner, new_elements);
            }
        });
        elements.subscribe(Rc::clone(&listener));
        inner.bag.hold(Box::new(listener));
        Self { inner }
    }

    pub fn current(&self) -> Option<IndexAndElement<T>> {
        self.inner.current.get()
    }

    /// Signals every selection re-derivation, including ones that land on
    /// the same index.
    pub fn signal(&self) -> ReadSignal<Option<IndexAndElement<T>>> {
        self.inner.current.read_only()
    }

    pub fn elements(&self) -> Vec<T> {
        self.inner.elements.get()
    }

    pub fn elements_signal(&self) -> ReadSignal<Vec<T>> {
        self.inner.elements.clone()
    }

    /// Select `index` in the current collection.
    pub fn select(&self, index: usize) {
        let element = self.inner.elements.get()[index].clone();
        self.inner.current.set(Some((index, element)));
    }

    /// The index just before `element`, by identity, if any.
    pub fn index_before(&self, element: &T) -> Option<usize> {
        let elements = self.elements();
        let index = elements.iter().position(|e| (self.inner.is_same)(e, element))?;
        index.checked_sub(1)
    }

    /// The index just after `element`, by identity, if any.
    pub fn index_after(&self, element: &T) -> Option<usize> {
        let elements = self.elements();
        let index = elements.iter().position(|e| (self.inner.is_same)(e, element))?;
        (index + 1 < elements.len()).then_some(index + 1)
    }
}

impl<T: Clone + 'static> KeepInner<T> {
    fn reselect(inner: &Rc<Self>, new: &[T]) {
        let old = inner.previous.replace(new.to_vec());
        let is_same = &inner.is_same;
        let old_index = inner.current.get().map(|(index, _)| index);

        let derived = 'derive: {
            let old_index = match old_index {
                Some(index) if index < old.len() => index,
                _ => break 'derive (!new.is_empty()).then_some(0),
            };
            // The selected element may simply have moved.
            let old_item = &old[old_index];
            if let Some(index) = new.iter().position(|e| is_same(e, old_item)) {
                break 'derive Some(index);
            }
            // Fall forward to the first surviving later neighbor.
            for old_item in &old[old_index + 1..] {
                if let Some(index) = new.iter().position(|e| is_same(e, old_item)) {
                    break 'derive Some(index);
                }
            }
            // Fall backward; land just after the survivor when possible.
            for old_item in old[..old_index].iter().rev() {
                if let Some(index) = new.iter().position(|e| is_same(e, old_item)) {
                    break 'derive Some(if index + 1 < new.len() { index + 1 } else { index });
                }
            }
            (!new.is_empty()).then_some(0)
        };

        inner
            .current
            .set(derived.map(|index| (index, new[index].clone())));
    }
}

impl<T: Clone + 'static> Clone for KeepSelection<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}
