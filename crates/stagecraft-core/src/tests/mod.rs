use std::cell::RefCell;
use std::rc::Rc;

use stagecraft_flow::Future;

mod master_detail_tests;
mod modal_tests;
mod selection_tests;

/// The future's value, if it has already resolved.
pub(crate) fn value_of<T: Clone + 'static>(future: &Future<T>) -> Option<T> {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    let _ = future.on_result(move |value| *sink.borrow_mut() = Some(value.clone()));
    let value = slot.borrow().clone();
    value
}
