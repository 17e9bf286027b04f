use std::cell::Cell;
use std::collections::HashSet;
use std::rc::Rc;

use proptest::prelude::*;
use stagecraft_flow::ReadWriteSignal;

use crate::selection::KeepSelection;

#[test]
fn selection_follows_identity_through_churn() {
    let items = ReadWriteSignal::new(vec![1, 2, 3]);
    let selection = KeepSelection::new(items.read_only(), |a: &i32, b: &i32| a == b);

    let count = Rc::new(Cell::new(0));
    let index = Rc::new(Cell::new(selection.current().map(|(i, _)| i)));
    let listener: Rc<dyn Fn(&Option<(usize, i32)>)> = Rc::new({
        let count = Rc::clone(&count);
        let index = Rc::clone(&index);
        move |value| {
            count.set(count.get() + 1);
            index.set(value.as_ref().map(|(i, _)| *i));
        }
    });
    selection.signal().subscribe(Rc::clone(&listener));

    assert_eq!(index.get(), Some(0));
    selection.select(1);
    assert_eq!(index.get(), Some(1));
    items.set(vec![1, 3]);
    assert_eq!(index.get(), Some(1), "element 2 vanished; 3 moved up");
    items.set(vec![1, 2, 3]);
    assert_eq!(index.get(), Some(2), "element 3 moved back to the end");
    items.set(vec![1, 2]);
    items.set(vec![1, 2]);
    assert_eq!(index.get(), Some(1));
    items.set(vec![]);
    assert_eq!(index.get(), None);
    items.set(vec![1, 2, 3]);
    items.set(vec![1, 2, 3]);
    assert_eq!(index.get(), Some(0));

    // One notification per select/mutation, including no-op mutations.
    assert_eq!(count.get(), 8);
}

#[test]
fn selection_falls_forward_then_backward() {
    let items = ReadWriteSignal::new(vec![10, 20, 30]);
    let selection = KeepSelection::new(items.read_only(), |a: &i32, b: &i32| a == b);

    // Forward: the selected head disappears, its later neighbor survives.
    items.set(vec![20, 30]);
    assert_eq!(selection.current(), Some((0, 20)));

    // Backward: the selected tail disappears; land after the survivor
    // when possible, else on it.
    selection.select(1);
    items.set(vec![20, 99]);
    assert_eq!(selection.current(), Some((1, 99)));
    items.set(vec![20]);
    assert_eq!(selection.current(), Some((0, 20)));

    items.set(vec![]);
    assert_eq!(selection.current(), None);
    items.set(vec![7, 8]);
    assert_eq!(selection.current(), Some((0, 7)));
}

#[test]
fn neighbor_lookups_step_by_identity() {
    let items = ReadWriteSignal::new(vec![1, 2, 3]);
    let selection = KeepSelection::new(items.read_only(), |a: &i32, b: &i32| a == b);
    assert_eq!(selection.index_before(&1), None);
    assert_eq!(selection.index_before(&3), Some(1));
    assert_eq!(selection.index_after(&1), Some(1));
    assert_eq!(selection.index_after(&3), None);
    assert_eq!(selection.index_after(&42), None);
}

proptest! {
    // Whatever churn the collection goes through, the selection stays a
    // valid index, and an element that survives (by identity) keeps it.
    #[test]
    fn selection_stays_consistent_under_churn(
        scripts in proptest::collection::vec(
            proptest::collection::vec(0i32..8, 0..6),
            1..12,
        )
    ) {
        let items = ReadWriteSignal::new(Vec::new());
        let selection = KeepSelection::new(items.read_only(), |a: &i32, b: &i32| a == b);
        for mut script in scripts {
            let mut seen = HashSet::new();
            script.retain(|v| seen.insert(*v));
            let previous = selection.current();
            items.set(script.clone());
            match selection.current() {
                Some((index, element)) => {
                    prop_assert!(index < script.len());
                    prop_assert_eq!(script[index], element);
                    if let Some((_, prev_element)) = previous {
                        if let Some(pos) = script.iter().position(|v| *v == prev_element) {
                            prop_assert_eq!(index, pos);
                        }
                    }
                }
                None => prop_assert!(script.is_empty()),
            }
        }
    }
}
