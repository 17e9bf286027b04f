use std::cell::Cell;
use std::rc::Rc;

use stagecraft_flow::{Disposer, ReadWriteSignal};

use crate::master_detail::MasterDetailSelection;

struct DetailProbe {
    presented: Rc<Cell<Option<usize>>>,
    count: Rc<Cell<usize>>,
}

/// Install a present-detail hook recording the presented index. With
/// `count_only_some`, re-presentations of "no detail" are not counted,
/// matching how a collapsed layout shows nothing.
fn observe<T: Clone + 'static>(
    selection: &MasterDetailSelection<T>,
    count_only_some: bool,
) -> (DetailProbe, Disposer) {
    let presented = Rc::new(Cell::new(None));
    let count = Rc::new(Cell::new(0));
    let guard = selection.set_present_detail({
        let presented = Rc::clone(&presented);
        let count = Rc::clone(&count);
        move |value| {
            let index = value.as_ref().map(|(i, _)| *i);
            presented.set(index);
            if !count_only_some || index.is_some() {
                count.set(count.get() + 1);
            }
            let presented = Rc::clone(&presented);
            Box::new(Disposer::new(move || presented.set(None)))
        }
    });
    (DetailProbe { presented, count }, guard)
}

#[test]
fn expanded_presents_on_every_selection_change() {
    let items = ReadWriteSignal::new(vec![1, 2, 3]);
    let collapsed = ReadWriteSignal::new(Some(false));
    let selection =
        MasterDetailSelection::new(items.read_only(), |a: &i32, b: &i32| a == b, collapsed.read_only());
    let (probe, _guard) = observe(&selection, false);

    assert_eq!(probe.presented.get(), Some(0));
    selection.select(1);
    assert_eq!(probe.presented.get(), Some(1));
    items.set(vec![]);
    assert_eq!(probe.presented.get(), None);
    items.set(vec![4, 5, 6]);
    assert_eq!(probe.presented.get(), Some(0));

    selection.deselect();
    assert_eq!(probe.presented.get(), None);

    selection.select(2);
    assert_eq!(probe.presented.get(), Some(2));
    items.set(vec![4, 5]);
    assert_eq!(probe.presented.get(), Some(1));

    assert_eq!(probe.count.get(), 7);
}

#[test]
fn collapsed_suppresses_position_only_churn() {
    let items = ReadWriteSignal::new(vec![1, 2, 3]);
    let collapsed = ReadWriteSignal::new(Some(true));
    let selection =
        MasterDetailSelection::new(items.read_only(), |a: &i32, b: &i32| a == b, collapsed.read_only());
    let (probe, _guard) = observe(&selection, true);

    assert_eq!(probe.presented.get(), None);
    selection.select(1);
    assert_eq!(probe.presented.get(), Some(1));
    items.set(vec![]);
    assert_eq!(probe.presented.get(), None);
    items.set(vec![4, 5, 6]);
    assert_eq!(probe.presented.get(), None);
    selection.select(2);
    assert_eq!(probe.presented.get(), Some(2));
    // The selected identity changes while collapsed: detail collapses away.
    items.set(vec![4, 5]);
    assert_eq!(probe.presented.get(), None);

    assert_eq!(probe.count.get(), 2);
}

#[test]
fn collapse_transitions_keep_the_selection() {
    let items = ReadWriteSignal::new(vec![1, 2, 3]);
    let collapsed = ReadWriteSignal::new(Some(true));
    let selection =
        MasterDetailSelection::new(items.read_only(), |a: &i32, b: &i32| a == b, collapsed.read_only());
    let (probe, _guard) = observe(&selection, true);

    assert_eq!(probe.presented.get(), None);
    collapsed.set(Some(false));
    assert_eq!(probe.presented.get(), Some(0));
    selection.select(1);
    assert_eq!(probe.presented.get(), Some(1));
    collapsed.set(Some(true));
    assert_eq!(probe.presented.get(), Some(1));
    selection.deselect();
    assert_eq!(probe.presented.get(), None);
    selection.select(2);
    assert_eq!(probe.presented.get(), Some(2));
    collapsed.set(Some(false));
    assert_eq!(probe.presented.get(), Some(2));

    assert_eq!(probe.count.get(), 3);
}

#[test]
fn expanded_reselection_of_same_index_is_a_no_op() {
    let items = ReadWriteSignal::new(vec![1, 2, 3]);
    let collapsed = ReadWriteSignal::new(Some(false));
    let selection =
        MasterDetailSelection::new(items.read_only(), |a: &i32, b: &i32| a == b, collapsed.read_only());
    let (probe, _guard) = observe(&selection, false);

    assert_eq!(probe.presented.get(), Some(0));
    selection.select(1);
    selection.select(1);
    assert_eq!(probe.presented.get(), Some(1));
    selection.select(2);
    selection.select(2);
    assert_eq!(probe.presented.get(), Some(2));

    assert_eq!(probe.count.get(), 3);
}

#[test]
fn collapsed_reselection_of_same_index_is_a_no_op() {
    let items = ReadWriteSignal::new(vec![1, 2, 3]);
    let collapsed = ReadWriteSignal::new(Some(true));
    let selection =
        MasterDetailSelection::new(items.read_only(), |a: &i32, b: &i32| a == b, collapsed.read_only());
    let (probe, _guard) = observe(&selection, true);

    assert_eq!(probe.presented.get(), None);
    selection.select(1);
    selection.select(1);
    assert_eq!(probe.presented.get(), Some(1));
    selection.select(2);
    selection.select(2);
    assert_eq!(probe.presented.get(), Some(2));

    selection.deselect();
    selection.select(1);
    selection.select(1);
    assert_eq!(probe.presented.get(), Some(1));

    assert_eq!(probe.count.get(), 3);
}

#[test]
fn content_only_changes_follow_the_needs_update_predicate() {
    // Identity is the first field; the second is mutable content.
    let items = ReadWriteSignal::new(vec![(1, 0), (2, 0)]);
    let collapsed = ReadWriteSignal::new(Some(false));
    let selection = MasterDetailSelection::with_needs_update(
        items.read_only(),
        |a: &(i32, i32), b: &(i32, i32)| a.0 == b.0,
        |a, b| a.1 != b.1,
        collapsed.read_only(),
    );
    let (probe, _guard) = observe(&selection, false);
    assert_eq!(probe.count.get(), 1);

    selection.select(1);
    assert_eq!(probe.count.get(), 2);

    // Same identity, changed content: re-present.
    items.set(vec![(1, 0), (2, 1)]);
    assert_eq!(probe.presented.get(), Some(1));
    assert_eq!(probe.count.get(), 3);

    // Same identity, same content: nothing to refresh.
    items.set(vec![(1, 0), (2, 1)]);
    assert_eq!(probe.count.get(), 3);
}

#[test]
fn deselect_while_unselected_is_a_no_op() {
    let items = ReadWriteSignal::new(vec![1, 2]);
    let collapsed = ReadWriteSignal::new(Some(true));
    let selection =
        MasterDetailSelection::new(items.read_only(), |a: &i32, b: &i32| a == b, collapsed.read_only());
    let (probe, _guard) = observe(&selection, false);
    let calls = probe.count.get();
    selection.deselect();
    selection.deselect();
    assert_eq!(probe.count.get(), calls);
}

#[test]
fn step_between_neighbors() {
    let items = ReadWriteSignal::new(vec![1, 2, 3]);
    let collapsed = ReadWriteSignal::new(Some(false));
    let selection =
        MasterDetailSelection::new(items.read_only(), |a: &i32, b: &i32| a == b, collapsed.read_only());
    let (probe, _guard) = observe(&selection, false);

    assert_eq!(probe.presented.get(), Some(0));
    assert!(!selection.select_previous());
    assert!(selection.select_next());
    assert_eq!(probe.presented.get(), Some(1));
    assert!(selection.select_next());
    assert_eq!(probe.presented.get(), Some(2));
    assert!(!selection.select_next());
    assert!(selection.select_previous());
    assert_eq!(probe.presented.get(), Some(1));
}
