use stagecraft_flow::Future;
use stagecraft_testing::EventLog;

use super::value_of;
use crate::error::PresentError;
use crate::modal::present_queued;
use crate::options::PresentationOptions;
use crate::screen::{DismissControl, Screen};

#[test]
fn queue_is_fifo_and_never_concurrent() {
    let host = Screen::new();
    let first = Screen::new();
    let second = Screen::new();

    let (result_first, dismiss_first) = present_queued(
        &host,
        first.clone(),
        PresentationOptions::none(),
        None,
        |_| Future::never(),
    );
    assert_eq!(host.presented(), Some(first.clone()));

    let (result_second, _dismiss_second) = present_queued(
        &host,
        second.clone(),
        PresentationOptions::none(),
        None,
        |_| Future::never(),
    );
    assert_eq!(
        host.presented(),
        Some(first),
        "the second presentation must wait for the first detach"
    );
    assert!(value_of(&result_first).is_none());
    assert!(value_of(&result_second).is_none());

    let detach = dismiss_first.invoke();
    assert_eq!(value_of(&detach), Some(Ok(())));
    assert_eq!(host.presented(), Some(second));
}

#[test]
fn fail_on_block_fails_synchronously() {
    let host = Screen::new();
    let first = Screen::new();
    let second = Screen::new();

    let (_result, _dismiss) = present_queued(
        &host,
        first,
        PresentationOptions::none(),
        None,
        |_| Future::never(),
    );
    let (result, _dismiss) = present_queued(
        &host,
        second.clone(),
        PresentationOptions::fail_on_block(),
        None,
        |_| Future::never(),
    );
    assert_eq!(value_of(&result), Some(Err(PresentError::Blocked)));
    assert_ne!(host.presented(), Some(second));
}

#[test]
fn cancelled_while_queued_fails_not_possible_and_never_attaches() {
    let host = Screen::new();
    let first = Screen::new();
    let second = Screen::new();

    let (_result_first, dismiss_first) = present_queued(
        &host,
        first,
        PresentationOptions::none(),
        None,
        |_| Future::never(),
    );
    let (result_second, dismiss_second) = present_queued(
        &host,
        second.clone(),
        PresentationOptions::none(),
        None,
        |_| Future::never(),
    );

    // Cancelling a queued entry marks it; it fails at its turn.
    let _ = dismiss_second.invoke();
    assert!(value_of(&result_second).is_none());

    let _ = dismiss_first.invoke();
    assert_eq!(value_of(&result_second), Some(Err(PresentError::NotPossible)));
    assert_eq!(host.presented(), None);
}

#[test]
fn affordance_trigger_surfaces_as_dismissed() {
    let host = Screen::new();
    let content = Screen::new();
    let control = DismissControl::new();
    content.set_dismiss_control(control.clone());

    let affordance_target = content.clone();
    let (result, _dismiss) = present_queued(
        &host,
        content,
        PresentationOptions::none(),
        None,
        move |bag| {
            let (triggered, installation) = affordance_target.install_dismiss_control();
            bag.insert(installation);
            triggered.map(|()| Err(PresentError::Dismissed))
        },
    );
    assert!(value_of(&result).is_none());
    control.trigger();
    assert_eq!(value_of(&result), Some(Err(PresentError::Dismissed)));
}

#[test]
fn waiting_entries_emit_enqueue_and_dequeue_events() {
    let log = EventLog::install();
    let host = Screen::new();
    host.set_debug_title("Host");
    let first = Screen::new();
    first.set_debug_title("First");
    let second = Screen::new();
    second.set_debug_title("Second");

    let (_result, dismiss_first) = present_queued(
        &host,
        first,
        PresentationOptions::none(),
        None,
        |_| Future::never(),
    );
    // The first presentation never waited: no queue events so far.
    assert!(log.snapshot().is_empty());

    let (_result, _dismiss) = present_queued(
        &host,
        second,
        PresentationOptions::none(),
        None,
        |_| Future::never(),
    );
    let _ = dismiss_first.invoke();

    assert_eq!(
        log.take(),
        vec![
            "will-enqueue Second from Host".to_string(),
            "will-dequeue Second from Host".to_string(),
        ]
    );
}
