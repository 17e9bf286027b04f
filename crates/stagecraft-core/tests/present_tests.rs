use std::cell::{Cell, RefCell};
use std::rc::Rc;

use stagecraft_flow::{DisposeBag, Future, Stream, StreamEvent};
use stagecraft_testing::{DeferredDriver, EventLog, TestLoop};

use stagecraft_core::error::{PresentError, PresentResult};
use stagecraft_core::options::PresentationOptions;
use stagecraft_core::presentation::{AnyPresentable, Presentation};
use stagecraft_core::screen::{DismissControl, Screen, ScreenKind};
use stagecraft_core::stack::StackContainer;
use stagecraft_core::style::{ArrowDirections, PresentationStyle};

/// The future's value, if it has already resolved.
fn value_of<T: Clone + 'static>(future: &Future<T>) -> Option<T> {
    let slot = Rc::new(RefCell::new(None));
    let sink = Rc::clone(&slot);
    let _ = future.on_result(move |value| *sink.borrow_mut() = Some(value.clone()));
    let value = slot.borrow().clone();
    value
}

fn never_presentation() -> Presentation<AnyPresentable<Future<PresentResult<i32>>>> {
    Presentation::from_materialize(|| (Screen::new(), Future::never()))
}

#[test]
fn abort_completes_exactly_once_with_dismissed() {
    let rt = TestLoop::new();
    let origin = Screen::new();
    let handle = origin.present(never_presentation());

    let outcomes: Rc<RefCell<Vec<PresentResult<i32>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&outcomes);
    let _ = handle
        .result()
        .on_result(move |outcome| sink.borrow_mut().push(outcome.clone()));

    assert!(origin.presented().is_some());
    let abort = handle.abort_handle();
    abort.dispose();
    rt.run_until_idle();
    assert_eq!(*outcomes.borrow(), vec![Err(PresentError::Dismissed)]);
    assert!(origin.presented().is_none(), "detach ran on cancellation");

    // Disposing after completion must not re-trigger the completion.
    abort.dispose();
    rt.run_until_idle();
    assert_eq!(outcomes.borrow().len(), 1);
}

#[test]
fn late_business_value_is_swallowed_after_abort() {
    let rt = TestLoop::new();
    let origin = Screen::new();
    let (business, resolver) = Future::pending();
    let handle = origin.present(Presentation::from_materialize(move || {
        (Screen::new(), business.clone())
    }));

    handle.abort_handle().dispose();
    rt.run_until_idle();
    resolver.resolve(Ok(5));
    assert_eq!(
        value_of(&handle.result()),
        Some(Err(PresentError::Dismissed)),
        "completion is first-caller-wins"
    );
}

#[test]
fn business_value_completes_and_detaches() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let (business, resolver) = Future::pending();
    let handle = origin.present(Presentation::from_materialize(move || {
        (Screen::new(), business.clone())
    }));
    assert!(origin.presented().is_some());

    resolver.resolve(Ok(42));
    assert_eq!(value_of(&handle.result()), Some(Ok(42)));
    assert!(origin.presented().is_none());
}

#[test]
fn synchronous_business_never_attaches() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let handle = origin.present(Presentation::invisible(|| Future::ready(Ok(7))));
    assert_eq!(value_of(&handle.result()), Some(Ok(7)));
    assert!(origin.presented().is_none());
}

#[test]
fn invisible_presentations_await_async_business() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let (business, resolver) = Future::<PresentResult<i32>>::pending();
    let handle = origin.present(Presentation::invisible(move || business.clone()));
    assert!(value_of(&handle.result()).is_none());
    assert!(origin.presented().is_none());
    resolver.resolve(Ok(3));
    assert_eq!(value_of(&handle.result()), Some(Ok(3)));
}

#[test]
fn default_style_pushes_when_origin_sits_in_a_stack() {
    let rt = TestLoop::new();
    let stack = StackContainer::new();
    let origin = Screen::new();
    let _ = stack.push(origin.clone(), PresentationOptions::none());

    let content = Screen::new();
    let materialized = content.clone();
    let handle = origin.present::<_, i32>(Presentation::from_materialize(move || {
        (materialized.clone(), Future::never())
    }));
    rt.run_until_idle();
    assert!(stack.screens().contains(&content));
    assert!(origin.presented().is_none(), "nothing was presented modally");

    // Popping the pushed screen ends the presentation as a dismissal.
    let _ = stack.pop(content, PresentationOptions::none());
    rt.run_until_idle();
    assert_eq!(
        value_of(&handle.result()),
        Some(Err(PresentError::Dismissed))
    );
}

#[test]
fn preferred_style_overrides_the_default() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let content = Screen::new();
    content.set_preferred_style(PresentationStyle::embed(None));
    let materialized = content.clone();
    let _handle = origin.present::<_, i32>(
        Presentation::from_materialize(move || (materialized.clone(), Future::never()))
            .with_options(PresentationOptions::none()),
    );
    assert_eq!(origin.children(), vec![content]);
    assert!(origin.presented().is_none());
}

#[test]
fn modal_content_embeds_in_a_fresh_stack_by_default() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let handle = origin.present(never_presentation());
    let shown = origin.presented().expect("attached modally");
    assert_eq!(shown.kind(), ScreenKind::Stack);
    drop(handle);
}

#[test]
fn popover_records_its_anchor_on_the_shown_screen() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let source = Screen::new();
    let content = Screen::new();
    let materialized = content.clone();
    let _handle = origin.present::<_, i32>(
        Presentation::from_materialize(move || (materialized.clone(), Future::never()))
            .with_style(PresentationStyle::popover(
                source.clone(),
                ArrowDirections::UP | ArrowDirections::DOWN,
            ))
            .with_options(PresentationOptions::none()),
    );
    let anchor = origin
        .presented()
        .and_then(|shown| shown.popover_anchor())
        .expect("popover anchor recorded");
    assert_eq!(anchor.source, source);
    assert_eq!(anchor.directions, ArrowDirections::UP | ArrowDirections::DOWN);
}

#[test]
fn dismiss_control_trigger_ends_the_presentation() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let control = DismissControl::new();
    let content = Screen::new();
    content.set_dismiss_control(control.clone());
    let materialized = content.clone();
    let handle = origin.present::<_, i32>(
        Presentation::from_materialize(move || (materialized.clone(), Future::never()))
            .with_style(PresentationStyle::modal())
            .with_options(PresentationOptions::none()),
    );
    assert_eq!(origin.presented(), Some(content));

    control.trigger();
    assert_eq!(
        value_of(&handle.result()),
        Some(Err(PresentError::Dismissed))
    );
    assert!(origin.presented().is_none());
}

#[test]
fn fail_on_block_fails_the_whole_presentation_synchronously() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let _first = origin.present(never_presentation());
    assert!(origin.presented().is_some());

    let second = origin.present(
        never_presentation().with_options(
            PresentationOptions::defaults() | PresentationOptions::fail_on_block(),
        ),
    );
    assert_eq!(value_of(&second.result()), Some(Err(PresentError::Blocked)));
}

#[test]
fn queued_modal_attaches_after_the_first_ends() {
    let rt = TestLoop::new();
    let origin = Screen::new();
    let content_a = Screen::new();
    let content_b = Screen::new();
    let a = content_a.clone();
    let first = origin.present::<_, i32>(
        Presentation::from_materialize(move || (a.clone(), Future::never()))
            .with_options(PresentationOptions::none()),
    );
    let b = content_b.clone();
    let second = origin.present::<_, i32>(
        Presentation::from_materialize(move || (b.clone(), Future::never()))
            .with_options(PresentationOptions::none()),
    );
    assert_eq!(origin.presented(), Some(content_a));
    assert!(value_of(&second.result()).is_none());

    first.abort_handle().dispose();
    rt.run_until_idle();
    assert_eq!(value_of(&first.result()), Some(Err(PresentError::Dismissed)));
    assert_eq!(origin.presented(), Some(content_b));
    drop(second);
}

#[test]
fn completion_waits_for_the_detach_unless_opted_out() {
    for dont_wait in [false, true] {
        let rt = TestLoop::new();
        let driver = DeferredDriver::new();
        let stack = StackContainer::with_driver(driver.clone());
        let origin = Screen::new();
        let _ = stack.push(origin.clone(), PresentationOptions::none());
        driver.settle();
        rt.run_until_idle();

        let (business, resolver) = Future::pending();
        let content = Screen::new();
        let materialized = content.clone();
        let shared = business.clone();
        let mut options = PresentationOptions::none() | PresentationOptions::auto_pop();
        if dont_wait {
            options |= PresentationOptions::dont_wait_for_dismiss_animation();
        }
        let handle = origin.present::<_, i32>(
            Presentation::from_materialize(move || (materialized.clone(), shared.clone()))
                .with_options(options),
        );
        rt.turn();
        driver.settle();
        rt.run_until_idle();
        assert!(stack.screens().contains(&content));

        resolver.resolve(Ok(9));
        if dont_wait {
            assert_eq!(
                value_of(&handle.result()),
                Some(Ok(9)),
                "completion must not wait for the pop to land"
            );
        } else {
            assert!(
                value_of(&handle.result()).is_none(),
                "completion waits for the auto-pop to land"
            );
        }

        rt.turn();
        driver.settle();
        rt.run_until_idle();
        assert_eq!(value_of(&handle.result()), Some(Ok(9)));
        assert!(!stack.screens().contains(&content));
    }
}

#[test]
fn embedded_content_is_removed_on_completion() {
    let rt = TestLoop::new();
    let origin = Screen::new();
    let content = Screen::new();
    let materialized = content.clone();
    let handle = origin.present::<_, i32>(
        Presentation::from_materialize(move || (materialized.clone(), Future::never()))
            .with_style(PresentationStyle::embed(None))
            .with_options(PresentationOptions::none()),
    );
    assert_eq!(origin.children(), vec![content]);

    handle.abort_handle().dispose();
    rt.run_until_idle();
    assert!(origin.children().is_empty());
    assert_eq!(
        value_of(&handle.result()),
        Some(Err(PresentError::Dismissed))
    );
}

#[test]
fn sheet_presents_alert_shaped_content() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let alert = Screen::alert();
    let materialized = alert.clone();
    let _handle = origin.present::<_, i32>(
        Presentation::from_materialize(move || (materialized.clone(), Future::never()))
            .with_style(PresentationStyle::sheet()),
    );
    assert_eq!(origin.presented(), Some(alert));
}

#[test]
#[should_panic(expected = "sheet presentation requires alert-shaped content")]
fn sheet_panics_on_plain_content() {
    let origin = Screen::new();
    let _ = origin.present::<_, i32>(never_presentation().with_style(PresentationStyle::sheet()));
}

#[test]
fn lifecycle_events_fire_in_order() {
    let log = EventLog::install();
    let rt = TestLoop::new();
    let origin = Screen::new();
    origin.set_debug_title("Root");
    let handle = origin.present::<_, i32>(
        Presentation::from_materialize(|| {
            let content = Screen::new();
            content.set_debug_title("Login");
            (content, Future::never())
        })
        .with_style(PresentationStyle::modal())
        .with_options(PresentationOptions::none()),
    );
    handle.abort_handle().dispose();
    rt.run_until_idle();

    let events = log.take();
    assert_eq!(events[0], "will-present Login from Root style=modal");
    assert_eq!(events[1], "did-cancel Login from Root");
    assert!(events[2].starts_with("did-dismiss Login from Root err="));
}

#[test]
fn presentation_combinators_observe_value_and_dismissal() {
    let _rt = TestLoop::new();
    let origin = Screen::new();
    let (business, resolver) = Future::pending();
    let seen = Rc::new(Cell::new(None));
    let dismissed = Rc::new(Cell::new(false));
    let seen_in = Rc::clone(&seen);
    let dismissed_in = Rc::clone(&dismissed);
    let handle = origin.present(
        Presentation::from_materialize(move || (Screen::new(), business.clone()))
            .on_value(move |value: &i32| seen_in.set(Some(*value)))
            .on_dismiss(move || dismissed_in.set(true)),
    );
    resolver.resolve(Ok(11));
    assert_eq!(value_of(&handle.result()), Some(Ok(11)));
    assert_eq!(seen.get(), Some(11));
    assert!(dismissed.get());
}

#[test]
fn disposable_presentations_run_until_aborted() {
    let rt = TestLoop::new();
    let origin = Screen::new();
    let cleaned = Rc::new(Cell::new(false));
    let cleaned_in = Rc::clone(&cleaned);
    let presentation = Presentation::<AnyPresentable<DisposeBag>>::from_materialize(move || {
        let bag = DisposeBag::new();
        let cleaned = Rc::clone(&cleaned_in);
        bag.on_dispose(move || cleaned.set(true));
        (Screen::new(), bag)
    });
    let handle = origin.present_disposable(presentation);
    assert!(origin.presented().is_some());
    assert!(!cleaned.get());

    handle.abort_handle().dispose();
    rt.run_until_idle();
    assert!(cleaned.get(), "the business bag is torn down on dismissal");
    assert_eq!(
        value_of(&handle.result()),
        Some(Err(PresentError::Dismissed))
    );
}

#[test]
fn stream_presentations_relay_values_and_end_on_dismissal() {
    let rt = TestLoop::new();
    let origin = Screen::new();
    let (stream, sender) = Stream::<i32, PresentError>::channel();
    let materialized = stream.clone();
    let presentation = Presentation::<AnyPresentable<Stream<i32, PresentError>>>::from_materialize(
        move || (Screen::new(), materialized.clone()),
    );
    let (values, abort) = origin.present_stream(presentation);

    let seen: Rc<RefCell<Vec<StreamEvent<i32, PresentError>>>> = Rc::new(RefCell::new(Vec::new()));
    let sink = Rc::clone(&seen);
    let _sub = values.subscribe(move |event| sink.borrow_mut().push(event.clone()));

    sender.send(1);
    sender.send(2);
    abort.dispose();
    rt.run_until_idle();

    assert_eq!(
        *seen.borrow(),
        vec![
            StreamEvent::Value(1),
            StreamEvent::Value(2),
            StreamEvent::End(Some(PresentError::Dismissed)),
        ]
    );
}
