//! Drives the presentation engine headlessly: a stack of screens, a modal
//! flow that collects a value, and a master/detail selection reacting to
//! collection churn. Run with `RUST_LOG=info` to watch the lifecycle
//! events.

use stagecraft_core::{
    DismissControl, MasterDetailSelection, Presentation, PresentationOptions, PresentationStyle,
    Screen, StackContainer,
};
use stagecraft_flow::{Future, ReadWriteSignal, RunLoop};
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let run_loop = RunLoop::new();
    let _guard = run_loop.install();

    let stack = StackContainer::new();
    let home = Screen::new();
    home.set_debug_title("Home");
    let _ = stack.push(home.clone(), PresentationOptions::none());
    run_loop.turn();

    // A modal flow that completes with a business value.
    let (business, answer) = Future::pending();
    let handle = home.present(
        Presentation::from_materialize(move || {
            let screen = Screen::new();
            screen.set_debug_title("PickNumber");
            screen.set_dismiss_control(DismissControl::new());
            (screen, business.clone())
        })
        .with_style(PresentationStyle::modal())
        .on_value(|value: &i32| tracing::info!(value, "number picked")),
    );
    let _ = handle
        .result()
        .on_result(|outcome| tracing::info!(?outcome, "modal flow finished"));
    answer.resolve(Ok(17));
    run_loop.turn();

    // Master/detail selection over a changing collection.
    let items = ReadWriteSignal::new(vec!["alpha", "beta", "gamma"]);
    let collapsed = ReadWriteSignal::new(Some(false));
    let selection = MasterDetailSelection::new(
        items.read_only(),
        |a: &&str, b: &&str| a == b,
        collapsed.read_only(),
    );
    let detail_origin = home.clone();
    let _detail = selection.present_detail_on(&detail_origin, |value| {
        let (index, name) = value?;
        Some(Presentation::from_materialize(move || {
            let screen = Screen::new();
            screen.set_debug_title(format!("Detail({name})"));
            (screen, stagecraft_flow::DisposeBag::new())
        })
        .with_options(PresentationOptions::none())
        .on_present(move || tracing::info!(index, name, "detail presented")))
    });
    selection.select(1);
    items.set(vec!["alpha", "gamma"]);
    run_loop.turn();

    while !run_loop.is_idle() {
        run_loop.turn();
    }

    let screens: Vec<String> = stack
        .screens()
        .iter()
        .map(|screen| screen.presentation_id().to_string())
        .collect();
    tracing::info!(?screens, "final stack");
}
