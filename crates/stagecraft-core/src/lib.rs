//! Stagecraft core: a declarative presentation engine.
//!
//! Application code describes *what* to show — a [`Presentable`] bundled
//! into a [`Presentation`] with a [`PresentationStyle`] and
//! [`PresentationOptions`] — and the engine decides *how* it reaches the
//! hierarchy: pushed onto a [`StackContainer`] with same-turn coalescing,
//! queued modally per host screen, embedded as a child, or attached
//! invisibly for headless flows. Every presentation hands back a
//! cancellable completion that resolves exactly once, after the detach has
//! finished.
//!
//! ```ignore
//! let handle = origin.present(
//!     Presentation::new(login).with_style(PresentationStyle::modal()),
//! );
//! handle.result().on_result(|user| { /* ... */ });
//! ```
//!
//! [`KeepSelection`] and [`MasterDetailSelection`] keep a selected element
//! meaningful while the backing collection and the collapsed/expanded
//! layout state change underneath it.

pub mod error;
pub mod event;
pub mod master_detail;
mod modal;
pub mod options;
pub mod present;
pub mod presentation;
pub mod screen;
pub mod selection;
pub mod stack;
pub mod style;

pub use error::{PresentError, PresentResult};
pub use event::{set_event_handler, EventHandler, PresentableId, PresentationEvent};
pub use master_detail::MasterDetailSelection;
pub use options::PresentationOptions;
pub use present::{AbortHandle, PresentationHandle};
pub use presentation::{AnyPresentable, Presentable, Presentation};
pub use screen::{
    ContainerResult, DismissControl, DismissHost, Dismisser, PresentingContainer, Screen, ScreenId,
    ScreenKind,
};
pub use selection::{IndexAndElement, KeepSelection};
pub use stack::{CommitFn, ImmediateDriver, StackContainer, StackDriver};
pub use style::{ArrowDirections, PopoverAnchor, PresentationStyle};

#[cfg(test)]
mod tests;
