//! Asynchronous value primitives for Stagecraft.
//!
//! Everything in this crate is single-threaded by design: the presentation
//! engine runs on one cooperative UI loop, so values are shared with `Rc`
//! and interior mutability rather than locks. The pieces are small and
//! composable:
//!
//! - [`Future`]/[`Resolver`] — a single-shot broadcast value with
//!   exactly-once resolution.
//! - [`Stream`]/[`StreamSender`] — a multi-value channel with one terminal
//!   end event.
//! - [`ReadSignal`]/[`ReadWriteSignal`] — a current-value container whose
//!   writes always notify subscribers.
//! - [`Disposable`]/[`Disposer`]/[`DisposeBag`] — explicit resource
//!   release with keep-alive token storage.
//! - [`RunLoop`] — the cooperative turn queue used to defer work to the
//!   next turn of the UI loop.

pub mod disposable;
pub mod future;
pub mod run_loop;
pub mod signal;
pub mod stream;

pub use disposable::{Disposable, DisposeBag, Disposer};
pub use future::{Future, Resolver, Subscription};
pub use run_loop::{post, LoopGuard, RunLoop};
pub use signal::{ReadSignal, ReadWriteSignal};
pub use stream::{Stream, StreamEvent, StreamSender, StreamSubscription};
