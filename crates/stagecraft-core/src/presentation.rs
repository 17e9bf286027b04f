use std::rc::Rc;

use stagecraft_flow::{DisposeBag, Future};

use crate::error::{PresentError, PresentResult};
use crate::options::PresentationOptions;
use crate::screen::Screen;
use crate::style::PresentationStyle;

/// Anything that can be materialized into a screen plus the result of
/// presenting it.
///
/// The result type is normally one of:
/// - [`DisposeBag`] — the presentation has no natural ending and is torn
///   down by the presenter.
/// - [`Future`]`<PresentResult<T>>` — the presentation ends once, with a
///   business value.
/// - [`Stream`](stagecraft_flow::Stream)`<T, PresentError>` — the
///   presentation emits values until it is dismissed.
pub trait Presentable {
    type Result;

    fn materialize(&self) -> (Screen, Self::Result);
}

/// A type-erased [`Presentable`].
pub struct AnyPresentable<R> {
    materialize: Rc<dyn Fn() -> (Screen, R)>,
}

impl<R> AnyPresentable<R> {
    pub fn new(materialize: impl Fn() -> (Screen, R) + 'static) -> Self {
        Self {
            materialize: Rc::new(materialize),
        }
    }

    /// Erase a concrete presentable.
    pub fn erasing<P>(presentable: P) -> Self
    where
        P: Presentable<Result = R> + 'static,
    {
        Self::new(move || presentable.materialize())
    }
}

impl<R> Presentable for AnyPresentable<R> {
    type Result = R;

    fn materialize(&self) -> (Screen, R) {
        (self.materialize)()
    }
}

impl<R> Clone for AnyPresentable<R> {
    fn clone(&self) -> Self {
        Self {
            materialize: Rc::clone(&self.materialize),
        }
    }
}

/// A presentable bundled with how it should be presented.
///
/// Carries the style and options, a configuration hook run just before
/// attaching, a transform applied to the materialized result, and an
/// on-dismiss callback, all composable:
///
/// ```ignore
/// let presentation = Presentation::new(login)
///     .with_style(PresentationStyle::modal())
///     .on_present(|| { /* ... */ })
///     .on_dismiss(|| { /* ... */ });
/// ```
pub struct Presentation<P: Presentable> {
    pub presentable: P,
    pub style: PresentationStyle,
    pub options: PresentationOptions,
    pub(crate) configure: Rc<dyn Fn(&Screen, &DisposeBag)>,
    pub(crate) transform: Rc<dyn Fn(P::Result) -> P::Result>,
    pub(crate) on_dismiss: Rc<dyn Fn(Option<PresentError>)>,
}

impl<P: Presentable> Presentation<P> {
    pub fn new(presentable: P) -> Self {
        Self {
            presentable,
            style: PresentationStyle::default_style(),
            options: PresentationOptions::defaults(),
            configure: Rc::new(|_, _| {}),
            transform: Rc::new(|result| result),
            on_dismiss: Rc::new(|_| {}),
        }
    }

    pub fn with_style(mut self, style: PresentationStyle) -> Self {
        self.style = style;
        self
    }

    pub fn with_options(mut self, options: PresentationOptions) -> Self {
        self.options = options;
        self
    }

    /// Run `configure` at presentation time, after any configuration
    /// already attached.
    pub fn add_configuration(mut self, configure: impl Fn(&Screen, &DisposeBag) + 'static) -> Self {
        let previous = Rc::clone(&self.configure);
        self.configure = Rc::new(move |screen, bag| {
            previous(screen, bag);
            configure(screen, bag);
        });
        self
    }

    /// Transform the materialized result, after any transform already
    /// attached.
    pub fn map(mut self, transform: impl Fn(P::Result) -> P::Result + 'static) -> Self
    where
        P::Result: 'static,
    {
        let previous = Rc::clone(&self.transform);
        self.transform = Rc::new(move |result| transform(previous(result)));
        self
    }

    /// Call `callback` when the presentation is being presented.
    pub fn on_present(self, callback: impl Fn() + 'static) -> Self
    where
        P::Result: 'static,
    {
        self.map(move |result| {
            callback();
            result
        })
    }

    /// Call `callback` once the presentation is done, dismissed or not.
    pub fn on_dismiss(mut self, callback: impl Fn() + 'static) -> Self {
        let previous = Rc::clone(&self.on_dismiss);
        self.on_dismiss = Rc::new(move |error| {
            previous(error);
            callback();
        });
        self
    }

    /// Call `callback` when the presentation ends with an error.
    pub fn on_error(mut self, callback: impl Fn(PresentError) + 'static) -> Self {
        let previous = Rc::clone(&self.on_dismiss);
        self.on_dismiss = Rc::new(move |error| {
            previous(error);
            if let Some(error) = error {
                callback(error);
            }
        });
        self
    }
}

impl<V: Clone + 'static, P> Presentation<P>
where
    P: Presentable<Result = Future<PresentResult<V>>>,
{
    /// Call `callback` with the business value of a successful dismissal.
    pub fn on_value(self, callback: impl Fn(&V) + 'static) -> Self {
        let callback = Rc::new(callback);
        self.map(move |future: Future<PresentResult<V>>| {
            let callback = Rc::clone(&callback);
            let _ = future.on_result(move |result| {
                if let Ok(value) = result {
                    callback(value);
                }
            });
            future
        })
    }
}

impl<R: 'static> Presentation<AnyPresentable<R>> {
    /// A presentation materialized from a closure.
    pub fn from_materialize(materialize: impl Fn() -> (Screen, R) + 'static) -> Self {
        Self::new(AnyPresentable::new(materialize))
    }

    /// A headless presentation: an invisible style whose result comes from
    /// `result` alone.
    pub fn invisible(result: impl Fn() -> R + 'static) -> Self {
        Self::from_materialize(move || (Screen::new(), result()))
            .with_style(PresentationStyle::invisible())
            .with_options(PresentationOptions::none())
    }
}

impl<P: Presentable + Clone> Clone for Presentation<P> {
    fn clone(&self) -> Self {
        Self {
            presentable: self.presentable.clone(),
            style: self.style.clone(),
            options: self.options,
            configure: Rc::clone(&self.configure),
            transform: Rc::clone(&self.transform),
            on_dismiss: Rc::clone(&self.on_dismiss),
        }
    }
}
