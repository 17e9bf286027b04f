use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::fmt::Debug;
use std::rc::Rc;

use stagecraft_flow::{run_loop, Disposable, DisposeBag, Future, Stream, StreamEvent};

use crate::error::{PresentError, PresentResult};
use crate::event::{emit, PresentationEvent};
use crate::options::PresentationOptions;
use crate::presentation::{AnyPresentable, Presentable, Presentation};
use crate::screen::{Dismisser, Screen};

struct AbortInner {
    fired: Cell<bool>,
    action: RefCell<Option<Box<dyn FnOnce()>>>,
}

/// Cancels a running presentation.
///
/// Disposing completes the presentation with
/// [`Dismissed`](PresentError::Dismissed) on the next turn; disposing
/// after the presentation completed is a no-op, and dropping the handle
/// without disposing leaves the presentation running.
pub struct AbortHandle {
    inner: Rc<AbortInner>,
}

impl AbortHandle {
    fn new(action: impl FnOnce() + 'static) -> Self {
        Self {
            inner: Rc::new(AbortInner {
                fired: Cell::new(false),
                action: RefCell::new(Some(Box::new(action))),
            }),
        }
    }

    pub fn dispose(&self) {
        if self.inner.fired.replace(true) {
            return;
        }
        let action = self.inner.action.borrow_mut().take();
        if let Some(action) = action {
            action();
        }
    }
}

impl Clone for AbortHandle {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl Disposable for AbortHandle {
    fn dispose(&mut self) {
        AbortHandle::dispose(self);
    }
}

/// The caller's side of a running presentation: the completion future and
/// the abort handle.
pub struct PresentationHandle<V> {
    result: Future<PresentResult<V>>,
    abort: AbortHandle,
}

impl<V: Clone + 'static> PresentationHandle<V> {
    /// Resolves exactly once, with the business value or the error that
    /// ended the presentation.
    pub fn result(&self) -> Future<PresentResult<V>> {
        self.result.clone()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }
}

impl Screen {
    /// Present `presentation` on this screen.
    ///
    /// The presentation ends when the materialized business future
    /// resolves, when the container force-ends it (affordance, pop,
    /// blocked queue), or when the abort handle is disposed. Whichever
    /// happens first wins; completion is exactly-once. The handle's future
    /// resolves after the detach finishes, unless
    /// `dont_wait_for_dismiss_animation` is set.
    pub fn present<P, V>(&self, presentation: Presentation<P>) -> PresentationHandle<V>
    where
        P: Presentable<Result = Future<PresentResult<V>>>,
        V: Clone + Debug + 'static,
    {
        let Presentation {
            presentable,
            style,
            options,
            configure,
            transform,
            on_dismiss,
        } = presentation;
        let (content, business) = presentable.materialize();
        if content.debug_title().is_none() {
            if let Some(label) = type_label::<P>() {
                content.set_debug_title(label);
            }
        }
        let from_id = self.presentation_id();
        let content_id = content.presentation_id();

        let bag = DisposeBag::new();
        let (result, out) = Future::pending();
        let did_complete = Rc::new(Cell::new(false));
        let dismisser_slot: Rc<RefCell<Option<Dismisser>>> = Rc::new(RefCell::new(None));

        let completion: Rc<dyn Fn(PresentResult<V>)> = {
            let did_complete = Rc::clone(&did_complete);
            let dismisser_slot = Rc::clone(&dismisser_slot);
            let bag = bag.clone();
            let out = out.clone();
            let on_dismiss = Rc::clone(&on_dismiss);
            let content_id = content_id.clone();
            let from_id = from_id.clone();
            Rc::new(move |outcome: PresentResult<V>| {
                if did_complete.replace(true) {
                    return;
                }
                // Release the slot borrow before invoking: detaching can
                // re-enter completion paths.
                let dismisser = dismisser_slot.borrow_mut().take();
                let detach = match dismisser {
                    Some(dismisser) => dismisser.invoke(),
                    None => Future::ready(Ok(())),
                };
                let finish = {
                    let out = out.clone();
                    let on_dismiss = Rc::clone(&on_dismiss);
                    let bag = bag.clone();
                    let content_id = content_id.clone();
                    let from_id = from_id.clone();
                    move || {
                        emit(PresentationEvent::DidDismiss {
                            presentable: content_id,
                            from: from_id,
                            result: outcome.as_ref().map(|v| format!("{v:?}")).map_err(|e| *e),
                        });
                        on_dismiss(outcome.as_ref().err().copied());
                        out.resolve(outcome);
                        bag.dispose();
                    }
                };
                if options.contains(PresentationOptions::dont_wait_for_dismiss_animation()) {
                    finish();
                } else {
                    let _ = detach.on_result(move |_| finish());
                }
            })
        };

        let abort = AbortHandle::new({
            let completion = Rc::clone(&completion);
            let did_complete = Rc::clone(&did_complete);
            let content_id = content_id.clone();
            let from_id = from_id.clone();
            move || {
                run_loop::post(move || {
                    if did_complete.get() {
                        return;
                    }
                    emit(PresentationEvent::DidCancel {
                        presentable: content_id,
                        from: from_id,
                    });
                    completion(Err(PresentError::Dismissed));
                });
            }
        });

        configure(&content, &bag);
        let business = transform(business);

        emit(PresentationEvent::WillPresent {
            presentable: content_id,
            from: from_id,
            style: style.name(),
        });

        bag.insert(business.on_result({
            let completion = Rc::clone(&completion);
            move |outcome| completion(outcome.clone())
        }));

        if did_complete.get() {
            // The business future finished synchronously; never attach.
            return PresentationHandle { result, abort };
        }

        let (attach_result, dismisser) = style.present(content, self, options);
        *dismisser_slot.borrow_mut() = Some(dismisser);
        bag.insert(attach_result.on_result({
            let completion = Rc::clone(&completion);
            move |outcome| {
                if let Err(error) = outcome {
                    completion(Err(*error));
                }
            }
        }));

        PresentationHandle { result, abort }
    }

    /// Present a presentation whose result is a [`DisposeBag`]: it has no
    /// natural ending and runs until dismissed or aborted.
    pub fn present_disposable<P>(&self, presentation: Presentation<P>) -> PresentationHandle<()>
    where
        P: Presentable<Result = DisposeBag> + 'static,
    {
        let Presentation {
            presentable,
            style,
            options,
            configure,
            transform,
            on_dismiss,
        } = presentation;
        let slot: Rc<RefCell<Option<DisposeBag>>> = Rc::new(RefCell::new(None));
        let materialize_slot = Rc::clone(&slot);
        let erased = AnyPresentable::new(move || {
            let (screen, business) = presentable.materialize();
            if screen.debug_title().is_none() {
                if let Some(label) = type_label::<P>() {
                    screen.set_debug_title(label);
                }
            }
            *materialize_slot.borrow_mut() = Some(transform(business));
            (screen, Future::never())
        });
        let wrapped_configure: Rc<dyn Fn(&Screen, &DisposeBag)> = Rc::new(move |screen, bag| {
            configure(screen, bag);
            // The business bag lives exactly as long as the presentation.
            if let Some(business) = slot.borrow_mut().take() {
                bag.insert(business);
            }
        });
        self.present::<_, ()>(Presentation {
            presentable: erased,
            style,
            options,
            configure: wrapped_configure,
            transform: Rc::new(|result| result),
            on_dismiss,
        })
    }

    /// Present a presentation whose result is a stream of values.
    ///
    /// The returned stream relays the materialized stream's values and
    /// ends when the presentation does, carrying the ending error if any.
    pub fn present_stream<P, V>(
        &self,
        presentation: Presentation<P>,
    ) -> (Stream<V, PresentError>, AbortHandle)
    where
        P: Presentable<Result = Stream<V, PresentError>> + 'static,
        V: Clone + 'static,
    {
        let Presentation {
            presentable,
            style,
            options,
            configure,
            transform,
            on_dismiss,
        } = presentation;
        let (out_stream, out_sender) = Stream::channel();
        let slot: Rc<RefCell<Option<Stream<V, PresentError>>>> = Rc::new(RefCell::new(None));
        let materialize_slot = Rc::clone(&slot);
        let erased = AnyPresentable::new(move || {
            let (screen, stream) = presentable.materialize();
            if screen.debug_title().is_none() {
                if let Some(label) = type_label::<P>() {
                    screen.set_debug_title(label);
                }
            }
            *materialize_slot.borrow_mut() = Some(transform(stream));
            (screen, Future::never())
        });
        let forward = out_sender.clone();
        let wrapped_configure: Rc<dyn Fn(&Screen, &DisposeBag)> = Rc::new(move |screen, bag| {
            configure(screen, bag);
            if let Some(stream) = slot.borrow_mut().take() {
                let sender = forward.clone();
                bag.insert(stream.subscribe(move |event| match event {
                    StreamEvent::Value(value) => sender.send(value.clone()),
                    StreamEvent::End(error) => sender.end(*error),
                }));
            }
        });
        let handle = self.present::<_, ()>(Presentation {
            presentable: erased,
            style,
            options,
            configure: wrapped_configure,
            transform: Rc::new(|result| result),
            on_dismiss,
        });
        let _ = handle.result().on_result(move |outcome| {
            out_sender.end(outcome.as_ref().err().copied());
        });
        (out_stream, handle.abort_handle())
    }
}

fn type_label<P>() -> Option<&'static str> {
    let full = type_name::<P>();
    let base = full.split('<').next().unwrap_or(full);
    let short = base.rsplit("::").next().unwrap_or(base);
    (short != "AnyPresentable").then_some(short)
}
