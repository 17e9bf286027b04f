use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicU64, Ordering};

use stagecraft_flow::{Disposer, Future, Resolver};

use crate::error::PresentResult;
use crate::event::PresentableId;
use crate::modal::ModalHost;
use crate::options::PresentationOptions;
use crate::style::{PopoverAnchor, PresentationStyle};

pub type ScreenId = u64;

static NEXT_SCREEN_ID: AtomicU64 = AtomicU64::new(1);

fn next_screen_id() -> ScreenId {
    NEXT_SCREEN_ID.fetch_add(1, Ordering::Relaxed)
}

/// The shape of a content unit, used where a style requires a specific
/// shape (a sheet only presents alerts).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenKind {
    Plain,
    Stack,
    Alert,
}

pub(crate) struct ScreenInner {
    id: ScreenId,
    kind: ScreenKind,
    debug_title: RefCell<Option<String>>,
    parent: RefCell<Option<Weak<ScreenInner>>>,
    presenter: RefCell<Option<Weak<dyn PresentingContainer>>>,
    dismiss_host: RefCell<Option<Weak<dyn DismissHost>>>,
    preferred_style: RefCell<Option<PresentationStyle>>,
    presented: RefCell<Option<Screen>>,
    modal: ModalHost,
    children: RefCell<Vec<Screen>>,
    dismiss_control: RefCell<Option<DismissControl>>,
    installed_controls: RefCell<Vec<DismissControl>>,
    popover_anchor: RefCell<Option<PopoverAnchor>>,
}

/// An opaque content unit: the thing that gets attached to and detached
/// from the visible hierarchy.
///
/// Screens are cheap handles with process-unique identity; equality is by
/// identity, never by structure. The engine only ever touches a screen
/// through the narrow state kept here — parent link, attached container
/// capability, modal slot, dismiss affordance — and leaves everything
/// visual to the embedding application.
pub struct Screen {
    inner: Rc<ScreenInner>,
}

impl Screen {
    pub fn new() -> Self {
        Self::with_kind(ScreenKind::Plain)
    }

    /// An alert-shaped screen, the only shape a sheet style accepts.
    pub fn alert() -> Self {
        Self::with_kind(ScreenKind::Alert)
    }

    pub(crate) fn with_kind(kind: ScreenKind) -> Self {
        Self {
            inner: Rc::new(ScreenInner {
                id: next_screen_id(),
                kind,
                debug_title: RefCell::new(None),
                parent: RefCell::new(None),
                presenter: RefCell::new(None),
                dismiss_host: RefCell::new(None),
                preferred_style: RefCell::new(None),
                presented: RefCell::new(None),
                modal: ModalHost::new(),
                children: RefCell::new(Vec::new()),
                dismiss_control: RefCell::new(None),
                installed_controls: RefCell::new(Vec::new()),
                popover_anchor: RefCell::new(None),
            }),
        }
    }

    pub fn id(&self) -> ScreenId {
        self.inner.id
    }

    pub fn kind(&self) -> ScreenKind {
        self.inner.kind
    }

    pub fn debug_title(&self) -> Option<String> {
        self.inner.debug_title.borrow().clone()
    }

    pub fn set_debug_title(&self, title: impl Into<String>) {
        *self.inner.debug_title.borrow_mut() = Some(title.into());
    }

    /// The label used in lifecycle events.
    pub fn presentation_id(&self) -> PresentableId {
        PresentableId(
            self.debug_title()
                .unwrap_or_else(|| format!("Screen#{}", self.inner.id)),
        )
    }

    pub fn parent(&self) -> Option<Screen> {
        self.inner
            .parent
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
            .map(|inner| Screen { inner })
    }

    pub(crate) fn set_parent(&self, parent: Option<&Screen>) {
        *self.inner.parent.borrow_mut() = parent.map(|p| Rc::downgrade(&p.inner));
    }

    /// The topmost screen reachable through parent links.
    pub fn root(&self) -> Screen {
        let mut cursor = self.clone();
        while let Some(parent) = cursor.parent() {
            cursor = parent;
        }
        cursor
    }

    /// Attach a container capability to this screen. The screen keeps a
    /// non-owning reference; the caller keeps the container alive.
    pub fn attach_presenter(&self, presenter: &Rc<dyn PresentingContainer>) {
        *self.inner.presenter.borrow_mut() = Some(Rc::downgrade(presenter));
    }

    pub fn presenter(&self) -> Option<Rc<dyn PresentingContainer>> {
        self.inner
            .presenter
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Attach a dismiss-control installation customization.
    pub fn attach_dismiss_host(&self, host: &Rc<dyn DismissHost>) {
        *self.inner.dismiss_host.borrow_mut() = Some(Rc::downgrade(host));
    }

    pub(crate) fn dismiss_host(&self) -> Option<Rc<dyn DismissHost>> {
        self.inner
            .dismiss_host
            .borrow()
            .as_ref()
            .and_then(Weak::upgrade)
    }

    /// Walk the parent chain for the nearest container capability.
    ///
    /// With `want_master` set only master-capable containers match; the
    /// default style falls back to a second pass without it.
    pub fn presenting_target(&self, want_master: bool) -> Option<Rc<dyn PresentingContainer>> {
        let mut cursor = Some(self.clone());
        while let Some(screen) = cursor {
            if let Some(presenter) = screen.presenter() {
                if !want_master || presenter.accepts_master_presentations() {
                    return Some(presenter);
                }
            }
            cursor = screen.parent();
        }
        None
    }

    /// Style override consulted by the default style.
    pub fn preferred_style(&self) -> Option<PresentationStyle> {
        self.inner.preferred_style.borrow().clone()
    }

    pub fn set_preferred_style(&self, style: PresentationStyle) {
        *self.inner.preferred_style.borrow_mut() = Some(style);
    }

    /// The modally presented child, if any.
    pub fn presented(&self) -> Option<Screen> {
        self.inner.presented.borrow().clone()
    }

    pub(crate) fn modal_host(&self) -> ModalHost {
        self.inner.modal.clone()
    }

    pub(crate) fn attach_modal(&self, child: &Screen) {
        *self.inner.presented.borrow_mut() = Some(child.clone());
        child.set_parent(Some(self));
    }

    pub(crate) fn dismiss_modal(&self, child: &Screen) -> Future<PresentResult<()>> {
        let mut presented = self.inner.presented.borrow_mut();
        if presented.as_ref() == Some(child) {
            *presented = None;
            drop(presented);
            child.set_parent(None);
        }
        Future::ready(Ok(()))
    }

    /// Embedded children.
    pub fn children(&self) -> Vec<Screen> {
        self.inner.children.borrow().clone()
    }

    pub(crate) fn add_child(&self, child: &Screen) {
        self.inner.children.borrow_mut().push(child.clone());
        child.set_parent(Some(self));
    }

    pub(crate) fn remove_child(&self, child: &Screen) {
        self.inner.children.borrow_mut().retain(|c| c != child);
        child.set_parent(None);
    }

    /// The popover anchor recorded by a popover-style presentation.
    pub fn popover_anchor(&self) -> Option<PopoverAnchor> {
        self.inner.popover_anchor.borrow().clone()
    }

    pub(crate) fn set_popover_anchor(&self, anchor: PopoverAnchor) {
        *self.inner.popover_anchor.borrow_mut() = Some(anchor);
    }

    /// The dismiss affordance to install when this screen is presented.
    pub fn dismiss_control(&self) -> Option<DismissControl> {
        self.inner.dismiss_control.borrow().clone()
    }

    pub fn set_dismiss_control(&self, control: DismissControl) {
        *self.inner.dismiss_control.borrow_mut() = Some(control);
    }

    /// Install this screen's dismiss control, going through the screen's
    /// [`DismissHost`] customization when one is attached. Returns a future
    /// that resolves on the first trigger and the installation's removal.
    pub fn install_dismiss_control(&self) -> (Future<()>, Disposer) {
        let control = match self.dismiss_control() {
            Some(control) => control,
            None => return (Future::never(), Disposer::empty()),
        };
        let removal = match self.dismiss_host() {
            Some(host) => host.install_dismiss_control(&control),
            None => self.install_control_default(&control),
        };
        (control.triggered(), removal)
    }

    /// Default installation strategy: append to the installed-control list.
    pub fn install_control_default(&self, control: &DismissControl) -> Disposer {
        self.inner.installed_controls.borrow_mut().push(control.clone());
        let screen = self.clone();
        let control = control.clone();
        Disposer::new(move || {
            screen
                .inner
                .installed_controls
                .borrow_mut()
                .retain(|c| !c.same(&control));
        })
    }

    /// Controls currently installed on this screen.
    pub fn installed_controls(&self) -> Vec<DismissControl> {
        self.inner.installed_controls.borrow().clone()
    }
}

impl Default for Screen {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Screen {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl PartialEq for Screen {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Screen {}

impl Hash for Screen {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Screen {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Screen")
            .field("id", &self.inner.id)
            .field("kind", &self.inner.kind)
            .field("title", &self.inner.debug_title.borrow())
            .finish()
    }
}

/// A "dismiss me" affordance. Triggering it ends the presentation it was
/// installed for with [`Dismissed`](crate::PresentError::Dismissed).
pub struct DismissControl {
    triggered: Future<()>,
    trigger: Resolver<()>,
}

impl DismissControl {
    pub fn new() -> Self {
        let (triggered, trigger) = Future::pending();
        Self { triggered, trigger }
    }

    /// The user activated the affordance. Only the first trigger counts.
    pub fn trigger(&self) {
        self.trigger.resolve(());
    }

    /// Resolves on the first trigger.
    pub fn triggered(&self) -> Future<()> {
        self.triggered.clone()
    }

    fn same(&self, other: &Self) -> bool {
        // Identity comparison for install/remove bookkeeping.
        self.triggered.ptr_eq(&other.triggered)
    }
}

impl Default for DismissControl {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for DismissControl {
    fn clone(&self) -> Self {
        Self {
            triggered: self.triggered.clone(),
            trigger: self.trigger.clone(),
        }
    }
}

/// Detaches presented content. Invoking is one-shot; later invocations
/// resolve immediately.
pub struct Dismisser(RefCell<Option<Box<dyn FnOnce() -> Future<PresentResult<()>>>>>);

impl Dismisser {
    pub fn new(f: impl FnOnce() -> Future<PresentResult<()>> + 'static) -> Self {
        Self(RefCell::new(Some(Box::new(f))))
    }

    /// A dismisser with nothing to detach.
    pub fn noop() -> Self {
        Self(RefCell::new(None))
    }

    /// Start detaching; the future resolves once the detach is done.
    pub fn invoke(&self) -> Future<PresentResult<()>> {
        let detach = self.0.borrow_mut().take();
        match detach {
            Some(f) => f(),
            None => Future::ready(Ok(())),
        }
    }
}

/// The result of attaching content to a container: the lifecycle future
/// and the detach operation.
///
/// The future resolves `Err` when the container force-ends the
/// presentation (affordance triggered, popped, blocked); `Ok(())` only
/// reports that the attach finished and never ends a presentation.
pub type ContainerResult = (Future<PresentResult<()>>, Dismisser);

/// The container capability: anything that can host presented content.
pub trait PresentingContainer {
    fn present(&self, content: Screen, options: PresentationOptions) -> ContainerResult;

    /// Whether this container hosts master-side presentations.
    fn accepts_master_presentations(&self) -> bool {
        false
    }
}

/// Customizes how a dismiss control is installed on a screen; the default
/// strategy appends to the screen's installed-control list.
pub trait DismissHost {
    fn install_dismiss_control(&self, control: &DismissControl) -> Disposer;
}
