use std::any::Any;
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use stagecraft_flow::{DisposeBag, Future};

use crate::error::PresentError;
use crate::modal;
use crate::options::PresentationOptions;
use crate::screen::{ContainerResult, Dismisser, Screen, ScreenKind};
use crate::stack::StackContainer;

bitflags! {
    /// Permitted arrow directions for a popover anchor.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ArrowDirections: u8 {
        const UP = 1 << 0;
        const DOWN = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const ANY = Self::UP.bits() | Self::DOWN.bits() | Self::LEFT.bits() | Self::RIGHT.bits();
    }
}

/// Where a popover points: the anchoring screen and the directions its
/// arrow may take.
#[derive(Debug, Clone)]
pub struct PopoverAnchor {
    pub source: Screen,
    pub directions: ArrowDirections,
}

#[derive(Clone)]
enum StyleKind {
    Default,
    Modal { popover: Option<PopoverAnchor> },
    Embed { target: Option<Screen> },
    Invisible,
    Sheet,
}

/// How content gets attached to the hierarchy.
///
/// A style is a name plus a closed attach/detach strategy. The name is
/// what equality and dispatch branch on, so ad-hoc instances of the same
/// style compare equal.
#[derive(Clone)]
pub struct PresentationStyle {
    name: &'static str,
    kind: StyleKind,
}

impl PresentationStyle {
    /// Per-content override if set, else the nearest container capability
    /// on the origin's parent chain, else modal.
    pub fn default_style() -> Self {
        Self {
            name: "default",
            kind: StyleKind::Default,
        }
    }

    /// Present modally on the origin's root screen, queuing behind any
    /// presentation already in flight unless `fail_on_block` is set.
    pub fn modal() -> Self {
        Self {
            name: "modal",
            kind: StyleKind::Modal { popover: None },
        }
    }

    /// Modal sub-style anchored to `source` with the given permitted arrow
    /// directions.
    pub fn popover(source: Screen, directions: ArrowDirections) -> Self {
        Self {
            name: "popover",
            kind: StyleKind::Modal {
                popover: Some(PopoverAnchor { source, directions }),
            },
        }
    }

    /// Attach content as a child of `target` (or the origin) without a new
    /// screen.
    pub fn embed(target: Option<Screen>) -> Self {
        Self {
            name: "embed",
            kind: StyleKind::Embed { target },
        }
    }

    /// Attach nothing: already-resolved attach, pass-through detach. For
    /// headless, logic-only flows.
    pub fn invisible() -> Self {
        Self {
            name: "invisible",
            kind: StyleKind::Invisible,
        }
    }

    /// Present an alert as a sheet. Any other content shape is a
    /// programmer error and panics.
    pub fn sheet() -> Self {
        Self {
            name: "sheet",
            kind: StyleKind::Sheet,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_default(&self) -> bool {
        self.name == "default"
    }

    /// Resolve the attach/detach pair for `content` presented from `from`.
    pub fn present(
        &self,
        content: Screen,
        from: &Screen,
        options: PresentationOptions,
    ) -> ContainerResult {
        match &self.kind {
            StyleKind::Default => present_default(content, from, options),
            StyleKind::Modal { popover } => present_modal(content, from, options, popover.clone()),
            StyleKind::Embed { target } => present_embedded(content, from, target.clone()),
            StyleKind::Invisible => (Future::ready(Ok(())), Dismisser::noop()),
            StyleKind::Sheet => {
                assert!(
                    content.kind() == ScreenKind::Alert,
                    "sheet presentation requires alert-shaped content, got {:?}",
                    content.kind()
                );
                present_modal(content, from, options, None)
            }
        }
    }
}

impl PartialEq for PresentationStyle {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for PresentationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PresentationStyle").field(&self.name).finish()
    }
}

fn present_default(
    content: Screen,
    from: &Screen,
    options: PresentationOptions,
) -> ContainerResult {
    if let Some(style) = content.preferred_style() {
        if !style.is_default() {
            return style.present(content, from, options);
        }
    }
    let want_master = options.contains(PresentationOptions::show_in_master());
    let target = from.presenting_target(want_master).or_else(|| {
        if want_master {
            from.presenting_target(false)
        } else {
            None
        }
    });
    if let Some(target) = target {
        return target.present(content, options);
    }
    present_modal(content, from, options, None)
}

fn present_modal(
    content: Screen,
    from: &Screen,
    options: PresentationOptions,
    popover: Option<PopoverAnchor>,
) -> ContainerResult {
    let host = from.root();
    let (shown, container) = embedded_in_stack(&content, options);
    if let Some(anchor) = popover {
        shown.set_popover_anchor(anchor);
    }
    let affordance = move |bag: &DisposeBag| {
        let (triggered, installation) = content.install_dismiss_control();
        bag.insert(installation);
        triggered.map(|()| Err(PresentError::Dismissed))
    };
    let keep_alive = container.map(|stack| Box::new(stack) as Box<dyn Any>);
    modal::present_queued(&host, shown, options, keep_alive, affordance)
}

fn present_embedded(content: Screen, from: &Screen, target: Option<Screen>) -> ContainerResult {
    let parent = target.unwrap_or_else(|| from.clone());
    parent.add_child(&content);
    let dismisser = Dismisser::new(move || {
        parent.remove_child(&content);
        Future::ready(Ok(()))
    });
    (Future::ready(Ok(())), dismisser)
}

/// Wrap plain content in a fresh stack container when `embed_in_stack` is
/// set. Stacks and alerts are presented as-is.
fn embedded_in_stack(
    content: &Screen,
    options: PresentationOptions,
) -> (Screen, Option<Rc<StackContainer>>) {
    if !options.contains(PresentationOptions::embed_in_stack())
        || content.kind() != ScreenKind::Plain
    {
        return (content.clone(), None);
    }
    let stack = StackContainer::new();
    if let Some(title) = content.debug_title() {
        stack.screen().set_debug_title(title);
    }
    let _ = stack.push(content.clone(), PresentationOptions::unanimated());
    (stack.screen(), Some(stack))
}
