use std::fmt;
use std::ops::{BitOr, BitOrAssign};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, OnceLock};

use hashbrown::HashMap;

/// Allocates one bit per distinct option, in first-use order.
///
/// This registry is the single sanctioned piece of process-wide state in
/// the engine. Allocation is normally confined to the UI thread; the
/// atomic counter and mutex-guarded name table keep it correct if an
/// option is ever first touched elsewhere.
struct OptionRegistry {
    next_bit: AtomicU32,
    names: Mutex<HashMap<u32, &'static str>>,
}

impl OptionRegistry {
    fn allocate(&self, name: &'static str) -> PresentationOptions {
        let bit = self.next_bit.fetch_add(1, Ordering::Relaxed);
        assert!(bit < 64, "presentation option bits exhausted");
        self.names
            .lock()
            .expect("option registry poisoned")
            .insert(bit, name);
        PresentationOptions { bits: 1 << bit }
    }

    fn name_of(&self, bit: u32) -> Option<&'static str> {
        self.names
            .lock()
            .expect("option registry poisoned")
            .get(&bit)
            .copied()
    }
}

fn registry() -> &'static OptionRegistry {
    static REGISTRY: OnceLock<OptionRegistry> = OnceLock::new();
    REGISTRY.get_or_init(|| OptionRegistry {
        next_bit: AtomicU32::new(0),
        names: Mutex::new(HashMap::new()),
    })
}

/// A composable set of presentation options.
///
/// Every distinct option occupies its own bit, handed out by the registry
/// at first use, so options declared anywhere in the process never
/// collide. Combine with `|`, query with [`contains`](Self::contains).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PresentationOptions {
    bits: u64,
}

impl PresentationOptions {
    /// The empty option set.
    pub fn none() -> Self {
        Self::default()
    }

    /// Allocate a fresh option with its own bit.
    ///
    /// Use this to declare new options outside the engine:
    ///
    /// ```
    /// # use stagecraft_core::PresentationOptions;
    /// fn wants_badge() -> PresentationOptions {
    ///     use std::sync::OnceLock;
    ///     static SLOT: OnceLock<PresentationOptions> = OnceLock::new();
    ///     *SLOT.get_or_init(|| PresentationOptions::allocate("wants_badge"))
    /// }
    /// ```
    pub fn allocate(name: &'static str) -> Self {
        registry().allocate(name)
    }

    pub fn is_empty(self) -> bool {
        self.bits == 0
    }

    pub fn contains(self, other: Self) -> bool {
        self.bits & other.bits == other.bits
    }

    pub fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    pub fn insert(&mut self, other: Self) {
        self.bits |= other.bits;
    }

    /// Whether a presentation with these options should animate.
    pub fn animated(self) -> bool {
        !self.contains(Self::unanimated())
    }

    /// The options used when none are passed explicitly.
    pub fn defaults() -> Self {
        Self::embed_in_stack()
    }
}

macro_rules! named_option {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        pub fn $name() -> Self {
            static SLOT: OnceLock<PresentationOptions> = OnceLock::new();
            *SLOT.get_or_init(|| Self::allocate(stringify!($name)))
        }
    };
}

impl PresentationOptions {
    named_option! {
        /// Embed the presented content in a fresh stack container, unless it
        /// already is a stack or an alert.
        embed_in_stack
    }

    named_option! {
        /// Present into the master side of a master/detail layout when the
        /// target container supports one.
        show_in_master
    }

    named_option! {
        /// Fail immediately with [`Blocked`](crate::PresentError::Blocked)
        /// instead of queuing when the presenting screen is busy.
        fail_on_block
    }

    named_option! {
        /// Resolve the caller's completion as soon as the presentation ends,
        /// without waiting for the detach to finish.
        dont_wait_for_dismiss_animation
    }

    named_option! {
        /// Disable presentation animations.
        unanimated
    }

    named_option! {
        /// Opt this push or pop out of same-turn coalescing.
        disable_push_pop_coalescing
    }

    named_option! {
        /// Automatically pop a pushed screen once its presentation completes.
        auto_pop
    }

    named_option! {
        /// Pop every screen pushed after this one when its presentation
        /// completes.
        auto_pop_successors
    }

    /// Equivalent to `auto_pop() | auto_pop_successors()`.
    pub fn auto_pop_self_and_successors() -> Self {
        Self::auto_pop() | Self::auto_pop_successors()
    }
}

impl BitOr for PresentationOptions {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.union(rhs)
    }
}

impl BitOrAssign for PresentationOptions {
    fn bitor_assign(&mut self, rhs: Self) {
        self.insert(rhs);
    }
}

impl fmt::Debug for PresentationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut set = f.debug_set();
        for bit in 0..64 {
            if self.bits & (1 << bit) != 0 {
                match registry().name_of(bit) {
                    Some(name) => set.entry(&name),
                    None => set.entry(&format_args!("bit{bit}")),
                };
            }
        }
        set.finish()
    }
}
