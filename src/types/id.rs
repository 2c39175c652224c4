//! Packed handles and identifier types for runtime entities.
//!
//! A [`Handle`] is the 64-bit packed value described in §3/§4.1 of the
//! spec: `[16-bit type_tag | 16-bit state_mask | 16-bit generation |
//! 16-bit slot_index]`. The per-kind newtypes (`RegionId`, `TaskId`, ...)
//! wrap a `Handle` and pin its `type_tag`, so a `TaskId` can never be
//! handed to the region arena and silently misinterpreted.

use core::fmt;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Discriminates which arena a [`Handle`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum TypeTag {
    /// [`RegionId`].
    Region = 1,
    /// [`TaskId`].
    Task = 2,
    /// [`ObligationId`].
    Obligation = 3,
    /// [`CancelWitnessId`].
    CancelWitness = 4,
    /// [`TimerId`].
    Timer = 5,
    /// [`ChannelId`].
    Channel = 6,
}

impl TypeTag {
    const fn from_u16(raw: u16) -> Option<Self> {
        match raw {
            1 => Some(Self::Region),
            2 => Some(Self::Task),
            3 => Some(Self::Obligation),
            4 => Some(Self::CancelWitness),
            5 => Some(Self::Timer),
            6 => Some(Self::Channel),
            _ => None,
        }
    }
}

/// A 64-bit packed, generation-safe handle.
///
/// Layout (high to low bits): `type_tag:16 | state_mask:16 | generation:16 |
/// slot_index:16`. Validation at every boundary checks `type_tag` against
/// the expected kind, `slot_index` against arena bounds, and `generation`
/// against the owning slot — see [`crate::util::Arena`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Handle(u64);

impl Handle {
    /// Packs the four fields into a handle.
    #[must_use]
    pub const fn pack(type_tag: TypeTag, state_mask: u16, generation: u16, slot_index: u16) -> Self {
        let raw = ((type_tag as u64) << 48)
            | ((state_mask as u64) << 32)
            | ((generation as u64) << 16)
            | (slot_index as u64);
        Self(raw)
    }

    /// Raw `type_tag` field (undecoded — see [`Self::type_tag`] for the
    /// validated accessor).
    #[must_use]
    pub const fn type_tag_raw(self) -> u16 {
        (self.0 >> 48) as u16
    }

    /// Decodes the `type_tag` field, or `None` if it is not one of the six
    /// known kinds (a handle constructed out-of-band, e.g. via
    /// deserialization of corrupt input).
    #[must_use]
    pub const fn type_tag(self) -> Option<TypeTag> {
        TypeTag::from_u16(self.type_tag_raw())
    }

    /// `state_mask` field.
    #[must_use]
    pub const fn state_mask(self) -> u16 {
        (self.0 >> 32) as u16
    }

    /// `generation` field.
    #[must_use]
    pub const fn generation(self) -> u16 {
        (self.0 >> 16) as u16
    }

    /// `slot_index` field.
    #[must_use]
    pub const fn slot_index(self) -> u16 {
        self.0 as u16
    }

    /// Returns a copy of this handle with `state_mask` replaced.
    #[must_use]
    pub const fn with_state_mask(self, state_mask: u16) -> Self {
        Self::pack(
            match self.type_tag() {
                Some(t) => t,
                None => TypeTag::Region,
            },
            state_mask,
            self.generation(),
            self.slot_index(),
        )
    }

    /// Raw bit pattern, primarily for journal/digest serialization.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Handle(tag={:?}, state={:#06x}, gen={}, slot={})",
            self.type_tag(),
            self.state_mask(),
            self.generation(),
            self.slot_index()
        )
    }
}

macro_rules! define_id {
    ($name:ident, $tag:expr, $display_prefix:literal) => {
        #[doc = concat!("Identifier for a `", stringify!($name), "` arena entry.")]
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(Handle);

        impl $name {
            /// Builds an identifier from arena coordinates. `state_mask`
            /// defaults to zero; use [`Self::with_state_mask`] to annotate it.
            #[must_use]
            pub const fn from_parts(slot_index: u16, generation: u16) -> Self {
                Self(Handle::pack($tag, 0, generation, slot_index))
            }

            /// The underlying packed handle.
            #[must_use]
            pub const fn handle(self) -> Handle {
                self.0
            }

            /// Builds an identifier directly from a handle, validating its
            /// `type_tag`. Returns `None` on mismatch.
            #[must_use]
            pub fn from_handle(handle: Handle) -> Option<Self> {
                if handle.type_tag_raw() == $tag as u16 {
                    Some(Self(handle))
                } else {
                    None
                }
            }

            /// Arena slot index.
            #[must_use]
            pub const fn slot_index(self) -> u16 {
                self.0.slot_index()
            }

            /// Arena slot generation.
            #[must_use]
            pub const fn generation(self) -> u16 {
                self.0.generation()
            }

            /// Returns a copy annotated with `state_mask` (debug/hardened
            /// profiles may check this at the API boundary).
            #[must_use]
            pub const fn with_state_mask(self, state_mask: u16) -> Self {
                Self(self.0.with_state_mask(state_mask))
            }

            /// Builds an identifier for tests, bypassing arena allocation.
            #[doc(hidden)]
            #[must_use]
            pub const fn new_for_test(slot_index: u16, generation: u16) -> Self {
                Self::from_parts(slot_index, generation)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(
                    f,
                    concat!(stringify!($name), "({}:{})"),
                    self.slot_index(),
                    self.generation()
                )
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($display_prefix, "{}"), self.slot_index())
            }
        }
    };
}

define_id!(RegionId, TypeTag::Region, "R");
define_id!(TaskId, TypeTag::Task, "T");
define_id!(ObligationId, TypeTag::Obligation, "O");
define_id!(CancelWitnessId, TypeTag::CancelWitness, "W");
define_id!(TimerId, TypeTag::Timer, "Tm");
define_id!(ChannelId, TypeTag::Channel, "C");

/// A logical instant, expressed in nanoseconds since an arbitrary epoch.
///
/// In deterministic mode, `Time` only ever advances via the logical clock
/// host hook (§6); it never reads the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Time(u64);

impl Time {
    /// The zero instant (epoch).
    pub const ZERO: Self = Self(0);

    /// The maximum representable instant.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a new time from nanoseconds since epoch.
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Creates a new time from milliseconds since epoch.
    #[must_use]
    pub const fn from_millis(millis: u64) -> Self {
        Self(millis.saturating_mul(1_000_000))
    }

    /// Creates a new time from seconds since epoch.
    #[must_use]
    pub const fn from_secs(secs: u64) -> Self {
        Self(secs.saturating_mul(1_000_000_000))
    }

    /// Returns the time as nanoseconds since epoch.
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Saturating addition of a [`Duration`].
    #[must_use]
    pub fn saturating_add(self, dur: Duration) -> Self {
        Self(self.0.saturating_add(dur.as_nanos() as u64))
    }

    /// Saturating difference, never going below zero; returns
    /// `Duration::ZERO` if `self <= earlier`.
    #[must_use]
    pub fn saturating_duration_since(self, earlier: Self) -> Duration {
        Duration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ns", self.0)
    }
}
