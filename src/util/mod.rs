//! Internal utilities for the deterministic kernel.
//!
//! These utilities are intentionally minimal and dependency-free to maintain
//! determinism across profiles.

pub mod arena;
pub mod det_hash;
pub mod det_rng;

pub use arena::{Arena, ArenaError, Slot};
pub use det_hash::{DetBuildHasher, DetHashMap, DetHasher};
pub use det_rng::DetRng;
