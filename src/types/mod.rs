//! Core types for the deterministic kernel.
//!
//! - [`id`]: packed handles and the per-kind identifier newtypes (`RegionId`,
//!   `TaskId`, `ObligationId`, `TimerId`, `ChannelId`, `CancelWitnessId`), plus
//!   [`Time`].
//! - [`outcome`]: the four-valued [`Outcome`] type with its severity lattice.
//! - [`budget`]: [`Budget`], the product meet-semiring of deadline/quotas/priority.
//! - [`cancel`]: [`CancelKind`], [`CancelReason`], [`CancelPhase`], [`CancelWitness`].

pub mod budget;
pub mod cancel;
pub mod id;
pub mod outcome;

pub use budget::Budget;
pub use cancel::{CancelKind, CancelPhase, CancelReason, CancelWitness};
pub use id::{CancelWitnessId, ChannelId, Handle, ObligationId, RegionId, TaskId, TimerId, Time, TypeTag};
pub use outcome::{Outcome, Severity, join_outcomes};
