//! The four-valued [`Outcome`] type and its severity lattice.
//!
//! `Outcome` is the terminal result of a task, region, or obligation: it
//! distinguishes ordinary success/failure from the two kernel-specific
//! terminal states, `Cancelled` (cooperative, expected) and `Panicked`
//! (unrecoverable invariant breach). Severities form a total order used to
//! `join` outcomes when aggregating children into a parent (§8: join is
//! associative, commutative, idempotent; identity `Ok`; absorbing `Panicked`).

use core::fmt;

use crate::types::cancel::CancelReason;

/// Total severity order over the four outcome variants.
///
/// Declaration order is significant: `derive(PartialOrd, Ord)` ranks
/// variants by declaration order, giving exactly `Ok(0) < Err(1) <
/// Cancelled(2) < Panicked(3)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    /// Successful completion.
    Ok = 0,
    /// Ordinary, recoverable failure.
    Err = 1,
    /// Cooperative cancellation was acknowledged and completed.
    Cancelled = 2,
    /// Unrecoverable invariant breach.
    Panicked = 3,
}

/// Payload carried by a [`Severity::Panicked`] outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanicPayload {
    /// Static description of the invariant that was breached.
    pub message: &'static str,
}

/// The terminal result of a task, region, or obligation.
///
/// `E` defaults to a caller-chosen error payload type; `T` the success
/// payload type. Both are typically small (`()`, an enum variant, or a
/// boxed value) since outcomes are stored inline in arena slots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T, E> {
    /// Completed successfully with a value.
    Ok(T),
    /// Completed with an ordinary error.
    Err(E),
    /// Cancellation was acknowledged and the task completed along the
    /// cancel path.
    Cancelled(CancelReason),
    /// An unrecoverable invariant breach; always fatal to the owning
    /// region.
    Panicked(PanicPayload),
}

impl<T, E> Outcome<T, E> {
    /// This outcome's severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::Ok(_) => Severity::Ok,
            Self::Err(_) => Severity::Err,
            Self::Cancelled(_) => Severity::Cancelled,
            Self::Panicked(_) => Severity::Panicked,
        }
    }

    /// True if this is the identity element of [`join_outcomes`] (`Ok`).
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Ok(_))
    }

    /// True if this is the absorbing element of [`join_outcomes`]
    /// (`Panicked`).
    #[must_use]
    pub const fn is_panicked(&self) -> bool {
        matches!(self, Self::Panicked(_))
    }
}

impl<T, E> fmt::Display for Outcome<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ok(_) => write!(f, "Ok"),
            Self::Err(_) => write!(f, "Err"),
            Self::Cancelled(reason) => write!(f, "Cancelled({})", reason.kind),
            Self::Panicked(p) => write!(f, "Panicked({})", p.message),
        }
    }
}

/// Joins two outcomes by severity: the higher-severity outcome wins; on a
/// tie, `a` wins (left-biased).
///
/// This is the join operation of §8's outcome lattice: associative,
/// commutative up to left-bias on ties, idempotent (`join(a, a) == a`),
/// with identity `Ok` and absorbing element `Panicked`.
#[must_use]
pub fn join_outcomes<T, E>(a: Outcome<T, E>, b: Outcome<T, E>) -> Outcome<T, E> {
    if b.severity() > a.severity() { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::cancel::{CancelKind, CancelReason};
    use crate::types::{RegionId, TaskId};

    fn reason(kind: CancelKind) -> CancelReason {
        CancelReason::new(kind, RegionId::new_for_test(0, 0), Some(TaskId::new_for_test(0, 0)), Time0)
    }

    // A tiny local alias so the doctest-ish helper above reads naturally;
    // `CancelReason::new` takes a `Time`, defined in `types::id`.
    #[allow(non_upper_case_globals)]
    const Time0: crate::types::Time = crate::types::Time::ZERO;

    #[test]
    fn join_identity_is_ok() {
        let ok: Outcome<(), ()> = Outcome::Ok(());
        let err: Outcome<(), ()> = Outcome::Err(());
        assert_eq!(join_outcomes(ok, err.clone()), err);
    }

    #[test]
    fn join_absorbing_is_panicked() {
        let panicked: Outcome<(), ()> = Outcome::Panicked(PanicPayload { message: "x" });
        let cancelled: Outcome<(), ()> = Outcome::Cancelled(reason(CancelKind::User));
        assert_eq!(
            join_outcomes(panicked.clone(), cancelled),
            panicked
        );
    }

    #[test]
    fn join_is_idempotent() {
        let err: Outcome<(), i32> = Outcome::Err(5);
        assert_eq!(join_outcomes(err.clone(), err.clone()), err);
    }

    #[test]
    fn join_left_biased_on_tie() {
        let a: Outcome<(), i32> = Outcome::Err(1);
        let b: Outcome<(), i32> = Outcome::Err(2);
        assert_eq!(join_outcomes(a, b), Outcome::Err(1));
    }

    #[test]
    fn severity_total_order() {
        assert!(Severity::Ok < Severity::Err);
        assert!(Severity::Err < Severity::Cancelled);
        assert!(Severity::Cancelled < Severity::Panicked);
    }
}
