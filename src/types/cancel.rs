//! Cancellation reason, phase, and witness types (C7 data model).
//!
//! Cancellation is a first-class protocol, never a silent drop. This
//! module defines the vocabulary: eleven [`CancelKind`]s with a fixed
//! `(severity, poll_quota, cost_quota, priority)` table, [`CancelReason`]
//! (kind plus a bounded attribution chain), [`CancelPhase`] (monotone
//! delivery phase), and [`CancelWitness`] (the per-task record that ties
//! them together).

use core::fmt;

use crate::types::id::{RegionId, TaskId};
use crate::types::Time;

/// Maximum attribution-chain depth before truncation (§3).
pub const MAX_CHAIN_DEPTH: usize = 16;
/// Maximum attribution-chain memory in bytes before truncation (§3).
pub const MAX_CHAIN_MEMORY: usize = 4096;

/// The kind of cancellation request.
///
/// Eleven variants with a fixed `(severity, poll_quota, cost_quota,
/// priority)` table (SPEC_FULL.md §3); `User` is the least severe (0),
/// `Shutdown` the most (5). These are compile-time constants, never
/// mutated — "fixed" per the spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize, serde::Deserialize)]
pub enum CancelKind {
    /// Explicit cancellation requested by user code.
    User,
    /// Cancellation because another branch of a race completed first.
    RaceLost,
    /// Cancellation due to a sleep/wait timeout (not a budget deadline).
    Timeout,
    /// Cancellation due to fail-fast policy (a sibling task failed).
    FailFast,
    /// Cancellation because a child task panicked.
    ChildPanicked,
    /// Cancellation because a budget deadline elapsed.
    Deadline,
    /// Cancellation because a task's poll or cost quota was exhausted.
    BudgetExhausted,
    /// Cancellation because the parent region was cancelled or is closing.
    ParentCancelled,
    /// Cancellation triggered by a detected linearity violation (e.g. an
    /// obligation leaked during region finalization).
    LinearityViolation,
    /// Cancellation triggered by resource exhaustion in a sibling
    /// subsystem that forces this subtree to unwind.
    ResourceExhausted,
    /// Cancellation due to runtime shutdown.
    Shutdown,
}

struct KindProfile {
    severity: u8,
    poll_quota: u32,
    cost_quota: u64,
    priority: u8,
}

impl CancelKind {
    const fn profile(self) -> KindProfile {
        match self {
            Self::User => KindProfile { severity: 0, poll_quota: 64, cost_quota: 4096, priority: 0 },
            Self::RaceLost => KindProfile { severity: 1, poll_quota: 32, cost_quota: 2048, priority: 1 },
            Self::Timeout => KindProfile { severity: 2, poll_quota: 32, cost_quota: 2048, priority: 2 },
            Self::FailFast => KindProfile { severity: 2, poll_quota: 16, cost_quota: 1024, priority: 2 },
            Self::ChildPanicked => KindProfile { severity: 2, poll_quota: 16, cost_quota: 1024, priority: 3 },
            Self::Deadline => KindProfile { severity: 3, poll_quota: 16, cost_quota: 1024, priority: 3 },
            Self::BudgetExhausted => KindProfile { severity: 3, poll_quota: 8, cost_quota: 512, priority: 3 },
            Self::ParentCancelled => KindProfile { severity: 4, poll_quota: 8, cost_quota: 512, priority: 4 },
            Self::LinearityViolation => KindProfile { severity: 4, poll_quota: 4, cost_quota: 256, priority: 4 },
            Self::ResourceExhausted => KindProfile { severity: 4, poll_quota: 4, cost_quota: 256, priority: 4 },
            Self::Shutdown => KindProfile { severity: 5, poll_quota: 0, cost_quota: 0, priority: 5 },
        }
    }

    /// Severity of this kind (0 = `User` ... 5 = `Shutdown`). Used to decide
    /// whether a strengthening request is legal.
    #[must_use]
    pub const fn severity(self) -> u8 {
        self.profile().severity
    }

    /// Fixed cleanup poll-quota associated with this kind.
    #[must_use]
    pub const fn poll_quota(self) -> u32 {
        self.profile().poll_quota
    }

    /// Fixed cleanup cost-quota associated with this kind.
    #[must_use]
    pub const fn cost_quota(self) -> u64 {
        self.profile().cost_quota
    }

    /// Fixed dispatch priority associated with this kind.
    #[must_use]
    pub const fn priority(self) -> u8 {
        self.profile().priority
    }

    /// The cleanup [`crate::types::Budget`] this kind installs on
    /// acknowledgment (min-plus of task's and reason's quotas happens at
    /// the call site; this is just this kind's half).
    #[must_use]
    pub const fn cleanup_budget(self) -> crate::types::Budget {
        crate::types::Budget::new(None, self.poll_quota(), self.cost_quota(), self.priority())
    }
}

impl fmt::Display for CancelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::User => "user",
            Self::RaceLost => "race-lost",
            Self::Timeout => "timeout",
            Self::FailFast => "fail-fast",
            Self::ChildPanicked => "child-panicked",
            Self::Deadline => "deadline",
            Self::BudgetExhausted => "budget-exhausted",
            Self::ParentCancelled => "parent-cancelled",
            Self::LinearityViolation => "linearity-violation",
            Self::ResourceExhausted => "resource-exhausted",
            Self::Shutdown => "shutdown",
        };
        write!(f, "{s}")
    }
}

/// One hop in a [`CancelReason`]'s attribution chain: which region
/// re-delivered the cancel, one level closer to the leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributionHop {
    /// The region that propagated this cancel one level further.
    pub region: RegionId,
}

/// Why a cancellation happened, including a bounded attribution chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelReason {
    /// The kind of cancellation.
    pub kind: CancelKind,
    /// The region in which the cancellation originated.
    pub origin_region: RegionId,
    /// The task that caused the cancellation, if any (e.g. a failed
    /// sibling for `FailFast`; `None` for externally-originated cancels).
    pub origin_task: Option<TaskId>,
    /// Logical time the reason was created.
    pub timestamp: Time,
    /// Optional static message (static for determinism: no heap
    /// allocation, no locale dependence).
    pub message: Option<&'static str>,
    /// The propagation chain from origin to the task observing this
    /// reason, bounded by [`MAX_CHAIN_DEPTH`]/[`MAX_CHAIN_MEMORY`].
    pub chain: Vec<AttributionHop>,
    /// Set once the chain has been truncated due to depth or memory
    /// limits; never unset.
    pub truncated: bool,
}

impl CancelReason {
    /// Creates a root reason (empty attribution chain).
    #[must_use]
    pub fn new(kind: CancelKind, origin_region: RegionId, origin_task: Option<TaskId>, timestamp: Time) -> Self {
        Self {
            kind,
            origin_region,
            origin_task,
            timestamp,
            message: None,
            chain: Vec::new(),
            truncated: false,
        }
    }

    /// Attaches a static message.
    #[must_use]
    pub fn with_message(mut self, message: &'static str) -> Self {
        self.message = Some(message);
        self
    }

    /// Returns a copy with the attribution chain extended by one hop
    /// through `region`, respecting the bounded depth/memory limits.
    #[must_use]
    pub fn extended(&self, region: RegionId) -> Self {
        let mut next = self.clone();
        const HOP_SIZE: usize = std::mem::size_of::<AttributionHop>();
        let would_be_bytes = (next.chain.len() + 1) * HOP_SIZE;
        if next.chain.len() >= MAX_CHAIN_DEPTH || would_be_bytes > MAX_CHAIN_MEMORY {
            next.truncated = true;
        } else {
            next.chain.push(AttributionHop { region });
        }
        next
    }

    /// Total order key for strengthening tie-breaks: `(severity desc via
    /// caller, earlier timestamp, lexicographically smaller message)`.
    /// Only used when two reasons have equal severity.
    fn tie_break_key(&self) -> (Time, &'static str) {
        (self.timestamp, self.message.unwrap_or(""))
    }

    /// Returns `true` if `candidate` is a legal strengthening of `self`:
    /// severity must be non-decreasing; on a severity tie, the tie-break
    /// key must not make the reason "weaker" (later timestamp or
    /// lexicographically larger message both count as weaker — ties keep
    /// the existing reason, which is encoded by the caller as "no
    /// transition").
    #[must_use]
    pub fn is_legal_strengthen(&self, candidate: &Self) -> bool {
        candidate.kind.severity() >= self.kind.severity()
    }

    /// Given `self` is current and `candidate` is proposed, returns the
    /// reason that should be stored: whichever has higher severity; on a
    /// tie, whichever has the lexicographically smaller tie-break key
    /// (earlier timestamp, then smaller message).
    #[must_use]
    pub fn strengthen_with(&self, candidate: &Self) -> Self {
        match candidate.kind.severity().cmp(&self.kind.severity()) {
            core::cmp::Ordering::Greater => candidate.clone(),
            core::cmp::Ordering::Less => self.clone(),
            core::cmp::Ordering::Equal => {
                if candidate.tie_break_key() < self.tie_break_key() {
                    candidate.clone()
                } else {
                    self.clone()
                }
            }
        }
    }
}

/// Monotone delivery phase of a [`CancelWitness`].
///
/// `Requested < Cancelling < Finalizing < Completed`; phase rank never
/// decreases across observations of the same witness (§8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CancelPhase {
    /// Cancel has been requested but not yet acknowledged by the task.
    Requested,
    /// The task has acknowledged cancellation and is running its cleanup
    /// path under a cleanup budget.
    Cancelling,
    /// The owning region is finalizing (cleanup stack is draining).
    Finalizing,
    /// The task has completed (with a `Cancelled` or other outcome).
    Completed,
}

/// Errors raised by witness installation/strengthening (§4.5).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CancelWitnessError {
    /// `task_id` on the candidate witness does not match the existing one.
    #[error("witness task mismatch")]
    TaskMismatch,
    /// `region_id` on the candidate witness does not match the existing one.
    #[error("witness region mismatch")]
    RegionMismatch,
    /// `epoch` on the candidate witness does not match the existing one.
    #[error("witness epoch mismatch")]
    EpochMismatch,
    /// A proposed phase has lower rank than the witness's current phase.
    #[error("witness phase regression")]
    PhaseRegression,
    /// A proposed reason has lower severity than the witness's current
    /// reason (weakening is never legal).
    #[error("witness reason weakened")]
    ReasonWeakened,
}

/// Per-task cancellation record: `(task_id, region_id, epoch, phase,
/// reason)`. Both `phase` and `reason.kind.severity()` are monotone
/// non-decreasing across the witness's lifetime (§8).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelWitness {
    /// The task this witness is attached to.
    pub task_id: TaskId,
    /// The task's owning region at witness-installation time.
    pub region_id: RegionId,
    /// Cancel epoch: increments exactly once, on first cancel request.
    pub epoch: u64,
    /// Current delivery phase.
    pub phase: CancelPhase,
    /// Current reason (kind + attribution).
    pub reason: CancelReason,
    /// Set by `checkpoint()` the first time the task observes this
    /// witness; used to answer "has this been delivered yet".
    pub observed: bool,
}

impl CancelWitness {
    /// Installs a brand-new witness at epoch `epoch`, phase `Requested`.
    #[must_use]
    pub const fn install(task_id: TaskId, region_id: RegionId, epoch: u64, reason: CancelReason) -> Self {
        Self {
            task_id,
            region_id,
            epoch,
            phase: CancelPhase::Requested,
            reason,
            observed: false,
        }
    }

    /// Attempts to strengthen this witness with a candidate phase/reason
    /// from the same `(task_id, region_id, epoch)`.
    ///
    /// Returns `Ok(true)` if this was an actual phase transition,
    /// `Ok(false)` if it was a same-phase reason-only strengthening (not a
    /// transition, per §4.3), or an error if the candidate violates
    /// monotonicity or identity.
    pub fn strengthen(
        &mut self,
        task_id: TaskId,
        region_id: RegionId,
        epoch: u64,
        phase: CancelPhase,
        reason: CancelReason,
    ) -> Result<bool, CancelWitnessError> {
        if task_id != self.task_id {
            return Err(CancelWitnessError::TaskMismatch);
        }
        if region_id != self.region_id {
            return Err(CancelWitnessError::RegionMismatch);
        }
        if epoch != self.epoch {
            return Err(CancelWitnessError::EpochMismatch);
        }
        if phase < self.phase {
            return Err(CancelWitnessError::PhaseRegression);
        }
        if !self.reason.is_legal_strengthen(&reason) {
            return Err(CancelWitnessError::ReasonWeakened);
        }
        self.reason = self.reason.strengthen_with(&reason);
        let transitioned = phase > self.phase;
        self.phase = phase;
        Ok(transitioned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region() -> RegionId {
        RegionId::new_for_test(0, 0)
    }
    fn task() -> TaskId {
        TaskId::new_for_test(0, 0)
    }

    #[test]
    fn severity_endpoints_match_spec() {
        assert_eq!(CancelKind::User.severity(), 0);
        assert_eq!(CancelKind::Shutdown.severity(), 5);
    }

    #[test]
    fn strengthen_monotone_severity_then_declined_weaker() {
        let mut w = CancelWitness::install(
            task(),
            region(),
            1,
            CancelReason::new(CancelKind::User, region(), None, Time::ZERO),
        );
        // Strengthen to Shutdown: legal.
        let r2 = CancelReason::new(CancelKind::Shutdown, region(), None, Time::from_millis(1));
        assert!(w.strengthen(task(), region(), 1, CancelPhase::Requested, r2).is_ok());
        assert_eq!(w.reason.kind, CancelKind::Shutdown);

        // Attempt to weaken back to User: must be declined (Err), not applied.
        let r3 = CancelReason::new(CancelKind::User, region(), None, Time::from_millis(2));
        let err = w.strengthen(task(), region(), 1, CancelPhase::Requested, r3);
        assert_eq!(err, Err(CancelWitnessError::ReasonWeakened));
        assert_eq!(w.reason.kind, CancelKind::Shutdown);
    }

    #[test]
    fn phase_regression_rejected() {
        let mut w = CancelWitness::install(
            task(),
            region(),
            1,
            CancelReason::new(CancelKind::User, region(), None, Time::ZERO),
        );
        w.phase = CancelPhase::Cancelling;
        let err = w.strengthen(
            task(),
            region(),
            1,
            CancelPhase::Requested,
            CancelReason::new(CancelKind::User, region(), None, Time::ZERO),
        );
        assert_eq!(err, Err(CancelWitnessError::PhaseRegression));
    }

    #[test]
    fn attribution_chain_truncates_past_max_depth() {
        let mut reason = CancelReason::new(CancelKind::ParentCancelled, region(), None, Time::ZERO);
        for _ in 0..MAX_CHAIN_DEPTH + 4 {
            reason = reason.extended(region());
        }
        assert!(reason.truncated);
        assert!(reason.chain.len() <= MAX_CHAIN_DEPTH);
    }

    #[test]
    fn equal_severity_tie_break_prefers_earlier_timestamp() {
        let a = CancelReason::new(CancelKind::Timeout, region(), None, Time::from_millis(5));
        let b = CancelReason::new(CancelKind::FailFast, region(), None, Time::from_millis(1));
        assert_eq!(a.kind.severity(), b.kind.severity());
        assert_eq!(a.strengthen_with(&b).timestamp, Time::from_millis(1));
    }
}
