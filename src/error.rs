//! Stable error taxonomy (§6) and the ambient per-task error ledger (§7).
//!
//! Every fallible kernel API returns `Result<T, KernelError>`. There is no
//! hidden error channel, no panic-based control flow outside documented
//! linearity violations (§4.6). `KernelError` is intentionally a flat,
//! stable enum — growing it is a breaking change, matching the teacher
//! crate's treatment of its public error surface.

use core::fmt;

/// The stable kernel error taxonomy (§6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum KernelError {
    /// A requested state transition is not in the legal-arc table.
    #[error("invalid state transition")]
    InvalidTransition,
    /// The operation requires the region to be `Open` (or `Finalizing` for
    /// finalizer task spawns) but it is not.
    #[error("region is not open")]
    RegionNotOpen,
    /// The region has reached `Closed`; no further access is permitted.
    #[error("region is closed")]
    RegionClosed,
    /// The region has been poisoned; no further spawns are permitted.
    #[error("region is poisoned")]
    RegionPoisoned,
    /// Admission into this region/channel/etc. has been closed.
    #[error("admission closed")]
    AdmissionClosed,
    /// The obligation has already left the `Reserved` state.
    #[error("obligation already resolved")]
    ObligationAlreadyResolved,
    /// The obligation was surfaced as leaked (informational outcome, not
    /// necessarily an error path).
    #[error("obligation leaked")]
    ObligationLeaked,
    /// One or more obligations remain unresolved.
    #[error("unresolved obligations")]
    UnresolvedObligations,
    /// One or more children have not reached a terminal state.
    #[error("incomplete children")]
    IncompleteChildren,
    /// The handle's generation does not match its slot's current
    /// generation.
    #[error("stale handle")]
    StaleHandle,
    /// The requested entity does not exist.
    #[error("not found")]
    NotFound,
    /// An argument failed validation (e.g. zero channel capacity).
    #[error("invalid argument")]
    InvalidArgument,
    /// The call is not legal in the component's current state (distinct
    /// from `InvalidTransition`, which is specifically about the
    /// region/task/obligation state machines).
    #[error("invalid state")]
    InvalidState,
    /// A fixed-capacity resource (arena, cleanup stack, journal, ...) is
    /// exhausted. Failure-atomic: no partial state change.
    #[error("resource exhausted")]
    ResourceExhausted,
    /// A [`crate::types::Budget`] quota was exhausted.
    #[error("budget exhausted")]
    BudgetExhausted,
    /// Specifically the poll-quota component of a budget was exhausted.
    #[error("poll budget exhausted")]
    PollBudgetExhausted,
    /// Quiescence check: at least one task is still active.
    #[error("tasks still active")]
    TasksStillActive,
    /// Quiescence check: at least one obligation is still reserved.
    #[error("obligations unresolved")]
    ObligationsUnresolved,
    /// Quiescence check: at least one region is not `Closed`.
    #[error("regions not closed")]
    RegionsNotClosed,
    /// Quiescence check: the timer wheel is not empty.
    #[error("timers pending")]
    TimersPending,
    /// Quiescence check: at least one channel still holds undelivered
    /// state.
    #[error("channel not drained")]
    ChannelNotDrained,
    /// A cancel witness's `task_id` did not match.
    #[error("witness task mismatch")]
    WitnessTaskMismatch,
    /// A cancel witness's `region_id` did not match.
    #[error("witness region mismatch")]
    WitnessRegionMismatch,
    /// A cancel witness's `epoch` did not match.
    #[error("witness epoch mismatch")]
    WitnessEpochMismatch,
    /// A proposed witness phase regressed relative to the current phase.
    #[error("witness phase regression")]
    WitnessPhaseRegression,
    /// A proposed witness reason was weaker than the current reason.
    #[error("witness reason weakened")]
    WitnessReasonWeakened,
    /// A timer's requested delay exceeds `max_timer_duration`.
    #[error("timer duration exceeded")]
    TimerDurationExceeded,
    /// The channel's receiver (or all senders) has dropped.
    #[error("disconnected")]
    Disconnected,
    /// The operation observed cancellation before mutating state.
    #[error("cancelled")]
    Cancelled,
    /// The channel has no spare capacity right now.
    #[error("full")]
    Full,
    /// The channel has no message available right now.
    #[error("empty")]
    Empty,
    /// The operation would suspend; never surfaced past the scheduler.
    #[error("pending")]
    Pending,
    /// The allocator hook has been sealed; no further allocation is
    /// permitted.
    #[error("allocator sealed")]
    AllocatorSealed,
    /// The host hook configuration violates deterministic-mode policy.
    #[error("determinism violation")]
    DeterminismViolation,
    /// A query about a task's outcome was made before it completed.
    #[error("task not completed")]
    TaskNotCompleted,
    /// A journal event failed to serialize to its canonical form.
    #[error("journal encode failed")]
    JournalEncodeFailed,
    /// A journal event failed to deserialize from a codec's byte form.
    #[error("journal decode failed")]
    JournalDecodeFailed,
}

impl From<crate::types::budget::BudgetExhaustion> for KernelError {
    fn from(e: crate::types::budget::BudgetExhaustion) -> Self {
        match e {
            crate::types::budget::BudgetExhaustion::Poll => Self::PollBudgetExhausted,
            crate::types::budget::BudgetExhaustion::Cost | crate::types::budget::BudgetExhaustion::Deadline => {
                Self::BudgetExhausted
            }
        }
    }
}

impl From<crate::util::arena::ArenaError> for KernelError {
    fn from(e: crate::util::arena::ArenaError) -> Self {
        match e {
            crate::util::arena::ArenaError::Full => Self::ResourceExhausted,
            crate::util::arena::ArenaError::OutOfBounds
            | crate::util::arena::ArenaError::StaleGeneration
            | crate::util::arena::ArenaError::Vacant => Self::StaleHandle,
        }
    }
}

impl From<crate::types::cancel::CancelWitnessError> for KernelError {
    fn from(e: crate::types::cancel::CancelWitnessError) -> Self {
        use crate::types::cancel::CancelWitnessError as W;
        match e {
            W::TaskMismatch => Self::WitnessTaskMismatch,
            W::RegionMismatch => Self::WitnessRegionMismatch,
            W::EpochMismatch => Self::WitnessEpochMismatch,
            W::PhaseRegression => Self::WitnessPhaseRegression,
            W::ReasonWeakened => Self::WitnessReasonWeakened,
        }
    }
}

/// `Result` alias for fallible kernel operations.
pub type Result<T> = core::result::Result<T, KernelError>;

/// `Result` alias for operations with no success payload.
pub type Status = Result<()>;

/// Capacity of the per-task error ledger ring.
pub const ERROR_LEDGER_CAPACITY: usize = 32;

/// One breadcrumb in a task's [`ErrorLedger`]: which operation failed,
/// where, and its position in the monotonic sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorStep {
    /// The operation being attempted (e.g. `"task_spawn"`).
    pub operation: &'static str,
    /// Source file of the call site.
    pub file: &'static str,
    /// Source line of the call site.
    pub line: u32,
    /// Monotonic sequence number, unique within a single task's ledger.
    pub sequence: u64,
    /// The error that occurred.
    pub error: KernelError,
}

/// A fixed-size, zero-allocation-after-construction ring buffer of the last
/// [`ERROR_LEDGER_CAPACITY`] propagation steps for a single task.
///
/// Active in every safety profile (§7): this is not a debug-only facility.
#[derive(Debug, Clone)]
pub struct ErrorLedger {
    steps: [Option<ErrorStep>; ERROR_LEDGER_CAPACITY],
    next_write: usize,
    next_sequence: u64,
}

impl ErrorLedger {
    /// Creates an empty ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            steps: [None; ERROR_LEDGER_CAPACITY],
            next_write: 0,
            next_sequence: 0,
        }
    }

    /// Records one propagation step, overwriting the oldest entry once the
    /// ring is full.
    pub fn record(&mut self, operation: &'static str, file: &'static str, line: u32, error: KernelError) {
        let sequence = self.next_sequence;
        self.next_sequence += 1;
        self.steps[self.next_write] = Some(ErrorStep {
            operation,
            file,
            line,
            sequence,
            error,
        });
        self.next_write = (self.next_write + 1) % ERROR_LEDGER_CAPACITY;
    }

    /// Iterates recorded steps in chronological order (oldest first among
    /// what remains in the ring).
    pub fn iter(&self) -> impl Iterator<Item = &ErrorStep> {
        let mut ordered: Vec<&ErrorStep> = self.steps.iter().flatten().collect();
        ordered.sort_by_key(|s| s.sequence);
        ordered.into_iter()
    }

    /// Number of steps currently retained (at most [`ERROR_LEDGER_CAPACITY`]).
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.iter().filter(|s| s.is_some()).count()
    }

    /// True if no step has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ErrorLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ErrorLedger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in self.iter() {
            writeln!(f, "[{}] {} at {}:{}: {}", step.sequence, step.operation, step.file, step.line, step.error)?;
        }
        Ok(())
    }
}

/// Records a step into an [`ErrorLedger`], capturing `file!()`/`line!()`
/// automatically. Mirrors the teacher crate's convention of thin,
/// call-site-capturing macros for zero-allocation diagnostics.
#[macro_export]
macro_rules! record_step {
    ($ledger:expr, $operation:expr, $error:expr) => {
        $ledger.record($operation, file!(), line!(), $error)
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_overwrites_oldest_on_overflow() {
        let mut ledger = ErrorLedger::new();
        for i in 0..ERROR_LEDGER_CAPACITY as u64 + 5 {
            ledger.record("op", "file.rs", i as u32, KernelError::NotFound);
        }
        assert_eq!(ledger.len(), ERROR_LEDGER_CAPACITY);
        let sequences: Vec<u64> = ledger.iter().map(|s| s.sequence).collect();
        assert_eq!(sequences.first().copied(), Some(5));
        assert_eq!(sequences.last().copied(), Some(ERROR_LEDGER_CAPACITY as u64 + 4));
    }

    #[test]
    fn ledger_sequence_is_monotonic() {
        let mut ledger = ErrorLedger::new();
        ledger.record("a", "f", 1, KernelError::Full);
        ledger.record("b", "f", 2, KernelError::Empty);
        let seqs: Vec<u64> = ledger.iter().map(|s| s.sequence).collect();
        assert_eq!(seqs, vec![0, 1]);
    }

    #[test]
    fn record_step_macro_captures_call_site() {
        let mut ledger = ErrorLedger::new();
        record_step!(ledger, "test_op", KernelError::Full);
        let step = ledger.iter().next().unwrap();
        assert_eq!(step.operation, "test_op");
        assert!(step.file.ends_with("error.rs"));
    }
}
