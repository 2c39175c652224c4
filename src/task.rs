//! Task lifecycle (C6): the unit of dispatchable work.
//!
//! A task's poll function and any captured state live in its owning
//! region's capture arena; this module only tracks the state machine,
//! scheduling metadata, and cleanup budget. `Completed` is absorbing —
//! once reached, no further transition is legal.

use crate::error::Result;
use crate::transition::{self, TaskState};
use crate::types::{Budget, RegionId, Time};

/// A task record.
pub struct Task {
    state: TaskState,
    region: RegionId,
    cancel_epoch: u64,
    cleanup_budget: Budget,
    /// Monotonic insertion sequence, used as the scheduler tie-break's
    /// last-resort key.
    insertion_seq: u64,
    deadline: Option<Time>,
    priority: u8,
}

impl Task {
    /// Creates a freshly spawned task in `Created` state.
    #[must_use]
    pub fn spawn(region: RegionId, insertion_seq: u64, deadline: Option<Time>, priority: u8) -> Self {
        Self {
            state: TaskState::Created,
            region,
            cancel_epoch: 0,
            cleanup_budget: Budget::INFINITE,
            insertion_seq,
            deadline,
            priority,
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> TaskState {
        self.state
    }

    /// The owning region.
    #[must_use]
    pub fn region(&self) -> RegionId {
        self.region
    }

    /// Current cancel epoch (increments exactly once, on first cancel
    /// request).
    #[must_use]
    pub fn cancel_epoch(&self) -> u64 {
        self.cancel_epoch
    }

    /// The task's cleanup budget, installed on cancel acknowledgment.
    #[must_use]
    pub fn cleanup_budget(&self) -> Budget {
        self.cleanup_budget
    }

    /// Insertion sequence, for deterministic tie-breaking.
    #[must_use]
    pub fn insertion_seq(&self) -> u64 {
        self.insertion_seq
    }

    /// The task's budget deadline, if any.
    #[must_use]
    pub fn deadline(&self) -> Option<Time> {
        self.deadline
    }

    /// Dispatch priority.
    #[must_use]
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Attempts a state-changing transition, routed through the
    /// transition authority. `Completed` is absorbing.
    pub fn transition(&mut self, to: TaskState) -> Result<()> {
        transition::task_transition_check(self.state, to)?;
        self.state = to;
        Ok(())
    }

    /// Bumps the cancel epoch exactly once, the first time a cancel is
    /// requested for this task.
    pub fn bump_cancel_epoch_once(&mut self) {
        if self.cancel_epoch == 0 {
            self.cancel_epoch = 1;
        }
    }

    /// Installs a cleanup budget (called on cancel acknowledgment, after
    /// the meet of task and reason quotas has been computed by the
    /// cancellation engine).
    pub fn install_cleanup_budget(&mut self, budget: Budget) {
        self.cleanup_budget = budget;
    }

    /// True once this task has reached a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.state == TaskState::Completed
    }
}
