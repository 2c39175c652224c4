//! Transition authority (C5): compile-time `(from, to)` legality tables for
//! the region, task, and obligation state machines.
//!
//! Every state mutation in the lifecycle engine routes through one of the
//! three `*_transition_check` functions here rather than assigning a state
//! field directly. This keeps the legal-arc graph in one place and makes
//! every illegal mutation fail closed with
//! [`KernelError::InvalidTransition`] instead of silently corrupting state.

use crate::error::{KernelError, Result};

/// Region lifecycle state. Monotone: declaration order is the only legal
/// direction of travel (`Open < Closing < Draining < Finalizing < Closed`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum RegionState {
    /// Accepting spawns, channel sends, obligation reservations.
    Open,
    /// Admission is closed; cancel has been propagated to children.
    Closing,
    /// Waiting for all children to reach a terminal state.
    Draining,
    /// Cleanup stack is draining; unresolved obligations are surfaced as
    /// `Leaked`.
    Finalizing,
    /// Terminal. The slot's generation is bumped on entry.
    Closed,
}

/// Task lifecycle state (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub enum TaskState {
    /// Spawned, never yet dispatched.
    Created,
    /// Dispatched at least once and not (yet) asked to cancel.
    Running,
    /// A cancel has been requested but not yet acknowledged by a
    /// checkpoint.
    CancelRequested,
    /// The task has acknowledged cancellation and is running its own
    /// cleanup path under a cleanup budget.
    Cancelling,
    /// The task's terminal outcome has been computed; only bookkeeping
    /// remains before `Completed`.
    Finalizing,
    /// Terminal. Absorbing: no arc leaves `Completed`.
    Completed,
}

/// Obligation lifecycle state (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ObligationState {
    /// Reserved; exactly one arc leaves this state.
    Reserved,
    /// Resolved successfully. Terminal.
    Committed,
    /// Resolved by explicit abort. Terminal.
    Aborted,
    /// Surfaced unresolved during region finalization. Terminal.
    Leaked,
}

/// Checks whether `from -> to` is a legal region transition.
///
/// Four full-path arcs plus the documented fast path
/// `Closing -> Finalizing` for a region that never admitted a child.
pub fn region_transition_check(from: RegionState, to: RegionState) -> Result<()> {
    use RegionState::{Closed, Closing, Draining, Finalizing, Open};
    let legal = matches!(
        (from, to),
        (Open, Closing) | (Closing, Draining) | (Draining, Finalizing) | (Finalizing, Closed) | (Closing, Finalizing)
    );
    if legal {
        Ok(())
    } else {
        Err(KernelError::InvalidTransition)
    }
}

/// Checks whether `from -> to` is a legal, state-changing task transition.
///
/// Ten arcs change state: `Created -> {Running, CancelRequested,
/// Completed}`, `Running -> {CancelRequested, Completed}`,
/// `CancelRequested -> {Cancelling, Completed}`, `Cancelling ->
/// {Finalizing, Completed}`, `Finalizing -> Completed`. The remaining
/// three of the task DAG's 13 named arcs are same-state cancel
/// "strengthen" arcs (`CancelRequested->CancelRequested`,
/// `Cancelling->Cancelling`, `Finalizing->Finalizing`): they are not a
/// transition (this function does not accept them) and instead update
/// `reason`/budget fields monotonically through [`crate::types::cancel`].
pub fn task_transition_check(from: TaskState, to: TaskState) -> Result<()> {
    use TaskState::{Cancelling, CancelRequested, Completed, Created, Finalizing, Running};
    let legal = matches!(
        (from, to),
        (Created, Running)
            | (Created, CancelRequested)
            | (Created, Completed)
            | (Running, CancelRequested)
            | (Running, Completed)
            | (CancelRequested, Cancelling)
            | (CancelRequested, Completed)
            | (Cancelling, Finalizing)
            | (Cancelling, Completed)
            | (Finalizing, Completed)
    );
    if legal {
        Ok(())
    } else {
        Err(KernelError::InvalidTransition)
    }
}

/// Checks whether `from -> to` is a legal obligation transition.
///
/// Exactly one arc leaves `Reserved`; all other states are absorbing.
pub fn obligation_transition_check(from: ObligationState, to: ObligationState) -> Result<()> {
    use ObligationState::{Aborted, Committed, Leaked, Reserved};
    let legal = matches!((from, to), (Reserved, Committed) | (Reserved, Aborted) | (Reserved, Leaked));
    if legal {
        Ok(())
    } else {
        Err(KernelError::InvalidTransition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REGION_STATES: [RegionState; 5] = [
        RegionState::Open,
        RegionState::Closing,
        RegionState::Draining,
        RegionState::Finalizing,
        RegionState::Closed,
    ];
    const TASK_STATES: [TaskState; 6] = [
        TaskState::Created,
        TaskState::Running,
        TaskState::CancelRequested,
        TaskState::Cancelling,
        TaskState::Finalizing,
        TaskState::Completed,
    ];
    const OBLIGATION_STATES: [ObligationState; 4] = [
        ObligationState::Reserved,
        ObligationState::Committed,
        ObligationState::Aborted,
        ObligationState::Leaked,
    ];

    #[test]
    fn region_fast_path_skips_draining() {
        assert!(region_transition_check(RegionState::Closing, RegionState::Finalizing).is_ok());
    }

    #[test]
    fn region_rejects_out_of_order_jump() {
        assert_eq!(
            region_transition_check(RegionState::Open, RegionState::Draining),
            Err(KernelError::InvalidTransition)
        );
    }

    #[test]
    fn region_closed_is_absorbing() {
        for &s in &REGION_STATES {
            assert_eq!(region_transition_check(RegionState::Closed, s), Err(KernelError::InvalidTransition));
        }
    }

    #[test]
    fn task_dag_has_exactly_ten_state_changing_arcs() {
        // The named 13-arc DAG is these 10 plus 3 same-state "strengthen"
        // arcs that never reach this function (see its doc comment).
        let mut count = 0;
        for &from in &TASK_STATES {
            for &to in &TASK_STATES {
                if task_transition_check(from, to).is_ok() {
                    count += 1;
                }
            }
        }
        assert_eq!(count, 10);
    }

    #[test]
    fn task_same_state_is_never_a_legal_transition() {
        for &s in &TASK_STATES {
            assert_eq!(task_transition_check(s, s), Err(KernelError::InvalidTransition));
        }
    }

    #[test]
    fn task_completed_is_absorbing() {
        for &s in &TASK_STATES {
            assert_eq!(task_transition_check(TaskState::Completed, s), Err(KernelError::InvalidTransition));
        }
    }

    #[test]
    fn task_cancel_state_never_reverts_to_running() {
        assert_eq!(
            task_transition_check(TaskState::CancelRequested, TaskState::Running),
            Err(KernelError::InvalidTransition)
        );
    }

    #[test]
    fn obligation_exactly_one_arc_leaves_reserved() {
        let legal_targets: Vec<ObligationState> = OBLIGATION_STATES
            .iter()
            .copied()
            .filter(|&to| obligation_transition_check(ObligationState::Reserved, to).is_ok())
            .collect();
        assert_eq!(legal_targets.len(), 3);
    }

    #[test]
    fn obligation_terminal_states_are_absorbing() {
        for terminal in [ObligationState::Committed, ObligationState::Aborted, ObligationState::Leaked] {
            for &s in &OBLIGATION_STATES {
                assert_eq!(obligation_transition_check(terminal, s), Err(KernelError::InvalidTransition));
            }
        }
    }
}
