//! Cancellation protocol engine (C7): installing, strengthening, and
//! observing [`CancelWitness`]es, and depth-first propagation through a
//! region's children.
//!
//! This module is the only place that mutates a [`CancelWitness`] once
//! installed; [`Task`] only exposes its own state machine, and the
//! witness itself only exposes `strengthen` as raw monotonicity-checking
//! machinery. `cancel`/`checkpoint`/`acknowledge_cancel` compose those two
//! primitives into the protocol described in SPEC_FULL.md §4.5.

use crate::error::{KernelError, Result};
use crate::task::Task;
use crate::transition::TaskState;
use crate::types::cancel::{CancelPhase, CancelReason, CancelWitness};
use crate::types::{CancelKind, RegionId, TaskId, Time};
use crate::util::DetHashMap;

/// The result of a [`CancellationEngine::checkpoint`] call.
#[derive(Debug, Clone)]
pub struct CheckpointResult {
    /// True if the task should observe itself as cancelled right now.
    pub cancelled: bool,
    /// True the first time this checkpoint call observed the witness
    /// (the caller should run `acknowledge_cancel` in response).
    pub first_observation: bool,
    /// The current reason, if cancelled.
    pub reason: Option<CancelReason>,
}

/// Owns the live `task_id -> CancelWitness` map for a runtime instance.
#[derive(Default)]
pub struct CancellationEngine {
    witnesses: DetHashMap<TaskId, CancelWitness>,
}

impl CancellationEngine {
    /// Creates an engine with no witnesses installed.
    #[must_use]
    pub fn new() -> Self {
        Self { witnesses: DetHashMap::default() }
    }

    /// Looks up the current witness for a task, if any.
    #[must_use]
    pub fn witness(&self, task_id: TaskId) -> Option<&CancelWitness> {
        self.witnesses.get(&task_id)
    }

    /// Requests (or strengthens) cancellation of `task_id` with `reason`.
    ///
    /// A task that has already reached `Completed` ignores the request
    /// (`Ok(false)`, no witness installed): cancelling a finished task is
    /// a no-op, not an error. Otherwise, the first call installs a fresh
    /// witness at phase `Requested` and moves the task out of `Created`/
    /// `Running` into `CancelRequested`; subsequent calls strengthen the
    /// existing witness's reason in place, holding its phase fixed (phase
    /// only ever advances through [`Self::acknowledge_cancel`] and
    /// [`Self::advance_phase`]).
    pub fn cancel(&mut self, task: &mut Task, task_id: TaskId, reason: CancelReason) -> Result<bool> {
        if task.is_terminal() {
            return Ok(false);
        }
        if let Some(existing) = self.witnesses.get(&task_id) {
            let phase = existing.phase;
            let epoch = existing.epoch;
            let region_id = existing.region_id;
            let witness = self.witnesses.get_mut(&task_id).expect("just checked present");
            // A weaker reason racing in after a stronger one already landed
            // is a normal, expected outcome (not a caller error): decline
            // it and keep the existing reason, rather than surfacing
            // `WitnessReasonWeakened`.
            match witness.strengthen(task_id, region_id, epoch, phase, reason) {
                Ok(transitioned) => return Ok(transitioned),
                Err(crate::types::cancel::CancelWitnessError::ReasonWeakened) => return Ok(false),
                Err(other) => return Err(other.into()),
            }
        }
        task.bump_cancel_epoch_once();
        let epoch = task.cancel_epoch();
        let witness = CancelWitness::install(task_id, task.region(), epoch, reason);
        self.witnesses.insert(task_id, witness);
        if matches!(task.state(), TaskState::Created | TaskState::Running) {
            task.transition(TaskState::CancelRequested)?;
        }
        Ok(true)
    }

    /// The sole synchronous boundary where cancellation is delivered to
    /// task code. Marks the witness observed on first call; the task is
    /// responsible for calling [`Self::acknowledge_cancel`] when
    /// `first_observation` is set.
    pub fn checkpoint(&mut self, task_state: TaskState, task_id: TaskId) -> CheckpointResult {
        if !matches!(task_state, TaskState::CancelRequested | TaskState::Cancelling) {
            return CheckpointResult { cancelled: false, first_observation: false, reason: None };
        }
        let Some(witness) = self.witnesses.get_mut(&task_id) else {
            return CheckpointResult { cancelled: false, first_observation: false, reason: None };
        };
        let first_observation = !witness.observed;
        witness.observed = true;
        CheckpointResult { cancelled: true, first_observation, reason: Some(witness.reason.clone()) }
    }

    /// Acknowledges cancellation: `CancelRequested -> Cancelling`,
    /// advances the witness phase to match, and installs a cleanup
    /// budget that is the meet of the task's current budget and the
    /// reason kind's fixed cleanup budget.
    pub fn acknowledge_cancel(&mut self, task: &mut Task, task_id: TaskId) -> Result<()> {
        let witness = self.witnesses.get(&task_id).ok_or(KernelError::NotFound)?;
        let (region_id, epoch, reason) = (witness.region_id, witness.epoch, witness.reason.clone());
        task.transition(TaskState::Cancelling)?;
        let merged = task.cleanup_budget().meet(reason.kind.cleanup_budget());
        task.install_cleanup_budget(merged);
        let witness = self.witnesses.get_mut(&task_id).expect("checked above");
        witness.strengthen(task_id, region_id, epoch, CancelPhase::Cancelling, reason)?;
        Ok(())
    }

    /// Advances a witness's phase without changing its reason (used when
    /// the task itself transitions `Cancelling -> Finalizing ->
    /// Completed` and the witness should track along).
    pub fn advance_phase(&mut self, task_id: TaskId, phase: CancelPhase) -> Result<()> {
        let witness = self.witnesses.get(&task_id).ok_or(KernelError::NotFound)?;
        let (region_id, epoch, reason) = (witness.region_id, witness.epoch, witness.reason.clone());
        let witness = self.witnesses.get_mut(&task_id).expect("checked above");
        witness.strengthen(task_id, region_id, epoch, phase, reason)?;
        Ok(())
    }

    /// Removes a witness once its task has reached `Completed` (called by
    /// the lifecycle engine during region finalization sweep).
    pub fn forget(&mut self, task_id: TaskId) {
        self.witnesses.remove(&task_id);
    }

    /// Propagates `reason` depth-first to `children`, in insertion-sequence
    /// order, extending the attribution chain by one hop through
    /// `region_id`. Returns one result per child, in the same order.
    pub fn propagate_to_children(
        &mut self,
        reason: &CancelReason,
        region_id: RegionId,
        children: &mut [(TaskId, &mut Task)],
    ) -> Vec<Result<bool>> {
        children.sort_by_key(|(_, t)| t.insertion_seq());
        let extended = reason.extended(region_id);
        children.iter_mut().map(|(task_id, task)| self.cancel(task, *task_id, extended.clone())).collect()
    }

    /// Convenience: installs a `BudgetExhausted` cancel triggered by
    /// `consume_poll`/`consume_cost` failing.
    pub fn on_budget_exhausted(&mut self, task: &mut Task, task_id: TaskId, region_id: RegionId, now: Time) -> Result<bool> {
        self.cancel(task, task_id, CancelReason::new(CancelKind::BudgetExhausted, region_id, None, now))
    }

    /// Convenience: installs a `Deadline` cancel triggered by
    /// `Budget::deadline_elapsed`.
    pub fn on_deadline_elapsed(&mut self, task: &mut Task, task_id: TaskId, region_id: RegionId, now: Time) -> Result<bool> {
        self.cancel(task, task_id, CancelReason::new(CancelKind::Deadline, region_id, None, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RegionId;

    fn region() -> RegionId {
        RegionId::new_for_test(0, 0)
    }
    fn tid(n: u16) -> TaskId {
        TaskId::new_for_test(n, 0)
    }

    #[test]
    fn first_cancel_moves_created_to_cancel_requested() {
        let mut engine = CancellationEngine::new();
        let mut task = Task::spawn(region(), 0, None, 0);
        let reason = CancelReason::new(CancelKind::User, region(), None, Time::ZERO);
        assert!(engine.cancel(&mut task, tid(1), reason).unwrap());
        assert_eq!(task.state(), TaskState::CancelRequested);
    }

    #[test]
    fn cancelling_a_completed_task_is_a_noop() {
        let mut engine = CancellationEngine::new();
        let mut task = Task::spawn(region(), 0, None, 0);
        task.transition(TaskState::Running).unwrap();
        task.transition(TaskState::Completed).unwrap();
        let reason = CancelReason::new(CancelKind::User, region(), None, Time::ZERO);
        assert_eq!(engine.cancel(&mut task, tid(2), reason), Ok(false));
        assert!(engine.witness(tid(2)).is_none());
    }

    #[test]
    fn checkpoint_reports_cancelled_and_marks_observed_once() {
        let mut engine = CancellationEngine::new();
        let mut task = Task::spawn(region(), 0, None, 0);
        let reason = CancelReason::new(CancelKind::User, region(), None, Time::ZERO);
        engine.cancel(&mut task, tid(3), reason).unwrap();

        let first = engine.checkpoint(task.state(), tid(3));
        assert!(first.cancelled);
        assert!(first.first_observation);

        let second = engine.checkpoint(task.state(), tid(3));
        assert!(second.cancelled);
        assert!(!second.first_observation);
    }

    #[test]
    fn acknowledge_cancel_installs_cleanup_budget_and_advances_phase() {
        let mut engine = CancellationEngine::new();
        let mut task = Task::spawn(region(), 0, None, 0);
        let reason = CancelReason::new(CancelKind::Shutdown, region(), None, Time::ZERO);
        engine.cancel(&mut task, tid(4), reason).unwrap();
        engine.acknowledge_cancel(&mut task, tid(4)).unwrap();
        assert_eq!(task.state(), TaskState::Cancelling);
        assert_eq!(task.cleanup_budget().poll_quota, 0);
        assert_eq!(engine.witness(tid(4)).unwrap().phase, CancelPhase::Cancelling);
    }

    #[test]
    fn strengthening_raises_severity_without_regressing_phase() {
        let mut engine = CancellationEngine::new();
        let mut task = Task::spawn(region(), 0, None, 0);
        engine.cancel(&mut task, tid(5), CancelReason::new(CancelKind::User, region(), None, Time::ZERO)).unwrap();
        engine
            .cancel(&mut task, tid(5), CancelReason::new(CancelKind::Shutdown, region(), None, Time::from_millis(1)))
            .unwrap();
        assert_eq!(engine.witness(tid(5)).unwrap().reason.kind, CancelKind::Shutdown);
        assert_eq!(engine.witness(tid(5)).unwrap().phase, CancelPhase::Requested);
    }

    #[test]
    fn propagation_extends_chain_in_insertion_order() {
        let mut engine = CancellationEngine::new();
        let mut t1 = Task::spawn(region(), 5, None, 0);
        let mut t2 = Task::spawn(region(), 2, None, 0);
        let reason = CancelReason::new(CancelKind::ParentCancelled, region(), None, Time::ZERO);
        let mut children: Vec<(TaskId, &mut Task)> = vec![(tid(10), &mut t1), (tid(11), &mut t2)];
        let results = engine.propagate_to_children(&reason, region(), &mut children);
        assert!(results.iter().all(|r| *r.as_ref().unwrap()));
        // After sorting by insertion_seq, t2 (seq 2) should have been
        // processed before t1 (seq 5): both now carry a one-hop chain.
        assert_eq!(engine.witness(tid(10)).unwrap().reason.chain.len(), 1);
        assert_eq!(engine.witness(tid(11)).unwrap().reason.chain.len(), 1);
    }
}
