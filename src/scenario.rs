//! Scenario DSL interpreter (§6): parses the canonical JSON scenario
//! envelope and executes its `ops[]` against a [`Runtime`], recording a
//! [`Journal`] as it goes and checking `expected{}` at the end.
//!
//! Grounded on the teacher's `lab` module family -- a deterministic
//! scenario runner driving a runtime from a declarative, seeded spec --
//! and on `lab::oracle::quiescence`'s event-driven bookkeeping style
//! (small `on_*`-style updates to a live-entity table, then a final
//! check), scoped down to the in-core DSL interpreter only; the
//! teacher's full CLI binary and chaos/fuzzing harness are out of scope
//! here.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::channel::{Channel, Permit, ReserveOutcome};
use crate::error::{KernelError, Result};
use crate::journal::{EventKind, Journal};
use crate::runtime::Runtime;
use crate::types::cancel::CancelReason;
use crate::types::{CancelKind, ObligationId, RegionId, TaskId, Time, TimerId};

/// Canonical JSON scenario envelope (§6).
#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioEnvelope {
    /// Identifies the scenario for reporting.
    pub scenario_id: String,
    /// Envelope schema version.
    pub version: u32,
    /// Seed threaded through every deterministic host hook driving this
    /// run.
    pub seed: u64,
    /// Named safety/platform profile, informational at this layer (the
    /// caller is expected to have built the [`Runtime`] under it already).
    #[serde(default)]
    pub profile: Option<String>,
    /// Which journal codec the caller intends to compare against.
    #[serde(default)]
    pub codec: Option<String>,
    /// Op ids that must not execute (sorted; see [`ScenarioRunner::run`]).
    #[serde(default)]
    pub forbidden_ids: Vec<String>,
    /// The op sequence, in authoritative order.
    pub ops: Vec<OpRecord>,
    /// Expected outcome to check after the last op runs.
    #[serde(default)]
    pub expected: ExpectedOutcome,
}

/// One entry of `ops[]`: an id, the op itself, and an optional
/// per-op expectation.
#[derive(Debug, Clone, Deserialize)]
pub struct OpRecord {
    /// Scenario-local id; later ops reference entities this op produced
    /// by this string.
    pub id: String,
    /// The operation and its arguments.
    #[serde(flatten)]
    pub op: ScenarioOp,
    /// An optional expectation checked immediately after this op runs.
    #[serde(default)]
    pub expect: Option<Value>,
}

/// The scenario ops grammar (§6).
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", content = "args")]
pub enum ScenarioOp {
    /// Opens the root region, or a subregion of `parent` if given.
    SpawnRegion {
        /// Id of a prior `SpawnRegion` op, or `None` for the root.
        parent: Option<String>,
    },
    /// Begins closing a region (does not itself finalize it).
    CloseRegion {
        /// Id of a prior `SpawnRegion` op.
        region: String,
    },
    /// Spawns a task owned by `region`.
    SpawnTask {
        /// Id of a prior `SpawnRegion` op.
        region: String,
        /// Optional absolute deadline, in nanoseconds.
        #[serde(default)]
        deadline_ns: Option<u64>,
        /// Dispatch priority.
        #[serde(default)]
        priority: u8,
    },
    /// Delivers the cancellation checkpoint for `task`.
    PollTask {
        /// Id of a prior `SpawnTask` op.
        task: String,
    },
    /// Requests cancellation of `task`, attributed to `region`.
    RequestCancel {
        /// Id of a prior `SpawnTask` op.
        task: String,
        /// Id of a prior `SpawnRegion` op, used as the reason's origin.
        region: String,
        /// Which kind of cancellation this is.
        kind: CancelKind,
    },
    /// Acknowledges a pending cancellation for `task`.
    AckCancel {
        /// Id of a prior `SpawnTask` op.
        task: String,
    },
    /// Reserves a new obligation owned by `region`.
    ReserveObligation {
        /// Id of a prior `SpawnRegion` op.
        region: String,
    },
    /// Commits a reserved obligation.
    CommitObligation {
        /// Id of a prior `ReserveObligation` op.
        obligation: String,
    },
    /// Aborts a reserved obligation.
    AbortObligation {
        /// Id of a prior `ReserveObligation` op.
        obligation: String,
    },
    /// Reserves a send slot on `channel`, creating it (with `capacity`,
    /// default 1) on first reference.
    ChannelReserve {
        /// Scenario-local channel name.
        channel: String,
        /// Channel capacity, used only the first time `channel` is named.
        #[serde(default)]
        capacity: Option<usize>,
    },
    /// Commits the reservation made by `permit` with `value`.
    ChannelSend {
        /// Scenario-local channel name.
        channel: String,
        /// Id of the `ChannelReserve` op that produced the permit.
        permit: String,
        /// The value to enqueue.
        value: Value,
    },
    /// Aborts the reservation made by `permit`.
    ChannelAbort {
        /// Scenario-local channel name.
        channel: String,
        /// Id of the `ChannelReserve` op that produced the permit.
        permit: String,
    },
    /// Registers a timer that re-injects `task` into the ready lane once
    /// due.
    TimerRegister {
        /// Id of a prior `SpawnTask` op.
        task: String,
        /// Absolute deadline, in nanoseconds.
        deadline_ns: u64,
    },
    /// Cancels a previously registered timer.
    TimerCancel {
        /// Id of a prior `TimerRegister` op.
        timer: String,
    },
    /// Advances the scenario's logical clock to `to_ns`.
    AdvanceTime {
        /// Absolute target time, in nanoseconds.
        to_ns: u64,
    },
    /// Checks a named condition against runtime state.
    Assert {
        /// One of `"quiescent"`, `"region_closed:<id>"`,
        /// `"task_completed:<id>"`, `"obligation_resolved:<id>"`.
        condition: String,
    },
}

/// What a scenario run is expected to produce; checked by
/// [`ScenarioRunner::run`] after the last op.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExpectedOutcome {
    /// Expected canonical digest of the recorded journal.
    #[serde(default)]
    pub digest: Option<u64>,
    /// Expected final quiescence state.
    #[serde(default)]
    pub quiescent: Option<bool>,
}

#[derive(Debug, Clone, Copy)]
enum Binding {
    Region(RegionId),
    Task(TaskId),
    Obligation(ObligationId),
    Timer(TimerId),
    Permit(Permit),
}

/// A scenario run's report: the journal recorded, and whether `expected`
/// matched.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Final digest of the recorded journal.
    pub digest: u64,
    /// Whether `quiescence_check` succeeded with no open channels left.
    pub quiescent: bool,
    /// `true` if every field named in `expected` matched the observed
    /// outcome.
    pub matched_expected: bool,
}

/// Interprets a [`ScenarioEnvelope`] against a [`Runtime`], maintaining
/// the scenario-local id -> handle bindings and a parallel event
/// [`Journal`].
///
/// The runtime's own methods do not emit journal events internally (§C11
/// stays decoupled from §C12); this runner emits one event per op,
/// since it is the one party that knows exactly which transition the op
/// just caused.
pub struct ScenarioRunner<'a> {
    runtime: &'a mut Runtime,
    journal: Journal,
    now: Time,
    bindings: BTreeMap<String, Binding>,
    channels: BTreeMap<String, Channel<Value>>,
}

impl<'a> ScenarioRunner<'a> {
    /// Creates a runner over an already-constructed, already-configured
    /// runtime.
    #[must_use]
    pub fn new(runtime: &'a mut Runtime, journal_capacity: usize) -> Self {
        Self {
            runtime,
            journal: Journal::with_capacity(journal_capacity),
            now: Time::ZERO,
            bindings: BTreeMap::new(),
            channels: BTreeMap::new(),
        }
    }

    /// The journal recorded so far.
    #[must_use]
    pub fn journal(&self) -> &Journal {
        &self.journal
    }

    /// The runtime this scenario is driving.
    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        self.runtime
    }

    /// Looks up a region bound by a prior `SpawnRegion` op's id.
    pub fn region(&self, id: &str) -> Result<RegionId> {
        match self.bindings.get(id) {
            Some(Binding::Region(r)) => Ok(*r),
            _ => Err(KernelError::InvalidArgument),
        }
    }

    /// Looks up a task bound by a prior `SpawnTask` op's id.
    pub fn task(&self, id: &str) -> Result<TaskId> {
        match self.bindings.get(id) {
            Some(Binding::Task(t)) => Ok(*t),
            _ => Err(KernelError::InvalidArgument),
        }
    }

    /// Looks up an obligation bound by a prior `ReserveObligation` op's id.
    pub fn obligation(&self, id: &str) -> Result<ObligationId> {
        match self.bindings.get(id) {
            Some(Binding::Obligation(o)) => Ok(*o),
            _ => Err(KernelError::InvalidArgument),
        }
    }

    fn timer(&self, id: &str) -> Result<TimerId> {
        match self.bindings.get(id) {
            Some(Binding::Timer(t)) => Ok(*t),
            _ => Err(KernelError::InvalidArgument),
        }
    }

    fn permit(&mut self, id: &str) -> Result<Permit> {
        match self.bindings.remove(id) {
            Some(Binding::Permit(p)) => Ok(p),
            _ => Err(KernelError::InvalidArgument),
        }
    }

    fn channel_mut(&mut self, name: &str, capacity: Option<usize>) -> &mut Channel<Value> {
        self.channels.entry(name.to_string()).or_insert_with(|| Channel::new(capacity.unwrap_or(1)))
    }

    /// Runs every op in order, skipping any whose id appears in
    /// `forbidden_ids`, then checks `expected` against the final state.
    ///
    /// `forbidden_ids` is interpreted as the set of op ids this scenario
    /// asserts never execute (e.g. a trimmed-down variant of a larger
    /// scenario) -- the DSL has no conditional ops, so "forbidden" can
    /// only mean "skip", not "must fail if reached".
    pub fn run(&mut self, envelope: &ScenarioEnvelope) -> Result<ScenarioReport> {
        let forbidden: std::collections::BTreeSet<&str> = envelope.forbidden_ids.iter().map(String::as_str).collect();
        for op in &envelope.ops {
            if forbidden.contains(op.id.as_str()) {
                continue;
            }
            self.execute(op)?;
        }

        let quiescent = self.runtime.quiescence_check(&self.channel_refs()).is_ok();
        let digest = self.journal.digest()?;
        let matched_expected = envelope.expected.digest.is_none_or(|d| d == digest)
            && envelope.expected.quiescent.is_none_or(|q| q == quiescent);
        Ok(ScenarioReport { digest, quiescent, matched_expected })
    }

    fn channel_refs(&self) -> Vec<&dyn crate::runtime::ChannelQuiescence> {
        self.channels.values().map(|c| c as &dyn crate::runtime::ChannelQuiescence).collect()
    }

    fn execute(&mut self, op: &OpRecord) -> Result<()> {
        match &op.op {
            ScenarioOp::SpawnRegion { parent } => {
                let region = match parent {
                    Some(parent_id) => {
                        let parent = self.region(parent_id)?;
                        self.runtime.open_subregion(parent)?
                    }
                    None => self.runtime.open_root_region()?,
                };
                self.bindings.insert(op.id.clone(), Binding::Region(region));
            }
            ScenarioOp::CloseRegion { region } => {
                let region_id = self.region(region)?;
                let from = self.runtime.region(region_id)?.state();

                let obligations_before: Vec<_> = self
                    .runtime
                    .region_obligation_ids(region_id)
                    .iter()
                    .map(|id| (*id, self.runtime.obligation(*id).map(crate::obligation::Obligation::state)))
                    .collect();

                self.runtime.begin_close(region_id)?;
                // best-effort: the DSL has no separate "finalize" op, so a
                // `CloseRegion` drains as far as the region's current state
                // allows (a no-op if live children remain).
                let _ = self.runtime.finalize_region(region_id);

                for (obligation_id, before) in obligations_before {
                    if let Ok(obligation) = self.runtime.obligation(obligation_id) {
                        let after = obligation.state();
                        if before != Ok(after) && after == crate::transition::ObligationState::Leaked {
                            self.journal.record(EventKind::ObligationResolved { obligation: obligation_id, to: after })?;
                        }
                    }
                }

                let to = self.runtime.region(region_id)?.state();
                self.journal.record(EventKind::RegionTransition { region: region_id, from, to })?;
            }
            ScenarioOp::SpawnTask { region, deadline_ns, priority } => {
                let region_id = self.region(region)?;
                let deadline = deadline_ns.map(Time::from_nanos);
                let task = self.runtime.spawn_task(region_id, deadline, *priority)?;
                self.bindings.insert(op.id.clone(), Binding::Task(task));
            }
            ScenarioOp::PollTask { task } => {
                let task_id = self.task(task)?;
                self.runtime.checkpoint(task_id)?;
            }
            ScenarioOp::RequestCancel { task, region, kind } => {
                let task_id = self.task(task)?;
                let region_id = self.region(region)?;
                let reason = CancelReason::new(*kind, region_id, Some(task_id), self.now);
                let transitioned = self.runtime.request_cancel(task_id, reason)?;
                let current_kind =
                    self.runtime.cancellation().witness(task_id).map_or(*kind, |w| w.reason.kind);
                self.journal.record(EventKind::CancelStrengthened {
                    task: task_id,
                    kind: current_kind,
                    declined: !transitioned && current_kind != *kind,
                })?;
            }
            ScenarioOp::AckCancel { task } => {
                let task_id = self.task(task)?;
                self.runtime.acknowledge_cancel(task_id)?;
            }
            ScenarioOp::ReserveObligation { region } => {
                let region_id = self.region(region)?;
                let obligation = self.runtime.reserve_obligation(region_id)?;
                self.bindings.insert(op.id.clone(), Binding::Obligation(obligation));
            }
            ScenarioOp::CommitObligation { obligation } => {
                let obligation_id = self.obligation(obligation)?;
                self.runtime.commit_obligation(obligation_id)?;
                self.journal.record(EventKind::ObligationResolved {
                    obligation: obligation_id,
                    to: crate::transition::ObligationState::Committed,
                })?;
            }
            ScenarioOp::AbortObligation { obligation } => {
                let obligation_id = self.obligation(obligation)?;
                self.runtime.abort_obligation(obligation_id)?;
                self.journal.record(EventKind::ObligationResolved {
                    obligation: obligation_id,
                    to: crate::transition::ObligationState::Aborted,
                })?;
            }
            ScenarioOp::ChannelReserve { channel, capacity } => {
                let waiter = self.channel_mut(channel, *capacity).next_waiter();
                let outcome = self.channel_mut(channel, *capacity).reserve(waiter, false);
                match outcome {
                    ReserveOutcome::Ready(permit) => {
                        self.bindings.insert(op.id.clone(), Binding::Permit(permit));
                    }
                    ReserveOutcome::Pending => return Err(KernelError::Pending),
                    ReserveOutcome::Cancelled => return Err(KernelError::Cancelled),
                    ReserveOutcome::Disconnected => return Err(KernelError::Disconnected),
                    ReserveOutcome::Full => return Err(KernelError::Full),
                }
            }
            ScenarioOp::ChannelSend { channel, permit, value } => {
                let permit = self.permit(permit)?;
                let chan = self.channel_mut(channel, None);
                chan.send(permit, value.clone()).map_err(|(_, _)| KernelError::Disconnected)?;
            }
            ScenarioOp::ChannelAbort { channel, permit } => {
                let permit = self.permit(permit)?;
                self.channel_mut(channel, None).abort(permit);
            }
            ScenarioOp::TimerRegister { task, deadline_ns } => {
                let task_id = self.task(task)?;
                let priority = self.runtime.task(task_id)?.priority();
                let deadline = Time::from_nanos(*deadline_ns);
                let wakeup = crate::scheduler::TimerWakeup { task: task_id, priority, lane: crate::scheduler::WakeupLane::Ready };
                let timer = self.runtime.register_timer(self.now, deadline, wakeup)?;
                self.bindings.insert(op.id.clone(), Binding::Timer(timer));
            }
            ScenarioOp::TimerCancel { timer } => {
                let timer_id = self.timer(timer)?;
                self.runtime.cancel_timer(timer_id);
            }
            ScenarioOp::AdvanceTime { to_ns } => {
                self.now = Time::from_nanos(*to_ns);
                self.runtime.tick(self.now);
            }
            ScenarioOp::Assert { condition } => {
                self.check_assertion(condition)?;
            }
        }
        Ok(())
    }

    fn check_assertion(&self, condition: &str) -> Result<()> {
        if condition == "quiescent" {
            return self.runtime.quiescence_check(&self.channel_refs()).map_err(|_| KernelError::InvalidState);
        }
        if let Some(id) = condition.strip_prefix("region_closed:") {
            let region_id = self.region(id)?;
            return if self.runtime.region(region_id)?.state() == crate::transition::RegionState::Closed {
                Ok(())
            } else {
                Err(KernelError::InvalidState)
            };
        }
        if let Some(id) = condition.strip_prefix("task_completed:") {
            let task_id = self.task(id)?;
            return if self.runtime.task(task_id)?.is_terminal() { Ok(()) } else { Err(KernelError::InvalidState) };
        }
        if let Some(id) = condition.strip_prefix("obligation_resolved:") {
            let obligation_id = self.obligation(id)?;
            return if self.runtime.obligation(obligation_id)?.is_resolved() { Ok(()) } else { Err(KernelError::InvalidState) };
        }
        Err(KernelError::InvalidArgument)
    }
}
