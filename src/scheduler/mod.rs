//! Three-lane deterministic scheduler (C10): Cancel, Timed, Ready, each
//! with its own entry ordering, composed into a governor-steerable
//! dispatch loop with cancel-streak fairness and spin/yield/park
//! backoff.
//!
//! Grounded on the teacher's `runtime::scheduler` module: `global_queue`
//! (FIFO injection queue, rebuilt over `VecDeque` instead of
//! `crossbeam_queue::SegQueue` since this scheduler has one cooperative
//! owner, not concurrent OS-thread workers) and `stealing` (RNG-seeded
//! circular scan, kept nearly verbatim). The teacher's
//! `franken_decision`-based Bayesian governor (`decision_contract.rs`)
//! is not carried over: `franken_decision`/`franken_kernel` are
//! fabricated internal crates outside this crate's dependency stack,
//! and the governor this kernel needs is the plain four-variant
//! suggestion table the specification describes, not a loss-matrix
//! posterior.

pub mod global_queue;
pub mod stealing;

use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::collections::VecDeque;

use crate::types::{TaskId, Time};
use crate::util::DetRng;
use global_queue::GlobalQueue;

const BASE_CANCEL_STREAK_LIMIT: u32 = 16;
const SPIN_ATTEMPTS: u32 = 8;
const YIELD_ATTEMPTS: u32 = 2;

/// Governor posture, steering lane order and cancel-streak tolerance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GovernorSuggestion {
    /// `Cancel > Timed > Ready`, base cancel-streak limit.
    #[default]
    NoPreference,
    /// `Timed > Cancel > Ready`, base cancel-streak limit.
    MeetDeadlines,
    /// `Cancel > Timed > Ready`, doubled cancel-streak limit.
    DrainObligations,
    /// `Cancel > Timed > Ready`, doubled cancel-streak limit.
    DrainRegions,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lane {
    Cancel,
    Timed,
    Ready,
}

impl GovernorSuggestion {
    fn lane_order(self) -> [Lane; 3] {
        match self {
            Self::MeetDeadlines => [Lane::Timed, Lane::Cancel, Lane::Ready],
            Self::NoPreference | Self::DrainObligations | Self::DrainRegions => [Lane::Cancel, Lane::Timed, Lane::Ready],
        }
    }

    fn cancel_streak_limit(self) -> u32 {
        match self {
            Self::DrainObligations | Self::DrainRegions => BASE_CANCEL_STREAK_LIMIT * 2,
            Self::NoPreference | Self::MeetDeadlines => BASE_CANCEL_STREAK_LIMIT,
        }
    }
}

/// Which lane a fired timer's task should be re-injected into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeupLane {
    /// The task becomes ready to run again.
    Ready,
    /// The task's deadline elapsed; it should be driven through cancel.
    Cancel,
}

/// A task ready to re-enter the scheduler after its timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimerWakeup {
    /// The task to re-inject.
    pub task: TaskId,
    /// Dispatch priority to inject it with.
    pub priority: u8,
    /// Which lane it re-enters.
    pub lane: WakeupLane,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PriorityEntry {
    priority: u8,
    insertion_seq: u64,
    task: TaskId,
}

impl PartialOrd for PriorityEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for PriorityEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Descending priority, ascending insertion_seq (FIFO) on ties.
        (self.priority, Reverse(self.insertion_seq)).cmp(&(other.priority, Reverse(other.insertion_seq)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct TimedEntry {
    deadline: Time,
    insertion_seq: u64,
    task: TaskId,
}

impl PartialOrd for TimedEntry {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}
impl Ord for TimedEntry {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Min-heap by (deadline, insertion_seq): earliest deadline, then FIFO.
        Reverse((self.deadline, self.insertion_seq)).cmp(&Reverse((other.deadline, other.insertion_seq)))
    }
}

/// What the scheduler's spin/yield/park backoff phase currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackoffPhase {
    /// A cheap busy-spin attempt; caller should retry immediately.
    Spin,
    /// An OS-yield attempt; caller should yield its thread then retry.
    Yield,
    /// Nothing runnable; caller should park until `timeout` (or
    /// indefinitely if `None`) or until woken by new work.
    Park {
        /// `min(next timer deadline, next timed-entry deadline)`. The
        /// timed-entry half comes from this worker's own `timed_lane`;
        /// the timer half must be supplied by the caller (the C9 timer
        /// wheel lives on `Runtime`, not on `Scheduler`) via
        /// [`Scheduler::dispatch_once`]'s `next_timer_deadline` argument.
        timeout: Option<Time>,
    },
}

/// The result of one [`Scheduler::dispatch_once`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A task was dispatched from the named lane.
    Dispatched(TaskId),
    /// Nothing was runnable this cycle.
    Idle(BackoffPhase),
}

/// Dispatch counters proving fair, deterministic scheduling over a run.
/// Its witness hash becomes part of the canonical event digest (C12).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FairnessPreemptionCertificate {
    /// Tasks dispatched from the cancel lane under normal fairness rules.
    pub cancel_dispatches: u64,
    /// Tasks dispatched from the timed lane.
    pub timed_dispatches: u64,
    /// Tasks dispatched from a ready path (fast path or RNG-hint).
    pub ready_dispatches: u64,
    /// Cancel dispatches that only happened via the streak-exceeded
    /// fallback (phase 7) because every other lane was empty.
    pub cancel_fallback_dispatches: u64,
    /// Number of times the cancel-streak limit was hit.
    pub cancel_streak_exceedances: u64,
    /// Work-stealing attempts made by this worker.
    pub steal_attempts: u64,
    /// Work-stealing attempts that returned a task.
    pub steal_successes: u64,
    /// Number of times the backoff reached the park phase.
    pub park_count: u64,
}

/// One scheduler worker: three dispatch lanes, an RNG tie-break stream,
/// and spin/yield/park backoff state.
pub struct Scheduler {
    worker_id: u32,
    rng: DetRng,
    governor: GovernorSuggestion,
    next_insertion_seq: u64,
    cancel_lane: BinaryHeap<PriorityEntry>,
    timed_lane: BinaryHeap<TimedEntry>,
    ready_global: GlobalQueue,
    /// LIFO for the owner (`push_ready_local`/dispatch), FIFO for thieves
    /// (`steal_from`) — a single `VecDeque` gives both for free.
    ready_local: VecDeque<TaskId>,
    ready_priority: Vec<PriorityEntry>,
    cancel_streak: u32,
    spin_count: u32,
    yield_count: u32,
    certificate: FairnessPreemptionCertificate,
}

impl Scheduler {
    /// Creates a scheduler worker, seeding its RNG from `worker_id`.
    #[must_use]
    pub fn new(worker_id: u32) -> Self {
        Self {
            worker_id,
            rng: DetRng::seed(worker_id),
            governor: GovernorSuggestion::default(),
            next_insertion_seq: 0,
            cancel_lane: BinaryHeap::new(),
            timed_lane: BinaryHeap::new(),
            ready_global: GlobalQueue::new(),
            ready_local: VecDeque::new(),
            ready_priority: Vec::new(),
            cancel_streak: 0,
            spin_count: 0,
            yield_count: 0,
            certificate: FairnessPreemptionCertificate::default(),
        }
    }

    /// This worker's id.
    #[must_use]
    pub fn worker_id(&self) -> u32 {
        self.worker_id
    }

    /// Installs a governor suggestion, taking effect on the next dispatch.
    pub fn set_governor(&mut self, governor: GovernorSuggestion) {
        self.governor = governor;
    }

    /// The running fairness certificate.
    #[must_use]
    pub fn certificate(&self) -> &FairnessPreemptionCertificate {
        &self.certificate
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_insertion_seq;
        self.next_insertion_seq += 1;
        seq
    }

    /// Injects a cancellation dispatch request.
    pub fn inject_cancel(&mut self, task: TaskId, priority: u8) {
        let insertion_seq = self.next_seq();
        self.cancel_lane.push(PriorityEntry { priority, insertion_seq, task });
    }

    /// Injects a deadline-ordered dispatch request.
    pub fn inject_timed(&mut self, task: TaskId, deadline: Time) {
        let insertion_seq = self.next_seq();
        self.timed_lane.push(TimedEntry { deadline, insertion_seq, task });
    }

    /// Injects a ready task via the global (cross-worker) FIFO path.
    pub fn inject_ready_global(&mut self, task: TaskId) {
        self.ready_global.push(task);
    }

    /// Pushes a ready task onto this worker's own local stack (LIFO for
    /// the owner — e.g. right after spawning a child task).
    pub fn push_ready_local(&mut self, task: TaskId) {
        self.ready_local.push_back(task);
    }

    /// Injects a ready task into the priority-grouped local set used by
    /// phase 5's RNG-hint selection among top-priority ties.
    pub fn inject_ready_priority(&mut self, task: TaskId, priority: u8) {
        let insertion_seq = self.next_seq();
        self.ready_priority.push(PriorityEntry { priority, insertion_seq, task });
    }

    /// Re-injects tasks whose timers fired, routing each to the lane its
    /// wakeup names (loop phase 1).
    pub fn admit_timer_wakeups(&mut self, wakeups: impl IntoIterator<Item = TimerWakeup>) {
        for wakeup in wakeups {
            match wakeup.lane {
                WakeupLane::Ready => self.inject_ready_priority(wakeup.task, wakeup.priority),
                WakeupLane::Cancel => self.inject_cancel(wakeup.task, wakeup.priority),
            }
        }
    }

    /// Pops a task for a thief worker to steal (FIFO, oldest first, to
    /// minimize contention with the owner working from the opposite end).
    pub fn steal_from(&mut self) -> Option<TaskId> {
        self.ready_local.pop_front()
    }

    fn take_top_priority_ready(&mut self) -> Option<TaskId> {
        if self.ready_priority.is_empty() {
            return None;
        }
        let top = self.ready_priority.iter().map(|e| e.priority).max()?;
        let candidate_indices: Vec<usize> =
            self.ready_priority.iter().enumerate().filter(|(_, e)| e.priority == top).map(|(i, _)| i).collect();
        let pick = candidate_indices[self.rng.next_below(candidate_indices.len())];
        Some(self.ready_priority.swap_remove(pick).task)
    }

    fn reset_backoff(&mut self) {
        self.spin_count = 0;
        self.yield_count = 0;
    }

    /// Runs one dispatch cycle: governor-ordered lanes (phases 2-3), fast
    /// ready paths (phase 4), RNG-hint priority ready (phase 5), fallback
    /// cancel (phase 7), then spin/yield/park backoff (phase 8). Work
    /// stealing (phase 6) is driven externally via [`stealing::steal_task`]
    /// since it needs every worker, not just this one.
    ///
    /// `next_timer_deadline` is the owning runtime's C9 timer wheel's
    /// next deadline (if any); when the cycle bottoms out at
    /// [`BackoffPhase::Park`] it is folded in via `min` against this
    /// worker's own timed-lane peek, so a live timer with nothing yet in
    /// the timed lane still produces a bounded park timeout instead of
    /// `None`. Callers with no timer wheel of their own (tests, benches)
    /// pass `None`.
    pub fn dispatch_once(&mut self, now: Time, next_timer_deadline: Option<Time>) -> DispatchOutcome {
        let limit = self.governor.cancel_streak_limit();
        let mut skip_cancel_for_fairness = false;
        if self.cancel_streak >= limit {
            skip_cancel_for_fairness = true;
            self.certificate.cancel_streak_exceedances += 1;
        }

        for lane in self.governor.lane_order() {
            match lane {
                Lane::Cancel => {
                    if skip_cancel_for_fairness {
                        continue;
                    }
                    if let Some(entry) = self.cancel_lane.pop() {
                        self.cancel_streak += 1;
                        self.certificate.cancel_dispatches += 1;
                        self.reset_backoff();
                        return DispatchOutcome::Dispatched(entry.task);
                    }
                }
                Lane::Timed => {
                    let due = matches!(self.timed_lane.peek(), Some(entry) if entry.deadline <= now);
                    if due {
                        let entry = self.timed_lane.pop().expect("peeked Some above");
                        self.certificate.timed_dispatches += 1;
                        self.reset_backoff();
                        return DispatchOutcome::Dispatched(entry.task);
                    }
                }
                Lane::Ready => {
                    if let Some(task) = self.ready_global.pop() {
                        self.certificate.ready_dispatches += 1;
                        self.reset_backoff();
                        return DispatchOutcome::Dispatched(task);
                    }
                    if let Some(task) = self.ready_local.pop_back() {
                        self.certificate.ready_dispatches += 1;
                        self.reset_backoff();
                        return DispatchOutcome::Dispatched(task);
                    }
                    if let Some(task) = self.take_top_priority_ready() {
                        self.certificate.ready_dispatches += 1;
                        self.reset_backoff();
                        return DispatchOutcome::Dispatched(task);
                    }
                }
            }
        }

        if skip_cancel_for_fairness {
            if let Some(entry) = self.cancel_lane.pop() {
                self.certificate.cancel_fallback_dispatches += 1;
                self.cancel_streak = 0;
                self.reset_backoff();
                return DispatchOutcome::Dispatched(entry.task);
            }
        }

        DispatchOutcome::Idle(self.advance_backoff(next_timer_deadline))
    }

    fn advance_backoff(&mut self, next_timer_deadline: Option<Time>) -> BackoffPhase {
        if self.spin_count < SPIN_ATTEMPTS {
            self.spin_count += 1;
            return BackoffPhase::Spin;
        }
        if self.yield_count < YIELD_ATTEMPTS {
            self.yield_count += 1;
            return BackoffPhase::Yield;
        }
        let next_timed_entry = self.timed_lane.peek().map(|e| e.deadline);
        let timeout = match (next_timed_entry, next_timer_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, Some(b)) => Some(b),
            (None, None) => None,
        };
        self.spin_count = 0;
        self.yield_count = 0;
        self.cancel_streak = 0;
        self.certificate.park_count += 1;

        #[cfg(feature = "tracing-integration")]
        tracing::trace!(worker = self.worker_id, ?timeout, "scheduler parking");

        BackoffPhase::Park { timeout }
    }

    /// True if no lane holds any entry.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.cancel_lane.is_empty()
            && self.timed_lane.is_empty()
            && self.ready_global.is_empty()
            && self.ready_local.is_empty()
            && self.ready_priority.is_empty()
    }
}
