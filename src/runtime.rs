//! Runtime orchestration and quiescence (C11): the single owning instance
//! that composes the lifecycle engine (C6), cancellation protocol (C7),
//! scheduler (C10), and timer wheel (C9) into one API surface, plus the
//! shutdown sequence and the five-condition quiescence check of
//! SPEC_FULL.md §4.9.
//!
//! All kernel state lives in the per-kind arenas owned here; external
//! callers hold only opaque handles (§5). There is no global mutable
//! state beyond one `Runtime` instance per process.

use crate::cancel::CancellationEngine;
use crate::config::Config;
use crate::error::{KernelError, Result};
use crate::hooks::HostHooks;
use crate::obligation::Obligation;
use crate::region::Region;
use crate::scheduler::{DispatchOutcome, Scheduler, TimerWakeup};
use crate::task::Task;
use crate::timer::TimerWheel;
use crate::transition::RegionState;
use crate::types::cancel::CancelReason;
use crate::types::{ObligationId, RegionId, TaskId, Time};
use crate::util::{Arena, DetHashMap};

/// Implemented by channel types so [`Runtime::quiescence_check`] can ask
/// "is this channel drained" without the runtime owning or type-erasing
/// arbitrary payload types. [`crate::channel::Channel`] implements this
/// for every `T`; callers pass the channels they're holding open as
/// `&dyn ChannelQuiescence` at check time.
pub trait ChannelQuiescence {
    /// True once the channel holds no undelivered message and no
    /// outstanding reservation.
    fn is_drained(&self) -> bool;
}

impl<T> ChannelQuiescence for crate::channel::Channel<T> {
    fn is_drained(&self) -> bool {
        self.used_slots() == 0
    }
}

/// The runtime instance: owns every region, task, and obligation, plus
/// the cancellation engine, scheduler, and timer wheel that act on them.
pub struct Runtime {
    regions: Arena<Region>,
    tasks: Arena<Task>,
    obligations: Arena<Obligation>,
    cancellation: CancellationEngine,
    scheduler: Scheduler,
    timers: TimerWheel<TimerWakeup>,
    config: Config,
    hooks: HostHooks,
    next_insertion_seq: u64,
    root: Option<RegionId>,
    /// Append-only per-region child logs. Entries are never removed;
    /// liveness is re-checked against the owning arena record at read
    /// time, the same lazy-deletion discipline the timer wheel (C9)
    /// uses for its buckets.
    region_tasks: DetHashMap<RegionId, Vec<TaskId>>,
    region_subregions: DetHashMap<RegionId, Vec<RegionId>>,
    region_obligations: DetHashMap<RegionId, Vec<ObligationId>>,
}

impl Runtime {
    /// Constructs a runtime from validated configuration and hooks. Use
    /// [`crate::config::RuntimeBuilder::build`] rather than calling this
    /// directly, so hook validation always runs first.
    #[must_use]
    pub fn new(config: Config, hooks: HostHooks) -> Self {
        let ceilings = config.resource_ceilings;
        Self {
            regions: Arena::with_capacity(ceilings.max_regions),
            tasks: Arena::with_capacity(ceilings.max_tasks),
            obligations: Arena::with_capacity(ceilings.max_obligations),
            cancellation: CancellationEngine::new(),
            scheduler: Scheduler::new(0),
            timers: TimerWheel::with_capacity(ceilings.max_timers),
            config,
            hooks,
            next_insertion_seq: 0,
            root: None,
            region_tasks: DetHashMap::default(),
            region_subregions: DetHashMap::default(),
            region_obligations: DetHashMap::default(),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Mutable access to the host hooks (e.g. to advance a
    /// [`crate::hooks::ManualClock`] or seal the allocator).
    pub fn hooks_mut(&mut self) -> &mut HostHooks {
        &mut self.hooks
    }

    fn next_seq(&mut self) -> u64 {
        let seq = self.next_insertion_seq;
        self.next_insertion_seq += 1;
        seq
    }

    fn region_mut(&mut self, id: RegionId) -> Result<&mut Region> {
        Ok(self.regions.get_mut(id.slot_index(), id.generation())?)
    }

    /// Read-only access to a region record.
    pub fn region(&self, id: RegionId) -> Result<&Region> {
        Ok(self.regions.get(id.slot_index(), id.generation())?)
    }

    /// Read-only access to a task record.
    pub fn task(&self, id: TaskId) -> Result<&Task> {
        Ok(self.tasks.get(id.slot_index(), id.generation())?)
    }

    /// Read-only access to an obligation record.
    pub fn obligation(&self, id: ObligationId) -> Result<&Obligation> {
        Ok(self.obligations.get(id.slot_index(), id.generation())?)
    }

    /// The root region, if one has been opened.
    #[must_use]
    pub fn root(&self) -> Option<RegionId> {
        self.root
    }

    /// The obligations ever reserved under `region_id`, in reservation
    /// order.
    #[must_use]
    pub fn region_obligation_ids(&self, region_id: RegionId) -> &[ObligationId] {
        self.region_obligations.get(&region_id).map_or(&[], Vec::as_slice)
    }

    /// Read-only access to the cancellation engine (witness lookups).
    #[must_use]
    pub fn cancellation(&self) -> &CancellationEngine {
        &self.cancellation
    }

    // -- region lifecycle -------------------------------------------------

    /// Opens the single root region. Fails with [`KernelError::InvalidState`]
    /// if a root has already been opened (one instance, one root tree,
    /// per §5).
    pub fn open_root_region(&mut self) -> Result<RegionId> {
        if self.root.is_some() {
            return Err(KernelError::InvalidState);
        }
        let ceilings = self.config.resource_ceilings;
        let region = Region::open(None, ceilings.cleanup_capacity, ceilings.capture_capacity);
        let (index, generation) = self.regions.alloc(region)?;
        let id = RegionId::from_parts(index, generation);
        self.root = Some(id);

        #[cfg(feature = "tracing-integration")]
        tracing::debug!(region = ?id, "root region opened");

        Ok(id)
    }

    /// Opens a sub-region of `parent`. Only legal while `parent` is
    /// `Open`.
    pub fn open_subregion(&mut self, parent: RegionId) -> Result<RegionId> {
        self.region_mut(parent)?.check_open_subregion()?;
        let ceilings = self.config.resource_ceilings;
        let region = Region::open(Some(parent), ceilings.cleanup_capacity, ceilings.capture_capacity);
        let (index, generation) = self.regions.alloc(region)?;
        let id = RegionId::from_parts(index, generation);
        self.region_mut(parent)?.on_subregion_opened();
        self.region_subregions.entry(parent).or_default().push(id);

        #[cfg(feature = "tracing-integration")]
        tracing::debug!(region = ?id, parent = ?parent, "subregion opened");

        Ok(id)
    }

    /// Advances a single region one step through `begin_close ->
    /// (fast-path `Finalizing` | `Draining`)`. Does not cascade to
    /// children; use [`Runtime::initiate_shutdown`] for a full
    /// depth-first cascade.
    pub fn begin_close(&mut self, region_id: RegionId) -> Result<()> {
        self.region_mut(region_id)?.begin_close()?;

        #[cfg(feature = "tracing-integration")]
        tracing::debug!(region = ?region_id, "region closing");

        Ok(())
    }

    /// Drains a region to `Closed`: advances `Draining -> Finalizing` if
    /// not already past it, leak-sweeps any obligations still `Reserved`,
    /// then `Finalizing -> Closed`. Fails if live children remain.
    pub fn finalize_region(&mut self, region_id: RegionId) -> Result<()> {
        {
            let region = self.region_mut(region_id)?;
            if region.state() == RegionState::Closing {
                if region.fast_path_eligible() {
                    region.advance_to_finalizing()?;
                } else {
                    region.advance_to_draining()?;
                    region.advance_to_finalizing()?;
                }
            } else if region.state() == RegionState::Draining {
                region.advance_to_finalizing()?;
            }
        }

        let obligations = self.region_obligations.get(&region_id).cloned().unwrap_or_default();
        for obligation_id in obligations {
            if let Ok(obligation) = self.obligations.get_mut(obligation_id.slot_index(), obligation_id.generation()) {
                if obligation.leak_if_unresolved()? {
                    self.region_mut(region_id)?.on_obligation_resolved();
                }
            }
        }

        let region = self.region_mut(region_id)?;
        region.advance_to_closed()?;
        let parent = region.parent();
        if let Some(parent) = parent {
            self.region_mut(parent)?.on_subregion_closed();
        }

        #[cfg(feature = "tracing-integration")]
        tracing::info!(region = ?region_id, "region closed");

        Ok(())
    }

    // -- task lifecycle -----------------------------------------------------

    /// Spawns a task owned by `region_id`, admits it to the scheduler's
    /// global ready lane, and returns its id.
    pub fn spawn_task(&mut self, region_id: RegionId, deadline: Option<Time>, priority: u8) -> Result<TaskId> {
        self.region_mut(region_id)?.check_spawn_task()?;
        let seq = self.next_seq();
        let task = Task::spawn(region_id, seq, deadline, priority);
        let (index, generation) = self.tasks.alloc(task)?;
        let id = TaskId::from_parts(index, generation);
        self.region_mut(region_id)?.on_task_spawned();
        self.region_tasks.entry(region_id).or_default().push(id);
        self.scheduler.inject_ready_global(id);

        #[cfg(feature = "tracing-integration")]
        tracing::trace!(task = ?id, region = ?region_id, "task spawned");

        Ok(id)
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task> {
        Ok(self.tasks.get_mut(id.slot_index(), id.generation())?)
    }

    /// Marks a task `Completed`, releases its region's child-task count,
    /// and forgets its cancel witness (if any).
    pub fn complete_task(&mut self, task_id: TaskId) -> Result<()> {
        let region_id = self.task(task_id)?.region();
        self.task_mut(task_id)?.transition(crate::transition::TaskState::Completed)?;
        self.region_mut(region_id)?.on_task_completed();
        self.cancellation.forget(task_id);

        #[cfg(feature = "tracing-integration")]
        tracing::trace!(task = ?task_id, "task completed");

        Ok(())
    }

    /// Requests (or strengthens) cancellation of a task, injecting it
    /// into the scheduler's cancel lane when the request newly moved the
    /// task into `CancelRequested`.
    pub fn request_cancel(&mut self, task_id: TaskId, reason: CancelReason) -> Result<bool> {
        let priority = self.task(task_id)?.priority();
        // Field-disjoint borrows: `self.tasks.get_mut` (not the `task_mut`
        // helper, which would borrow all of `self`) so `self.cancellation`
        // can be borrowed in the same call.
        let task = self.tasks.get_mut(task_id.slot_index(), task_id.generation())?;
        let transitioned = self.cancellation.cancel(task, task_id, reason)?;
        if transitioned {
            self.scheduler.inject_cancel(task_id, priority);

            #[cfg(feature = "tracing-integration")]
            tracing::debug!(task = ?task_id, "cancel requested");
        }
        Ok(transitioned)
    }

    /// Delivers the sole synchronous cancellation checkpoint for a task.
    pub fn checkpoint(&mut self, task_id: TaskId) -> Result<crate::cancel::CheckpointResult> {
        let state = self.task(task_id)?.state();
        Ok(self.cancellation.checkpoint(state, task_id))
    }

    /// Acknowledges a pending cancellation: `CancelRequested ->
    /// Cancelling`, installing the merged cleanup budget.
    pub fn acknowledge_cancel(&mut self, task_id: TaskId) -> Result<()> {
        let task = self.tasks.get_mut(task_id.slot_index(), task_id.generation())?;
        self.cancellation.acknowledge_cancel(task, task_id)
    }

    // -- obligations ----------------------------------------------------

    /// Reserves a new obligation owned by `region_id`.
    pub fn reserve_obligation(&mut self, region_id: RegionId) -> Result<ObligationId> {
        self.region_mut(region_id)?.check_reserve_obligation()?;
        let (index, generation) = self.obligations.alloc(Obligation::reserve(region_id))?;
        let id = ObligationId::from_parts(index, generation);
        self.region_mut(region_id)?.on_obligation_reserved();
        self.region_obligations.entry(region_id).or_default().push(id);
        Ok(id)
    }

    fn obligation_mut(&mut self, id: ObligationId) -> Result<&mut Obligation> {
        Ok(self.obligations.get_mut(id.slot_index(), id.generation())?)
    }

    /// Resolves an obligation successfully.
    pub fn commit_obligation(&mut self, obligation_id: ObligationId) -> Result<()> {
        let region_id = self.obligation(obligation_id)?.region();
        self.region_mut(region_id)?.check_resolve_obligation()?;
        self.obligation_mut(obligation_id)?.commit()?;
        self.region_mut(region_id)?.on_obligation_resolved();
        Ok(())
    }

    /// Resolves an obligation by explicit abort.
    pub fn abort_obligation(&mut self, obligation_id: ObligationId) -> Result<()> {
        let region_id = self.obligation(obligation_id)?.region();
        self.region_mut(region_id)?.check_resolve_obligation()?;
        self.obligation_mut(obligation_id)?.abort()?;
        self.region_mut(region_id)?.on_obligation_resolved();
        Ok(())
    }

    // -- timers & dispatch ------------------------------------------------

    /// Registers a timer that will fire `wakeup` into the scheduler lane
    /// it names once due.
    pub fn register_timer(&mut self, now: Time, deadline: Time, wakeup: TimerWakeup) -> Result<crate::types::TimerId> {
        self.timers.register(now, deadline, wakeup)
    }

    /// Cancels a previously registered timer.
    pub fn cancel_timer(&mut self, id: crate::types::TimerId) -> bool {
        self.timers.cancel(id)
    }

    /// One scheduler cycle: collects expired timers, admits their
    /// wakeups into the appropriate lane, then runs one dispatch. Timer
    /// expirations are processed before task dispatch in every cycle
    /// (§5 ordering guarantee).
    pub fn tick(&mut self, now: Time) -> DispatchOutcome {
        let expired = self.timers.collect_expired(now);
        self.scheduler.admit_timer_wakeups(expired);
        let next_timer_deadline = self.timers.peek_next_deadline();
        self.scheduler.dispatch_once(now, next_timer_deadline)
    }

    // -- shutdown & quiescence -------------------------------------------

    /// Initiates shutdown: begins close on the root region and cascades
    /// depth-first, requesting cancellation of every live task along the
    /// way (§4.9). Does not itself drive the scheduler to completion —
    /// the cooperative scheduler (§5) never blocks internally, so the
    /// host must keep calling [`Runtime::tick`] (and completing/
    /// acknowledging tasks as they dispatch) until
    /// [`Runtime::quiescence_check`] succeeds.
    pub fn initiate_shutdown(&mut self, reason: CancelReason) -> Result<()> {
        let root = self.root.ok_or(KernelError::NotFound)?;

        #[cfg(feature = "tracing-integration")]
        tracing::info!(?reason, "shutdown initiated");

        self.cascade_close(root, reason)
    }

    fn cascade_close(&mut self, region_id: RegionId, reason: CancelReason) -> Result<()> {
        let region = self.region_mut(region_id)?;
        if region.state() == RegionState::Open {
            region.begin_close()?;
        }

        let subregions = self.region_subregions.get(&region_id).cloned().unwrap_or_default();
        let extended = reason.extended(region_id);
        for child in subregions {
            if self.region(child)?.state() != RegionState::Closed {
                self.cascade_close(child, extended.clone())?;
            }
        }

        let tasks = self.region_tasks.get(&region_id).cloned().unwrap_or_default();
        for task_id in tasks {
            if !self.task(task_id)?.is_terminal() {
                self.request_cancel(task_id, extended.clone())?;
            }
        }
        Ok(())
    }

    /// Count of tasks not yet `Completed`.
    #[must_use]
    pub fn active_task_count(&self) -> usize {
        self.tasks.iter().filter(|(_, _, t)| !t.is_terminal()).count()
    }

    /// Count of obligations still `Reserved`.
    #[must_use]
    pub fn reserved_obligation_count(&self) -> usize {
        self.obligations.iter().filter(|(_, _, o)| !o.is_resolved()).count()
    }

    /// True once every region has reached `Closed`.
    #[must_use]
    pub fn all_regions_closed(&self) -> bool {
        self.regions.iter().all(|(_, _, r)| r.state() == RegionState::Closed)
    }

    /// The five-condition quiescence check of §4.9. `channels` lists
    /// every channel still open, so the caller (who alone knows each
    /// channel's payload type) can ask it over a uniform interface.
    pub fn quiescence_check(&self, channels: &[&dyn ChannelQuiescence]) -> Result<()> {
        if self.active_task_count() != 0 {
            return Err(KernelError::TasksStillActive);
        }
        if self.reserved_obligation_count() != 0 {
            return Err(KernelError::ObligationsUnresolved);
        }
        if !self.all_regions_closed() {
            return Err(KernelError::RegionsNotClosed);
        }
        if !self.timers.is_empty() {
            return Err(KernelError::TimersPending);
        }
        if !channels.iter().all(|c| c.is_drained()) {
            return Err(KernelError::ChannelNotDrained);
        }
        Ok(())
    }
}
