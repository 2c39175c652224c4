//! Region lifecycle (C6): the unit of structured concurrency.
//!
//! A region owns a cleanup stack, a capture arena for tasks' captured
//! state, and counts of its live children and outstanding obligations.
//! Its state is monotone along `Open<Closing<Draining<Finalizing<Closed`;
//! reaching `Closed` requires zero live children and zero unresolved
//! obligations (enforced by the caller via [`Region::can_reach_closed`],
//! since the counts alone don't know *which* children are still live —
//! that bookkeeping lives in the task/obligation tables).

use crate::cleanup::CleanupStack;
use crate::error::{KernelError, Result};
use crate::transition::{self, RegionState};
use crate::types::RegionId;

/// A byte-granular bump allocator backing a region's captured task state.
///
/// Never reclaims individual allocations; the whole arena is dropped with
/// the region. Matches the spec's "capture arena (byte-granular bump
/// allocator)" region attribute.
pub struct CaptureArena {
    bytes: Vec<u8>,
    capacity: usize,
}

impl CaptureArena {
    /// Creates an arena with a fixed byte capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { bytes: Vec::with_capacity(capacity.min(4096)), capacity }
    }

    /// Bump-allocates `size` bytes aligned to `align` (a power of two),
    /// returning the byte offset of the allocation. Fails atomically,
    /// without growing the arena, if the allocation would exceed
    /// capacity.
    pub fn alloc(&mut self, size: usize, align: usize) -> Result<usize> {
        let base = self.bytes.len();
        let aligned = base.div_ceil(align) * align;
        let end = aligned.checked_add(size).ok_or(KernelError::ResourceExhausted)?;
        if end > self.capacity {
            return Err(KernelError::ResourceExhausted);
        }
        self.bytes.resize(end, 0);
        Ok(aligned)
    }

    /// Bytes currently in use (including alignment padding).
    #[must_use]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if nothing has been allocated yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Fixed capacity in bytes.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// A region record.
pub struct Region {
    state: RegionState,
    parent: Option<RegionId>,
    child_task_count: u32,
    child_region_count: u32,
    obligation_count: u32,
    ever_had_children: bool,
    poisoned: bool,
    cleanup: CleanupStack,
    capture: CaptureArena,
}

impl Region {
    /// Opens a new region (root if `parent` is `None`).
    #[must_use]
    pub fn open(parent: Option<RegionId>, cleanup_capacity: usize, capture_capacity: usize) -> Self {
        Self {
            state: RegionState::Open,
            parent,
            child_task_count: 0,
            child_region_count: 0,
            obligation_count: 0,
            ever_had_children: false,
            poisoned: false,
            cleanup: CleanupStack::with_capacity(cleanup_capacity),
            capture: CaptureArena::with_capacity(capture_capacity),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> RegionState {
        self.state
    }

    /// The parent region, if any.
    #[must_use]
    pub fn parent(&self) -> Option<RegionId> {
        self.parent
    }

    /// True once [`Region::poison`] has been called.
    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Mutable access to the cleanup stack (used by the C7 cancellation
    /// engine and by [`Region::advance_to_finalizing`]).
    pub fn cleanup_stack(&mut self) -> &mut CleanupStack {
        &mut self.cleanup
    }

    /// Mutable access to the capture arena.
    pub fn capture_arena(&mut self) -> &mut CaptureArena {
        &mut self.capture
    }

    /// Admission gate: spawning a task is allowed in `Open` and, for
    /// finalizer tasks, in `Finalizing`.
    pub fn check_spawn_task(&self) -> Result<()> {
        if self.poisoned {
            return Err(KernelError::RegionPoisoned);
        }
        match self.state {
            RegionState::Open | RegionState::Finalizing => Ok(()),
            _ => Err(KernelError::RegionNotOpen),
        }
    }

    /// Admission gate: opening a sub-region is allowed only in `Open`.
    pub fn check_open_subregion(&self) -> Result<()> {
        if self.state == RegionState::Open {
            Ok(())
        } else {
            Err(KernelError::RegionNotOpen)
        }
    }

    /// Admission gate: reserving an obligation is allowed only in `Open`.
    pub fn check_reserve_obligation(&self) -> Result<()> {
        if self.state == RegionState::Open {
            Ok(())
        } else {
            Err(KernelError::RegionNotOpen)
        }
    }

    /// Admission gate: resolving an obligation (commit/abort) is allowed
    /// in every state except `Closed`.
    pub fn check_resolve_obligation(&self) -> Result<()> {
        if self.state == RegionState::Closed {
            Err(KernelError::RegionClosed)
        } else {
            Ok(())
        }
    }

    /// Admission gate: arena access is allowed in every state except
    /// `Closed`.
    pub fn check_access_arena(&self) -> Result<()> {
        if self.state == RegionState::Closed {
            Err(KernelError::RegionClosed)
        } else {
            Ok(())
        }
    }

    /// Poisons the region (only legal while `Open`). Poisoning does not
    /// itself change `state`; it only forbids further spawns.
    pub fn poison(&mut self) -> Result<()> {
        if self.state != RegionState::Open {
            return Err(KernelError::RegionNotOpen);
        }
        self.poisoned = true;
        Ok(())
    }

    /// Increments the live child-task count.
    pub fn on_task_spawned(&mut self) {
        self.child_task_count += 1;
        self.ever_had_children = true;
    }

    /// Decrements the live child-task count (a task reached `Completed`).
    pub fn on_task_completed(&mut self) {
        self.child_task_count = self.child_task_count.saturating_sub(1);
    }

    /// Increments the live child-region count.
    pub fn on_subregion_opened(&mut self) {
        self.child_region_count += 1;
        self.ever_had_children = true;
    }

    /// Decrements the live child-region count (a sub-region reached
    /// `Closed`).
    pub fn on_subregion_closed(&mut self) {
        self.child_region_count = self.child_region_count.saturating_sub(1);
    }

    /// Increments the outstanding-obligation count.
    pub fn on_obligation_reserved(&mut self) {
        self.obligation_count += 1;
    }

    /// Decrements the outstanding-obligation count (committed, aborted,
    /// or leaked).
    pub fn on_obligation_resolved(&mut self) {
        self.obligation_count = self.obligation_count.saturating_sub(1);
    }

    /// Number of live child tasks.
    #[must_use]
    pub fn child_task_count(&self) -> u32 {
        self.child_task_count
    }

    /// Number of live child regions.
    #[must_use]
    pub fn child_region_count(&self) -> u32 {
        self.child_region_count
    }

    /// Number of outstanding obligations.
    #[must_use]
    pub fn obligation_count(&self) -> u32 {
        self.obligation_count
    }

    /// True if this region is eligible for the `Closing -> Finalizing`
    /// fast path: it never admitted a single child task or sub-region.
    #[must_use]
    pub fn fast_path_eligible(&self) -> bool {
        !self.ever_had_children
    }

    /// Begins close: `Open -> Closing`.
    pub fn begin_close(&mut self) -> Result<()> {
        transition::region_transition_check(self.state, RegionState::Closing)?;
        self.state = RegionState::Closing;
        Ok(())
    }

    /// Advances `Closing -> Draining`.
    pub fn advance_to_draining(&mut self) -> Result<()> {
        transition::region_transition_check(self.state, RegionState::Draining)?;
        self.state = RegionState::Draining;
        Ok(())
    }

    /// Advances to `Finalizing`, either from `Draining` (normal path, once
    /// all children are terminal) or from `Closing` directly (fast path,
    /// only legal when [`Region::fast_path_eligible`]).
    pub fn advance_to_finalizing(&mut self) -> Result<()> {
        if self.state == RegionState::Closing && !self.fast_path_eligible() {
            return Err(KernelError::IncompleteChildren);
        }
        transition::region_transition_check(self.state, RegionState::Finalizing)?;
        self.state = RegionState::Finalizing;
        Ok(())
    }

    /// Drains the cleanup stack and advances `Finalizing -> Closed`.
    /// Fails (without transitioning) if children or obligations are still
    /// outstanding.
    pub fn advance_to_closed(&mut self) -> Result<()> {
        if self.child_task_count != 0 || self.child_region_count != 0 {
            return Err(KernelError::IncompleteChildren);
        }
        if self.obligation_count != 0 {
            return Err(KernelError::UnresolvedObligations);
        }
        transition::region_transition_check(self.state, RegionState::Closed)?;
        self.cleanup.drain();
        self.state = RegionState::Closed;
        Ok(())
    }
}
