//! Per-region bounded LIFO cleanup stack (C4).
//!
//! Each region owns a [`CleanupStack`] of scoped release actions, pushed as
//! the region accumulates resources that must be released on close. `pop`
//! marks an entry dead without compacting the stack (cheap, O(1), and
//! avoids shifting every other handle); `drain` walks top-to-bottom
//! invoking every still-live entry exactly once, and is idempotent: a
//! second `drain` call is a no-op because every entry has already been
//! marked dead.

use smallvec::SmallVec;

use crate::error::{KernelError, Result};

/// An opaque handle to a pushed cleanup entry, returned by [`CleanupStack::push`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CleanupHandle(u32);

/// A boxed, zero-argument cleanup action.
pub type CleanupFn = Box<dyn FnOnce() + Send>;

struct Entry {
    action: Option<CleanupFn>,
}

/// A bounded LIFO stack of cleanup actions.
///
/// Capacity is fixed at construction (§5 resource contract): `push` past
/// capacity returns [`KernelError::ResourceExhausted`] without mutating
/// the stack.
pub struct CleanupStack {
    entries: SmallVec<[Entry; 8]>,
    capacity: usize,
}

impl CleanupStack {
    /// Creates an empty stack with a fixed capacity.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: SmallVec::new(),
            capacity,
        }
    }

    /// Number of entries, live or dead, currently occupying a slot.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if no entry (live or dead) currently occupies a slot.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of entries that would still run on [`Self::drain`].
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries.iter().filter(|e| e.action.is_some()).count()
    }

    /// Pushes a cleanup action, failing atomically if the stack is at
    /// capacity.
    pub fn push(&mut self, action: CleanupFn) -> Result<CleanupHandle> {
        if self.entries.len() >= self.capacity {
            return Err(KernelError::ResourceExhausted);
        }
        let handle = CleanupHandle(self.entries.len() as u32);
        self.entries.push(Entry { action: Some(action) });
        Ok(handle)
    }

    /// Marks the entry at `handle` dead so [`Self::drain`] will skip it.
    /// Does not compact the stack. Returns `NotFound` for an out-of-range
    /// or already-popped handle.
    pub fn pop(&mut self, handle: CleanupHandle) -> Result<()> {
        let entry = self
            .entries
            .get_mut(handle.0 as usize)
            .ok_or(KernelError::NotFound)?;
        if entry.action.is_none() {
            return Err(KernelError::NotFound);
        }
        entry.action = None;
        Ok(())
    }

    /// Runs every still-live entry exactly once, from the top of the stack
    /// (highest index) down to the bottom. Idempotent: entries are marked
    /// dead as they run, so a second call does nothing.
    pub fn drain(&mut self) {
        for entry in self.entries.iter_mut().rev() {
            if let Some(action) = entry.action.take() {
                action();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn drain_runs_live_entries_in_lifo_order() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = CleanupStack::with_capacity(4);
        for i in 0..3 {
            let log = log.clone();
            stack.push(Box::new(move || log.borrow_mut().push(i))).unwrap();
        }
        stack.drain();
        assert_eq!(*log.borrow(), vec![2, 1, 0]);
    }

    #[test]
    fn pop_skips_entry_on_drain() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = CleanupStack::with_capacity(4);
        let l0 = log.clone();
        stack.push(Box::new(move || l0.borrow_mut().push(0))).unwrap();
        let l1 = log.clone();
        let h1 = stack.push(Box::new(move || l1.borrow_mut().push(1))).unwrap();
        stack.pop(h1).unwrap();
        stack.drain();
        assert_eq!(*log.borrow(), vec![0]);
    }

    #[test]
    fn drain_is_idempotent() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut stack = CleanupStack::with_capacity(4);
        let l = log.clone();
        stack.push(Box::new(move || l.borrow_mut().push(1))).unwrap();
        stack.drain();
        stack.drain();
        assert_eq!(*log.borrow(), vec![1]);
    }

    #[test]
    fn push_past_capacity_is_failure_atomic() {
        let mut stack = CleanupStack::with_capacity(1);
        stack.push(Box::new(|| {})).unwrap();
        assert_eq!(stack.push(Box::new(|| {})), Err(KernelError::ResourceExhausted));
        assert_eq!(stack.len(), 1);
    }

    #[test]
    fn pop_unknown_handle_is_not_found() {
        let mut stack = CleanupStack::with_capacity(2);
        assert_eq!(stack.pop(CleanupHandle(0)), Err(KernelError::NotFound));
    }
}
