//! Work stealing among scheduler workers.
//!
//! Circular scan seeded by `DetRng`, matching the teacher's
//! `runtime::scheduler::stealing::steal_task` exactly in shape. In the
//! single-worker profile this is never called with more than one
//! scheduler and degenerates to the documented no-op (DESIGN.md, Open
//! Question 2); it is kept ready for a future multi-worker profile.

use super::Scheduler;
use crate::types::TaskId;
use crate::util::DetRng;

/// Tries to steal a ready task from another worker's local queue.
///
/// Starts at a random index and scans every worker exactly once in
/// circular order, stopping at the first successful steal.
pub fn steal_task(workers: &mut [Scheduler], rng: &mut DetRng) -> Option<TaskId> {
    if workers.is_empty() {
        return None;
    }

    let len = workers.len();
    let start = rng.next_below(len);

    for i in 0..len {
        let idx = (start + i) % len;
        if let Some(task) = workers[idx].steal_from() {
            return Some(task);
        }
    }

    None
}
