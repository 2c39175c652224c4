//! Bounded MPSC channel (C8): two-phase reserve/send/abort, cancel-safe.
//!
//! `reserve` never mutates state on the cancelled or disconnected paths;
//! a committed reservation (`reserved`) always satisfies
//! `queue.len() + reserved <= capacity`. The channel itself is a single
//! owned record, mutated through `&mut self` by whichever task the
//! deterministic scheduler is currently running — there is no shared
//! ownership or locking inside this module.

use std::collections::VecDeque;

/// Monotonic per-channel waiter identifier, assigned in reservation
/// request order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WaiterId(u64);

/// A reserved slot on whichever [`Channel`] produced it. Must be
/// resolved via [`Channel::send`] or [`Channel::abort`]; an unresolved
/// permit is a linearity violation the same way an unresolved obligation
/// is (the runtime layer ties a permit's reservation to an
/// [`crate::obligation::Obligation`] so the region leak sweep catches
/// one left unresolved). Carries no channel identity of its own —
/// callers are expected to resolve a permit against the same `Channel`
/// value that issued it, the same way a `SemaphorePermit` ties back to
/// its semaphore.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[must_use = "a permit must be resolved via send() or abort()"]
pub struct Permit {
    _private: (),
}

/// Outcome of [`Channel::reserve`] / [`Channel::try_reserve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReserveOutcome {
    /// A slot was reserved; resolve it with `send` or `abort`.
    Ready(Permit),
    /// No slot available yet; caller was registered (or refreshed) as a
    /// waiter and should retry after being woken. `try_reserve` never
    /// produces this variant.
    Pending,
    /// `checkpoint()` observed cancellation before any mutation.
    Cancelled,
    /// The receiver has dropped.
    Disconnected,
    /// `try_reserve` found no immediately available slot (receiver
    /// alive, not cancelled).
    Full,
}

/// Outcome of [`Channel::recv`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecvOutcome<T> {
    /// A message was dequeued.
    Ready(T),
    /// No message yet; receiver registered for the wake.
    Pending,
    /// `checkpoint()` observed cancellation; no message consumed.
    Cancelled,
    /// `sender_count` has reached zero and the queue is empty.
    Disconnected,
}

/// A value returned to the caller on a failed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The receiver dropped between reserve and send.
    Disconnected,
}

/// Outcome of [`Channel::send_evict_oldest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvictOutcome<T> {
    /// Room was available; nothing evicted.
    Sent,
    /// The oldest committed entry was evicted to make room.
    Evicted(T),
    /// Every slot is reserved (none committed) so nothing could be
    /// evicted to make room.
    Full(T),
    /// The receiver has dropped.
    Disconnected(T),
}

/// A bounded, FIFO, multi-producer single-consumer channel of fixed
/// capacity > 0.
pub struct Channel<T> {
    capacity: usize,
    queue: VecDeque<T>,
    reserved: usize,
    sender_count: u32,
    receiver_dropped: bool,
    waiters: VecDeque<WaiterId>,
    next_waiter_id: u64,
    /// Waiters woken since the last drain (by `abort`, `close_receiver`,
    /// or `drop_sender` on last-sender-drop). Consumed by the scheduler.
    woken_senders: VecDeque<WaiterId>,
    receiver_waiting: bool,
    receiver_woken: bool,
}

impl<T> Channel<T> {
    /// Creates a channel with the given fixed capacity and one
    /// registered sender.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "channel capacity must be > 0");
        Self {
            capacity,
            queue: VecDeque::new(),
            reserved: 0,
            sender_count: 1,
            receiver_dropped: false,
            waiters: VecDeque::new(),
            next_waiter_id: 0,
            woken_senders: VecDeque::new(),
            receiver_waiting: false,
            receiver_woken: false,
        }
    }

    /// Fixed capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// `queue.len() + reserved`: occupied slots right now.
    #[must_use]
    pub fn used_slots(&self) -> usize {
        self.queue.len() + self.reserved
    }

    /// True once the receiver has dropped.
    #[must_use]
    pub fn is_receiver_dropped(&self) -> bool {
        self.receiver_dropped
    }

    /// Registers an additional sender (e.g. a clone of a sender handle).
    pub fn register_sender(&mut self) {
        self.sender_count += 1;
    }

    /// Drops one sender. On the last sender dropping, wakes the receiver
    /// (but preserves any queued messages for draining).
    pub fn drop_sender(&mut self) {
        self.sender_count = self.sender_count.saturating_sub(1);
        if self.sender_count == 0 {
            self.receiver_woken = true;
        }
    }

    fn issue_waiter_id(&mut self) -> WaiterId {
        let id = WaiterId(self.next_waiter_id);
        self.next_waiter_id += 1;
        id
    }

    fn has_room(&self) -> bool {
        self.queue.len() + self.reserved < self.capacity
    }

    /// Poll-structured two-phase reserve (§4.6): checkpoint, then
    /// disconnect, then strict-FIFO ordering, then capacity.
    pub fn reserve(&mut self, waiter: WaiterId, cancelled: bool) -> ReserveOutcome {
        if cancelled {
            return ReserveOutcome::Cancelled;
        }
        if self.receiver_dropped {
            return ReserveOutcome::Disconnected;
        }
        if let Some(&front) = self.waiters.front() {
            if front != waiter {
                if !self.waiters.contains(&waiter) {
                    self.waiters.push_back(waiter);
                }
                return ReserveOutcome::Pending;
            }
        }
        if self.has_room() {
            if self.waiters.front() == Some(&waiter) {
                self.waiters.pop_front();
            }
            self.reserved += 1;
            return ReserveOutcome::Ready(Permit { _private: () });
        }
        if !self.waiters.contains(&waiter) {
            self.waiters.push_back(waiter);
        }
        ReserveOutcome::Pending
    }

    /// Strict-FIFO non-blocking reserve: never jumps the queue even if
    /// raw capacity would otherwise allow it.
    pub fn try_reserve(&mut self, cancelled: bool) -> ReserveOutcome {
        if cancelled {
            return ReserveOutcome::Cancelled;
        }
        if self.receiver_dropped {
            return ReserveOutcome::Disconnected;
        }
        if !self.waiters.is_empty() {
            return ReserveOutcome::Full;
        }
        if self.has_room() {
            self.reserved += 1;
            return ReserveOutcome::Ready(Permit { _private: () });
        }
        ReserveOutcome::Full
    }

    /// Issues a fresh, monotonic waiter id for a new reserve attempt.
    pub fn next_waiter(&mut self) -> WaiterId {
        self.issue_waiter_id()
    }

    /// Commits a permit: decrements `reserved`; if the receiver is still
    /// alive, enqueues `value` and marks the receiver woken; otherwise
    /// returns the value undelivered.
    pub fn send(&mut self, permit: Permit, value: T) -> Result<(), (T, SendError)> {
        let _ = permit;
        self.reserved = self.reserved.saturating_sub(1);
        if self.receiver_dropped {
            return Err((value, SendError::Disconnected));
        }
        self.queue.push_back(value);
        if self.receiver_waiting {
            self.receiver_waiting = false;
            self.receiver_woken = true;
        }
        Ok(())
    }

    /// Aborts a permit: decrements `reserved`, wakes the next FIFO
    /// waiter (cascade).
    pub fn abort(&mut self, permit: Permit) {
        let _ = permit;
        self.reserved = self.reserved.saturating_sub(1);
        if let Some(next) = self.waiters.pop_front() {
            self.woken_senders.push_back(next);
        }

        #[cfg(feature = "tracing-integration")]
        tracing::trace!(reserved = self.reserved, "channel reservation aborted");
    }

    /// Checks cancellation first (no message consumed on that path),
    /// then pops the queue front, else reports disconnect or pending.
    pub fn recv(&mut self, cancelled: bool) -> RecvOutcome<T> {
        if cancelled {
            return RecvOutcome::Cancelled;
        }
        if let Some(value) = self.queue.pop_front() {
            if let Some(next) = self.waiters.pop_front() {
                self.woken_senders.push_back(next);
            }
            return RecvOutcome::Ready(value);
        }
        if self.sender_count == 0 {
            return RecvOutcome::Disconnected;
        }
        self.receiver_waiting = true;
        RecvOutcome::Pending
    }

    /// Evict-oldest convenience send, bypassing explicit reserve/commit.
    pub fn send_evict_oldest(&mut self, value: T) -> EvictOutcome<T> {
        if self.receiver_dropped {
            return EvictOutcome::Disconnected(value);
        }
        if self.has_room() {
            self.queue.push_back(value);
            if self.receiver_waiting {
                self.receiver_waiting = false;
                self.receiver_woken = true;
            }
            return EvictOutcome::Sent;
        }
        if let Some(evicted) = self.queue.pop_front() {
            self.queue.push_back(value);
            EvictOutcome::Evicted(evicted)
        } else {
            EvictOutcome::Full(value)
        }
    }

    /// Receiver drop: a single monotone flip. Drains and returns queued
    /// messages, clears receive interest, and wakes every waiting
    /// sender.
    pub fn close_receiver(&mut self) -> Vec<T> {
        self.receiver_dropped = true;
        self.receiver_waiting = false;
        self.woken_senders.extend(self.waiters.drain(..));
        self.queue.drain(..).collect()
    }

    /// Drains and returns waiters woken since the last call (by abort,
    /// receiver close, or last-sender-drop), for the scheduler to
    /// re-dispatch.
    pub fn take_woken_senders(&mut self) -> Vec<WaiterId> {
        self.woken_senders.drain(..).collect()
    }

    /// True if the receiver has been woken (queue gained a message, or
    /// the last sender dropped) since the last call; clears the flag.
    pub fn take_receiver_woken(&mut self) -> bool {
        std::mem::replace(&mut self.receiver_woken, false)
    }

}
