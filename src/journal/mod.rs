//! Event journal and canonical digest (C12, §4.10).
//!
//! Every observable state transition, scheduler dispatch, cancel
//! strengthening, timer fire, channel reserve/send/abort/recv, and
//! obligation resolution is recorded as a [`JournalEvent`] with a
//! strictly monotonic `event_seq`. [`Journal`] is the in-memory append log;
//! [`digest::digest_events`] reduces any event sequence to a single
//! deterministic hash, and the [`codec`] module provides the JSON/binary
//! encodings that must agree on that hash bit-for-bit.

pub mod codec;
pub mod digest;
pub mod event;

pub use event::{DispatchLane, EventKind, JournalEvent};

use crate::error::{KernelError, Result};

/// An append-only, strictly-sequenced log of [`JournalEvent`]s.
///
/// Bounded by `capacity`: once full, further appends fail with
/// [`KernelError::ResourceExhausted`] rather than silently growing or
/// overwriting history, matching the fixed-capacity discipline the rest
/// of the kernel uses for arenas and cleanup stacks.
#[derive(Debug, Clone)]
pub struct Journal {
    events: Vec<JournalEvent>,
    capacity: usize,
    next_seq: u64,
}

impl Journal {
    /// Creates an empty journal bounded to `capacity` events.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self { events: Vec::with_capacity(capacity), capacity, next_seq: 0 }
    }

    /// Appends an event, assigning it the next monotonic `event_seq`.
    pub fn record(&mut self, kind: EventKind) -> Result<u64> {
        if self.events.len() >= self.capacity {
            return Err(KernelError::ResourceExhausted);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        self.events.push(JournalEvent::new(seq, kind));
        Ok(seq)
    }

    /// The recorded events, in `event_seq` order.
    #[must_use]
    pub fn events(&self) -> &[JournalEvent] {
        &self.events
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// True if no event has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Computes the canonical digest of the recorded sequence.
    pub fn digest(&self) -> Result<u64> {
        digest::digest_events(self.events.iter())
    }

    /// Encodes the recorded sequence as canonical JSON.
    pub fn to_json(&self) -> Result<Vec<u8>> {
        codec::encode_json(&self.events)
    }

    /// Encodes the recorded sequence with the binary codec.
    pub fn to_binary(&self) -> Result<Vec<u8>> {
        codec::encode_binary(&self.events)
    }
}

/// How a replay's computed digest compared against the digest recorded
/// alongside a scenario's expected outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestMismatchClass {
    /// Digests matched; no mismatch.
    None,
    /// A mismatch expected and accepted as an intentional behavior change
    /// upstream of this crate (e.g. a scenario fixture updated on purpose).
    IntentionalUpstream,
    /// An unexpected mismatch indicating a real behavioral regression.
    Regression,
    /// The scenario or its expectations are themselves inconsistent.
    SpecDefect,
    /// The replay harness itself is at fault (e.g. a non-deterministic
    /// host hook leaked into a deterministic run).
    HarnessDefect,
}

/// Compares a freshly computed digest against an expected one, classifying
/// any mismatch. A caller with independent knowledge of which bucket an
/// observed mismatch belongs to should override [`DigestMismatchClass::Regression`]
/// accordingly; this function can only distinguish match from mismatch.
#[must_use]
pub fn classify_digest(expected: u64, actual: u64) -> DigestMismatchClass {
    if expected == actual {
        DigestMismatchClass::None
    } else {
        DigestMismatchClass::Regression
    }
}
