//! Canonical digest (§4.10): a deterministic 64-bit hash over an ordered
//! event sequence, stable across the JSON and binary codecs.
//!
//! Each event is canonicalized by round-tripping it through
//! [`serde_json::Value`] before final byte serialization. `serde_json`'s
//! default `Value::Object` representation is a `BTreeMap` (this crate does
//! not enable the `preserve_order` feature), so object keys come out
//! sorted for free -- no hand-rolled canonical-JSON writer is needed.

use crate::error::{KernelError, Result};
use crate::journal::event::JournalEvent;
use crate::util::det_hash::digest_chunks;

/// Canonicalizes a single event to its sorted-key JSON byte form.
fn canonical_bytes(event: &JournalEvent) -> Result<Vec<u8>> {
    let value = serde_json::to_value(event).map_err(|_| KernelError::JournalEncodeFailed)?;
    serde_json::to_vec(&value).map_err(|_| KernelError::JournalEncodeFailed)
}

/// Computes the canonical digest of an ordered event sequence.
///
/// The digest depends on `event_seq` order and content only, never on
/// which codec produced the events: JSON-decoded and binary-decoded
/// copies of the same events hash identically (see the `codec` module's
/// round-trip tests).
pub fn digest_events<'a>(events: impl IntoIterator<Item = &'a JournalEvent>) -> Result<u64> {
    let canonical: Vec<Vec<u8>> = events.into_iter().map(canonical_bytes).collect::<Result<_>>()?;
    Ok(digest_chunks(canonical.iter().map(Vec::as_slice)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::event::EventKind;
    use crate::types::{RegionId, TaskId};

    fn sample_events() -> Vec<JournalEvent> {
        vec![
            JournalEvent::new(
                0,
                EventKind::RegionTransition {
                    region: RegionId::new_for_test(0, 0),
                    from: crate::transition::RegionState::Open,
                    to: crate::transition::RegionState::Closing,
                },
            ),
            JournalEvent::new(
                1,
                EventKind::TaskTransition {
                    task: TaskId::new_for_test(0, 0),
                    from: crate::transition::TaskState::Created,
                    to: crate::transition::TaskState::Running,
                },
            ),
        ]
    }

    #[test]
    fn same_sequence_same_digest() {
        let events = sample_events();
        let a = digest_events(events.iter()).unwrap();
        let b = digest_events(events.iter()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn reordering_events_changes_digest() {
        let mut events = sample_events();
        let a = digest_events(events.iter()).unwrap();
        events.swap(0, 1);
        let b = digest_events(events.iter()).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn empty_sequence_has_a_stable_digest() {
        let empty: Vec<JournalEvent> = Vec::new();
        assert_eq!(digest_events(empty.iter()).unwrap(), digest_events(std::iter::empty()).unwrap());
    }
}
