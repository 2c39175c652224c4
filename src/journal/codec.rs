//! Codec parity (§8 round-trip law): a `serde_json` text codec and a
//! `bincode` binary codec over the same [`JournalEvent`] sequence, kept
//! deliberately interchangeable -- decoding either byte form back into
//! `JournalEvent`s and computing [`digest_events`] must yield the same
//! digest.

use crate::error::{KernelError, Result};
use crate::journal::event::JournalEvent;

/// Encodes an event sequence as canonical (sorted-key, one-value-per-line)
/// JSON text.
pub fn encode_json(events: &[JournalEvent]) -> Result<Vec<u8>> {
    serde_json::to_vec(events).map_err(|_| KernelError::JournalEncodeFailed)
}

/// Decodes a JSON-encoded event sequence.
pub fn decode_json(bytes: &[u8]) -> Result<Vec<JournalEvent>> {
    serde_json::from_slice(bytes).map_err(|_| KernelError::JournalDecodeFailed)
}

/// Encodes an event sequence with `bincode`'s standard configuration.
pub fn encode_binary(events: &[JournalEvent]) -> Result<Vec<u8>> {
    bincode::serde::encode_to_vec(events, bincode::config::standard()).map_err(|_| KernelError::JournalEncodeFailed)
}

/// Decodes a `bincode`-encoded event sequence.
pub fn decode_binary(bytes: &[u8]) -> Result<Vec<JournalEvent>> {
    let (events, _) = bincode::serde::decode_from_slice(bytes, bincode::config::standard())
        .map_err(|_| KernelError::JournalDecodeFailed)?;
    Ok(events)
}
