//! Journal event records (§4.10): one record per observable state
//! transition, scheduler dispatch, cancel strengthening, timer fire, or
//! channel/obligation resolution, each carrying a strictly monotonic
//! `event_seq`.

use serde::{Deserialize, Serialize};

use crate::transition::{ObligationState, RegionState, TaskState};
use crate::types::{CancelKind, ChannelId, ObligationId, RegionId, TaskId, TimerId};

/// Which scheduler lane a dispatch came from, for the journal record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchLane {
    /// The cancel lane.
    Cancel,
    /// The timed (EDF) lane.
    Timed,
    /// Any of the ready sub-queues (global, local, priority).
    Ready,
}

/// The kind of observable event, tagged by variant name in the canonical
/// serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EventKind {
    /// A region moved from one lifecycle state to another.
    RegionTransition {
        /// The region.
        region: RegionId,
        /// Prior state.
        from: RegionState,
        /// New state.
        to: RegionState,
    },
    /// A task moved from one lifecycle state to another.
    TaskTransition {
        /// The task.
        task: TaskId,
        /// Prior state.
        from: TaskState,
        /// New state.
        to: TaskState,
    },
    /// The scheduler dispatched a task from a lane.
    Dispatch {
        /// The dispatched task.
        task: TaskId,
        /// The lane it came from.
        lane: DispatchLane,
    },
    /// A cancel witness was installed, strengthened, or a strengthening
    /// attempt was declined as a weakening of the existing reason.
    CancelStrengthened {
        /// The cancelled task.
        task: TaskId,
        /// The witness's kind after this event (unchanged from before if
        /// `declined`).
        kind: CancelKind,
        /// `true` if the candidate reason was weaker than the witness
        /// already installed and was declined, leaving `kind` unchanged.
        declined: bool,
    },
    /// A timer fired (delivered its wakeup).
    TimerFired {
        /// The timer.
        timer: TimerId,
    },
    /// A channel reservation was made.
    ChannelReserve {
        /// The channel.
        channel: ChannelId,
    },
    /// A channel send committed a reservation.
    ChannelSend {
        /// The channel.
        channel: ChannelId,
    },
    /// A channel reservation was aborted.
    ChannelAbort {
        /// The channel.
        channel: ChannelId,
    },
    /// A channel receive dequeued a message.
    ChannelRecv {
        /// The channel.
        channel: ChannelId,
    },
    /// An obligation resolved.
    ObligationResolved {
        /// The obligation.
        obligation: ObligationId,
        /// The resolution it reached.
        to: ObligationState,
    },
}

/// One journal record: a strictly monotonic sequence number plus the
/// event it describes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEvent {
    /// Strictly monotonic across the whole journal.
    pub event_seq: u64,
    /// The event itself.
    pub kind: EventKind,
}

impl JournalEvent {
    /// Builds a record at the given sequence number.
    #[must_use]
    pub fn new(event_seq: u64, kind: EventKind) -> Self {
        Self { event_seq, kind }
    }
}
