//! A deterministic structured-concurrency runtime kernel: regions, tasks,
//! and obligations with cancel-correct lifecycle, a first-class
//! cancellation protocol, bounded two-phase channels, a hierarchical
//! timer wheel, and a three-lane deterministic scheduler.
//!
//! # Core guarantees
//!
//! - **No orphan tasks**: every spawned task is owned by a region; region
//!   close waits for all children.
//! - **Cancel-correctness**: cancellation is request -> acknowledge ->
//!   finalize, never a silent drop.
//! - **Bounded cleanup**: cleanup budgets are sufficient conditions, not
//!   hopes; overrun force-completes rather than blocking indefinitely.
//! - **No silent drops**: two-phase channel effects (reserve/commit)
//!   prevent data loss on cancellation.
//! - **Determinism**: same seed, same scenario, same scheduler trace, same
//!   event digest.
//!
//! # Module structure
//!
//! - [`types`]: identifiers, outcomes, budgets, cancellation data model.
//! - [`util`]: deterministic RNG, generation-checked arenas, hashing.
//! - [`error`]: the stable `KernelError` taxonomy and per-task error ledger.
//! - [`cleanup`]: the cleanup stack (C4).
//! - [`transition`]: the task/region transition authority (C5).
//! - [`region`], [`task`], [`obligation`]: the lifecycle engine (C6).
//! - [`cancel`]: the cancellation protocol engine (C7).
//! - [`channel`]: the bounded two-phase MPSC channel (C8).
//! - [`timer`]: the hierarchical timer wheel (C9).
//! - [`scheduler`]: the three-lane deterministic scheduler (C10).
//! - [`runtime`]: quiescence and the orchestrating `Runtime` (C11).
//! - [`journal`]: the event journal and canonical digest (C12).
//! - [`scenario`]: the JSON scenario DSL interpreter.
//! - [`hooks`], [`config`]: host hooks and `RuntimeBuilder` configuration.

#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

pub mod cancel;
pub mod channel;
pub mod cleanup;
pub mod config;
pub mod error;
pub mod hooks;
pub mod journal;
pub mod obligation;
pub mod region;
pub mod runtime;
pub mod scenario;
pub mod scheduler;
pub mod task;
pub mod timer;
pub mod transition;
pub mod types;
pub mod util;

pub use cancel::CancellationEngine;
pub use channel::Channel;
pub use config::{Config, RuntimeBuilder};
pub use error::KernelError;
pub use hooks::HostHooks;
pub use journal::{Journal, JournalEvent};
pub use obligation::Obligation;
pub use region::Region;
pub use runtime::Runtime;
pub use scenario::{ScenarioEnvelope, ScenarioRunner};
pub use scheduler::Scheduler;
pub use task::Task;
pub use timer::TimerWheel;
