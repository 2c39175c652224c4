//! Exercises the ambient tracing instrumentation end-to-end with a real
//! subscriber installed, rather than just compiling the `tracing::*`
//! call sites behind the `tracing-integration` feature.
//!
//! Only compiled with that feature enabled (the crate's own call sites
//! are themselves `#[cfg(feature = "tracing-integration")]`-gated, so
//! without it there is nothing for a subscriber to observe):
//!   cargo test --test tracing_integration --features tracing-integration

#![cfg(feature = "tracing-integration")]

use asupersync_kernel::config::Config;
use asupersync_kernel::hooks::{DetRngEntropy, HostHooks, ManualClock};
use asupersync_kernel::runtime::Runtime;

#[test]
fn lifecycle_and_scheduler_operations_emit_tracing_events() {
    let _ = tracing_subscriber::fmt().with_test_writer().with_env_filter("trace").try_init();

    let hooks = HostHooks::new()
        .with_logical_clock(Box::new(ManualClock::new()))
        .with_entropy(Box::new(DetRngEntropy::seeded(11)), true);
    let mut rt = Runtime::new(Config::default(), hooks);

    let region = rt.open_root_region().unwrap();
    let task = rt.spawn_task(region, None, 0).unwrap();
    let reason = asupersync_kernel::types::CancelReason::new(
        asupersync_kernel::types::CancelKind::User,
        region,
        Some(task),
        asupersync_kernel::types::Time::ZERO,
    );
    rt.request_cancel(task, reason).unwrap();
    rt.acknowledge_cancel(task).unwrap();
}
