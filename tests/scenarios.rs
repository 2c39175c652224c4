//! End-to-end scenarios S1-S7 (SPEC_FULL.md), exercising the channel,
//! timer wheel, region/obligation lifecycle, cancellation, and event
//! journal together rather than unit-by-unit.

use asupersync_kernel::channel::{Channel, RecvOutcome, ReserveOutcome};
use asupersync_kernel::config::Config;
use asupersync_kernel::hooks::{DetRngEntropy, HostHooks, ManualClock};
use asupersync_kernel::runtime::Runtime;
use asupersync_kernel::scenario::{ScenarioEnvelope, ScenarioRunner};
use asupersync_kernel::timer::TimerWheel;
use asupersync_kernel::transition::ObligationState;
use asupersync_kernel::types::{CancelKind, Time};

fn runtime(seed: u64) -> Runtime {
    let hooks = HostHooks::new()
        .with_logical_clock(Box::new(ManualClock::new()))
        .with_entropy(Box::new(DetRngEntropy::seeded(seed)), true);
    Runtime::new(Config::default(), hooks)
}

// S1 - two_phase_send_recv: capacity-1 channel, reserve -> send(x) -> recv
// returns Ok(x); used_slots returns to 0; no leaked reservation.
#[test]
fn s1_two_phase_send_recv() {
    let mut ch: Channel<i32> = Channel::new(1);
    let waiter = ch.next_waiter();
    let ReserveOutcome::Ready(permit) = ch.reserve(waiter, false) else {
        panic!("expected a ready reservation on an empty capacity-1 channel");
    };
    assert_eq!(ch.used_slots(), 1);

    ch.send(permit, 42).expect("receiver is alive");
    assert_eq!(ch.used_slots(), 1);

    let RecvOutcome::Ready(value) = ch.recv(false) else {
        panic!("expected the sent value to be ready");
    };
    assert_eq!(value, 42);
    assert_eq!(ch.used_slots(), 0);
}

// S2 - permit_abort_releases_slot: capacity-1, reserve -> register a second
// waiter via reserve -> abort the first permit -> the second waiter is
// woken and eventually acquires the permit.
#[test]
fn s2_permit_abort_releases_slot() {
    let mut ch: Channel<i32> = Channel::new(1);
    let w1 = ch.next_waiter();
    let ReserveOutcome::Ready(first) = ch.reserve(w1, false) else {
        panic!("first reserve should succeed immediately");
    };

    let w2 = ch.next_waiter();
    assert_eq!(ch.reserve(w2, false), ReserveOutcome::Pending);

    ch.abort(first);
    assert_eq!(ch.take_woken_senders(), vec![w2]);

    let ReserveOutcome::Ready(_second) = ch.reserve(w2, false) else {
        panic!("woken second waiter should now acquire the slot");
    };
}

// S3 - same_deadline_insertion_order: register A, B, C at identical
// deadline D in that order; advance to D; fired order is exactly A, B, C.
#[test]
fn s3_same_deadline_insertion_order() {
    let mut wheel: TimerWheel<&'static str> = TimerWheel::with_capacity(16);
    let now = Time::ZERO;
    let deadline = Time::from_millis(100);
    wheel.register(now, deadline, "A").unwrap();
    wheel.register(now, deadline, "B").unwrap();
    wheel.register(now, deadline, "C").unwrap();

    let fired = wheel.collect_expired(deadline);
    assert_eq!(fired, vec!["A", "B", "C"]);
}

// S4 - stale_timer_handle_rejected: register T1 at H1; cancel H1; register
// T2 (reusing the slot, incremented generation). cancel(H1) on the stale
// value returns false; cancel(handle_of(T2)) returns true.
#[test]
fn s4_stale_timer_handle_rejected() {
    let mut wheel: TimerWheel<&'static str> = TimerWheel::with_capacity(16);
    let now = Time::ZERO;
    let deadline = Time::from_millis(50);

    let h1 = wheel.register(now, deadline, "T1").unwrap();
    assert!(wheel.cancel(h1));

    let h2 = wheel.register(now, deadline, "T2").unwrap();
    assert_eq!(h1.slot_index(), h2.slot_index(), "the freed slot should be reused");
    assert_ne!(h1.generation(), h2.generation(), "reuse must bump the generation");

    assert!(!wheel.cancel(h1), "the stale handle value must be rejected");
    assert!(wheel.cancel(h2), "the fresh handle must still be live");
}

// S5 - region_close_surfaces_leak: open a region, reserve obligation O,
// request region close, drain; region reaches Closed with O transitioned
// to Leaked and a journal event recording the leak is present.
#[test]
fn s5_region_close_surfaces_leak() {
    let mut rt = runtime(1);
    let mut runner = ScenarioRunner::new(&mut rt, 32);
    let envelope: ScenarioEnvelope = serde_json::from_str(
        r#"{
            "scenario_id": "s5",
            "version": 1,
            "seed": 1,
            "ops": [
                {"id": "r0", "op": "SpawnRegion", "args": {"parent": null}},
                {"id": "o0", "op": "ReserveObligation", "args": {"region": "r0"}},
                {"id": "c0", "op": "CloseRegion", "args": {"region": "r0"}},
                {"id": "a0", "op": "Assert", "args": {"condition": "region_closed:r0"}},
                {"id": "a1", "op": "Assert", "args": {"condition": "obligation_resolved:o0"}}
            ]
        }"#,
    )
    .unwrap();

    let report = runner.run(&envelope).unwrap();
    let obligation = runner.obligation("o0").unwrap();
    assert_eq!(rt.obligation(obligation).unwrap().state(), ObligationState::Leaked);

    let leaked_event = runner
        .journal()
        .events()
        .iter()
        .find(|e| matches!(&e.kind, asupersync_kernel::journal::EventKind::ObligationResolved { to, .. } if *to == ObligationState::Leaked));
    assert!(leaked_event.is_some(), "expected a journal event recording the leak");
    assert!(report.matched_expected);
}

// S6 - cancel_strengthening_monotone: a running task is cancelled with
// User, then Shutdown, then User again. Final witness kind is Shutdown;
// the second User request is declined (no weakening), and the journal
// records a CancelStrengthened event with declined=true and the
// original (stronger) severity preserved.
#[test]
fn s6_cancel_strengthening_monotone() {
    let mut rt = runtime(2);
    let mut runner = ScenarioRunner::new(&mut rt, 32);
    let envelope: ScenarioEnvelope = serde_json::from_str(
        r#"{
            "scenario_id": "s6",
            "version": 1,
            "seed": 2,
            "ops": [
                {"id": "r0", "op": "SpawnRegion", "args": {"parent": null}},
                {"id": "t0", "op": "SpawnTask", "args": {"region": "r0"}},
                {"id": "c0", "op": "RequestCancel", "args": {"task": "t0", "region": "r0", "kind": "User"}},
                {"id": "c1", "op": "RequestCancel", "args": {"task": "t0", "region": "r0", "kind": "Shutdown"}},
                {"id": "c2", "op": "RequestCancel", "args": {"task": "t0", "region": "r0", "kind": "User"}}
            ]
        }"#,
    )
    .unwrap();

    let report = runner.run(&envelope).unwrap();
    assert!(report.matched_expected);

    let task = runner.task("t0").unwrap();
    let witness = runner.runtime().cancellation().witness(task).expect("witness installed on first cancel");
    assert_eq!(witness.reason.kind, CancelKind::Shutdown);
    assert_eq!(witness.reason.kind.severity(), 5);

    let strengthened: Vec<_> = runner
        .journal()
        .events()
        .iter()
        .filter_map(|e| match &e.kind {
            asupersync_kernel::journal::EventKind::CancelStrengthened { task: t, kind, declined } if *t == task => {
                Some((*kind, *declined))
            }
            _ => None,
        })
        .collect();

    assert_eq!(strengthened.len(), 3, "expected one CancelStrengthened event per RequestCancel op");
    assert_eq!(strengthened[0], (CancelKind::User, false));
    assert_eq!(strengthened[1], (CancelKind::Shutdown, false));
    assert_eq!(
        strengthened[2],
        (CancelKind::Shutdown, true),
        "weakening to User after Shutdown must be declined with the original severity preserved"
    );
}

// S7 - deterministic_replay_digest: running the same scenario with the
// same seed twice (fresh runtime each time) produces equal, non-zero
// digests; altering a single op's argument changes the digest.
#[test]
fn s7_deterministic_replay_digest() {
    fn envelope(value: i64) -> ScenarioEnvelope {
        serde_json::from_str(&format!(
            r#"{{
                "scenario_id": "s7",
                "version": 1,
                "seed": 42,
                "ops": [
                    {{"id": "r0", "op": "SpawnRegion", "args": {{"parent": null}}}},
                    {{"id": "o0", "op": "ReserveObligation", "args": {{"region": "r0"}}}},
                    {{"id": "o0c", "op": "CommitObligation", "args": {{"obligation": "o0"}}}},
                    {{"id": "res0", "op": "ChannelReserve", "args": {{"channel": "ch", "capacity": 1}}}},
                    {{"id": "send0", "op": "ChannelSend", "args": {{"channel": "ch", "permit": "res0", "value": {value}}}}}
                ]
            }}"#
        ))
        .unwrap()
    }

    let run = |value: i64| {
        let mut rt = runtime(42);
        let mut runner = ScenarioRunner::new(&mut rt, 32);
        runner.run(&envelope(value)).unwrap().digest
    };

    let first = run(7);
    let second = run(7);
    assert_eq!(first, second);
    assert_ne!(first, 0);

    let altered = run(8);
    assert_ne!(first, altered, "altering a single op argument must change the digest");
}
