//! Test: Global orchestrator - full tracker cycles

use crate::helpers::*;
use gnss_tracker::core::RING_CAPACITY;
use gnss_tracker::execution::{GlobalStep, Send4gStep, TrackerEvent};
use gnss_tracker::persistence::TrackerStore;

#[test]
fn test_first_cycle_event_sequence() {
    let mut orchestrator = orchestrator();
    let events = record_events(&mut orchestrator);
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| o.context().cycles == 1);

    let events = events.lock().unwrap();
    let milestones: Vec<&TrackerEvent> = events
        .iter()
        .filter(|event| !matches!(event, TrackerEvent::StepChanged { .. }))
        .collect();

    assert_eq!(milestones[0], &TrackerEvent::CycleStarted { cycle: 1 });
    for (i, buffered) in (1..=RING_CAPACITY).enumerate() {
        assert_eq!(milestones[1 + i], &TrackerEvent::FixRecorded { buffered });
    }
    assert!(matches!(
        milestones[1 + RING_CAPACITY],
        TrackerEvent::BatchComposed { records: 10, .. }
    ));
    assert_eq!(
        &milestones[2 + RING_CAPACITY..],
        &[
            &TrackerEvent::BearerReady,
            &TrackerEvent::BatchSent { rotated: true },
            &TrackerEvent::CycleCompleted { cycle: 1 },
        ]
    );

    let steps: Vec<GlobalStep> = events
        .iter()
        .filter_map(|event| match event {
            TrackerEvent::StepChanged { to, .. } => Some(*to),
            _ => None,
        })
        .collect();
    assert_eq!(
        steps,
        vec![
            GlobalStep::Gnss,
            GlobalStep::ComposeJson,
            GlobalStep::Send4g,
            GlobalStep::EndGlobal,
            GlobalStep::InitGlobal,
        ]
    );
}

#[test]
fn test_cycle_leaves_buffer_one_short_and_clears_payload() {
    let mut orchestrator = orchestrator();
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| o.context().cycles == 1);

    assert_eq!(orchestrator.step(), GlobalStep::InitGlobal);
    assert_eq!(orchestrator.context().fixes.len(), RING_CAPACITY - 1);
    assert!(orchestrator.context().payload.is_empty());
    assert_eq!(orchestrator.send4g_step(), Send4gStep::Bearer);

    // the next cycle needs a single new fix to fill the buffer again
    let queries_before = modem.count("AT+CGNSINF");
    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| o.context().cycles == 2);
    assert_eq!(modem.count("AT+CGNSINF") - queries_before, 1);
    assert_eq!(modem.payloads().len(), 2);
}

#[test]
fn test_bearer_runs_before_every_send() {
    let mut orchestrator = orchestrator();
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 600, |o| o.context().cycles == 2);

    assert_eq!(modem.count("AT+CNMP=38"), 2);
    assert_eq!(modem.count("AT+CNACT=0,1"), 2);
    assert_eq!(modem.count("AT+CAOPEN"), 2);

    let sent = modem.commands_sent();
    let bearer_up = sent.iter().position(|c| c == "AT+COPS?").unwrap();
    let socket_open = sent.iter().position(|c| c.starts_with("AT+CAOPEN")).unwrap();
    assert!(bearer_up < socket_open);
}

#[test]
fn test_abandoned_batch_restarts_cycle() {
    let mut orchestrator = orchestrator();
    let events = record_events(&mut orchestrator);
    let mut modem = ScriptedModem::happy().mute("AT+CASEND");
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 400, |_| {
        events
            .lock()
            .unwrap()
            .iter()
            .any(|event| matches!(event, TrackerEvent::BatchAbandoned { .. }))
    });

    assert_eq!(orchestrator.step(), GlobalStep::InitGlobal);
    assert_eq!(orchestrator.context().cycles, 0);
    assert!(orchestrator.context().payload.is_empty());
    assert_eq!(orchestrator.context().fixes.len(), RING_CAPACITY);
    assert!(modem.payloads().is_empty());

    // the restart goes straight back to acquisition
    orchestrator.tick(&mut modem, clock.advance(TICK_MS));
    assert_eq!(orchestrator.step(), GlobalStep::Gnss);
}

#[test]
fn test_end_global_waits_out_adjustment_period() {
    let mut orchestrator = orchestrator();
    orchestrator.context_mut().runtime.adjustment_period = std::time::Duration::from_secs(600);
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    let ticks = tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| {
        o.step() == GlobalStep::EndGlobal
    });
    assert!((ticks as u64) * TICK_MS < 600_000);

    for _ in 0..20 {
        orchestrator.tick(&mut modem, clock.advance(TICK_MS));
    }
    assert_eq!(orchestrator.step(), GlobalStep::EndGlobal);
    assert_eq!(orchestrator.context().cycles, 0);

    orchestrator.tick(&mut modem, clock.advance(600_000));
    assert_eq!(orchestrator.step(), GlobalStep::InitGlobal);
    assert_eq!(orchestrator.context().cycles, 1);
}

#[test]
fn test_compose_persists_latest_fix() {
    let mut orchestrator = orchestrator().with_store(TrackerStore::in_memory());
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| {
        o.step() == GlobalStep::Send4g
    });

    let stored = orchestrator.store().unwrap().load_last_fix().unwrap().unwrap();
    assert_eq!(stored.latitude.to_decimal_string(), "47.123");
    assert_eq!(stored.longitude.to_decimal_string(), "4.456");
    assert_eq!(stored.timestamp, "20240101120000.000");
}
