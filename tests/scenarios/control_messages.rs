//! Test: Control messages pushed down by the collector

use crate::helpers::*;
use gnss_tracker::core::RING_CAPACITY;
use gnss_tracker::execution::{GlobalStep, TrackerEvent};
use gnss_tracker::payload::{ControlMessage, PrecisionOption};
use serde_json::json;
use std::time::Duration;

fn applied(events: &[TrackerEvent]) -> Vec<ControlMessage> {
    events
        .iter()
        .filter_map(|event| match event {
            TrackerEvent::ControlApplied { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_periode_and_start_are_applied() {
    let mut orchestrator = orchestrator();
    let events = record_events(&mut orchestrator);
    let mut modem = ScriptedModem::happy();
    modem.reply_once("AT+CARECV", receive_reply(&cbor(json!({"periode": 600000, "start": true}))));
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| o.context().cycles == 1);

    assert_eq!(
        applied(&events.lock().unwrap()),
        vec![ControlMessage {
            periode: Some(600_000),
            start: Some(true),
            precision: None,
        }]
    );
    let runtime = &orchestrator.context().runtime;
    assert_eq!(runtime.adjustment_period, Duration::from_secs(600));
    // consumed by EndGlobal
    assert!(!runtime.start);
}

#[test]
fn test_start_skips_wait_only_once() {
    let mut orchestrator = orchestrator();
    let mut modem = ScriptedModem::happy();
    modem.reply_once("AT+CARECV", receive_reply(&cbor(json!({"periode": 600000, "start": true}))));
    let mut clock = Clock::new();

    // first cycle ends well inside the new ten-minute period
    let ticks = tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| o.context().cycles == 1);
    assert!((ticks as u64) * TICK_MS < 600_000);

    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| {
        o.step() == GlobalStep::EndGlobal
    });
    for _ in 0..30 {
        orchestrator.tick(&mut modem, clock.advance(TICK_MS));
    }
    assert_eq!(orchestrator.step(), GlobalStep::EndGlobal);
    assert_eq!(orchestrator.context().cycles, 1);
}

#[test]
fn test_precision_message_gates_next_fixes() {
    let mut orchestrator = orchestrator();
    let events = record_events(&mut orchestrator);
    let mut modem = ScriptedModem::happy();
    modem.reply_once(
        "AT+CARECV",
        receive_reply(&cbor(json!({"precision": {"valeur": 1, "active": true}}))),
    );
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| o.context().cycles == 1);
    assert_eq!(
        applied(&events.lock().unwrap())[0].precision,
        Some(PrecisionOption {
            valeur: Some(1),
            active: Some(true),
        })
    );

    // HDOP 1.2 no longer passes, so the buffer never refills
    for _ in 0..60 {
        orchestrator.tick(&mut modem, clock.advance(TICK_MS));
    }
    assert_eq!(orchestrator.step(), GlobalStep::Gnss);
    assert_eq!(orchestrator.context().fixes.len(), RING_CAPACITY - 1);
}

#[test]
fn test_undecodable_message_is_discarded() {
    let mut orchestrator = orchestrator();
    let events = record_events(&mut orchestrator);
    let mut modem = ScriptedModem::happy();
    modem.reply_once("AT+CARECV", receive_reply(&[0xff, 0x00, 0x13]));
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| o.context().cycles == 1);

    assert!(applied(&events.lock().unwrap()).is_empty());
    assert_eq!(
        orchestrator.context().runtime.adjustment_period,
        Duration::from_millis(30_000)
    );
    assert_eq!(modem.count("AT+CACLOSE"), 1);
}

#[test]
fn test_empty_map_is_still_a_control_message() {
    let mut orchestrator = orchestrator();
    let events = record_events(&mut orchestrator);
    let mut modem = ScriptedModem::happy();
    modem.reply_once("AT+CARECV", receive_reply(&cbor(json!({}))));
    let mut clock = Clock::new();

    tick_until(&mut orchestrator, &mut modem, &mut clock, 300, |o| o.context().cycles == 1);

    let applied = applied(&events.lock().unwrap());
    assert_eq!(applied.len(), 1);
    assert!(applied[0].is_empty());
}
