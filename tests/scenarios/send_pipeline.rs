//! Test: CBOR send pipeline against a scripted collector link

use crate::helpers::*;
use gnss_tracker::core::{Coordinate, Fix, TrackerConfig, TrackerContext};
use gnss_tracker::execution::{AbandonReason, CborSendPipeline, SendProgress, SendStep};
use gnss_tracker::payload::compose_batch;
use serde_json::json;

fn context_with_fixes(count: i32) -> TrackerContext {
    let mut ctx = TrackerContext::new(DEVICE_ID, &TrackerConfig::default());
    for n in 0..count {
        ctx.record_fix(Fix::from_coordinates(
            Coordinate::new(47, format!("{}", 100 + n)),
            Coordinate::new(4, "456"),
        ));
    }
    ctx.payload = compose_batch(&ctx.device_id, &mut ctx.fixes).unwrap();
    ctx
}

/// Tick every `TICK_MS` until the pipeline reports something other than progress
fn run_send(
    pipeline: &mut CborSendPipeline,
    ctx: &mut TrackerContext,
    modem: &mut ScriptedModem,
    clock: &mut Clock,
    max_ticks: usize,
) -> Vec<SendProgress> {
    let mut reported = Vec::new();
    for _ in 0..max_ticks {
        let progress = pipeline.tick(ctx, modem, clock.advance(TICK_MS));
        match progress {
            SendProgress::InProgress => {}
            SendProgress::ControlApplied(_) => reported.push(progress),
            _ => {
                reported.push(progress);
                return reported;
            }
        }
    }
    panic!("send pipeline stuck at {:?}", pipeline.step());
}

#[test]
fn test_happy_path_sends_batch_and_rotates_one_entry() {
    let mut ctx = context_with_fixes(3);
    let mut pipeline = CborSendPipeline::new();
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    let reported = run_send(&mut pipeline, &mut ctx, &mut modem, &mut clock, 60);

    assert_eq!(reported, vec![SendProgress::Completed { rotated: true }]);
    assert_eq!(pipeline.step(), SendStep::Init);
    assert_eq!(ctx.fixes.len(), 2);
    assert_eq!(ctx.fixes.front().unwrap().fix.latitude.to_decimal_string(), "47.101");

    let sent: Vec<&str> = modem.commands_sent().iter().map(String::as_str).collect();
    let payload = &modem.payloads()[0];
    assert_eq!(
        sent,
        vec![
            "AT+CEREG?",
            "AT+CAOPEN=0,0,\"TCP\",\"rnqrg-185-223-151-250.a.free.pinggy.link\",32913",
            format!("AT+CASEND=0,{}", payload.len()).as_str(),
            "AT+CARECV=0,100",
            "AT+CACLOSE=0",
        ]
    );
}

#[test]
fn test_written_payload_is_cbor_of_composed_json() {
    let mut ctx = context_with_fixes(1);
    let mut pipeline = CborSendPipeline::new();
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    run_send(&mut pipeline, &mut ctx, &mut modem, &mut clock, 60);

    assert_eq!(modem.payloads().len(), 1);
    let decoded: serde_json::Value = serde_cbor::from_slice(&modem.payloads()[0]).unwrap();
    assert_eq!(
        decoded,
        json!([{"imei": DEVICE_ID, "latitude": 47.1, "longitude": 4.456}])
    );
}

#[test]
fn test_missing_prompt_escalates_and_abandons_batch() {
    let mut ctx = context_with_fixes(2);
    let mut pipeline = CborSendPipeline::new();
    let mut modem = ScriptedModem::happy().mute("AT+CASEND");
    let mut clock = Clock::new();

    let reported = run_send(&mut pipeline, &mut ctx, &mut modem, &mut clock, 200);

    assert!(matches!(
        reported.as_slice(),
        [SendProgress::Abandoned(AbandonReason::ByteCount(_))]
    ));
    assert_eq!(pipeline.step(), SendStep::Init);
    assert!(ctx.payload.is_empty());
    // nothing consumed, nothing written
    assert_eq!(ctx.fixes.len(), 2);
    assert!(modem.payloads().is_empty());
    // first attempt plus three retries
    assert_eq!(modem.count("AT+CASEND"), 4);
    assert!(pipeline.byte_count_task().is_none());
}

#[test]
fn test_registration_retries_without_limit() {
    let mut ctx = context_with_fixes(1);
    let mut pipeline = CborSendPipeline::new();
    let mut modem = ScriptedModem::happy().mute("AT+CEREG?");
    let mut clock = Clock::new();

    for _ in 0..200 {
        pipeline.tick(&mut ctx, &mut modem, clock.advance(TICK_MS));
    }

    assert_eq!(pipeline.step(), SendStep::VerifyRegistration);
    // more writes than a single 15-retry budget allows
    assert!(modem.count("AT+CEREG?") > 16);
    assert_eq!(modem.count("AT+CAOPEN"), 0);
}

#[test]
fn test_unanswered_receive_closes_socket() {
    let mut ctx = context_with_fixes(1);
    let mut pipeline = CborSendPipeline::new();
    let mut modem = ScriptedModem::happy().mute("AT+CARECV");
    let mut clock = Clock::new();

    let reported = run_send(&mut pipeline, &mut ctx, &mut modem, &mut clock, 60);

    assert_eq!(reported, vec![SendProgress::Completed { rotated: true }]);
    assert_eq!(modem.count("AT+CACLOSE"), 1);
}
