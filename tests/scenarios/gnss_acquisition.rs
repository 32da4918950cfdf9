//! Test: GNSS acquisition - power on, collect fixes, power off

use crate::helpers::*;
use gnss_tracker::core::{TrackerConfig, TrackerContext, RING_CAPACITY};
use gnss_tracker::execution::{GnssPipeline, GnssProgress, GnssStep};

fn context() -> TrackerContext {
    TrackerContext::new(DEVICE_ID, &TrackerConfig::default())
}

#[test]
fn test_collects_until_buffer_full_then_powers_off() {
    let mut pipeline = GnssPipeline::new();
    let mut ctx = context();
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    let mut recorded = Vec::new();
    let mut finished = false;
    for _ in 0..100 {
        match pipeline.tick(&mut ctx, &mut modem, clock.advance(TICK_MS)) {
            GnssProgress::FixRecorded(buffered) => recorded.push(buffered),
            GnssProgress::Done => {
                finished = true;
                break;
            }
            GnssProgress::Working => {}
        }
    }

    assert!(finished);
    assert_eq!(recorded, (1..=RING_CAPACITY).collect::<Vec<_>>());
    assert!(ctx.fixes.is_full());
    assert!(ctx.fixes.iter().all(|entry| entry.fix.valid));
    assert_eq!(pipeline.step(), GnssStep::PowerOn);
    assert_eq!(modem.commands_sent().first().map(String::as_str), Some("AT+CGNSPWR=1"));
    assert_eq!(modem.commands_sent().last().map(String::as_str), Some("AT+CGNSPWR=0"));
    assert_eq!(modem.count("AT+CGNSINF"), RING_CAPACITY);
}

#[test]
fn test_status_queries_are_spaced_by_info_interval() {
    let mut pipeline = GnssPipeline::new();
    let mut ctx = context();
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    // power on takes three ticks, then one query every 3 s
    for _ in 0..3 + 12 {
        pipeline.tick(&mut ctx, &mut modem, clock.advance(1000));
    }

    // queries at 4 s, 8 s, 12 s (strictly more than 3 s apart)
    assert_eq!(modem.count("AT+CGNSINF"), 3);
    assert_eq!(ctx.fixes.len(), 3);
}

#[test]
fn test_zero_coordinates_are_dropped() {
    let mut pipeline = GnssPipeline::new();
    let mut ctx = context();
    let mut modem = ScriptedModem::happy().reply("AT+CGNSINF", GNSS_NO_FIX);
    let mut clock = Clock::new();

    for _ in 0..60 {
        assert!(!matches!(
            pipeline.tick(&mut ctx, &mut modem, clock.advance(TICK_MS)),
            GnssProgress::FixRecorded(_)
        ));
    }

    assert_eq!(pipeline.step(), GnssStep::Info);
    assert!(ctx.fixes.is_empty());
    assert!(modem.count("AT+CGNSINF") > 10);
}

#[test]
fn test_precision_filter_rejects_imprecise_fix() {
    let mut pipeline = GnssPipeline::new();
    let mut ctx = context();
    ctx.runtime.precision.active = true;
    ctx.runtime.precision.threshold = 1;
    let mut modem = ScriptedModem::happy();
    let mut clock = Clock::new();

    for _ in 0..20 {
        pipeline.tick(&mut ctx, &mut modem, clock.advance(TICK_MS));
    }
    // HDOP 1.2 is not below 1
    assert!(ctx.fixes.is_empty());

    ctx.runtime.precision.threshold = 2;
    for _ in 0..6 {
        pipeline.tick(&mut ctx, &mut modem, clock.advance(TICK_MS));
    }
    assert!(!ctx.fixes.is_empty());
}

#[test]
fn test_power_on_failure_stalls_acquisition() {
    let mut pipeline = GnssPipeline::new();
    let mut ctx = context();
    let mut modem = ScriptedModem::happy().mute("AT+CGNSPWR");
    let mut clock = Clock::new();

    for _ in 0..200 {
        pipeline.tick(&mut ctx, &mut modem, clock.advance(TICK_MS));
    }

    assert_eq!(pipeline.step(), GnssStep::PowerOn);
    assert_eq!(modem.count("AT+CGNSPWR=1"), 7);
    assert_eq!(modem.count("AT+CGNSINF"), 0);
}
