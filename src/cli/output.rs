//! CLI output formatting

use crate::core::RuntimeConfig;
use crate::execution::{GlobalStep, TrackerEvent};
use crate::payload::ControlMessage;
use console::Emoji;
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SATELLITE: Emoji<'_, '_> = Emoji("🛰️  ", "* ");

/// Short display name of a global step
pub fn format_step(step: GlobalStep) -> String {
    let name = match step {
        GlobalStep::InitGlobal => "init",
        GlobalStep::Gnss => "gnss",
        GlobalStep::ComposeJson => "compose",
        GlobalStep::Send4g => "send",
        GlobalStep::EndGlobal => "end",
    };
    style(name).cyan().to_string()
}

/// Format a tracker event for display
pub fn format_tracker_event(event: &TrackerEvent) -> String {
    match event {
        TrackerEvent::CycleStarted { cycle } => {
            format!("{} Cycle {} started", ROCKET, style(cycle).bold())
        }
        TrackerEvent::StepChanged { from, to } => format!(
            "{} {} → {}",
            INFO,
            style(format_step(*from)).dim(),
            format_step(*to)
        ),
        TrackerEvent::FixRecorded { buffered } => {
            format!("{} Fix recorded ({} buffered)", SATELLITE, style(buffered).cyan())
        }
        TrackerEvent::BatchComposed { records, bytes } => format!(
            "{} Batch of {} records composed ({} bytes JSON)",
            INFO,
            style(records).cyan(),
            bytes
        ),
        TrackerEvent::BearerReady => format!("{} Bearer {}", CHECK, style("ready").green()),
        TrackerEvent::BatchSent { rotated } => {
            if *rotated {
                format!("{} Batch {}, oldest fix rotated out", CHECK, style("sent").green())
            } else {
                format!("{} Batch {}", CHECK, style("sent").green())
            }
        }
        TrackerEvent::BatchAbandoned { reason } => {
            format!("{} Batch {}: {}", CROSS, style("abandoned").red(), style(reason).dim())
        }
        TrackerEvent::ControlApplied { message } => {
            format!("{} Control message applied: {}", WARN, format_control(message))
        }
        TrackerEvent::CycleCompleted { cycle } => {
            format!("{} Cycle {} {}", CHECK, style(cycle).bold(), style("completed").green())
        }
    }
}

/// One-line summary of the options a control message carries
pub fn format_control(message: &ControlMessage) -> String {
    if message.is_empty() {
        return style("no options").dim().to_string();
    }
    let mut parts = Vec::new();
    if let Some(period) = message.periode {
        parts.push(format!("period={}", format_duration(Duration::from_millis(period))));
    }
    if let Some(start) = message.start {
        parts.push(format!("start={}", start));
    }
    if let Some(precision) = &message.precision {
        if let Some(threshold) = precision.valeur {
            parts.push(format!("precision.threshold={}", threshold));
        }
        if let Some(active) = precision.active {
            parts.push(format!("precision.active={}", active));
        }
    }
    parts.join(", ")
}

/// Multi-line rendering of the runtime options
pub fn format_runtime(runtime: &RuntimeConfig) -> String {
    format!(
        "  Adjustment period: {}\n  Start: {}\n  Precision filter: {} (HDOP < {})",
        style(format_duration(runtime.adjustment_period)).cyan(),
        style(runtime.start).cyan(),
        if runtime.precision.active {
            style("active").green()
        } else {
            style("inactive").dim()
        },
        runtime.precision.threshold
    )
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    let millis = duration.subsec_millis();
    if secs < 60 {
        if millis == 0 {
            format!("{}s", secs)
        } else {
            format!("{}.{:03}s", secs, millis)
        }
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
