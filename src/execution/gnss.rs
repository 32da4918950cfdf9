//! GNSS acquisition pipeline
//!
//! Powers the receiver on, collects valid fixes into the context's ring
//! buffer until it is full, then powers the receiver off.

use crate::core::{CommandTask, FailurePolicy, Fix, Throttle, TrackerContext};
use crate::execution::TaskMachine;
use crate::modem::{commands, Exchange, Transport};
use std::task::Poll;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Minimum spacing between two status queries
pub const INFO_INTERVAL: Duration = Duration::from_millis(3000);
const STATUS_BUDGET: Duration = Duration::from_millis(2000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GnssStep {
    PowerOn,
    Info,
    PowerOff,
    Done,
}

/// What one tick of the pipeline produced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GnssProgress {
    Working,
    /// A fix was accepted; carries the buffer size afterwards
    FixRecorded(usize),
    /// Acquisition finished; the pipeline is back at `PowerOn`
    Done,
}

pub struct GnssPipeline {
    step: GnssStep,
    machine: TaskMachine,
    power_on: CommandTask,
    power_off: CommandTask,
    poll_pace: Throttle,
    status_query: Option<Exchange>,
}

impl GnssPipeline {
    pub fn new() -> Self {
        Self {
            step: GnssStep::PowerOn,
            machine: TaskMachine::new("gnss"),
            power_on: CommandTask::new(commands::GNSS_POWER_ON, commands::OK, 6, Duration::from_millis(4000))
                .with_failure_policy(FailurePolicy::LogOnly),
            power_off: CommandTask::new(commands::GNSS_POWER_OFF, commands::OK, 3, Duration::from_millis(2000)),
            poll_pace: Throttle::new(),
            status_query: None,
        }
    }

    pub fn step(&self) -> GnssStep {
        self.step
    }

    pub fn power_on_task(&self) -> &CommandTask {
        &self.power_on
    }

    pub fn tick(&mut self, ctx: &mut TrackerContext, transport: &mut dyn Transport, now: Instant) -> GnssProgress {
        match self.step {
            GnssStep::PowerOn => {
                if self.machine.advance(&mut self.power_on, transport, now) {
                    self.power_on.rearm();
                    self.enter(GnssStep::Info);
                }
                GnssProgress::Working
            }
            GnssStep::Info => self.collect(ctx, transport, now),
            GnssStep::PowerOff => {
                if self.machine.advance(&mut self.power_off, transport, now) {
                    self.power_off.rearm();
                    self.enter(GnssStep::Done);
                }
                GnssProgress::Working
            }
            GnssStep::Done => {
                self.enter(GnssStep::PowerOn);
                GnssProgress::Done
            }
        }
    }

    fn collect(&mut self, ctx: &mut TrackerContext, transport: &mut dyn Transport, now: Instant) -> GnssProgress {
        if ctx.fixes.is_full() {
            self.status_query = None;
            self.enter(GnssStep::PowerOff);
            return GnssProgress::Working;
        }

        if self.status_query.is_none() {
            if !self.poll_pace.ready(now, INFO_INTERVAL) {
                return GnssProgress::Working;
            }
            self.poll_pace.rearm(now);
            self.status_query = Some(Exchange::new(commands::GNSS_INFO, STATUS_BUDGET));
        }

        let reply = match self.status_query.as_mut().map(|query| query.poll(transport, now)) {
            Some(Poll::Ready(reply)) => reply,
            _ => return GnssProgress::Working,
        };
        self.status_query = None;

        let mut fix = match Fix::parse(&reply.text()) {
            Ok(fix) => fix,
            Err(e) => {
                debug!("No usable fix: {}", e);
                return GnssProgress::Working;
            }
        };
        if !fix.assess(&ctx.runtime.precision) {
            debug!(hdop = ?fix.hdop, "Fix rejected");
            return GnssProgress::Working;
        }

        info!(
            latitude = %fix.latitude.to_decimal_string(),
            longitude = %fix.longitude.to_decimal_string(),
            time = %fix.local_time(ctx.utc_offset_hours).unwrap_or_default(),
            "Fix acquired"
        );
        ctx.record_fix(fix);
        let buffered = ctx.fixes.len();
        if ctx.fixes.is_full() {
            self.enter(GnssStep::PowerOff);
        }
        GnssProgress::FixRecorded(buffered)
    }

    fn enter(&mut self, next: GnssStep) {
        debug!(from = ?self.step, to = ?next, "GNSS step");
        self.step = next;
    }
}

impl Default for GnssPipeline {
    fn default() -> Self {
        Self::new()
    }
}
