//! Global orchestrator - the top-level tracker cycle
//!
//! One cycle runs `InitGlobal -> Gnss -> ComposeJson -> Send4g -> EndGlobal`.
//! Send4g first brings the bearer up, then runs the CBOR send pipeline.
//! [`GlobalOrchestrator::poll`] is meant to be called from a fast host loop;
//! it only does work once per tick interval.

use crate::core::{Throttle, TrackerConfig, TrackerContext};
use crate::execution::{
    BearerPipeline, BearerProgress, CborSendPipeline, GnssPipeline, GnssProgress, SendProgress,
};
use crate::modem::Transport;
use crate::payload::{compose_batch, ControlMessage};
use crate::persistence::TrackerStore;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlobalStep {
    InitGlobal,
    Gnss,
    ComposeJson,
    Send4g,
    EndGlobal,
}

/// Sub-phase of `Send4g`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Send4gStep {
    Bearer,
    SendCbor,
}

/// Events that can occur during a tracker cycle
#[derive(Debug, Clone, PartialEq)]
pub enum TrackerEvent {
    CycleStarted {
        cycle: u64,
    },
    StepChanged {
        from: GlobalStep,
        to: GlobalStep,
    },
    FixRecorded {
        buffered: usize,
    },
    BatchComposed {
        records: usize,
        bytes: usize,
    },
    BearerReady,
    BatchSent {
        rotated: bool,
    },
    BatchAbandoned {
        reason: String,
    },
    ControlApplied {
        message: ControlMessage,
    },
    CycleCompleted {
        cycle: u64,
    },
}

/// Type for event handlers
pub type EventHandler = Box<dyn FnMut(&TrackerEvent) + Send>;

pub struct GlobalOrchestrator {
    ctx: TrackerContext,
    step: GlobalStep,
    send_step: Send4gStep,
    gnss: GnssPipeline,
    bearer: BearerPipeline,
    send: CborSendPipeline,
    tick_guard: Throttle,
    tick_interval: Duration,
    store: Option<TrackerStore>,
    handlers: Vec<EventHandler>,
}

impl GlobalOrchestrator {
    pub fn new(ctx: TrackerContext, tick_interval: Duration) -> Self {
        Self {
            ctx,
            step: GlobalStep::InitGlobal,
            send_step: Send4gStep::Bearer,
            gnss: GnssPipeline::new(),
            bearer: BearerPipeline::new(),
            send: CborSendPipeline::new(),
            tick_guard: Throttle::new(),
            tick_interval,
            store: None,
            handlers: Vec::new(),
        }
    }

    pub fn from_config(device_id: impl Into<String>, config: &TrackerConfig) -> Self {
        Self::new(
            TrackerContext::new(device_id, config),
            config.timing.tick_interval(),
        )
    }

    /// Persist the newest fix of every composed batch to `store`
    pub fn with_store(mut self, store: TrackerStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: FnMut(&TrackerEvent) + Send + 'static,
    {
        self.handlers.push(Box::new(handler));
    }

    pub fn step(&self) -> GlobalStep {
        self.step
    }

    pub fn send4g_step(&self) -> Send4gStep {
        self.send_step
    }

    pub fn context(&self) -> &TrackerContext {
        &self.ctx
    }

    pub fn context_mut(&mut self) -> &mut TrackerContext {
        &mut self.ctx
    }

    pub fn gnss(&self) -> &GnssPipeline {
        &self.gnss
    }

    pub fn bearer(&self) -> &BearerPipeline {
        &self.bearer
    }

    pub fn send_pipeline(&self) -> &CborSendPipeline {
        &self.send
    }

    pub fn store(&self) -> Option<&TrackerStore> {
        self.store.as_ref()
    }

    /// Run one tick if the tick interval has elapsed since the last one
    ///
    /// Returns the step the tick ran, or `None` when it was skipped.
    pub fn poll(&mut self, transport: &mut dyn Transport, now: Instant) -> Option<GlobalStep> {
        if !self.tick_guard.ready(now, self.tick_interval) {
            return None;
        }
        self.tick_guard.rearm(now);
        let step = self.step;
        self.tick(transport, now);
        Some(step)
    }

    /// Run one tick of the current step regardless of the tick interval
    pub fn tick(&mut self, transport: &mut dyn Transport, now: Instant) {
        match self.step {
            GlobalStep::InitGlobal => {
                self.ctx.cycle_started = Some(now);
                self.send_step = Send4gStep::Bearer;
                info!(cycle = self.ctx.cycles + 1, "Cycle started");
                self.emit(TrackerEvent::CycleStarted {
                    cycle: self.ctx.cycles + 1,
                });
                self.enter(GlobalStep::Gnss);
            }
            GlobalStep::Gnss => match self.gnss.tick(&mut self.ctx, transport, now) {
                GnssProgress::FixRecorded(buffered) => self.emit(TrackerEvent::FixRecorded { buffered }),
                GnssProgress::Done => self.enter(GlobalStep::ComposeJson),
                GnssProgress::Working => {}
            },
            GlobalStep::ComposeJson => self.compose(),
            GlobalStep::Send4g => self.send4g(transport, now),
            GlobalStep::EndGlobal => {
                let elapsed = self
                    .ctx
                    .cycle_started
                    .map(|started| now.saturating_duration_since(started))
                    .unwrap_or_default();
                let start_now = self.ctx.runtime.take_start();
                if start_now || elapsed >= self.ctx.runtime.adjustment_period {
                    if start_now {
                        info!("Start requested; skipping the rest of the adjustment period");
                    }
                    self.ctx.clear_cycle();
                    self.ctx.cycles += 1;
                    let cycle = self.ctx.cycles;
                    info!(cycle, "Cycle completed");
                    self.emit(TrackerEvent::CycleCompleted { cycle });
                    self.enter(GlobalStep::InitGlobal);
                }
            }
        }
    }

    fn compose(&mut self) {
        match compose_batch(&self.ctx.device_id, &mut self.ctx.fixes) {
            Ok(json) => {
                let records = self.ctx.fixes.len();
                debug!(records, payload = %json, "Batch composed");
                self.emit(TrackerEvent::BatchComposed {
                    records,
                    bytes: json.len(),
                });
                self.ctx.payload = json;
                self.persist_latest_fix();
                self.enter(GlobalStep::Send4g);
            }
            Err(e) => {
                warn!("Batch could not be composed: {}", e);
                self.enter(GlobalStep::EndGlobal);
            }
        }
    }

    fn persist_latest_fix(&mut self) {
        let (Some(store), Some(fix)) = (self.store.as_mut(), self.ctx.latest_fix()) else {
            return;
        };
        if let Err(e) = store.save_last_fix(fix) {
            warn!("Last fix not persisted: {}", e);
        }
    }

    fn send4g(&mut self, transport: &mut dyn Transport, now: Instant) {
        match self.send_step {
            Send4gStep::Bearer => {
                if self.bearer.tick(&self.ctx, transport, now) == BearerProgress::Ready {
                    self.send_step = Send4gStep::SendCbor;
                    self.emit(TrackerEvent::BearerReady);
                }
            }
            Send4gStep::SendCbor => match self.send.tick(&mut self.ctx, transport, now) {
                SendProgress::InProgress => {}
                SendProgress::ControlApplied(message) => {
                    self.emit(TrackerEvent::ControlApplied { message });
                }
                SendProgress::Completed { rotated } => {
                    self.emit(TrackerEvent::BatchSent { rotated });
                    self.send_step = Send4gStep::Bearer;
                    self.enter(GlobalStep::EndGlobal);
                }
                SendProgress::Abandoned(reason) => {
                    self.emit(TrackerEvent::BatchAbandoned {
                        reason: reason.to_string(),
                    });
                    self.send_step = Send4gStep::Bearer;
                    self.enter(GlobalStep::InitGlobal);
                }
            },
        }
    }

    fn enter(&mut self, next: GlobalStep) {
        if next == self.step {
            return;
        }
        info!(from = ?self.step, to = ?next, "Global step");
        self.emit(TrackerEvent::StepChanged {
            from: self.step,
            to: next,
        });
        self.step = next;
    }

    fn emit(&mut self, event: TrackerEvent) {
        for handler in self.handlers.iter_mut() {
            handler(&event);
        }
    }
}
