//! Cellular bearer bring-up
//!
//! Selects CAT-M1, defines and configures the PDP context on the APN,
//! waits for network registration and activates the context. Plain
//! configuration commands go through exchanges; the two steps whose
//! acknowledgement matters (PDP definition, registration) are tasks.

use crate::core::{CommandTask, TrackerContext};
use crate::execution::TaskMachine;
use crate::modem::response::{parse_signal_quality, pdp_address, select_field};
use crate::modem::{commands, Exchange, ExchangeReply, ExchangeSequence, Transport};
use std::task::Poll;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

const COMMAND_BUDGET: Duration = Duration::from_millis(1000);
const ACTIVATION_BUDGET: Duration = Duration::from_millis(15_000);
const STATUS_BUDGET: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerStep {
    RadioMode,
    DefinePdp,
    ConfigurePdp,
    Registration,
    Activate,
    Diagnostics,
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BearerProgress {
    InProgress,
    /// Bearer is up; the pipeline is back at `RadioMode` for the next cycle
    Ready,
}

pub struct BearerPipeline {
    step: BearerStep,
    machine: TaskMachine,
    define_pdp: Option<CommandTask>,
    registration: CommandTask,
    sequence: Option<ExchangeSequence>,
    activation: Option<Exchange>,
}

impl BearerPipeline {
    pub fn new() -> Self {
        Self {
            step: BearerStep::RadioMode,
            machine: TaskMachine::new("bearer"),
            define_pdp: None,
            registration: CommandTask::new(
                commands::REGISTRATION_QUERY,
                commands::REGISTERED,
                15,
                Duration::from_millis(100),
            ),
            sequence: None,
            activation: None,
        }
    }

    pub fn step(&self) -> BearerStep {
        self.step
    }

    pub fn tick(&mut self, ctx: &TrackerContext, transport: &mut dyn Transport, now: Instant) -> BearerProgress {
        match self.step {
            BearerStep::RadioMode => {
                let sequence = self.sequence.get_or_insert_with(|| {
                    ExchangeSequence::new([
                        (commands::PREFER_LTE, COMMAND_BUDGET),
                        (commands::PREFER_CATM1, COMMAND_BUDGET),
                        (commands::DEACTIVATE_PDP, COMMAND_BUDGET),
                    ])
                });
                if sequence.poll(transport, now).is_ready() {
                    self.sequence = None;
                    self.enter(BearerStep::DefinePdp);
                }
            }
            BearerStep::DefinePdp => {
                let task = self.define_pdp.get_or_insert_with(|| {
                    CommandTask::new(commands::define_pdp(&ctx.apn), commands::OK, 10, Duration::from_millis(100))
                });
                if self.machine.advance(task, transport, now) {
                    self.define_pdp = None;
                    self.enter(BearerStep::ConfigurePdp);
                }
            }
            BearerStep::ConfigurePdp => {
                let sequence = self.sequence.get_or_insert_with(|| {
                    ExchangeSequence::new([
                        (commands::NETWORK_APN.to_string(), COMMAND_BUDGET),
                        (commands::configure_pdp(&ctx.apn), COMMAND_BUDGET),
                    ])
                });
                if let Poll::Ready(replies) = sequence.poll(transport, now) {
                    self.sequence = None;
                    if let Some(apn) = replies.first().and_then(|r| select_field(&r.text(), "+CGNAPN", 1)) {
                        debug!(apn = %apn, "Network APN");
                    }
                    self.enter(BearerStep::Registration);
                }
            }
            BearerStep::Registration => {
                if self.machine.advance(&mut self.registration, transport, now) {
                    self.registration.rearm();
                    self.enter(BearerStep::Activate);
                }
            }
            BearerStep::Activate => {
                let exchange = self
                    .activation
                    .get_or_insert_with(|| Exchange::new(commands::ACTIVATE_PDP, ACTIVATION_BUDGET));
                if let Poll::Ready(reply) = exchange.poll(transport, now) {
                    self.activation = None;
                    match select_field(&reply.text(), "PDP", 1) {
                        Some(state) if state == "ACTIVE" => info!("PDP context active"),
                        state => warn!(state = ?state, "PDP context not reported active"),
                    }
                    self.enter(BearerStep::Diagnostics);
                }
            }
            BearerStep::Diagnostics => {
                let sequence = self.sequence.get_or_insert_with(|| {
                    ExchangeSequence::new([
                        (commands::PDP_STATUS, STATUS_BUDGET),
                        (commands::SIGNAL_QUALITY, COMMAND_BUDGET),
                        (commands::OPERATOR, COMMAND_BUDGET),
                    ])
                });
                if let Poll::Ready(replies) = sequence.poll(transport, now) {
                    self.sequence = None;
                    log_diagnostics(&replies);
                    self.enter(BearerStep::Ready);
                }
            }
            BearerStep::Ready => {
                self.enter(BearerStep::RadioMode);
                return BearerProgress::Ready;
            }
        }
        BearerProgress::InProgress
    }

    fn enter(&mut self, next: BearerStep) {
        debug!(from = ?self.step, to = ?next, "Bearer step");
        self.step = next;
    }
}

impl Default for BearerPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn log_diagnostics(replies: &[ExchangeReply]) {
    for reply in replies {
        let text = reply.text();
        match reply.command.as_str() {
            commands::PDP_STATUS => {
                if let Some(address) = pdp_address(&text, 0) {
                    info!(address = %address, "PDP address");
                }
            }
            commands::SIGNAL_QUALITY => {
                if let Some((rssi, ber)) = parse_signal_quality(&text) {
                    info!(rssi, ber, "Signal quality");
                }
            }
            commands::OPERATOR => {
                if let Some(operator) = select_field(&text, "+COPS", 2) {
                    info!(operator = %operator, "Operator");
                }
            }
            _ => {}
        }
    }
}
