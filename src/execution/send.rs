//! CBOR send pipeline
//!
//! Ships the composed batch over a TCP socket opened by the modem:
//!
//! 1. `Init` encodes the payload and builds the byte-count task
//! 2. `VerifyRegistration` waits for network registration
//! 3. `OpenConnection` opens the socket
//! 4. `DefineByteCount` announces the payload size and waits for `>`
//! 5. `Write` pushes the raw CBOR bytes
//! 6. `Receive` drains any reply from the collector
//! 7. `ReceiveDecode` applies a decoded control message
//! 8. `CloseConnection` closes the socket
//! 9. `End` rotates the oldest buffered fix out and returns to `Init`
//!
//! All steps share one pacing throttle. Only the byte-count task unwinds the
//! pipeline when it runs out of retries; the registration, open and close
//! tasks keep the default policy and re-attempt forever.

use crate::core::{CommandTask, FailurePolicy, TaskError, TaskPoll, Throttle, TrackerContext};
use crate::execution::TaskMachine;
use crate::modem::{commands, Exchange, Transport};
use crate::payload::{decode_receive, encode_batch, ControlMessage};
use std::task::Poll;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Pacing of ordinary steps
pub const STEP_INTERVAL: Duration = Duration::from_millis(100);
/// Pacing of the byte-count step
pub const BYTE_COUNT_INTERVAL: Duration = Duration::from_millis(1000);
const RECEIVE_BUDGET: Duration = Duration::from_millis(3000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStep {
    Init,
    VerifyRegistration,
    OpenConnection,
    DefineByteCount,
    Write,
    Receive,
    ReceiveDecode,
    CloseConnection,
    End,
}

/// Why a batch was given up
#[derive(Debug, Clone, PartialEq)]
pub enum AbandonReason {
    Encode(String),
    ByteCount(TaskError),
}

impl std::fmt::Display for AbandonReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AbandonReason::Encode(e) => write!(f, "payload could not be encoded: {}", e),
            AbandonReason::ByteCount(e) => write!(f, "send announcement failed: {}", e),
        }
    }
}

/// What one tick of the pipeline produced
#[derive(Debug, Clone, PartialEq)]
pub enum SendProgress {
    InProgress,
    /// A control message from the collector was applied
    ControlApplied(ControlMessage),
    /// `End` ran; `rotated` tells whether a buffered fix was consumed
    Completed { rotated: bool },
    /// The pipeline unwound to `Init`; the orchestrator must restart its cycle
    Abandoned(AbandonReason),
}

pub struct CborSendPipeline {
    step: SendStep,
    machine: TaskMachine,
    pace: Throttle,
    registration: CommandTask,
    open: Option<CommandTask>,
    close: CommandTask,
    byte_count: Option<CommandTask>,
    cbor: Vec<u8>,
    receive: Option<Exchange>,
    inbound: Option<ControlMessage>,
}

impl CborSendPipeline {
    pub fn new() -> Self {
        Self {
            step: SendStep::Init,
            machine: TaskMachine::new("cbor"),
            pace: Throttle::new(),
            registration: CommandTask::new(
                commands::REGISTRATION_QUERY,
                commands::REGISTERED,
                15,
                Duration::from_millis(100),
            ),
            open: None,
            close: CommandTask::new(commands::CLOSE_SOCKET, commands::OK, 15, Duration::from_millis(100)),
            byte_count: None,
            cbor: Vec::new(),
            receive: None,
            inbound: None,
        }
    }

    pub fn step(&self) -> SendStep {
        self.step
    }

    /// Encoded payload of the batch in flight
    pub fn payload(&self) -> &[u8] {
        &self.cbor
    }

    pub fn byte_count_task(&self) -> Option<&CommandTask> {
        self.byte_count.as_ref()
    }

    pub fn tick(&mut self, ctx: &mut TrackerContext, transport: &mut dyn Transport, now: Instant) -> SendProgress {
        match self.step {
            SendStep::Init => {
                if !self.pace.ready(now, STEP_INTERVAL) {
                    return SendProgress::InProgress;
                }
                match encode_batch(&ctx.payload) {
                    Ok(cbor) => {
                        self.byte_count = Some(
                            CommandTask::new(
                                commands::send_length(cbor.len()),
                                commands::SEND_PROMPT,
                                3,
                                Duration::from_millis(5000),
                            )
                            .with_failure_policy(FailurePolicy::Escalate),
                        );
                        debug!(bytes = cbor.len(), "Payload encoded");
                        self.cbor = cbor;
                    }
                    Err(e) => {
                        let reason = AbandonReason::Encode(e.to_string());
                        return self.unwind(ctx, reason);
                    }
                }
                self.pace.rearm(now);
                self.enter(SendStep::VerifyRegistration);
            }
            SendStep::VerifyRegistration => {
                if self.pace.ready(now, STEP_INTERVAL) {
                    self.pace.rearm(now);
                    if self.machine.advance(&mut self.registration, transport, now) {
                        self.registration.rearm();
                        self.enter(SendStep::OpenConnection);
                    }
                }
            }
            SendStep::OpenConnection => {
                if self.pace.ready(now, STEP_INTERVAL) {
                    self.pace.rearm(now);
                    let task = self.open.get_or_insert_with(|| {
                        CommandTask::new(
                            commands::open_tcp(&ctx.endpoint.host, ctx.endpoint.port),
                            commands::OK,
                            15,
                            Duration::from_millis(8000),
                        )
                    });
                    if self.machine.advance(task, transport, now) {
                        self.open = None;
                        self.enter(SendStep::DefineByteCount);
                    }
                }
            }
            SendStep::DefineByteCount => {
                if !self.pace.ready(now, BYTE_COUNT_INTERVAL) {
                    return SendProgress::InProgress;
                }
                self.pace.rearm(now);
                let poll = match self.byte_count.as_mut() {
                    Some(task) => self.machine.poll(task, transport, now),
                    None => {
                        warn!("No byte-count task; re-encoding payload");
                        self.enter(SendStep::Init);
                        return SendProgress::InProgress;
                    }
                };
                match poll {
                    TaskPoll::Done => self.enter(SendStep::Write),
                    TaskPoll::Escalated(e) => return self.unwind(ctx, AbandonReason::ByteCount(e)),
                    TaskPoll::Pending | TaskPoll::Failed(_) => {}
                }
            }
            SendStep::Write => {
                match transport.write(&self.cbor) {
                    Ok(()) => info!(bytes = self.cbor.len(), "Payload written"),
                    Err(e) => warn!("Payload write failed: {}", e),
                }
                self.enter(SendStep::Receive);
            }
            SendStep::Receive => {
                let exchange = self
                    .receive
                    .get_or_insert_with(|| Exchange::new(commands::RECEIVE, RECEIVE_BUDGET));
                if let Poll::Ready(reply) = exchange.poll(transport, now) {
                    self.receive = None;
                    match decode_receive(&reply.bytes) {
                        Ok(Some(message)) => {
                            debug!(?message, "Control message received");
                            self.inbound = Some(message);
                        }
                        Ok(None) => debug!("Nothing pending on socket"),
                        Err(e) => warn!("Discarding inbound message: {}", e),
                    }
                    if self.inbound.is_some() {
                        self.enter(SendStep::ReceiveDecode);
                    } else {
                        self.enter(SendStep::CloseConnection);
                    }
                }
            }
            SendStep::ReceiveDecode => {
                self.enter(SendStep::CloseConnection);
                if let Some(message) = self.inbound.take() {
                    ctx.runtime.apply(&message);
                    return SendProgress::ControlApplied(message);
                }
            }
            SendStep::CloseConnection => {
                if self.pace.ready(now, STEP_INTERVAL) {
                    self.pace.rearm(now);
                    if self.machine.advance(&mut self.close, transport, now) {
                        self.close.rearm();
                        self.enter(SendStep::End);
                    }
                }
            }
            SendStep::End => {
                self.reset_local();
                let rotated = ctx.fixes.consume_oldest().is_some();
                self.enter(SendStep::Init);
                return SendProgress::Completed { rotated };
            }
        }
        SendProgress::InProgress
    }

    fn reset_local(&mut self) {
        self.cbor.clear();
        self.byte_count = None;
        self.receive = None;
        self.inbound = None;
    }

    /// Drop the batch in flight and return to `Init`
    fn unwind(&mut self, ctx: &mut TrackerContext, reason: AbandonReason) -> SendProgress {
        error!("Batch abandoned: {}", reason);
        self.reset_local();
        self.registration.rearm();
        self.open = None;
        self.close.rearm();
        self.pace.clear();
        ctx.clear_cycle();
        self.enter(SendStep::Init);
        SendProgress::Abandoned(reason)
    }

    fn enter(&mut self, next: SendStep) {
        debug!(from = ?self.step, to = ?next, "Send step");
        self.step = next;
    }
}

impl Default for CborSendPipeline {
    fn default() -> Self {
        Self::new()
    }
}
