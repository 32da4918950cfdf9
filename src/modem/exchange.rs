//! Cooperative send-and-wait
//!
//! Some commands are not tracked by a [`crate::core::CommandTask`]: the
//! caller only wants whatever the modem says back within a time budget. An
//! [`Exchange`] writes the command on its first poll and then collects
//! bytes on every later poll until the reply ends with a terminator or the
//! budget runs out. It never blocks the tick.

use crate::modem::{write_line, Transport};
use std::task::Poll;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Reply endings that close an exchange early
const TERMINATORS: [&[u8]; 2] = [b"OK", b"ACTIVE"];

/// Bytes collected for one exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeReply {
    pub command: String,
    pub bytes: Vec<u8>,
    /// Budget ran out before a terminator arrived
    pub timed_out: bool,
}

impl ExchangeReply {
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.bytes).into_owned()
    }
}

/// One command written and its reply collected across ticks
#[derive(Debug, Clone)]
pub struct Exchange {
    command: String,
    budget: Duration,
    started: Option<Instant>,
    buffer: Vec<u8>,
}

impl Exchange {
    pub fn new(command: impl Into<String>, budget: Duration) -> Self {
        Self {
            command: command.into(),
            budget,
            started: None,
            buffer: Vec::new(),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn is_started(&self) -> bool {
        self.started.is_some()
    }

    /// Advance the exchange; a ready reply resets it so a later poll resends
    pub fn poll(&mut self, transport: &mut dyn Transport, now: Instant) -> Poll<ExchangeReply> {
        let started = match self.started {
            Some(started) => started,
            None => {
                debug!(command = %self.command, "Exchange sent");
                if let Err(e) = write_line(transport, &self.command) {
                    warn!(command = %self.command, "Exchange write failed: {}", e);
                }
                self.buffer.clear();
                self.started = Some(now);
                now
            }
        };

        self.buffer.extend(transport.poll_available());

        let terminated = ends_with_terminator(&self.buffer);
        let timed_out = !terminated && now.saturating_duration_since(started) >= self.budget;
        if !terminated && !timed_out {
            return Poll::Pending;
        }

        if timed_out {
            debug!(command = %self.command, "Exchange budget elapsed");
        }
        self.started = None;
        Poll::Ready(ExchangeReply {
            command: self.command.clone(),
            bytes: std::mem::take(&mut self.buffer),
            timed_out,
        })
    }
}

fn ends_with_terminator(bytes: &[u8]) -> bool {
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(0, |i| i + 1);
    let trimmed = &bytes[..end];
    TERMINATORS.iter().any(|t| trimmed.ends_with(t))
}

/// Several exchanges run back to back
#[derive(Debug, Clone)]
pub struct ExchangeSequence {
    pending: Vec<Exchange>,
    index: usize,
    replies: Vec<ExchangeReply>,
}

impl ExchangeSequence {
    pub fn new<I, S>(commands: I) -> Self
    where
        I: IntoIterator<Item = (S, Duration)>,
        S: Into<String>,
    {
        Self {
            pending: commands
                .into_iter()
                .map(|(command, budget)| Exchange::new(command, budget))
                .collect(),
            index: 0,
            replies: Vec::new(),
        }
    }

    /// Advance the running exchange; at most one command is written per poll
    pub fn poll(&mut self, transport: &mut dyn Transport, now: Instant) -> Poll<Vec<ExchangeReply>> {
        while let Some(exchange) = self.pending.get_mut(self.index) {
            let was_started = exchange.is_started();
            match exchange.poll(transport, now) {
                Poll::Ready(reply) => {
                    self.replies.push(reply);
                    self.index += 1;
                    if !was_started {
                        // Sent and answered on the same poll; next command waits a tick
                        break;
                    }
                }
                Poll::Pending => return Poll::Pending,
            }
        }

        if self.index < self.pending.len() {
            return Poll::Pending;
        }
        self.index = 0;
        Poll::Ready(std::mem::take(&mut self.replies))
    }
}
