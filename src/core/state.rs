//! Command task state models

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of a single command task
///
/// Each pipeline keeps its own step enumeration; this one belongs to the
/// generic task machine only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskState {
    /// Nothing sent yet for the current attempt cycle
    Idle,
    /// Command is about to be written
    Sending,
    /// Command written, accumulating reply lines
    AwaitingResponse,
    /// Timeout elapsed without a match
    Retry,
    /// Retries exhausted; recoverable through the failure policy
    Failed,
    /// Expected response observed
    Done,
}

impl TaskState {
    /// Check if the task has stopped on its own (done or out of retries)
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskState::Done | TaskState::Failed)
    }
}

/// Failure raised when a task exhausts its retries
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TaskError {
    #[error("no response matching for '{command}' after {attempts} attempts")]
    ProtocolTimeout { command: String, attempts: u32 },

    #[error("modem sent no bytes for '{command}' across {attempts} attempts")]
    TransportStarved { command: String, attempts: u32 },
}

impl TaskError {
    /// Command the failure belongs to
    pub fn command(&self) -> &str {
        match self {
            TaskError::ProtocolTimeout { command, .. } => command,
            TaskError::TransportStarved { command, .. } => command,
        }
    }
}

/// Outcome of polling a task once
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskPoll {
    /// Still exchanging with the modem
    Pending,
    /// Expected response observed (repeats on every later poll)
    Done,
    /// Retries were just exhausted on this poll
    Failed(TaskError),
    /// The failure policy asks the driving stage to unwind
    Escalated(TaskError),
}

impl TaskPoll {
    pub fn is_done(&self) -> bool {
        matches!(self, TaskPoll::Done)
    }
}
