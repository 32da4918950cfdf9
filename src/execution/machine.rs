//! Task machine - advances one command task per call
//!
//! A task moves `Idle -> Sending -> AwaitingResponse -> (Retry | Done)` and
//! `Retry -> (Sending | Failed)`. No call ever waits: each one does at most
//! one write or one drain of whatever bytes the transport already holds.
//! What happens in `Failed` is decided by the task's [`FailurePolicy`].

use crate::core::{CommandTask, FailurePolicy, TaskPoll, TaskState};
use crate::modem::{commands, write_line, Transport};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Drives command tasks for one pipeline
#[derive(Debug, Clone, Copy)]
pub struct TaskMachine {
    label: &'static str,
}

impl TaskMachine {
    /// `label` tags every log line from this machine
    pub fn new(label: &'static str) -> Self {
        Self { label }
    }

    pub fn label(&self) -> &'static str {
        self.label
    }

    /// Advance the task once; true iff it is `Done` afterwards
    pub fn advance(&self, task: &mut CommandTask, transport: &mut dyn Transport, now: Instant) -> bool {
        self.poll(task, transport, now).is_done()
    }

    /// Advance the task once and report what happened
    pub fn poll(&self, task: &mut CommandTask, transport: &mut dyn Transport, now: Instant) -> TaskPoll {
        match task.state {
            TaskState::Idle => {
                task.retry_count = 0;
                task.response.clear();
                task.partial.clear();
                task.bytes_seen = 0;
                task.state = TaskState::Sending;
                TaskPoll::Pending
            }
            TaskState::Sending => {
                if let Err(e) = write_line(transport, &task.command) {
                    warn!(machine = self.label, command = %task.command, "Write failed: {}", e);
                }
                debug!(
                    machine = self.label,
                    command = %task.command,
                    attempt = task.attempts(),
                    "Command sent"
                );
                task.sent_at = Some(now);
                task.state = TaskState::AwaitingResponse;
                TaskPoll::Pending
            }
            TaskState::AwaitingResponse => self.await_response(task, transport, now),
            TaskState::Retry => {
                if task.retry_count < task.max_retries {
                    task.retry_count += 1;
                    task.state = TaskState::Sending;
                    info!(
                        machine = self.label,
                        command = %task.command,
                        "Retry {}/{}",
                        task.retry_count,
                        task.max_retries
                    );
                    TaskPoll::Pending
                } else {
                    let error = task.exhaustion_error();
                    task.state = TaskState::Failed;
                    task.finished = true;
                    task.last_error = Some(error.clone());
                    warn!(machine = self.label, "{}", error);
                    TaskPoll::Failed(error)
                }
            }
            TaskState::Failed => self.handle_failure(task),
            TaskState::Done => TaskPoll::Done,
        }
    }

    fn await_response(&self, task: &mut CommandTask, transport: &mut dyn Transport, now: Instant) -> TaskPoll {
        let bytes = transport.poll_available();
        task.bytes_seen += bytes.len();
        task.partial.push_str(&String::from_utf8_lossy(&bytes));

        let mut new_lines = false;
        while let Some(end) = task.partial.find('\n') {
            let line = task.partial[..end].trim().to_string();
            task.partial.drain(..=end);
            if line.is_empty() {
                continue;
            }
            debug!(machine = self.label, "<< {}", line);
            task.response.push_str(&line);
            task.response.push('\n');
            new_lines = true;

            if task.expected.matches(&task.response) {
                let reply = task.response.clone();
                return self.complete(task, reply);
            }
        }

        // Prompts such as `>` arrive without a line terminator
        if !task.partial.is_empty() {
            let reply = task.reply_text();
            if task.expected.matches(&reply) {
                return self.complete(task, reply);
            }
        }

        if new_lines {
            if task.response.trim_end().ends_with(commands::OK) {
                debug!(machine = self.label, command = %task.command, "Acknowledged without expected reply");
            } else if task.response.contains(commands::ERROR) {
                warn!(machine = self.label, command = %task.command, "Modem reported ERROR");
            }
        }

        let elapsed = task
            .sent_at
            .map(|sent| now.saturating_duration_since(sent))
            .unwrap_or_default();
        if elapsed > task.timeout {
            debug!(machine = self.label, command = %task.command, "Timed out after {:?}", elapsed);
            task.state = TaskState::Retry;
        }
        TaskPoll::Pending
    }

    fn complete(&self, task: &mut CommandTask, reply: String) -> TaskPoll {
        task.state = TaskState::Done;
        task.finished = true;
        task.result = Some(reply);
        debug!(machine = self.label, command = %task.command, "Expected reply received");
        TaskPoll::Done
    }

    fn handle_failure(&self, task: &mut CommandTask) -> TaskPoll {
        let mut policy = std::mem::take(&mut task.on_failure);
        let outcome = match &mut policy {
            FailurePolicy::Rearm => {
                debug!(machine = self.label, command = %task.command, "Rearming failed task");
                task.rearm();
                TaskPoll::Pending
            }
            FailurePolicy::LogOnly => {
                debug!(machine = self.label, command = %task.command, "Task remains failed");
                TaskPoll::Pending
            }
            FailurePolicy::Escalate => {
                let error = task
                    .last_error
                    .clone()
                    .unwrap_or_else(|| task.exhaustion_error());
                task.rearm();
                TaskPoll::Escalated(error)
            }
            FailurePolicy::Handler(handler) => {
                handler(task);
                if task.state == TaskState::Done {
                    TaskPoll::Done
                } else {
                    TaskPoll::Pending
                }
            }
        };
        task.on_failure = policy;
        outcome
    }
}
