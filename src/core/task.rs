//! Command task model
//!
//! A [`CommandTask`] is one outstanding request/response exchange with the
//! modem. It is owned by the pipeline step that built it and advanced by
//! [`crate::execution::TaskMachine`].

use crate::core::state::{TaskError, TaskState};
use regex::Regex;
use std::fmt;
use std::time::{Duration, Instant};

/// Pattern for recognising the acknowledgement of a command
#[derive(Debug, Clone)]
pub enum ResponsePattern {
    /// Plain substring match
    Simple(String),
    /// Regular expression match
    Regex(Regex),
}

impl ResponsePattern {
    /// Check if the pattern matches the accumulated reply
    pub fn matches(&self, text: &str) -> bool {
        match self {
            ResponsePattern::Simple(pattern) => text.contains(pattern.as_str()),
            ResponsePattern::Regex(regex) => regex.is_match(text),
        }
    }
}

impl From<&str> for ResponsePattern {
    fn from(pattern: &str) -> Self {
        ResponsePattern::Simple(pattern.to_string())
    }
}

impl From<String> for ResponsePattern {
    fn from(pattern: String) -> Self {
        ResponsePattern::Simple(pattern)
    }
}

impl From<Regex> for ResponsePattern {
    fn from(regex: Regex) -> Self {
        ResponsePattern::Regex(regex)
    }
}

/// Handler invoked with the failed task; it may rewrite any field
pub type FailureHandler = Box<dyn FnMut(&mut CommandTask) + Send>;

/// What the task machine does with a task sitting in [`TaskState::Failed`]
#[derive(Default)]
pub enum FailurePolicy {
    /// Reset to `Idle` and start over (unbounded re-attempts)
    #[default]
    Rearm,
    /// Log the failure and stay in `Failed`
    LogOnly,
    /// Reset the task and report [`crate::core::TaskPoll::Escalated`] so the
    /// driving stage can unwind
    Escalate,
    /// Caller-supplied handler
    Handler(FailureHandler),
}

impl fmt::Debug for FailurePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePolicy::Rearm => write!(f, "Rearm"),
            FailurePolicy::LogOnly => write!(f, "LogOnly"),
            FailurePolicy::Escalate => write!(f, "Escalate"),
            FailurePolicy::Handler(_) => write!(f, "Handler(..)"),
        }
    }
}

/// One request/response exchange with the modem
#[derive(Debug)]
pub struct CommandTask {
    /// Command text, written with a trailing CRLF
    pub command: String,

    /// Acknowledgement pattern
    pub expected: ResponsePattern,

    /// Retries allowed after the first attempt
    pub max_retries: u32,

    /// How long to wait for the acknowledgement per attempt
    pub timeout: Duration,

    pub retry_count: u32,

    /// Complete reply lines received so far, each terminated by `\n`
    pub response: String,

    /// Bytes after the last line terminator (e.g. a `>` prompt)
    pub partial: String,

    pub state: TaskState,

    /// Set on `Done` or when retries are exhausted
    pub finished: bool,

    /// Reply captured when the task reached `Done`
    pub result: Option<String>,

    pub on_failure: FailurePolicy,

    /// When the current attempt was written
    pub sent_at: Option<Instant>,

    /// Bytes observed across every attempt since the last reset
    pub bytes_seen: usize,

    pub last_error: Option<TaskError>,
}

impl CommandTask {
    /// Create a task using the default (rearm) failure policy
    pub fn new(
        command: impl Into<String>,
        expected: impl Into<ResponsePattern>,
        max_retries: u32,
        timeout: Duration,
    ) -> Self {
        Self {
            command: command.into(),
            expected: expected.into(),
            max_retries,
            timeout,
            retry_count: 0,
            response: String::new(),
            partial: String::new(),
            state: TaskState::Idle,
            finished: false,
            result: None,
            on_failure: FailurePolicy::default(),
            sent_at: None,
            bytes_seen: 0,
            last_error: None,
        }
    }

    /// Set the failure policy
    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_failure = policy;
        self
    }

    /// Install a handler closure as the failure policy
    pub fn on_failure<F>(self, handler: F) -> Self
    where
        F: FnMut(&mut CommandTask) + Send + 'static,
    {
        self.with_failure_policy(FailurePolicy::Handler(Box::new(handler)))
    }

    /// Put the task back to `Idle` with empty buffers, keeping its policy
    pub fn rearm(&mut self) {
        self.state = TaskState::Idle;
        self.retry_count = 0;
        self.response.clear();
        self.partial.clear();
        self.finished = false;
        self.result = None;
        self.sent_at = None;
        self.bytes_seen = 0;
    }

    /// Number of times the command has been written in this cycle
    pub fn attempts(&self) -> u32 {
        self.retry_count + 1
    }

    /// Text the acknowledgement pattern is tested against
    pub fn reply_text(&self) -> String {
        let mut text = self.response.clone();
        text.push_str(&self.partial);
        text
    }

    pub fn is_done(&self) -> bool {
        self.state == TaskState::Done
    }

    /// Classify the exhaustion that just happened
    pub(crate) fn exhaustion_error(&self) -> TaskError {
        if self.bytes_seen == 0 {
            TaskError::TransportStarved {
                command: self.command.clone(),
                attempts: self.attempts(),
            }
        } else {
            TaskError::ProtocolTimeout {
                command: self.command.clone(),
                attempts: self.attempts(),
            }
        }
    }
}
