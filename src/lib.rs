//! gnss-tracker - cooperative AT-command pipelines for a cellular GNSS tracker

pub mod cli;
pub mod core;
pub mod execution;
pub mod modem;
pub mod payload;
pub mod persistence;

// Re-export commonly used types
pub use crate::core::{CommandTask, CoordinateRingBuffer, FailurePolicy, Fix, TaskState, Throttle, TrackerConfig, TrackerContext};
pub use crate::execution::{CborSendPipeline, GlobalOrchestrator, GlobalStep, GnssPipeline, TaskMachine, TrackerEvent};
pub use crate::modem::{Transport, TransportError};
pub use crate::persistence::{ByteStore, MemoryStore, TrackerStore};
