//! Tracker execution: the task machine and the pipelines it drives

pub mod bearer;
pub mod gnss;
pub mod machine;
pub mod orchestrator;
pub mod send;

pub use bearer::{BearerPipeline, BearerProgress, BearerStep};
pub use gnss::{GnssPipeline, GnssProgress, GnssStep};
pub use machine::TaskMachine;
pub use orchestrator::{EventHandler, GlobalOrchestrator, GlobalStep, Send4gStep, TrackerEvent};
pub use send::{AbandonReason, CborSendPipeline, SendProgress, SendStep};
