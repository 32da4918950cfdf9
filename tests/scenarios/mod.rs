//! Scenario-based tests for the tracker

mod control_messages;
mod gnss_acquisition;
mod orchestrator_cycle;
mod send_pipeline;
mod task_retry;
