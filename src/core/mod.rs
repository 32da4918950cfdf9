//! Core domain models for the tracker
//!
//! This module defines the command task, the fix and ring buffer models,
//! pacing, and configuration shared by every pipeline.

pub mod config;
pub mod context;
pub mod fix;
pub mod ring;
pub mod state;
pub mod task;
pub mod throttle;

pub use config::{PrecisionFilter, RuntimeConfig, TrackerConfig};
pub use context::*;
pub use fix::{Coordinate, Fix, FixError};
pub use ring::*;
pub use state::*;
pub use task::*;
pub use throttle::Throttle;
