//! Bounded chunk extraction pipeline.
//!
//! This crate provides:
//! - The pipeline controller that fetches, transcodes, salvages and uploads a chunk
//! - A single-resolution guard shared by every termination trigger
//! - A watchdog combining the job deadline and stall detection
//! - Artifact ownership with guaranteed cleanup
//! - Structured job logging and pipeline metrics

pub mod artifact;
pub mod config;
pub mod controller;
pub mod error;
pub mod guard;
pub mod logging;
pub mod metrics;
pub mod salvage;
pub mod watchdog;

pub use artifact::Artifact;
pub use config::PipelineConfig;
pub use controller::ChunkPipeline;
pub use error::{CleanupError, PipelineError, PipelineResult};
pub use guard::{ResolutionGuard, TerminationReason, Trigger};
pub use logging::JobLogger;
pub use watchdog::{StallDetector, WatchdogConfig};
