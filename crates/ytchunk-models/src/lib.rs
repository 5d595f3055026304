//! Shared data models for the chunk extraction service.
//!
//! This crate provides:
//! - Chunk jobs, job IDs and the job lifecycle state machine
//! - Inbound request validation
//! - Durable object references
//! - Seek timestamp formatting and progress timemark parsing

pub mod job;
pub mod reference;
pub mod request;
pub mod timestamp;

// Re-export common types
pub use job::{ChunkJob, InvalidRange, InvalidTransition, JobId, JobLifecycle, JobState};
pub use reference::DurableReference;
pub use request::{ChunkRange, ChunkRequest, RequestError, MAX_OFFSET_SECS};
pub use timestamp::{parse_timemark, seconds_to_time, TimestampError};
