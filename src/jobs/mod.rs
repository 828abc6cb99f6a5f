//! # Jobs
//!
//! Asynchronous units of work (audio transcriptions and model downloads)
//! tracked by identity and state.
//!
//! - **record**: the [`Job`] entity, its kinds and state machines
//! - **registry**: the concurrency-safe [`JobRegistry`] holding every job

pub mod record;
pub mod registry;

pub use record::{Job, JobFailure, JobKind, JobState};
pub use registry::JobRegistry;
