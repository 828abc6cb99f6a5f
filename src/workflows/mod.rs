//! # Background Workflows
//!
//! Each submitted job is driven to a terminal state by a spawned tokio
//! task; workflows report back only through registry writes.

pub mod download;
pub mod transcription;

pub use download::DownloadWorkflow;
pub use transcription::TranscriptionPipeline;
