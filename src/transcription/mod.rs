//! # Speech Recognition
//!
//! - **audio**: WAV decoding, resampling and mel filters
//! - **device**: compute device selection for inference
//! - **engine**: the [`Transcriber`] seam and the Whisper implementation

pub mod audio;
pub mod device;
pub mod engine;

pub use device::{select_device, DevicePreference};
pub use engine::{Transcriber, WhisperTranscriber};
