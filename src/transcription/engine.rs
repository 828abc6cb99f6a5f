//! # Transcription Engine
//!
//! The [`Transcriber`] seam the transcription workflow calls, and
//! [`WhisperTranscriber`], its Candle-based Whisper implementation.
//!
//! ## Inference Process:
//! 1. Decode the uploaded WAV file to 16 kHz mono samples
//! 2. Load config, tokenizer and weights from the model directory
//! 3. Build the log-mel spectrogram and cut it into 30 s segments
//! 4. Greedily decode each segment and join the texts
//!
//! ## Concurrency:
//! Candle's Whisper keeps its key/value cache inside the model, so decoding
//! needs `&mut` access. Each call loads its own model instance; concurrent
//! jobs never share decoder state.

use crate::catalog::ModelHandle;
use crate::progress::ProgressSink;
use crate::transcription::audio;
use anyhow::{anyhow, Context, Result};
use candle_core::{Device, IndexOp, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::whisper::{self as m, Config};
use std::time::Instant;
use tokenizers::Tokenizer;
use tracing::{debug, info};

/// Converts audio into text with a downloaded model.
///
/// Implementations are synchronous and may block for a long time; callers
/// run them on a blocking thread.
pub trait Transcriber: Send + Sync {
    /// ## Parameters:
    /// - **model**: Downloaded model to use, also carrying the language
    /// - **audio**: Raw bytes of the uploaded file
    /// - **progress**: Receives `segments done / segments total`
    fn transcribe(&self, model: &ModelHandle, audio: &[u8], progress: &ProgressSink) -> Result<String>;
}

/// Whisper inference with Candle.
#[derive(Debug, Clone)]
pub struct WhisperTranscriber {
    device: Device,
}

impl WhisperTranscriber {
    pub fn new(device: Device) -> Self {
        Self { device }
    }
}

/// A Whisper model loaded for one transcription.
struct LoadedModel {
    model: m::model::Whisper,
    config: Config,
    tokenizer: Tokenizer,
    mel_filters: Vec<f32>,
}

impl WhisperTranscriber {
    fn load(&self, handle: &ModelHandle) -> Result<LoadedModel> {
        let start_time = Instant::now();
        let dir = &handle.path;

        let config_file = std::fs::File::open(dir.join("config.json"))
            .with_context(|| format!("Failed to open config.json in {}", dir.display()))?;
        let config: Config = serde_json::from_reader(config_file).context("Invalid model config")?;

        let tokenizer = Tokenizer::from_file(dir.join("tokenizer.json"))
            .map_err(|e| anyhow!("Failed to load tokenizer: {}", e))?;

        let weights = dir.join("model.safetensors");
        // SAFETY: the weights file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], m::DTYPE, &self.device)? };
        let model = m::model::Whisper::load(&vb, config.clone())?;

        let mel_filters = audio::mel_filters(config.num_mel_bins);

        info!(
            language = %handle.entry.language,
            model = %handle.entry.model,
            "Whisper model loaded in {:.2}s",
            start_time.elapsed().as_secs_f64()
        );
        Ok(LoadedModel {
            model,
            config,
            tokenizer,
            mel_filters,
        })
    }
}

impl LoadedModel {
    /// Decoder prompt: start of transcript, language, task, no timestamps.
    ///
    /// English-only checkpoints take no language or task token.
    fn prompt(&self, language: &str) -> Result<Vec<u32>> {
        let mut tokens = vec![token_id(&self.tokenizer, m::SOT_TOKEN)?];
        if self.is_multilingual() {
            if let Some(lang) = self.tokenizer.token_to_id(&format!("<|{}|>", language)) {
                tokens.push(lang);
            }
            tokens.push(token_id(&self.tokenizer, m::TRANSCRIBE_TOKEN)?);
        }
        tokens.push(token_id(&self.tokenizer, m::NO_TIMESTAMPS_TOKEN)?);
        Ok(tokens)
    }

    fn is_multilingual(&self) -> bool {
        self.config.vocab_size >= 51865
    }

    /// Greedy decoding of one mel segment.
    fn decode_segment(&mut self, mel: &Tensor, prompt: &[u32], device: &Device) -> Result<String> {
        let eot = token_id(&self.tokenizer, m::EOT_TOKEN)?;
        let features = self.model.encoder.forward(mel, true)?;
        let max_tokens = self.config.max_target_positions / 2;

        let mut tokens = prompt.to_vec();
        for i in 0..max_tokens {
            let input = Tensor::new(tokens.as_slice(), device)?.unsqueeze(0)?;
            let ys = self.model.decoder.forward(&input, &features, i == 0)?;

            let (_, seq_len, _) = ys.dims3()?;
            let logits = self
                .model
                .decoder
                .final_linear(&ys.i((..1, seq_len - 1..))?)?
                .i(0)?
                .i(0)?;
            let next = logits.argmax(D::Minus1)?.to_scalar::<u32>()?;

            if next == eot || tokens.len() >= self.config.max_target_positions {
                break;
            }
            tokens.push(next);
        }

        let text = self
            .tokenizer
            .decode(&tokens[prompt.len()..], true)
            .map_err(|e| anyhow!("Tokenizer decode error: {}", e))?;
        Ok(text.trim().to_string())
    }
}

impl Transcriber for WhisperTranscriber {
    fn transcribe(&self, handle: &ModelHandle, audio_bytes: &[u8], progress: &ProgressSink) -> Result<String> {
        let start_time = Instant::now();

        let samples = audio::decode_wav(audio_bytes)?;
        if samples.is_empty() {
            return Err(anyhow!("Audio data is empty"));
        }

        let mut loaded = self.load(handle)?;
        let prompt = loaded.prompt(&handle.entry.language)?;

        let n_mels = loaded.config.num_mel_bins;
        let mel = m::audio::pcm_to_mel(&loaded.config, &samples, &loaded.mel_filters);
        let frames = mel.len() / n_mels;
        let mel = Tensor::from_vec(mel, (1, n_mels, frames), &self.device)?;

        // The spectrogram is zero-padded; only decode frames backed by audio.
        let content_frames = frames.min(samples.len().div_ceil(m::HOP_LENGTH));
        let segments = content_frames.div_ceil(m::N_FRAMES) as u64;
        progress.report(0, segments);

        let mut texts = Vec::new();
        let mut seek = 0;
        while seek < content_frames {
            let size = (content_frames - seek).min(m::N_FRAMES);
            let segment = mel.narrow(2, seek, size)?;
            let text = loaded.decode_segment(&segment, &prompt, &self.device)?;
            debug!(seek, size, %text, "decoded segment");

            if !text.is_empty() {
                texts.push(text);
            }
            seek += size;
            progress.report(seek.div_ceil(m::N_FRAMES) as u64, segments);
        }

        let transcript = texts.join(" ");
        info!(
            language = %handle.entry.language,
            model = %handle.entry.model,
            chars = transcript.len(),
            "Transcribed {:.2}s of audio in {:.2}s",
            samples.len() as f64 / audio::SAMPLE_RATE as f64,
            start_time.elapsed().as_secs_f64()
        );
        Ok(transcript)
    }
}

fn token_id(tokenizer: &Tokenizer, token: &str) -> Result<u32> {
    tokenizer
        .token_to_id(token)
        .ok_or_else(|| anyhow!("Tokenizer has no {} token", token))
}
