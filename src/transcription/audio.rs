//! # Audio Front End
//!
//! Turns an uploaded WAV file into what Whisper consumes: mono `f32`
//! samples at 16 kHz in `[-1.0, 1.0]`, and the mel filterbank used to build
//! the log-mel spectrogram.
//!
//! ## Accepted Input:
//! - 8, 16, 24 or 32-bit integer PCM, or 32-bit float
//! - Any channel count (channels are averaged)
//! - Any sample rate (band-limited FFT resampling)

use anyhow::{anyhow, Context, Result};
use hound::{SampleFormat, WavReader};
use rubato::{FftFixedIn, Resampler};
use std::io::Cursor;
use tracing::debug;

/// Sample rate Whisper models are trained on.
pub const SAMPLE_RATE: u32 = 16_000;

/// FFT window used by Whisper's spectrogram.
pub const N_FFT: usize = 400;

/// Input frames per resampler call.
const RESAMPLE_CHUNK: usize = 1024;

/// Decode a WAV file into 16 kHz mono samples.
pub fn decode_wav(bytes: &[u8]) -> Result<Vec<f32>> {
    let reader = WavReader::new(Cursor::new(bytes)).context("Failed to read WAV data")?;
    let spec = reader.spec();

    let channels = spec.channels.max(1);
    let interleaved = pcm_to_float(reader)?;
    let mono = downmix(&interleaved, channels);
    let samples = resample(&mono, spec.sample_rate, SAMPLE_RATE)?;

    debug!(
        channels,
        source_rate = spec.sample_rate,
        bits = spec.bits_per_sample,
        samples = samples.len(),
        seconds = samples.len() as f64 / SAMPLE_RATE as f64,
        "decoded audio"
    );
    Ok(samples)
}

/// Convert any supported sample format to `f32` in `[-1.0, 1.0]`.
fn pcm_to_float(reader: WavReader<Cursor<&[u8]>>) -> Result<Vec<f32>> {
    let spec = reader.spec();
    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .context("Failed to read float samples")?,
        SampleFormat::Int => {
            let scale = (1u64 << (spec.bits_per_sample.clamp(1, 32) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|x| x as f32 / scale))
                .collect::<Result<_, _>>()
                .context("Failed to read PCM samples")?
        }
    };

    if samples.is_empty() {
        return Err(anyhow!("WAV file contains no audio data"));
    }
    Ok(samples)
}

/// Average interleaved frames into one channel.
fn downmix(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels == 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Resample mono audio with rubato's FFT resampler.
///
/// Content above the target Nyquist frequency is removed rather than folded
/// back. The resampler's delay is trimmed so the output lines up with the
/// input and has `len * to / from` samples.
fn resample(samples: &[f32], from: u32, to: u32) -> Result<Vec<f32>> {
    if from == to || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    if from == 0 {
        return Err(anyhow!("WAV file declares a sample rate of 0"));
    }

    let mut resampler = FftFixedIn::<f32>::new(from as usize, to as usize, RESAMPLE_CHUNK, 2, 1)
        .context("Failed to create resampler")?;
    let delay = resampler.output_delay();
    let expected = (samples.len() as u64 * u64::from(to) / u64::from(from)) as usize;
    let mut output = Vec::with_capacity(expected + delay);

    let mut chunks = samples.chunks_exact(resampler.input_frames_next());
    for chunk in &mut chunks {
        let out = resampler.process(&[chunk][..], None).context("Resampling failed")?;
        output.extend_from_slice(&out[0]);
    }
    let rest = chunks.remainder();
    if !rest.is_empty() {
        let out = resampler
            .process_partial(Some(&[rest][..]), None)
            .context("Resampling failed")?;
        output.extend_from_slice(&out[0]);
    }
    // flush the samples still held back by the filter delay
    while output.len() < expected + delay {
        let out = resampler
            .process_partial::<&[f32]>(None, None)
            .context("Resampling failed")?;
        if out[0].is_empty() {
            break;
        }
        output.extend_from_slice(&out[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected);
    Ok(output)
}

/// Slaney-style mel filterbank, `n_mels` rows of `N_FFT / 2 + 1` weights.
///
/// Matches the filters Whisper was trained with (librosa defaults for a
/// 16 kHz signal and a 400-sample FFT).
pub fn mel_filters(n_mels: usize) -> Vec<f32> {
    let n_freqs = N_FFT / 2 + 1;
    let nyquist = SAMPLE_RATE as f64 / 2.0;

    let min_mel = hz_to_mel(0.0);
    let max_mel = hz_to_mel(nyquist);
    let edges: Vec<f64> = (0..n_mels + 2)
        .map(|i| mel_to_hz(min_mel + (max_mel - min_mel) * i as f64 / (n_mels + 1) as f64))
        .collect();

    let mut filters = vec![0.0f32; n_mels * n_freqs];
    for m in 0..n_mels {
        let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
        let norm = 2.0 / (upper - lower);
        for k in 0..n_freqs {
            let freq = k as f64 * SAMPLE_RATE as f64 / N_FFT as f64;
            let rising = (freq - lower) / (center - lower);
            let falling = (upper - freq) / (upper - center);
            filters[m * n_freqs + k] = (rising.min(falling).max(0.0) * norm) as f32;
        }
    }
    filters
}

const MEL_F_SP: f64 = 200.0 / 3.0;
const MEL_MIN_LOG_HZ: f64 = 1000.0;
const MEL_MIN_LOG_MEL: f64 = MEL_MIN_LOG_HZ / MEL_F_SP;

fn mel_log_step() -> f64 {
    6.4f64.ln() / 27.0
}

fn hz_to_mel(hz: f64) -> f64 {
    if hz >= MEL_MIN_LOG_HZ {
        MEL_MIN_LOG_MEL + (hz / MEL_MIN_LOG_HZ).ln() / mel_log_step()
    } else {
        hz / MEL_F_SP
    }
}

fn mel_to_hz(mel: f64) -> f64 {
    if mel >= MEL_MIN_LOG_MEL {
        MEL_MIN_LOG_HZ * (mel_log_step() * (mel - MEL_MIN_LOG_MEL)).exp()
    } else {
        MEL_F_SP * mel
    }
}
