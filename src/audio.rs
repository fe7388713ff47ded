//! Audio decoding, downmixing and resampling

use crate::config::Config;
use crate::error::{Result, WhistleError};
use hound::WavReader;
use log::{debug, warn};
use rubato::{FftFixedIn, Resampler};
use std::io::{Cursor, Read};

/// Decoded mono audio
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Mono samples, normalized to [-1, 1]
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl AudioBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Get audio duration in seconds
    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Decode WAV bytes into mono samples
///
/// A `sample_rate_hint` overrides the rate stored in the header.
pub fn decode_wav_bytes(bytes: &[u8], sample_rate_hint: Option<u32>) -> Result<AudioBuffer> {
    if bytes.is_empty() {
        return Err(WhistleError::AudioDecode("no audio bytes supplied".to_string()));
    }
    let reader = WavReader::new(Cursor::new(bytes))?;
    let (samples, header_rate) = read_wav(reader)?;
    let sample_rate = match sample_rate_hint {
        Some(hint) if hint != header_rate => {
            debug!(
                "Sample rate hint {} Hz overrides header rate {} Hz",
                hint, header_rate
            );
            hint
        }
        _ => header_rate,
    };
    if sample_rate == 0 {
        return Err(WhistleError::UnsupportedSampleRate(0));
    }
    Ok(AudioBuffer::new(samples, sample_rate))
}

fn read_wav<R: Read>(mut reader: WavReader<R>) -> Result<(Vec<f32>, u32)> {
    let spec = reader.spec();

    if spec.channels == 0 {
        return Err(WhistleError::InvalidAudioFormat(
            "WAV header declares zero channels".to_string(),
        ));
    }

    if spec.bits_per_sample == 0 || spec.bits_per_sample > 32 {
        return Err(WhistleError::InvalidAudioFormat(format!(
            "Unsupported bit depth: {}",
            spec.bits_per_sample
        )));
    }

    let mut interleaved: Vec<f32> = Vec::with_capacity(reader.len() as usize);
    match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_value = (1i64 << (spec.bits_per_sample - 1)) as f32;
            for sample in reader.samples::<i32>() {
                interleaved.push(sample? as f32 / max_value);
            }
        }
        hound::SampleFormat::Float => {
            for sample in reader.samples::<f32>() {
                interleaved.push(sample?);
            }
        }
    }

    Ok((downmix(&interleaved, spec.channels as usize), spec.sample_rate))
}

/// Average interleaved channels into a single mono channel
pub fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Resample a mono signal with an FFT resampler
///
/// The resampler's group delay is trimmed so that sample `n` of the output
/// lines up with time `n / target_rate` of the input.
pub fn resample(
    samples: &[f32],
    source_rate: u32,
    target_rate: u32,
    chunk_size: usize,
) -> Result<Vec<f32>> {
    if source_rate == 0 || target_rate == 0 {
        return Err(WhistleError::UnsupportedSampleRate(source_rate.min(target_rate)));
    }
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        chunk_size,
        2,
        1,
    )?;

    let delay = resampler.output_delay();
    let expected_output_frames =
        (samples.len() as f64 * target_rate as f64 / source_rate as f64).ceil() as usize;
    let wanted = expected_output_frames + delay;

    let mut output = Vec::with_capacity(wanted + chunk_size);
    let mut pos = 0;
    // Zero-padding past the end flushes the delay line
    while output.len() < wanted {
        let needed = resampler.input_frames_next();
        let mut chunk = vec![0.0f32; needed];
        if pos < samples.len() {
            let available = needed.min(samples.len() - pos);
            chunk[..available].copy_from_slice(&samples[pos..pos + available]);
        }
        pos += needed;

        let processed = resampler.process(&[chunk], None)?;
        output.extend_from_slice(&processed[0]);
    }

    output.drain(..delay.min(output.len()));
    output.truncate(expected_output_frames);

    debug!(
        "Resampled {} samples at {} Hz to {} samples at {} Hz",
        samples.len(),
        source_rate,
        output.len(),
        target_rate
    );
    Ok(output)
}

/// Reject audio the pipeline cannot meaningfully analyse
pub fn validate_audio(samples: &[f32], sample_rate: u32, config: &Config) -> Result<()> {
    if samples.is_empty() {
        return Err(WhistleError::InputValidation(
            "Audio contains no samples".to_string(),
        ));
    }

    if !(config.audio.min_sample_rate..=config.audio.max_sample_rate)
        .contains(&sample_rate)
    {
        return Err(WhistleError::UnsupportedSampleRate(sample_rate));
    }

    if samples.iter().any(|s| !s.is_finite()) {
        return Err(WhistleError::InputValidation(
            "Audio contains non-finite samples".to_string(),
        ));
    }

    let peak = peak(samples);
    debug!("Input level: rms {:.4}, peak {:.4}", rms(samples), peak);
    if peak > 0.99 {
        warn!("Audio may be clipped (peak = {:.3})", peak);
    }

    Ok(())
}

/// Root-mean-square level
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    (samples.iter().map(|&x| x * x).sum::<f32>() / samples.len() as f32).sqrt()
}

/// Absolute peak level
pub fn peak(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &x| acc.max(x.abs()))
}

/// Generate a sine tone, used for synthetic inputs and previews
pub fn sine_tone(frequency: f32, sample_rate: u32, duration_sec: f64, amplitude: f32) -> Vec<f32> {
    let n = (duration_sec * sample_rate as f64).round() as usize;
    (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            amplitude * (2.0 * std::f64::consts::PI * frequency as f64 * t).sin() as f32
        })
        .collect()
}

/// Encode mono samples as 16-bit PCM WAV bytes
pub fn encode_wav_bytes(samples: &[f32], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer.write_sample((clamped * i16::MAX as f32) as i16)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}
