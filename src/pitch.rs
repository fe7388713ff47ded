//! Pitch extraction: estimator abstraction, YIN estimator and confidence gate
//!
//! The extractor resamples audio to the estimator's analysis rate, asks the
//! estimator for a per-frame track and then applies the confidence gate.
//! Gated frames keep their time and confidence but report 0 Hz, so frame
//! count and timing always match the raw estimator output one to one.
//!
//! ## YIN
//!
//! The bundled estimator follows de Cheveigné & Kawahara (2002):
//!
//! 1. **Difference function** - d(τ) = Σ(x[j] - x[j+τ])²
//! 2. **Cumulative mean normalized difference** - d'(τ)
//! 3. **Absolute threshold** - first local minimum with d'(τ) < threshold
//! 4. **Parabolic interpolation** - sub-sample period
//!
//! Confidence is `1 - d'(τ)` at the chosen period.
//!
//! `YinDetector` is laid out after the YIN `PitchDetector` in Tutti's
//! `tutti-analysis` crate: reusable scratch buffers, threshold search, then
//! parabolic refinement.

use crate::audio;
use crate::config::{Config, PitchConfig, PitchDecoding};
use crate::error::{Result, WhistleError};
use crate::note::PitchFrame;
use log::debug;

/// Raw estimator output: three equal-length arrays
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PitchTrack {
    pub time: Vec<f64>,
    pub frequency: Vec<f32>,
    pub confidence: Vec<f32>,
}

impl PitchTrack {
    pub fn len(&self) -> usize {
        self.time.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty()
    }

    /// Check that all three arrays line up
    pub fn validate(&self) -> Result<()> {
        if self.frequency.len() != self.time.len() || self.confidence.len() != self.time.len() {
            return Err(WhistleError::PitchEstimation(format!(
                "estimator returned mismatched arrays (time {}, frequency {}, confidence {})",
                self.time.len(),
                self.frequency.len(),
                self.confidence.len()
            )));
        }
        Ok(())
    }
}

/// Capability: estimate a monophonic pitch track
pub trait PitchEstimator: Send + Sync {
    /// Rate the estimator expects its input at
    fn required_sample_rate(&self) -> u32;

    /// Estimate per-frame time, frequency and confidence
    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<PitchTrack>;
}

/// Per-frame YIN result
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct YinEstimate {
    /// Detected frequency in Hz (0.0 if unvoiced)
    pub frequency: f32,
    /// 1 - aperiodicity, clamped to [0, 1]
    pub confidence: f32,
}

/// Single-frame YIN detector with pre-allocated buffers
pub struct YinDetector {
    sample_rate: f64,
    min_freq: f32,
    max_freq: f32,
    threshold: f32,
    difference: Vec<f32>,
    cumulative_mean: Vec<f32>,
}

impl YinDetector {
    pub fn new(sample_rate: u32, min_freq: f32, max_freq: f32, threshold: f32) -> Self {
        let sample_rate = sample_rate as f64;
        let max_period = (sample_rate / min_freq as f64) as usize;
        Self {
            sample_rate,
            min_freq,
            max_freq,
            threshold,
            difference: vec![0.0; max_period + 1],
            cumulative_mean: vec![0.0; max_period + 1],
        }
    }

    /// Samples per analysis frame (two periods of the lowest frequency)
    pub fn frame_size(&self) -> usize {
        let max_period = (self.sample_rate / self.min_freq as f64) as usize;
        max_period * 2
    }

    /// Detect pitch in a single frame
    pub fn detect(&mut self, frame: &[f32]) -> YinEstimate {
        let min_period = ((self.sample_rate / self.max_freq as f64) as usize).max(2);
        let max_period = ((self.sample_rate / self.min_freq as f64) as usize)
            .min(frame.len() / 2)
            .min(self.difference.len() - 1);

        if max_period <= min_period {
            return YinEstimate::default();
        }

        self.compute_difference(frame, max_period);
        self.compute_cumulative_mean(max_period);

        let Some((period, aperiodicity)) = self.find_period(min_period, max_period) else {
            return YinEstimate::default();
        };

        let refined = self.parabolic_interpolation(period, max_period);
        if refined <= 0.0 {
            return YinEstimate::default();
        }

        YinEstimate {
            frequency: (self.sample_rate / refined) as f32,
            confidence: (1.0 - aperiodicity).clamp(0.0, 1.0),
        }
    }

    fn compute_difference(&mut self, frame: &[f32], max_period: usize) {
        let window = max_period;

        let mut cum_sq = vec![0.0f64; frame.len() + 1];
        for (i, &x) in frame.iter().enumerate() {
            cum_sq[i + 1] = cum_sq[i] + (x as f64) * (x as f64);
        }
        let energy = |start: usize| -> f64 {
            let end = (start + window).min(frame.len());
            cum_sq[end] - cum_sq[start.min(end)]
        };

        self.difference[0] = 0.0;
        let e0 = energy(0);
        for tau in 1..=max_period {
            let mut autocorr = 0.0f64;
            for j in 0..window.min(frame.len().saturating_sub(tau)) {
                autocorr += (frame[j] as f64) * (frame[j + tau] as f64);
            }
            self.difference[tau] = (e0 + energy(tau) - 2.0 * autocorr).max(0.0) as f32;
        }
    }

    fn compute_cumulative_mean(&mut self, max_period: usize) {
        self.cumulative_mean[0] = 1.0;
        let mut running_sum = 0.0f32;
        for tau in 1..=max_period {
            running_sum += self.difference[tau];
            self.cumulative_mean[tau] = if running_sum > 1e-10 {
                self.difference[tau] * tau as f32 / running_sum
            } else {
                1.0
            };
        }
    }

    /// First local minimum under the threshold, else the global minimum if
    /// it is still reasonably periodic
    fn find_period(&self, min_period: usize, max_period: usize) -> Option<(usize, f32)> {
        let mut tau = min_period;
        while tau < max_period {
            if self.cumulative_mean[tau] < self.threshold {
                while tau + 1 < max_period
                    && self.cumulative_mean[tau + 1] < self.cumulative_mean[tau]
                {
                    tau += 1;
                }
                return Some((tau, self.cumulative_mean[tau]));
            }
            tau += 1;
        }

        let (best_tau, best_val) = (min_period..=max_period)
            .map(|t| (t, self.cumulative_mean[t]))
            .fold((min_period, f32::INFINITY), |best, cur| {
                if cur.1 < best.1 {
                    cur
                } else {
                    best
                }
            });

        if best_val < 0.5 {
            Some((best_tau, best_val))
        } else {
            None
        }
    }

    fn parabolic_interpolation(&self, tau: usize, max_period: usize) -> f64 {
        if tau < 1 || tau >= max_period {
            return tau as f64;
        }

        let s0 = self.cumulative_mean[tau - 1] as f64;
        let s1 = self.cumulative_mean[tau] as f64;
        let s2 = self.cumulative_mean[tau + 1] as f64;
        let denominator = 2.0 * (2.0 * s1 - s2 - s0);

        if denominator.abs() > 1e-10 {
            tau as f64 + (s2 - s0) / denominator
        } else {
            tau as f64
        }
    }
}

/// Frame-stepped YIN pitch estimator
#[derive(Debug, Clone)]
pub struct YinEstimator {
    sample_rate: u32,
    step_ms: f64,
    min_freq: f32,
    max_freq: f32,
    threshold: f32,
    decoding: PitchDecoding,
    jump_penalty: f32,
}

impl YinEstimator {
    pub fn new(config: &PitchConfig) -> Self {
        Self {
            sample_rate: config.sample_rate,
            step_ms: config.step_ms,
            min_freq: config.min_frequency_hz,
            max_freq: config.max_frequency_hz,
            threshold: config.yin_threshold,
            decoding: config.decoding,
            jump_penalty: config.jump_penalty,
        }
    }

    pub fn hop_size(&self) -> usize {
        ((self.step_ms / 1000.0 * self.sample_rate as f64).round() as usize).max(1)
    }
}

impl PitchEstimator for YinEstimator {
    fn required_sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<PitchTrack> {
        if sample_rate != self.sample_rate {
            return Err(WhistleError::PitchEstimation(format!(
                "YIN estimator configured for {} Hz but received {} Hz",
                self.sample_rate, sample_rate
            )));
        }
        if samples.is_empty() {
            return Err(WhistleError::PitchEstimation(
                "no samples to analyse".to_string(),
            ));
        }

        let mut detector = YinDetector::new(
            self.sample_rate,
            self.min_freq,
            self.max_freq,
            self.threshold,
        );
        let hop = self.hop_size();
        let frame_size = detector.frame_size();
        let half = frame_size / 2;
        let n_frames = 1 + samples.len() / hop;

        let mut track = PitchTrack {
            time: Vec::with_capacity(n_frames),
            frequency: Vec::with_capacity(n_frames),
            confidence: Vec::with_capacity(n_frames),
        };
        let mut frame = vec![0.0f32; frame_size];

        for i in 0..n_frames {
            // Frame i is centred on sample i * hop, zero padded at the edges
            let centre = i * hop;
            for (k, slot) in frame.iter_mut().enumerate() {
                let idx = (centre + k).checked_sub(half);
                *slot = idx.and_then(|idx| samples.get(idx)).copied().unwrap_or(0.0);
            }

            let estimate = detector.detect(&frame);
            track.time.push(centre as f64 / self.sample_rate as f64);
            track.frequency.push(estimate.frequency);
            track.confidence.push(estimate.confidence);
        }

        if self.decoding == PitchDecoding::Viterbi {
            penalize_jumps(&mut track, self.jump_penalty);
        }

        Ok(track)
    }
}

/// Reduce confidence on frame-to-frame jumps wider than a major third
pub fn penalize_jumps(track: &mut PitchTrack, jump_penalty: f32) {
    for i in 1..track.len() {
        let (prev, cur) = (track.frequency[i - 1], track.frequency[i]);
        if prev <= 0.0 || cur <= 0.0 {
            continue;
        }

        let ratio = cur / prev;
        if !(0.79..=1.26).contains(&ratio) {
            // 0.23 ≈ ln(1.26)
            let jump_cost = ((ratio.ln().abs() / 0.23) - 1.0).max(0.0);
            track.confidence[i] *= (-jump_penalty * jump_cost).exp();
        }
    }
}

/// Force sub-threshold frames to 0 Hz without dropping them
pub fn apply_confidence_gate(track: &PitchTrack, threshold: f32) -> Vec<PitchFrame> {
    track
        .time
        .iter()
        .zip(&track.frequency)
        .zip(&track.confidence)
        .map(|((&time, &frequency), &confidence)| {
            let frequency = if confidence < threshold { 0.0 } else { frequency };
            PitchFrame::new(time, frequency, confidence)
        })
        .collect()
}

/// Resamples, estimates and gates
pub struct PitchExtractor {
    estimator: Box<dyn PitchEstimator>,
    confidence_threshold: f32,
    resample_chunk_size: usize,
}

impl PitchExtractor {
    /// Extractor backed by the bundled YIN estimator
    pub fn new(config: &Config) -> Self {
        Self::with_estimator(config, Box::new(YinEstimator::new(&config.pitch)))
    }

    pub fn with_estimator(config: &Config, estimator: Box<dyn PitchEstimator>) -> Self {
        Self {
            estimator,
            confidence_threshold: config.pitch.confidence_threshold,
            resample_chunk_size: config.audio.resample_chunk_size,
        }
    }

    pub fn required_sample_rate(&self) -> u32 {
        self.estimator.required_sample_rate()
    }

    /// Produce gated pitch frames for a mono signal
    pub fn extract(&self, samples: &[f32], sample_rate: u32) -> Result<Vec<PitchFrame>> {
        if samples.is_empty() {
            return Err(WhistleError::PitchEstimation(
                "no samples to analyse".to_string(),
            ));
        }

        let required = self.required_sample_rate();
        let resampled;
        let analysis = if sample_rate != required {
            resampled =
                audio::resample(samples, sample_rate, required, self.resample_chunk_size)?;
            &resampled[..]
        } else {
            samples
        };

        let track = self.estimator.estimate(analysis, required)?;
        track.validate()?;
        if track.is_empty() {
            return Err(WhistleError::PitchEstimation(
                "estimator returned no frames".to_string(),
            ));
        }

        let frames = apply_confidence_gate(&track, self.confidence_threshold);
        debug!(
            "Extracted {} frames ({} voiced) from {} samples at {} Hz",
            frames.len(),
            frames.iter().filter(|f| f.frequency > 0.0).count(),
            analysis.len(),
            required
        );
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::sine_tone;

    #[test]
    fn test_yin_detects_a440() {
        let mut detector = YinDetector::new(16000, 60.0, 4000.0, 0.1);
        let tone = sine_tone(440.0, 16000, 0.1, 0.8);
        let estimate = detector.detect(&tone[..detector.frame_size()]);
        assert!(
            (estimate.frequency - 440.0).abs() < 2.0,
            "got {}",
            estimate.frequency
        );
        assert!(estimate.confidence > 0.9);
    }

    #[test]
    fn test_yin_silence_is_unvoiced() {
        let mut detector = YinDetector::new(16000, 60.0, 4000.0, 0.1);
        let silence = vec![0.0; detector.frame_size()];
        let estimate = detector.detect(&silence);
        assert_eq!(estimate.frequency, 0.0);
        assert_eq!(estimate.confidence, 0.0);
    }

    #[test]
    fn test_gate_preserves_frames() {
        let track = PitchTrack {
            time: vec![0.0, 0.01, 0.02],
            frequency: vec![440.0, 441.0, 442.0],
            confidence: vec![0.9, 0.49, 0.5],
        };
        let frames = apply_confidence_gate(&track, 0.5);
        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].frequency, 440.0);
        assert_eq!(frames[1].frequency, 0.0);
        assert_eq!(frames[1].confidence, 0.49);
        assert_eq!(frames[1].time, 0.01);
        assert_eq!(frames[2].frequency, 442.0);
    }

    #[test]
    fn test_mismatched_track_rejected() {
        let track = PitchTrack {
            time: vec![0.0, 0.01],
            frequency: vec![440.0],
            confidence: vec![0.9, 0.9],
        };
        assert!(track.validate().is_err());
    }

    #[test]
    fn test_jump_penalty_only_on_wide_jumps() {
        let mut track = PitchTrack {
            time: vec![0.0, 0.01, 0.02],
            frequency: vec![440.0, 523.25, 1046.5],
            confidence: vec![0.9, 0.9, 0.9],
        };
        penalize_jumps(&mut track, 1.0);
        assert_eq!(track.confidence[1], 0.9);
        assert!(track.confidence[2] < 0.9);
    }
}
