//! Configuration system for the whistle-to-sheet transcriber

use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub version: String,
    pub audio: AudioConfig,
    pub pitch: PitchConfig,
    pub segmentation: SegmentationConfig,
    pub midi: MidiConfig,
    pub sheet: SheetConfig,
    pub preview: PreviewConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            audio: AudioConfig::default(),
            pitch: PitchConfig::default(),
            segmentation: SegmentationConfig::default(),
            midi: MidiConfig::default(),
            sheet: SheetConfig::default(),
            preview: PreviewConfig::default(),
        }
    }
}

/// Audio input configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AudioConfig {
    /// Lowest accepted input sample rate
    pub min_sample_rate: u32,
    /// Highest accepted input sample rate
    pub max_sample_rate: u32,
    /// FFT resampler input chunk size
    pub resample_chunk_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            min_sample_rate: 4000,
            max_sample_rate: 192_000,
            resample_chunk_size: 1024,
        }
    }
}

/// Decoding strategy applied to the raw per-frame estimates
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PitchDecoding {
    /// Use every frame estimate as-is
    Greedy,
    /// Penalise confidence on implausible frame-to-frame jumps
    #[default]
    Viterbi,
}

/// Pitch extraction configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PitchConfig {
    /// Rate the estimator analyses at; input is resampled to it
    pub sample_rate: u32,
    /// Analysis step between frames
    pub step_ms: f64,
    pub min_frequency_hz: f32,
    pub max_frequency_hz: f32,
    /// YIN absolute threshold on the normalized difference function
    pub yin_threshold: f32,
    pub decoding: PitchDecoding,
    /// Penalty strength for the viterbi decoding
    pub jump_penalty: f32,
    /// Frames below this confidence are treated as unvoiced
    pub confidence_threshold: f32,
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            step_ms: 10.0,
            min_frequency_hz: 60.0,
            max_frequency_hz: 4000.0,
            yin_threshold: 0.1,
            decoding: PitchDecoding::Viterbi,
            jump_penalty: 1.0,
            confidence_threshold: 0.5,
        }
    }
}

/// Note segmentation configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SegmentationConfig {
    /// Frequency drift from the anchor tolerated inside one note
    pub drift_tolerance_hz: f32,
    /// Notes shorter than this are discarded
    pub min_note_duration_sec: f64,
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            drift_tolerance_hz: 50.0,
            min_note_duration_sec: 0.1,
        }
    }
}

/// MIDI export configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MidiConfig {
    /// General MIDI program (0 = acoustic grand piano)
    pub program: u8,
    pub velocity: u8,
    pub channel: u8,
    /// Pulses per quarter note
    pub ppq: u16,
    /// Nominal tempo used only to convert seconds to ticks
    pub tempo_bpm: f64,
    pub track_name: String,
}

impl Default for MidiConfig {
    fn default() -> Self {
        Self {
            program: 0,
            velocity: 100,
            channel: 0,
            ppq: 480,
            tempo_bpm: 120.0,
            track_name: "Whistled Melody".to_string(),
        }
    }
}

/// Staff preview configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SheetConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub note_radius: i32,
    pub label_font_size: u32,
}

impl Default for SheetConfig {
    fn default() -> Self {
        Self {
            width: 1200,
            height: 600,
            title: "Generated Sheet Music".to_string(),
            note_radius: 10,
            label_font_size: 16,
        }
    }
}

/// Audio preview synthesis configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PreviewConfig {
    pub sample_rate: u32,
    /// Peak amplitude of each tone
    pub amplitude: f32,
    /// Linear fade in/out applied to each tone
    pub fade_ms: f32,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            sample_rate: 22_050,
            amplitude: 0.3,
            fade_ms: 5.0,
        }
    }
}

/// Validate configuration parameters
pub fn validate_config(config: &Config) -> anyhow::Result<()> {
    let pitch = &config.pitch;
    if pitch.sample_rate == 0 {
        anyhow::bail!("pitch.sample_rate must be > 0");
    }
    if pitch.step_ms <= 0.0 {
        anyhow::bail!("pitch.step_ms must be > 0");
    }
    if pitch.min_frequency_hz <= 0.0 || pitch.min_frequency_hz >= pitch.max_frequency_hz {
        anyhow::bail!("pitch frequency range must satisfy 0 < min < max");
    }
    if pitch.max_frequency_hz > pitch.sample_rate as f32 / 2.0 {
        anyhow::bail!(
            "pitch.max_frequency_hz {} exceeds Nyquist for {} Hz",
            pitch.max_frequency_hz,
            pitch.sample_rate
        );
    }
    if !(0.0..=1.0).contains(&pitch.confidence_threshold) {
        anyhow::bail!("pitch.confidence_threshold must be within [0, 1]");
    }
    if !(0.0..=1.0).contains(&pitch.yin_threshold) {
        anyhow::bail!("pitch.yin_threshold must be within [0, 1]");
    }

    if config.segmentation.drift_tolerance_hz <= 0.0 {
        anyhow::bail!("segmentation.drift_tolerance_hz must be > 0");
    }
    if config.segmentation.min_note_duration_sec < 0.0 {
        anyhow::bail!("segmentation.min_note_duration_sec must be >= 0");
    }

    let midi = &config.midi;
    if midi.program > 127 || midi.velocity > 127 || midi.velocity == 0 {
        anyhow::bail!("midi.program must be <= 127 and midi.velocity within 1..=127");
    }
    if midi.channel > 15 {
        anyhow::bail!("midi.channel must be <= 15");
    }
    if midi.ppq == 0 || midi.ppq > 0x7FFF || midi.tempo_bpm <= 0.0 {
        anyhow::bail!("midi.ppq must be within 1..=32767 and midi.tempo_bpm > 0");
    }

    if config.sheet.width < 100 || config.sheet.height < 100 {
        anyhow::bail!("sheet dimensions must be at least 100x100");
    }

    if config.audio.min_sample_rate > config.audio.max_sample_rate {
        anyhow::bail!("audio.min_sample_rate must be <= audio.max_sample_rate");
    }
    if config.audio.resample_chunk_size == 0 {
        anyhow::bail!("audio.resample_chunk_size must be > 0");
    }

    if config.preview.sample_rate == 0 || !(0.0..=1.0).contains(&config.preview.amplitude) {
        anyhow::bail!("preview.sample_rate must be > 0 and preview.amplitude within [0, 1]");
    }

    Ok(())
}

/// Load configuration from JSON file
pub fn load_config<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    let config: Config = serde_json::from_str(&content)?;
    validate_config(&config)?;
    Ok(config)
}

/// Save configuration to JSON file
pub fn save_config<P: AsRef<std::path::Path>>(config: &Config, path: P) -> anyhow::Result<()> {
    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_default_policy_constants() {
        let config = Config::default();
        assert_eq!(config.pitch.sample_rate, 16_000);
        assert_eq!(config.pitch.step_ms, 10.0);
        assert_eq!(config.pitch.confidence_threshold, 0.5);
        assert_eq!(config.segmentation.drift_tolerance_hz, 50.0);
        assert_eq!(config.segmentation.min_note_duration_sec, 0.1);
        assert_eq!(config.midi.program, 0);
        assert_eq!(config.midi.velocity, 100);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{ "segmentation": { "drift_tolerance_hz": 30.0 } }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.segmentation.drift_tolerance_hz, 30.0);
        assert_eq!(config.segmentation.min_note_duration_sec, 0.1);
        assert_eq!(config.pitch, PitchConfig::default());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut config = Config::default();
        config.pitch.confidence_threshold = 1.5;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.pitch.max_frequency_hz = 9000.0;
        assert!(validate_config(&config).is_err());

        let mut config = Config::default();
        config.midi.velocity = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_decoding_serializes_snake_case() {
        let json = serde_json::to_string(&PitchDecoding::Viterbi).unwrap();
        assert_eq!(json, "\"viterbi\"");
    }
}
