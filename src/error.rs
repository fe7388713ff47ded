//! Error types for the whistle-to-sheet system

use thiserror::Error;

/// Broad category of a failure, used by callers to pick a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Audio could not be decoded, resampled or analysed for pitch
    Extraction,
    /// The pitch frame stream was malformed
    Segmentation,
    /// Analysis succeeded but no note survived segmentation
    EmptyMelody,
    /// A staff preview or MIDI artifact could not be produced
    Rendering,
    /// Configuration or file system problem outside the pipeline proper
    Setup,
}

/// Custom error type for whistle transcription
#[derive(Error, Debug)]
pub enum WhistleError {
    /// E001: Invalid audio format (e.g., unsupported bit depth)
    #[error("E001: Invalid audio format - {0}")]
    InvalidAudioFormat(String),

    /// E002: Unsupported sample rate
    #[error("E002: Unsupported sample rate {0} Hz")]
    UnsupportedSampleRate(u32),

    /// E003: Audio bytes could not be decoded
    #[error("E003: Audio decode error - {0}")]
    AudioDecode(String),

    /// E004: Resampling to the analysis rate failed
    #[error("E004: Resampling error - {0}")]
    Resample(String),

    /// E005: The pitch estimator failed or returned malformed output
    #[error("E005: Pitch estimation error - {0}")]
    PitchEstimation(String),

    /// E006: The frame stream could not be segmented
    #[error("E006: Segmentation error - {0}")]
    Segmentation(String),

    /// E007: No notes were detected
    #[error("E007: No melody detected ({voiced_frames} of {frames} frames voiced)")]
    EmptyMelody { frames: usize, voiced_frames: usize },

    /// E008: MIDI serialization failed
    #[error("E008: MIDI export error - {0}")]
    MidiExport(String),

    /// E009: Staff preview rendering failed
    #[error("E009: Sheet rendering error - {0}")]
    SheetRender(String),

    /// E010: Invalid configuration parameter
    #[error("E010: Invalid configuration parameter - {0}")]
    InvalidConfigParameter(String),

    /// E011: File I/O error
    #[error("E011: File I/O error - {0}")]
    Io(#[from] std::io::Error),

    /// E012: Analysis export error
    #[error("E012: Analysis export error - {0}")]
    AnalysisExport(String),

    /// E013: Input validation error
    #[error("E013: Input validation error - {0}")]
    InputValidation(String),
}

impl WhistleError {
    /// Classify this error for presentation
    pub fn kind(&self) -> FailureKind {
        match self {
            WhistleError::InvalidAudioFormat(_)
            | WhistleError::UnsupportedSampleRate(_)
            | WhistleError::AudioDecode(_)
            | WhistleError::Resample(_)
            | WhistleError::PitchEstimation(_)
            | WhistleError::InputValidation(_) => FailureKind::Extraction,
            WhistleError::Segmentation(_) => FailureKind::Segmentation,
            WhistleError::EmptyMelody { .. } => FailureKind::EmptyMelody,
            WhistleError::MidiExport(_) | WhistleError::SheetRender(_) => FailureKind::Rendering,
            WhistleError::InvalidConfigParameter(_)
            | WhistleError::Io(_)
            | WhistleError::AnalysisExport(_) => FailureKind::Setup,
        }
    }

    /// True when the input simply contained no recognisable melody
    pub fn is_empty_melody(&self) -> bool {
        self.kind() == FailureKind::EmptyMelody
    }
}

impl From<hound::Error> for WhistleError {
    fn from(err: hound::Error) -> Self {
        WhistleError::AudioDecode(err.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for WhistleError {
    fn from(err: rubato::ResamplerConstructionError) -> Self {
        WhistleError::Resample(err.to_string())
    }
}

impl From<rubato::ResampleError> for WhistleError {
    fn from(err: rubato::ResampleError) -> Self {
        WhistleError::Resample(err.to_string())
    }
}

impl From<serde_json::Error> for WhistleError {
    fn from(err: serde_json::Error) -> Self {
        WhistleError::AnalysisExport(format!("JSON serialization error: {}", err))
    }
}

impl From<anyhow::Error> for WhistleError {
    fn from(err: anyhow::Error) -> Self {
        WhistleError::InvalidConfigParameter(err.to_string())
    }
}

/// Result type alias for whistle transcription operations
pub type Result<T> = std::result::Result<T, WhistleError>;
