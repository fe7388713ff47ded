//! Whistle-to-Sheet Transcription System
//!
//! Turns a monophonic recording (whistling, humming) into a sequence of
//! discrete notes, then renders those notes as a staff preview image and a
//! Standard MIDI File.
//!
//! Audio → pitch frames ([`pitch`]) → notes ([`segment`]) → artifacts
//! ([`sheet`], [`midi`]).

pub mod analysis;
pub mod audio;
pub mod config;
pub mod error;
pub mod midi;
pub mod note;
pub mod pitch;
pub mod segment;
pub mod sheet;
pub mod synth;

pub use config::Config;
pub use error::{FailureKind, Result, WhistleError};
pub use midi::{MidiSerializer, SmfSerializer};
pub use note::{Note, NoteName, PitchFrame};
pub use pitch::{PitchEstimator, PitchExtractor, YinEstimator};
pub use segment::Segmenter;

use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// Finished transcription: notes plus independently rendered artifacts
#[derive(Debug)]
pub struct Transcription {
    pub notes: Vec<Note>,
    /// Rate the pitch analysis ran at
    pub sample_rate: u32,
    pub frame_count: usize,
    pub voiced_frame_count: usize,
    /// PNG staff preview
    pub sheet_image: Result<Vec<u8>>,
    /// Standard MIDI File bytes
    pub midi_bytes: Result<Vec<u8>>,
}

impl Transcription {
    /// Both artifacts rendered
    pub fn is_complete(&self) -> bool {
        self.sheet_image.is_ok() && self.midi_bytes.is_ok()
    }
}

/// Files written by [`WhistleToSheet::process`]
#[derive(Debug, Clone, Default)]
pub struct OutputFiles {
    pub midi: Option<PathBuf>,
    pub sheet: Option<PathBuf>,
    pub analysis: Option<PathBuf>,
    pub preview: Option<PathBuf>,
}

/// Main processing pipeline for whistle-to-sheet conversion
pub struct WhistleToSheet {
    config: Config,
    extractor: PitchExtractor,
    segmenter: Segmenter,
    serializer: Box<dyn MidiSerializer>,
}

impl WhistleToSheet {
    /// Create a processor with the bundled YIN estimator and SMF writer
    pub fn new(config: Config) -> Self {
        let estimator = Box::new(YinEstimator::new(&config.pitch));
        let serializer = Box::new(SmfSerializer::new(&config.midi));
        Self::with_components(config, estimator, serializer)
    }

    /// Create a processor with substitute collaborators
    pub fn with_components(
        config: Config,
        estimator: Box<dyn PitchEstimator>,
        serializer: Box<dyn MidiSerializer>,
    ) -> Self {
        let extractor = PitchExtractor::with_estimator(&config, estimator);
        let segmenter = Segmenter::new(&config);
        Self {
            config,
            extractor,
            segmenter,
            serializer,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Transcribe WAV bytes
    ///
    /// `sample_rate_hint` overrides the rate in the WAV header when given.
    pub fn transcribe(
        &self,
        audio_bytes: &[u8],
        sample_rate_hint: Option<u32>,
    ) -> Result<Transcription> {
        let audio = audio::decode_wav_bytes(audio_bytes, sample_rate_hint)?;
        self.transcribe_samples(&audio.samples, audio.sample_rate)
    }

    /// Transcribe already decoded mono samples
    pub fn transcribe_samples(&self, samples: &[f32], sample_rate: u32) -> Result<Transcription> {
        audio::validate_audio(samples, sample_rate, &self.config)?;

        let frames = self.extractor.extract(samples, sample_rate)?;
        let voiced_frame_count = frames.iter().filter(|f| f.frequency > 0.0).count();

        let notes = self.segmenter.segment(&frames)?;
        if notes.is_empty() {
            return Err(WhistleError::EmptyMelody {
                frames: frames.len(),
                voiced_frames: voiced_frame_count,
            });
        }
        info!(
            "Detected {} notes from {} frames ({} voiced)",
            notes.len(),
            frames.len(),
            voiced_frame_count
        );

        let sheet_image = sheet::render_sheet_png(&notes, &self.config.sheet);
        if let Err(e) = &sheet_image {
            warn!("Sheet preview unavailable: {}", e);
        }

        let midi_bytes =
            midi::notes_to_midi_bytes(&notes, &self.config.midi, self.serializer.as_ref());
        if let Err(e) = &midi_bytes {
            warn!("MIDI export unavailable: {}", e);
        }

        Ok(Transcription {
            notes,
            sample_rate: self.extractor.required_sample_rate(),
            frame_count: frames.len(),
            voiced_frame_count,
            sheet_image,
            midi_bytes,
        })
    }

    /// Transcribe a WAV file and write its artifacts into `output_dir`
    pub fn process<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        input_path: P,
        output_dir: Q,
        sample_rate_hint: Option<u32>,
        write_preview: bool,
    ) -> Result<(Transcription, OutputFiles)> {
        let bytes = std::fs::read(input_path.as_ref())?;
        debug!(
            "Read {} bytes from {}",
            bytes.len(),
            input_path.as_ref().display()
        );
        let transcription = self.transcribe(&bytes, sample_rate_hint)?;
        let files = self.export_results(&transcription, output_dir.as_ref(), write_preview)?;
        Ok((transcription, files))
    }

    /// Write MIDI, sheet preview, analysis report and optional audio preview
    pub fn export_results(
        &self,
        transcription: &Transcription,
        output_dir: &Path,
        write_preview: bool,
    ) -> Result<OutputFiles> {
        std::fs::create_dir_all(output_dir)?;
        let mut files = OutputFiles::default();

        if let Ok(bytes) = &transcription.midi_bytes {
            let path = output_dir.join("melody.mid");
            midi::export_midi(bytes, &path)?;
            files.midi = Some(path);
        }

        if let Ok(bytes) = &transcription.sheet_image {
            let path = output_dir.join("sheet.png");
            std::fs::write(&path, bytes)?;
            files.sheet = Some(path);
        }

        files.analysis = Some(analysis::export_analysis(transcription, output_dir)?);

        if write_preview {
            let path = output_dir.join("preview.wav");
            let bytes = synth::preview_wav_bytes(&transcription.notes, &self.config.preview)?;
            std::fs::write(&path, bytes)?;
            files.preview = Some(path);
        }

        Ok(files)
    }
}

/// Validate configuration and input file
///
/// Applies `sample_rate_hint` the same way [`WhistleToSheet::transcribe`] does,
/// so anything rejected here would also be rejected by the pipeline.
pub fn validate_input<P: AsRef<Path>>(
    input_path: P,
    config: &Config,
    sample_rate_hint: Option<u32>,
) -> Result<()> {
    let input_path = input_path.as_ref();
    if !input_path.exists() {
        return Err(WhistleError::InputValidation(format!(
            "Audio file does not exist: {}",
            input_path.display()
        )));
    }

    config::validate_config(config)?;
    let bytes = std::fs::read(input_path)?;
    let audio = audio::decode_wav_bytes(&bytes, sample_rate_hint)?;
    audio::validate_audio(&audio.samples, audio.sample_rate, config)?;
    debug!(
        "Validated {} ({:.2}s at {} Hz)",
        input_path.display(),
        audio.duration_sec(),
        audio.sample_rate
    );
    Ok(())
}
