//! End-to-end transcription through the orchestrator

use std::sync::Arc;
use whistle2sheet::analysis::TranscriptionReport;
use whistle2sheet::audio::{encode_wav_bytes, sine_tone};
use whistle2sheet::midi::{read_midi_notes, MidiNoteEvent};
use whistle2sheet::pitch::PitchTrack;
use whistle2sheet::{
    validate_input, Config, FailureKind, MidiSerializer, PitchEstimator, Result, SmfSerializer,
    WhistleError, WhistleToSheet, YinEstimator,
};

/// Half a second of A4, a 50 ms breath, then half a second of C5, as WAV bytes
fn two_note_whistle(sample_rate: u32) -> Vec<u8> {
    let mut samples = sine_tone(440.0, sample_rate, 0.5, 0.5);
    samples.extend(std::iter::repeat(0.0).take(sample_rate as usize / 20));
    samples.extend(sine_tone(523.25, sample_rate, 0.5, 0.5));
    encode_wav_bytes(&samples, sample_rate).unwrap()
}

/// Serializer that always fails
struct BrokenSerializer;

impl MidiSerializer for BrokenSerializer {
    fn serialize(&self, _events: &[MidiNoteEvent], _program: u8) -> Result<Vec<u8>> {
        Err(WhistleError::MidiExport("synthesizer offline".to_string()))
    }
}

/// Estimator that reports a steady pitch for the whole input
struct SteadyEstimator {
    frequency: f32,
}

impl PitchEstimator for SteadyEstimator {
    fn required_sample_rate(&self) -> u32 {
        16000
    }

    fn estimate(&self, samples: &[f32], sample_rate: u32) -> Result<PitchTrack> {
        let n = 1 + samples.len() / (sample_rate as usize / 100);
        Ok(PitchTrack {
            time: (0..n).map(|i| i as f64 * 0.01).collect(),
            frequency: vec![self.frequency; n],
            confidence: vec![0.95; n],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_note_whistle() {
        let processor = WhistleToSheet::new(Config::default());
        let transcription = processor.transcribe(&two_note_whistle(16000), None).unwrap();

        let names: Vec<String> = transcription
            .notes
            .iter()
            .map(|n| n.note_name.to_string())
            .collect();
        assert_eq!(names, vec!["A4", "C5"]);
        assert!(transcription.notes[0].start_time < 0.05);
        assert!((transcription.notes[1].start_time - 0.55).abs() < 0.05);
        assert_eq!(transcription.sample_rate, 16000);
        assert_eq!(transcription.frame_count, 1 + 16800 / 160);

        let midi = transcription.midi_bytes.as_ref().unwrap();
        let pitches: Vec<u8> = read_midi_notes(midi)
            .unwrap()
            .iter()
            .map(|e| e.pitch)
            .collect();
        assert_eq!(pitches, vec![69, 72]);

        let png = transcription.sheet_image.as_ref().unwrap();
        assert_eq!(&png[..8], b"\x89PNG\r\n\x1a\n");
        assert!(transcription.is_complete());
    }

    #[test]
    fn test_resampled_input_matches() {
        let processor = WhistleToSheet::new(Config::default());
        let transcription = processor.transcribe(&two_note_whistle(44100), None).unwrap();
        let names: Vec<String> = transcription
            .notes
            .iter()
            .map(|n| n.note_name.to_string())
            .collect();
        assert_eq!(names, vec!["A4", "C5"]);
    }

    #[test]
    fn test_silence_is_empty_melody() {
        let processor = WhistleToSheet::new(Config::default());
        let bytes = encode_wav_bytes(&vec![0.0; 16000], 16000).unwrap();
        let err = processor.transcribe(&bytes, None).unwrap_err();
        assert_eq!(err.kind(), FailureKind::EmptyMelody);
        assert!(err.is_empty_melody());
        assert!(matches!(
            err,
            WhistleError::EmptyMelody {
                frames: 101,
                voiced_frames: 0
            }
        ));
    }

    #[test]
    fn test_garbage_bytes_are_extraction_failure() {
        let processor = WhistleToSheet::new(Config::default());
        let err = processor.transcribe(b"RIFF0000garbage", None).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Extraction);
        let err = processor.transcribe(&[], None).unwrap_err();
        assert_eq!(err.kind(), FailureKind::Extraction);
    }

    #[test]
    fn test_midi_failure_keeps_sheet() {
        let config = Config::default();
        let processor = WhistleToSheet::with_components(
            config.clone(),
            Box::new(YinEstimator::new(&config.pitch)),
            Box::new(BrokenSerializer),
        );
        let transcription = processor.transcribe(&two_note_whistle(16000), None).unwrap();

        assert_eq!(transcription.notes.len(), 2);
        let err = transcription.midi_bytes.as_ref().unwrap_err();
        assert_eq!(err.kind(), FailureKind::Rendering);
        assert!(transcription.sheet_image.is_ok());
        assert!(!transcription.is_complete());
    }

    #[test]
    fn test_substitute_estimator() {
        let config = Config::default();
        let processor = WhistleToSheet::with_components(
            config.clone(),
            Box::new(SteadyEstimator { frequency: 660.0 }),
            Box::new(SmfSerializer::new(&config.midi)),
        );
        let transcription = processor.transcribe_samples(&[0.0; 16000], 16000).unwrap();

        assert_eq!(transcription.notes.len(), 1);
        assert_eq!(transcription.notes[0].note_name.to_string(), "E5");
        assert_eq!(transcription.voiced_frame_count, 101);
    }

    #[test]
    fn test_process_writes_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("whistle.wav");
        std::fs::write(&input, two_note_whistle(16000)).unwrap();
        let out_dir = dir.path().join("out");

        let processor = WhistleToSheet::new(Config::default());
        let (transcription, files) = processor.process(&input, &out_dir, None, true).unwrap();

        for path in [&files.midi, &files.sheet, &files.analysis, &files.preview] {
            let path = path.as_ref().unwrap();
            assert!(path.exists(), "{} missing", path.display());
        }
        assert_eq!(files.midi.as_ref().unwrap(), &out_dir.join("melody.mid"));

        let json = std::fs::read_to_string(out_dir.join("analysis.json")).unwrap();
        let report: TranscriptionReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report.note_count, transcription.notes.len());
        assert_eq!(report.notes[0].note_name, "A4");
        assert!(report.midi_rendered);
        assert!(report.rendering_errors.is_empty());
    }

    #[test]
    fn test_process_without_preview() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("whistle.wav");
        std::fs::write(&input, two_note_whistle(16000)).unwrap();

        let processor = WhistleToSheet::new(Config::default());
        let (_, files) = processor.process(&input, dir.path(), None, false).unwrap();
        assert!(files.preview.is_none());
        assert!(!dir.path().join("preview.wav").exists());
    }

    #[test]
    fn test_shared_between_threads() {
        let processor = Arc::new(WhistleToSheet::new(Config::default()));
        let bytes = Arc::new(two_note_whistle(16000));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let processor = Arc::clone(&processor);
                let bytes = Arc::clone(&bytes);
                std::thread::spawn(move || processor.transcribe(&bytes, None).map(|t| t.notes))
            })
            .collect();

        let results: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().unwrap().unwrap())
            .collect();
        for notes in &results[1..] {
            assert_eq!(notes, &results[0]);
        }
    }

    #[test]
    fn test_validate_input_honours_sample_rate_hint() {
        // Header claims 2000 Hz, below the accepted range; the samples are really 16 kHz
        let samples = sine_tone(440.0, 16000, 0.5, 0.5);
        let bytes = encode_wav_bytes(&samples, 2000).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("recording.raw");
        std::fs::write(&input, &bytes).unwrap();

        let config = Config::default();
        let err = validate_input(&input, &config, None).unwrap_err();
        assert!(matches!(err, WhistleError::UnsupportedSampleRate(2000)));

        validate_input(&input, &config, Some(16000)).unwrap();
        let transcription = WhistleToSheet::new(config)
            .transcribe(&bytes, Some(16000))
            .unwrap();
        assert_eq!(transcription.notes.len(), 1);
    }

    #[test]
    fn test_validate_input_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_input(dir.path().join("absent.wav"), &Config::default(), None)
            .unwrap_err();
        assert!(matches!(err, WhistleError::InputValidation(_)));
    }
}
