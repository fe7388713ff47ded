//! Sine-tone audio preview of a note sequence

use crate::audio;
use crate::config::PreviewConfig;
use crate::error::Result;
use crate::note::Note;

/// Render notes as equal-tempered sine tones
///
/// Each note sounds at its quantized pitch, not the raw anchor frequency, so
/// the preview plays what the MIDI file contains.
pub fn synthesize(notes: &[Note], config: &PreviewConfig) -> Vec<f32> {
    let sr = config.sample_rate as f64;
    let total_sec = notes.iter().map(|n| n.end_time).fold(0.0f64, f64::max);
    let mut out = vec![0.0f32; (total_sec * sr).ceil() as usize + 1];

    let fade_samples = ((config.fade_ms as f64 / 1000.0) * sr) as usize;
    for note in notes {
        if note.frequency <= 0.0 {
            continue;
        }
        let start = (note.start_time.max(0.0) * sr).round() as usize;
        let end = ((note.end_time * sr).round() as usize).min(out.len());
        if end <= start {
            continue;
        }

        let freq = note.note_name.frequency();
        let len = end - start;
        let fade = fade_samples.min(len / 2);
        for (i, slot) in out[start..end].iter_mut().enumerate() {
            let t = i as f64 / sr;
            let envelope = if fade == 0 {
                1.0
            } else if i < fade {
                i as f32 / fade as f32
            } else if i >= len - fade {
                (len - i) as f32 / fade as f32
            } else {
                1.0
            };
            *slot += config.amplitude
                * envelope
                * (2.0 * std::f64::consts::PI * freq * t).sin() as f32;
        }
    }

    out
}

/// Render notes to 16-bit WAV bytes
pub fn preview_wav_bytes(notes: &[Note], config: &PreviewConfig) -> Result<Vec<u8>> {
    let samples = synthesize(notes, config);
    audio::encode_wav_bytes(&samples, config.sample_rate)
}
