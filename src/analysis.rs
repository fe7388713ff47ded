//! Transcription report and note listing

use crate::note::Note;
use crate::Transcription;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Per-note summary
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NoteSummary {
    pub index: usize,
    pub note_name: String,
    pub midi_number: i32,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub anchor_frequency_hz: f32,
}

/// Serializable account of one transcription
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptionReport {
    pub analysis_sample_rate: u32,
    pub frame_count: usize,
    pub voiced_frame_count: usize,
    pub note_count: usize,
    pub total_note_duration_sec: f64,
    pub notes: Vec<NoteSummary>,
    pub sheet_rendered: bool,
    pub midi_rendered: bool,
    /// Messages of any artifact that failed to render
    pub rendering_errors: Vec<String>,
}

/// Build the report for a transcription
pub fn build_report(transcription: &Transcription) -> TranscriptionReport {
    let notes: Vec<NoteSummary> = transcription
        .notes
        .iter()
        .enumerate()
        .map(|(i, note)| NoteSummary {
            index: i + 1,
            note_name: note.note_name.to_string(),
            midi_number: note.note_name.midi_number(),
            start_time: note.start_time,
            end_time: note.end_time,
            duration: note.duration(),
            anchor_frequency_hz: note.frequency,
        })
        .collect();

    let rendering_errors = [&transcription.sheet_image, &transcription.midi_bytes]
        .iter()
        .filter_map(|artifact| artifact.as_ref().err().map(|e| e.to_string()))
        .collect();

    TranscriptionReport {
        analysis_sample_rate: transcription.sample_rate,
        frame_count: transcription.frame_count,
        voiced_frame_count: transcription.voiced_frame_count,
        note_count: notes.len(),
        total_note_duration_sec: notes.iter().map(|n| n.duration).sum(),
        notes,
        sheet_rendered: transcription.sheet_image.is_ok(),
        midi_rendered: transcription.midi_bytes.is_ok(),
        rendering_errors,
    }
}

/// Export the report as pretty JSON
pub fn export_analysis(
    transcription: &Transcription,
    output_dir: &Path,
) -> crate::Result<std::path::PathBuf> {
    std::fs::create_dir_all(output_dir)?;
    let analysis_path = output_dir.join("analysis.json");

    let report = build_report(transcription);
    let json = serde_json::to_string_pretty(&report)?;
    std::fs::write(&analysis_path, json)?;

    Ok(analysis_path)
}

/// Human readable listing, one line per note
pub fn format_note_listing(notes: &[Note]) -> String {
    notes
        .iter()
        .enumerate()
        .map(|(i, note)| {
            format!(
                "Note {}: {} ({:.2}s - {:.2}s)",
                i + 1,
                note.note_name,
                note.start_time,
                note.end_time
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_note_listing() {
        let notes = vec![
            Note {
                start_time: 0.0,
                end_time: 0.49,
                note_name: "A4".parse().unwrap(),
                frequency: 440.0,
            },
            Note {
                start_time: 0.5,
                end_time: 0.99,
                note_name: "C5".parse().unwrap(),
                frequency: 523.25,
            },
        ];
        assert_eq!(
            format_note_listing(&notes),
            "Note 1: A4 (0.00s - 0.49s)\nNote 2: C5 (0.50s - 0.99s)"
        );
        assert_eq!(format_note_listing(&[]), "");
    }
}
