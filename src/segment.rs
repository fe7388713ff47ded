//! Note segmentation: group the per-frame pitch stream into discrete notes
//!
//! The segmenter holds at most one open note. Each frame either extends it
//! (frequency within the drift tolerance of the note's anchor), closes it and
//! opens another (larger drift), or closes it (unvoiced frame). Closed notes
//! shorter than the minimum duration are dropped.
//!
//! The per-frame logic is the pure [`step`] function; [`Segmenter::segment`]
//! folds it over the frame slice.

use crate::config::Config;
use crate::error::{Result, WhistleError};
use crate::note::{frequency_to_note_name, Note, NoteName, PitchFrame};
use log::debug;

/// Absorbs float error in frame timestamps when testing minimum duration
const DURATION_EPSILON: f64 = 1e-9;

/// Fixed policy applied while segmenting
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentationPolicy {
    pub drift_tolerance_hz: f32,
    pub min_note_duration_sec: f64,
    pub confidence_threshold: f32,
}

impl Default for SegmentationPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl SegmentationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            drift_tolerance_hz: config.segmentation.drift_tolerance_hz,
            min_note_duration_sec: config.segmentation.min_note_duration_sec,
            confidence_threshold: config.pitch.confidence_threshold,
        }
    }

    /// Whether a closed note is long enough to keep
    pub fn accepts(&self, note: &Note) -> bool {
        note.duration() + DURATION_EPSILON >= self.min_note_duration_sec
    }

    /// Note name for a frame, or `None` when it counts as silence
    pub fn frame_note(&self, frame: &PitchFrame) -> Option<NoteName> {
        if !frame.is_voiced(self.confidence_threshold) {
            return None;
        }
        frequency_to_note_name(frame.frequency)
    }
}

/// Segmenter state between frames
#[derive(Debug, Clone, PartialEq)]
pub enum SegmenterState {
    Idle,
    Open(Note),
}

fn open_note(frame: &PitchFrame, note_name: NoteName) -> SegmenterState {
    SegmenterState::Open(Note {
        start_time: frame.time,
        end_time: frame.time,
        note_name,
        frequency: frame.frequency,
    })
}

fn close(note: Note, policy: &SegmentationPolicy) -> Option<Note> {
    policy.accepts(&note).then_some(note)
}

/// Advance the state machine by one frame
///
/// Returns the new state and at most one finished note.
pub fn step(
    state: SegmenterState,
    frame: &PitchFrame,
    policy: &SegmentationPolicy,
) -> (SegmenterState, Option<Note>) {
    let note_name = policy.frame_note(frame);

    match (state, note_name) {
        (SegmenterState::Idle, Some(name)) => (open_note(frame, name), None),
        (SegmenterState::Idle, None) => (SegmenterState::Idle, None),
        (SegmenterState::Open(mut current), Some(name)) => {
            if (frame.frequency - current.frequency).abs() < policy.drift_tolerance_hz {
                current.end_time = frame.time;
                (SegmenterState::Open(current), None)
            } else {
                (open_note(frame, name), close(current, policy))
            }
        }
        (SegmenterState::Open(current), None) => (SegmenterState::Idle, close(current, policy)),
    }
}

/// Flush the open note at end of stream
pub fn finish(state: SegmenterState, policy: &SegmentationPolicy) -> Option<Note> {
    match state {
        SegmenterState::Idle => None,
        SegmenterState::Open(note) => close(note, policy),
    }
}

/// Frame-stream to note-sequence converter
#[derive(Debug, Clone, Default)]
pub struct Segmenter {
    policy: SegmentationPolicy,
}

impl Segmenter {
    pub fn new(config: &Config) -> Self {
        Self {
            policy: SegmentationPolicy::from_config(config),
        }
    }

    pub fn with_policy(policy: SegmentationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &SegmentationPolicy {
        &self.policy
    }

    /// Segment frames into notes
    ///
    /// Malformed input (non-finite values or time going backwards) aborts the
    /// whole segmentation; no partial list is returned.
    pub fn segment(&self, frames: &[PitchFrame]) -> Result<Vec<Note>> {
        validate_frames(frames)?;

        let mut notes = Vec::new();
        let state = frames
            .iter()
            .fold(SegmenterState::Idle, |state, frame| {
                let (next, emitted) = step(state, frame, &self.policy);
                notes.extend(emitted);
                next
            });
        notes.extend(finish(state, &self.policy));

        debug!("Segmented {} frames into {} notes", frames.len(), notes.len());
        Ok(notes)
    }
}

fn validate_frames(frames: &[PitchFrame]) -> Result<()> {
    let mut previous_time = f64::NEG_INFINITY;
    for (i, frame) in frames.iter().enumerate() {
        if !frame.time.is_finite() || !frame.frequency.is_finite() || !frame.confidence.is_finite()
        {
            return Err(WhistleError::Segmentation(format!(
                "frame {} has a non-finite value ({:?})",
                i, frame
            )));
        }
        if frame.time < previous_time {
            return Err(WhistleError::Segmentation(format!(
                "frame {} time {:.4}s precedes previous frame time {:.4}s",
                i, frame.time, previous_time
            )));
        }
        previous_time = frame.time;
    }
    Ok(())
}
