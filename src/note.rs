//! Pitch frames, note names and detected notes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Reference pitch of A4 in Hz
pub const A4_HZ: f64 = 440.0;

/// Frequency of C0, the bottom of octave 0 (A4 * 2^-4.75)
pub fn c0_hz() -> f64 {
    A4_HZ * 2f64.powf(-4.75)
}

/// One analysis frame of the pitch track
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PitchFrame {
    /// Frame centre in seconds
    pub time: f64,
    /// Estimated fundamental in Hz (0.0 = unvoiced)
    pub frequency: f32,
    /// Estimator confidence (0.0 - 1.0)
    pub confidence: f32,
}

impl PitchFrame {
    pub fn new(time: f64, frequency: f32, confidence: f32) -> Self {
        Self {
            time,
            frequency,
            confidence,
        }
    }

    /// Voiced when a positive frequency passed the confidence gate
    pub fn is_voiced(&self, confidence_threshold: f32) -> bool {
        self.frequency > 0.0 && self.confidence >= confidence_threshold
    }
}

/// The twelve equal-tempered pitch classes, spelled with sharps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PitchClass {
    C,
    CSharp,
    D,
    DSharp,
    E,
    F,
    FSharp,
    G,
    GSharp,
    A,
    ASharp,
    B,
}

impl PitchClass {
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::CSharp,
        PitchClass::D,
        PitchClass::DSharp,
        PitchClass::E,
        PitchClass::F,
        PitchClass::FSharp,
        PitchClass::G,
        PitchClass::GSharp,
        PitchClass::A,
        PitchClass::ASharp,
        PitchClass::B,
    ];

    /// Semitones above C
    pub fn index(&self) -> u8 {
        *self as u8
    }

    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index % 12) as usize]
    }

    pub fn name(&self) -> &'static str {
        match self {
            PitchClass::C => "C",
            PitchClass::CSharp => "C#",
            PitchClass::D => "D",
            PitchClass::DSharp => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::FSharp => "F#",
            PitchClass::G => "G",
            PitchClass::GSharp => "G#",
            PitchClass::A => "A",
            PitchClass::ASharp => "A#",
            PitchClass::B => "B",
        }
    }

    /// Natural letter this class is written on (sharps share their letter)
    pub fn letter(&self) -> char {
        self.name().chars().next().unwrap_or('C')
    }
}

/// Pitch class plus octave, with middle C (MIDI 60) named "C4"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct NoteName {
    pub pitch_class: PitchClass,
    pub octave: i32,
}

impl NoteName {
    pub fn new(pitch_class: PitchClass, octave: i32) -> Self {
        Self {
            pitch_class,
            octave,
        }
    }

    /// MIDI note number; may fall outside 0..=127 for extreme octaves
    pub fn midi_number(&self) -> i32 {
        12 * (self.octave + 1) + self.pitch_class.index() as i32
    }

    /// Equal-tempered frequency of this note
    pub fn frequency(&self) -> f64 {
        midi_to_frequency(self.midi_number() as f64)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.pitch_class.name(), self.octave)
    }
}

impl From<NoteName> for String {
    fn from(name: NoteName) -> Self {
        name.to_string()
    }
}

impl FromStr for NoteName {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let mut chars = s.chars();
        let letter = chars
            .next()
            .ok_or_else(|| "empty note name".to_string())?
            .to_ascii_uppercase();
        let natural: i32 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return Err(format!("invalid note letter in '{}'", s)),
        };

        let rest = chars.as_str();
        let (accidental, octave_str) = match rest.chars().next() {
            Some('#') => (1, &rest[1..]),
            Some('b') => (-1, &rest[1..]),
            _ => (0, rest),
        };
        let octave: i32 = octave_str
            .parse()
            .map_err(|_| format!("invalid octave in '{}'", s))?;

        // Cb and B# wrap across the octave boundary
        let semitone = natural + accidental;
        let octave = octave + semitone.div_euclid(12);
        Ok(Self {
            pitch_class: PitchClass::from_index(semitone.rem_euclid(12) as u8),
            octave,
        })
    }
}

impl TryFrom<String> for NoteName {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

/// A detected musical event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub start_time: f64,
    pub end_time: f64,
    pub note_name: NoteName,
    /// Anchor frequency, taken from the note's first frame
    pub frequency: f32,
}

impl Note {
    pub fn duration(&self) -> f64 {
        self.end_time - self.start_time
    }
}

/// Quantize a frequency to the nearest equal-tempered note
///
/// Returns `None` for non-positive frequencies and anything at or below C0.
pub fn frequency_to_note_name(frequency: f32) -> Option<NoteName> {
    let frequency = frequency as f64;
    if !frequency.is_finite() || frequency <= 0.0 {
        return None;
    }

    let c0 = c0_hz();
    if frequency <= c0 {
        return None;
    }

    let h = (12.0 * (frequency / c0).log2()).round_ties_even() as i64;
    Some(NoteName {
        pitch_class: PitchClass::from_index(h.rem_euclid(12) as u8),
        octave: h.div_euclid(12) as i32,
    })
}

/// Frequency of a (possibly fractional) MIDI note number
pub fn midi_to_frequency(midi: f64) -> f64 {
    A4_HZ * 2f64.powf((midi - 69.0) / 12.0)
}
