//! MIDI export functionality

use crate::config::MidiConfig;
use crate::error::{Result, WhistleError};
use crate::note::Note;
use log::{debug, warn};
use midly::num::{u15, u24, u28, u4, u7};
use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
};
use std::collections::HashMap;
use std::path::Path;

/// Largest tick a variable-length delta can hold (28 bits)
const MAX_TICK: u64 = (1 << 28) - 1;

/// One note as handed to a MIDI serializer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MidiNoteEvent {
    pub pitch: u8,
    pub velocity: u8,
    pub start_sec: f64,
    pub end_sec: f64,
}

/// Capability: turn note events into a playable MIDI byte stream
pub trait MidiSerializer: Send + Sync {
    fn serialize(&self, events: &[MidiNoteEvent], program: u8) -> Result<Vec<u8>>;
}

/// Map detected notes to MIDI note events
///
/// Notes with a non-positive anchor frequency or a pitch outside the MIDI
/// range are left out.
pub fn notes_to_events(notes: &[Note], velocity: u8) -> Vec<MidiNoteEvent> {
    notes
        .iter()
        .filter_map(|note| {
            if note.frequency <= 0.0 {
                return None;
            }
            let midi = note.note_name.midi_number();
            match u8::try_from(midi) {
                Ok(pitch) if pitch <= 127 => Some(MidiNoteEvent {
                    pitch,
                    velocity,
                    start_sec: note.start_time,
                    end_sec: note.end_time,
                }),
                _ => {
                    warn!(
                        "Skipping {} at {:.2}s: MIDI number {} out of range",
                        note.note_name, note.start_time, midi
                    );
                    None
                }
            }
        })
        .collect()
}

/// Standard MIDI File writer: one track, metrical timing, fixed tempo
#[derive(Debug, Clone)]
pub struct SmfSerializer {
    ppq: u16,
    tempo_bpm: f64,
    channel: u8,
    track_name: String,
}

impl Default for SmfSerializer {
    fn default() -> Self {
        Self::new(&MidiConfig::default())
    }
}

impl SmfSerializer {
    pub fn new(config: &MidiConfig) -> Self {
        Self {
            ppq: config.ppq,
            tempo_bpm: config.tempo_bpm,
            channel: config.channel,
            track_name: config.track_name.clone(),
        }
    }

    pub fn ticks_per_second(&self) -> f64 {
        self.ppq as f64 * self.tempo_bpm / 60.0
    }

    fn to_tick(&self, seconds: f64) -> Result<u32> {
        let tick = (seconds.max(0.0) * self.ticks_per_second()).round();
        if tick > MAX_TICK as f64 {
            return Err(WhistleError::MidiExport(format!(
                "time {:.3}s is beyond the last representable tick",
                seconds
            )));
        }
        Ok(tick as u32)
    }
}

#[derive(Debug)]
struct TimedMessage {
    tick: u32,
    /// Note-offs sort before note-ons on the same tick
    order: u8,
    message: MidiMessage,
}

impl MidiSerializer for SmfSerializer {
    fn serialize(&self, events: &[MidiNoteEvent], program: u8) -> Result<Vec<u8>> {
        if program > 127 {
            return Err(WhistleError::MidiExport(format!(
                "program {} outside 0..=127",
                program
            )));
        }

        let mut messages = Vec::with_capacity(events.len() * 2);
        for event in events {
            if event.pitch > 127 || event.velocity > 127 {
                return Err(WhistleError::MidiExport(format!(
                    "event out of range (pitch {}, velocity {})",
                    event.pitch, event.velocity
                )));
            }
            if !(event.start_sec.is_finite() && event.end_sec.is_finite()) {
                return Err(WhistleError::MidiExport(format!(
                    "event with non-finite time at pitch {}",
                    event.pitch
                )));
            }

            let start_tick = self.to_tick(event.start_sec)?;
            let end_tick = self.to_tick(event.end_sec)?.max(start_tick + 1);
            if end_tick as u64 > MAX_TICK {
                return Err(WhistleError::MidiExport(format!(
                    "note at pitch {} ends beyond the last representable tick",
                    event.pitch
                )));
            }
            messages.push(TimedMessage {
                tick: start_tick,
                order: 1,
                message: MidiMessage::NoteOn {
                    key: u7::from(event.pitch),
                    vel: u7::from(event.velocity),
                },
            });
            messages.push(TimedMessage {
                tick: end_tick,
                order: 0,
                message: MidiMessage::NoteOff {
                    key: u7::from(event.pitch),
                    vel: u7::from(0),
                },
            });
        }
        messages.sort_by_key(|m| (m.tick, m.order));

        let tempo_uspq = (60_000_000.0 / self.tempo_bpm).round() as u32;
        let channel = u4::from(self.channel);

        let mut track_events = vec![
            TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Meta(MetaMessage::TrackName(self.track_name.as_bytes())),
            },
            TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::from(tempo_uspq))),
            },
            TrackEvent {
                delta: u28::from(0),
                kind: TrackEventKind::Midi {
                    channel,
                    message: MidiMessage::ProgramChange {
                        program: u7::from(program),
                    },
                },
            },
        ];

        let mut current_tick = 0u32;
        for timed in messages {
            track_events.push(TrackEvent {
                delta: u28::from(timed.tick - current_tick),
                kind: TrackEventKind::Midi {
                    channel,
                    message: timed.message,
                },
            });
            current_tick = timed.tick;
        }

        track_events.push(TrackEvent {
            delta: u28::from(0),
            kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
        });

        let smf = Smf {
            header: Header {
                format: Format::SingleTrack,
                timing: Timing::Metrical(u15::from(self.ppq)),
            },
            tracks: vec![track_events],
        };

        let mut bytes = Vec::new();
        smf.write(&mut bytes)
            .map_err(|e| WhistleError::MidiExport(format!("Failed to write MIDI data: {:?}", e)))?;
        debug!("Serialized {} notes into {} MIDI bytes", events.len(), bytes.len());
        Ok(bytes)
    }
}

/// Render notes to MIDI bytes with the configured program and velocity
pub fn notes_to_midi_bytes(
    notes: &[Note],
    config: &MidiConfig,
    serializer: &dyn MidiSerializer,
) -> Result<Vec<u8>> {
    let events = notes_to_events(notes, config.velocity);
    serializer.serialize(&events, config.program)
}

/// Write MIDI bytes to disk
pub fn export_midi(bytes: &[u8], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, bytes)?;
    Ok(())
}

/// Parse MIDI bytes back into note events (first tempo applies throughout)
pub fn read_midi_notes(bytes: &[u8]) -> Result<Vec<MidiNoteEvent>> {
    let smf = Smf::parse(bytes)
        .map_err(|e| WhistleError::MidiExport(format!("Failed to parse MIDI data: {}", e)))?;

    let ppq = match smf.header.timing {
        Timing::Metrical(tpb) => tpb.as_int() as f64,
        Timing::Timecode(_, _) => {
            return Err(WhistleError::MidiExport(
                "timecode-based MIDI timing is not supported".to_string(),
            ))
        }
    };

    let mut first_tempo: Option<f64> = None;
    let mut events = Vec::new();
    for track in &smf.tracks {
        let mut tick = 0u64;
        let mut open: HashMap<u8, (u64, u8)> = HashMap::new();
        let mut raw: Vec<(u8, u8, u64, u64)> = Vec::new();

        for event in track {
            tick += event.delta.as_int() as u64;
            match event.kind {
                TrackEventKind::Meta(MetaMessage::Tempo(t)) => {
                    first_tempo.get_or_insert(t.as_int() as f64);
                }
                TrackEventKind::Midi { message, .. } => match message {
                    MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                        open.insert(key.as_int(), (tick, vel.as_int()));
                    }
                    MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                        if let Some((start, vel)) = open.remove(&key.as_int()) {
                            raw.push((key.as_int(), vel, start, tick));
                        }
                    }
                    _ => {}
                },
                _ => {}
            }
        }

        let seconds_per_tick = first_tempo.unwrap_or(500_000.0) / 1_000_000.0 / ppq;
        events.extend(raw.into_iter().map(|(pitch, velocity, start, end)| MidiNoteEvent {
            pitch,
            velocity,
            start_sec: start as f64 * seconds_per_tick,
            end_sec: end as f64 * seconds_per_tick,
        }));
    }

    events.sort_by(|a, b| a.start_sec.total_cmp(&b.start_sec));
    Ok(events)
}
