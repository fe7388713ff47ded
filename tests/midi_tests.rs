//! MIDI rendering: event mapping, SMF layout and round trips

use midly::{MetaMessage, MidiMessage, Smf, TrackEventKind};
use whistle2sheet::config::MidiConfig;
use whistle2sheet::midi::{notes_to_midi_bytes, read_midi_notes, MidiSerializer, SmfSerializer};
use whistle2sheet::note::Note;

const ONE_TICK_SEC: f64 = 1.0 / 960.0;

fn note(name: &str, start: f64, end: f64) -> Note {
    let note_name: whistle2sheet::NoteName = name.parse().unwrap();
    Note {
        start_time: start,
        end_time: end,
        note_name,
        frequency: note_name.frequency() as f32,
    }
}

fn melody() -> Vec<Note> {
    vec![
        note("A4", 0.0, 0.49),
        note("C5", 0.5, 0.99),
        note("E5", 1.0, 1.333),
        note("C#4", 1.4, 2.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_within_one_tick() {
        let notes = melody();
        let serializer = SmfSerializer::default();
        assert_eq!(serializer.ticks_per_second(), 960.0);

        let bytes = notes_to_midi_bytes(&notes, &MidiConfig::default(), &serializer).unwrap();
        let events = read_midi_notes(&bytes).unwrap();

        assert_eq!(events.len(), notes.len());
        for (event, note) in events.iter().zip(&notes) {
            assert_eq!(event.pitch as i32, note.note_name.midi_number());
            assert_eq!(event.velocity, 100);
            assert!((event.start_sec - note.start_time).abs() <= ONE_TICK_SEC);
            assert!((event.end_sec - note.end_time).abs() <= ONE_TICK_SEC);
        }
    }

    #[test]
    fn test_middle_c_is_sixty() {
        let bytes = notes_to_midi_bytes(
            &[note("C4", 0.0, 0.5)],
            &MidiConfig::default(),
            &SmfSerializer::default(),
        )
        .unwrap();
        let events = read_midi_notes(&bytes).unwrap();
        assert_eq!(events[0].pitch, 60);
    }

    #[test]
    fn test_track_layout() {
        let config = MidiConfig::default();
        let bytes =
            notes_to_midi_bytes(&melody(), &config, &SmfSerializer::new(&config)).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let track = &smf.tracks[0];

        assert!(matches!(
            track[0].kind,
            TrackEventKind::Meta(MetaMessage::TrackName(name)) if name == config.track_name.as_bytes()
        ));
        assert!(matches!(
            track[1].kind,
            TrackEventKind::Meta(MetaMessage::Tempo(t)) if t.as_int() == 500_000
        ));
        assert!(matches!(
            track.last().map(|e| e.kind),
            Some(TrackEventKind::Meta(MetaMessage::EndOfTrack))
        ));

        let note_ons = track
            .iter()
            .filter(|e| {
                matches!(
                    e.kind,
                    TrackEventKind::Midi {
                        message: MidiMessage::NoteOn { .. },
                        ..
                    }
                )
            })
            .count();
        assert_eq!(note_ons, 4);
    }

    #[test]
    fn test_note_off_precedes_note_on_at_same_tick() {
        let notes = vec![note("A4", 0.0, 0.5), note("A4", 0.5, 1.0)];
        let bytes =
            notes_to_midi_bytes(&notes, &MidiConfig::default(), &SmfSerializer::default())
                .unwrap();
        let smf = Smf::parse(&bytes).unwrap();

        let messages: Vec<MidiMessage> = smf.tracks[0]
            .iter()
            .filter_map(|e| match e.kind {
                TrackEventKind::Midi { message, .. } => Some(message),
                _ => None,
            })
            .filter(|m| !matches!(m, MidiMessage::ProgramChange { .. }))
            .collect();
        assert!(matches!(messages[0], MidiMessage::NoteOn { .. }));
        assert!(matches!(messages[1], MidiMessage::NoteOff { .. }));
        assert!(matches!(messages[2], MidiMessage::NoteOn { .. }));

        let events = read_midi_notes(&bytes).unwrap();
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn test_custom_program_and_velocity() {
        let config = MidiConfig {
            program: 73,
            velocity: 64,
            ..MidiConfig::default()
        };
        let bytes =
            notes_to_midi_bytes(&melody(), &config, &SmfSerializer::new(&config)).unwrap();
        let smf = Smf::parse(&bytes).unwrap();
        let program = smf.tracks[0].iter().find_map(|e| match e.kind {
            TrackEventKind::Midi {
                message: MidiMessage::ProgramChange { program },
                ..
            } => Some(program.as_int()),
            _ => None,
        });
        assert_eq!(program, Some(73));
        assert!(read_midi_notes(&bytes)
            .unwrap()
            .iter()
            .all(|e| e.velocity == 64));
    }

    #[test]
    fn test_empty_sequence_is_valid_file() {
        let bytes = SmfSerializer::default().serialize(&[], 0).unwrap();
        assert!(read_midi_notes(&bytes).unwrap().is_empty());
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(read_midi_notes(b"not midi").is_err());
    }
}
