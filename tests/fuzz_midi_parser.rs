//! Fuzzing tests for the MIDI note parser and the recorder fed from it
//!
//! Random and malformed byte sequences must never panic, and whatever the
//! recorder makes of them must still be a well-formed take.

use mymusic_recorder::midi::event::MidiEvent;
use mymusic_recorder::sequencer::midi_recorder::MidiRecorder;
use mymusic_recorder::{ManualClock, TimedMidiMessage, VirtualInput};
use rand::Rng;

/// Fuzz the parser with random byte sequences
#[test]
fn fuzz_midi_parser_random_bytes() {
    let mut rng = rand::thread_rng();

    for _ in 0..1000 {
        let length = rng.gen_range(0..=8);
        let random_bytes: Vec<u8> = (0..length).map(|_| rng.gen_range(0..=255)).collect();

        if let Some(event) = MidiEvent::from_bytes(&random_bytes) {
            // Anything parsed is a full note message with 7-bit data
            assert!(random_bytes.len() >= 3);
            assert!(event.note() <= 127);
        }
    }
}

/// Fuzz with note and non-note channel messages
#[test]
fn fuzz_midi_parser_patterns() {
    let mut rng = rand::thread_rng();
    let status_bytes = [0x80u8, 0x90, 0xA0, 0xB0, 0xC0, 0xD0, 0xE0, 0xF0, 0xF8, 0xFF];

    for _ in 0..1000 {
        let status = status_bytes[rng.gen_range(0..status_bytes.len())];
        let status = if status < 0xF0 {
            status | rng.gen_range(0..=15)
        } else {
            status
        };
        let note = rng.gen_range(0..=127u8);
        let velocity = rng.gen_range(0..=127u8);

        match (status & 0xF0, MidiEvent::from_bytes(&[status, note, velocity])) {
            (0x90, Some(MidiEvent::NoteOn { note: n, velocity: v, .. })) => {
                assert_eq!(n, note);
                assert_eq!(v, velocity);
                assert!(velocity > 0);
            }
            (0x90, Some(MidiEvent::NoteOff { note: n, .. })) => {
                assert_eq!(n, note);
                assert_eq!(velocity, 0);
            }
            (0x80, Some(MidiEvent::NoteOff { note: n, .. })) => assert_eq!(n, note),
            (0x80 | 0x90, other) => panic!("note message misparsed: {:?}", other),
            (_, other) => assert_eq!(other, None),
        }
    }
}

/// Random streams through the recorder always yield valid, sorted notes
#[test]
fn fuzz_recorder_with_random_stream() {
    let mut rng = rand::thread_rng();

    for _ in 0..50 {
        let clock = ManualClock::new(0.0);
        let mut recorder = MidiRecorder::new(clock.shared());
        let mut input = VirtualInput::with_capacity("fuzz", 4096);
        recorder.start(&mut input).unwrap();

        let mut t = 0.0;
        for _ in 0..500 {
            t += rng.gen_range(0.0..20.0);
            let status = (if rng.gen_bool(0.5) { 0x90 } else { 0x80 }) | rng.gen_range(0..=15u8);
            let pitch = rng.gen_range(48..=60u8);
            let velocity = rng.gen_range(0..=127u8);
            recorder.handle_message(&TimedMidiMessage::new(&[status, pitch, velocity], t));
        }

        clock.set(t + 10.0);
        let notes = recorder.stop();

        for pair in notes.windows(2) {
            assert!(pair[0].start <= pair[1].start);
        }
        for note in &notes {
            assert!(note.end > note.start, "{:?}", note);
            assert!(note.start >= 0.0);
            assert!(note.end <= t + 10.0);
        }
    }
}
