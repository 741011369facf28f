// MIDI Recorder - turns a live Note-On/Note-Off stream into note intervals

use crate::clock::SharedClock;
use crate::error::Result;
use crate::midi::event::{MidiEvent, TimedMidiMessage};
use crate::midi::input::{InputListener, MidiInputSource};
use crate::sequencer::note::{Note, NoteList};
use std::collections::HashMap;

/// Shortest note the recorder produces (on/off at the same instant)
pub const MIN_NOTE_LENGTH_MS: f64 = 1.0;

/// Gap left between a retriggered note and the note it cuts off
pub const RETRIGGER_GAP_MS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

#[derive(Debug, Clone, Copy)]
struct OpenNote {
    pitch: u8,
    velocity: u8,
    start: f64,
    end: Option<f64>,
}

impl OpenNote {
    fn close(&mut self, end: f64) {
        self.end = Some(end.max(self.start + MIN_NOTE_LENGTH_MS));
    }
}

/// Listener attached to one input source, released when recording stops
struct InputBinding {
    source_id: String,
    listener: Box<dyn InputListener>,
}

/// Records a single take from a MIDI input source
///
/// Note times are relative to the instant `start` was called. Events are
/// handled strictly in arrival order; each pitch has at most one hanging
/// (open) note.
pub struct MidiRecorder {
    clock: SharedClock,
    state: RecorderState,
    start_time: f64,
    recorded: Vec<OpenNote>,
    hanging: HashMap<u8, usize>, // pitch -> index in `recorded`
    latest: HashMap<u8, usize>,  // pitch -> most recent note, open or closed
    binding: Option<InputBinding>,
}

impl MidiRecorder {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            state: RecorderState::Idle,
            start_time: 0.0,
            recorded: Vec::new(),
            hanging: HashMap::new(),
            latest: HashMap::new(),
            binding: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    pub fn is_recording(&self) -> bool {
        self.state == RecorderState::Recording
    }

    /// Engine-clock instant the current take started at
    pub fn start_time(&self) -> f64 {
        self.start_time
    }

    /// Id of the source the recorder is listening to, if any
    pub fn bound_source(&self) -> Option<&str> {
        self.binding.as_ref().map(|b| b.source_id.as_str())
    }

    pub fn hanging_count(&self) -> usize {
        self.hanging.len()
    }

    /// Start a new take on `source`, returning the captured start time
    ///
    /// The listener is only re-attached when `source` differs from the one
    /// already bound; messages queued before this call are discarded.
    pub fn start(&mut self, source: &mut dyn MidiInputSource) -> Result<f64> {
        let rebind = match &self.binding {
            Some(binding) => binding.source_id != source.id(),
            None => true,
        };

        if rebind {
            let listener = source.subscribe()?;
            self.binding = Some(InputBinding {
                source_id: source.id().to_string(),
                listener,
            });
        } else if let Some(binding) = self.binding.as_mut() {
            while binding.listener.try_next().is_some() {}
        }

        self.recorded.clear();
        self.hanging.clear();
        self.latest.clear();
        self.start_time = self.clock.now();
        self.state = RecorderState::Recording;

        tracing::debug!(source = %source.id(), start_time = self.start_time, "recording started");
        Ok(self.start_time)
    }

    /// Stop the take and hand off its notes
    ///
    /// Pending messages are processed first, then every hanging note is
    /// closed at the stop time. Idle recorders return an empty list and do
    /// nothing else.
    pub fn stop(&mut self) -> NoteList {
        if self.state != RecorderState::Recording {
            return NoteList::new();
        }

        self.poll();

        let end = self.relative(self.clock.now());
        let hanging: Vec<usize> = self.hanging.drain().map(|(_, index)| index).collect();
        for index in hanging {
            if let Some(note) = self.recorded.get_mut(index) {
                note.close(end);
            }
        }

        self.latest.clear();
        self.binding = None;
        self.state = RecorderState::Idle;

        let mut notes: NoteList = self
            .recorded
            .drain(..)
            .filter_map(|n| n.end.map(|end| Note::new(n.pitch, n.velocity, n.start, end)))
            .collect();
        notes.sort_by(|a, b| a.start.total_cmp(&b.start));

        tracing::debug!(notes = notes.len(), "recording stopped");
        notes
    }

    /// Elapsed ms since the take started, 0 when idle
    pub fn time(&self) -> f64 {
        match self.state {
            RecorderState::Recording => self.clock.now() - self.start_time,
            RecorderState::Idle => 0.0,
        }
    }

    /// Drain the bound listener; returns the number of messages handled
    pub fn poll(&mut self) -> usize {
        if self.state != RecorderState::Recording {
            return 0;
        }

        let mut handled = 0;
        while let Some(message) = self
            .binding
            .as_mut()
            .and_then(|binding| binding.listener.try_next())
        {
            self.handle_message(&message);
            handled += 1;
        }
        handled
    }

    /// Feed one message; ignored unless recording
    pub fn handle_message(&mut self, message: &TimedMidiMessage) {
        if self.state != RecorderState::Recording {
            return;
        }

        match message.event() {
            Some(MidiEvent::NoteOn { note, velocity, .. }) => {
                self.note_on(note, velocity, message.timestamp)
            }
            Some(MidiEvent::NoteOff { note, .. }) => self.note_off(note, message.timestamp),
            None => tracing::trace!(bytes = ?message.bytes(), "ignoring non-note message"),
        }
    }

    fn relative(&self, timestamp: f64) -> f64 {
        (timestamp - self.start_time).max(0.0)
    }

    fn note_on(&mut self, pitch: u8, velocity: u8, timestamp: f64) {
        let start = self.relative(timestamp);

        // The previous note of this pitch must end strictly before `start`:
        // cut it just before this one, or take it over when the cut would
        // leave it shorter than the minimum length.
        if let Some(&previous) = self.latest.get(&pitch)
            && let Some(note) = self.recorded.get_mut(previous)
        {
            let reaches = note.end.is_none_or(|end| end >= start);
            let cut = start - RETRIGGER_GAP_MS;

            if reaches && cut >= note.start + MIN_NOTE_LENGTH_MS {
                note.end = Some(cut);
            } else if reaches {
                note.velocity = velocity;
                note.end = None;
                self.hanging.insert(pitch, previous);
                return;
            }
        }

        self.recorded.push(OpenNote {
            pitch,
            velocity,
            start,
            end: None,
        });
        let index = self.recorded.len() - 1;
        self.hanging.insert(pitch, index);
        self.latest.insert(pitch, index);
    }

    fn note_off(&mut self, pitch: u8, timestamp: f64) {
        let end = self.relative(timestamp);

        match self.hanging.remove(&pitch) {
            Some(index) => {
                if let Some(note) = self.recorded.get_mut(index) {
                    note.close(end);
                }
            }
            None => tracing::trace!(pitch, "note-off without matching note-on"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::midi::input::VirtualInput;
    use crate::sequencer::note::check_note_list;

    fn recorder_at(start_ms: f64) -> (MidiRecorder, ManualClock) {
        let clock = ManualClock::new(start_ms);
        (MidiRecorder::new(clock.shared()), clock)
    }

    #[test]
    fn test_basic_recording() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        assert_eq!(recorder.start(&mut input).unwrap(), 0.0);
        keys.send(&[0x90, 60, 100], 100.0);
        keys.send(&[0x80, 60, 0], 250.0);

        clock.set(300.0);
        let notes = recorder.stop();
        assert_eq!(notes, vec![Note::new(60, 100, 100.0, 250.0)]);
    }

    #[test]
    fn test_hanging_note_closed_at_stop() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x90, 60, 100], 100.0);
        recorder.poll();
        assert_eq!(recorder.hanging_count(), 1);

        clock.set(500.0);
        let notes = recorder.stop();
        assert_eq!(notes, vec![Note::new(60, 100, 100.0, 500.0)]);
        assert_eq!(recorder.hanging_count(), 0);
    }

    #[test]
    fn test_times_relative_to_start() {
        let (mut recorder, clock) = recorder_at(1000.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        assert_eq!(recorder.start(&mut input).unwrap(), 1000.0);
        clock.set(1040.0);
        assert_eq!(recorder.time(), 40.0);

        keys.send(&[0x90, 64, 80], 1010.0);
        keys.send(&[0x90, 64, 0], 1060.0); // velocity 0 = Note-Off
        clock.set(1100.0);

        assert_eq!(recorder.stop(), vec![Note::new(64, 80, 10.0, 60.0)]);
        assert_eq!(recorder.time(), 0.0);
    }

    #[test]
    fn test_unmatched_note_off_ignored() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x80, 60, 0], 10.0);
        keys.send(&[0xB0, 64, 127], 15.0); // sustain pedal, not a note
        clock.set(50.0);

        assert!(recorder.stop().is_empty());
    }

    #[test]
    fn test_retrigger_closes_previous_note() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x90, 60, 100], 0.0);
        keys.send(&[0x90, 60, 70], 200.0);
        keys.send(&[0x80, 60, 0], 300.0);
        clock.set(400.0);

        let notes = recorder.stop();
        assert_eq!(
            notes,
            vec![Note::new(60, 100, 0.0, 199.0), Note::new(60, 70, 200.0, 300.0)]
        );
    }

    #[test]
    fn test_zero_length_note_stretched() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x90, 60, 100], 20.0);
        keys.send(&[0x80, 60, 0], 20.0);
        clock.set(30.0);

        let notes = recorder.stop();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].end, 20.0 + MIN_NOTE_LENGTH_MS);
    }

    #[test]
    fn test_stop_when_idle_is_noop() {
        let (mut recorder, _clock) = recorder_at(0.0);

        assert!(recorder.stop().is_empty());
        assert!(recorder.stop().is_empty());
        assert_eq!(recorder.state(), RecorderState::Idle);
        assert_eq!(recorder.time(), 0.0);
    }

    #[test]
    fn test_listener_released_on_stop() {
        let (mut recorder, _clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        assert_eq!(keys.subscriber_count(), 1);
        assert_eq!(recorder.bound_source(), Some("keys"));

        recorder.stop();
        assert_eq!(keys.subscriber_count(), 0);
        assert_eq!(recorder.bound_source(), None);

        // Quick record -> stop -> record cycle never stacks listeners
        recorder.start(&mut input).unwrap();
        recorder.stop();
        recorder.start(&mut input).unwrap();
        assert_eq!(keys.subscriber_count(), 1);
    }

    #[test]
    fn test_restart_same_source_keeps_binding() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x90, 60, 100], 5.0);

        // Restarting on the same source drops the stale event, no second listener
        clock.set(10.0);
        recorder.start(&mut input).unwrap();
        assert_eq!(keys.subscriber_count(), 1);

        clock.set(50.0);
        assert!(recorder.stop().is_empty());
    }

    #[test]
    fn test_switching_source_rebinds() {
        let (mut recorder, _clock) = recorder_at(0.0);
        let mut first = VirtualInput::new("first");
        let mut second = VirtualInput::new("second");
        let first_handle = first.clone();
        let second_handle = second.clone();

        recorder.start(&mut first).unwrap();
        recorder.start(&mut second).unwrap();

        assert_eq!(first_handle.subscriber_count(), 0);
        assert_eq!(second_handle.subscriber_count(), 1);
        assert_eq!(recorder.bound_source(), Some("second"));
    }

    #[test]
    fn test_messages_ignored_when_idle() {
        let (mut recorder, _clock) = recorder_at(0.0);
        recorder.handle_message(&TimedMidiMessage::new(&[0x90, 60, 100], 10.0));
        assert_eq!(recorder.hanging_count(), 0);
        assert_eq!(recorder.poll(), 0);
    }

    #[test]
    fn test_output_sorted_by_start() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x90, 60, 100], 0.0);
        keys.send(&[0x90, 64, 100], 10.0);
        keys.send(&[0x80, 64, 0], 20.0);
        keys.send(&[0x80, 60, 0], 100.0);
        clock.set(200.0);

        let notes = recorder.stop();
        assert_eq!(notes[0].pitch, 60);
        assert_eq!(notes[1].pitch, 64);
    }

    #[test]
    fn test_fast_retrigger_keeps_take_valid() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x90, 60, 100], 100.0);
        keys.send(&[0x90, 60, 70], 100.5);
        keys.send(&[0x80, 60, 0], 200.0);
        clock.set(300.0);

        let take = recorder.stop();
        assert!(check_note_list(&take).is_ok());
        assert_eq!(take, vec![Note::new(60, 70, 100.0, 200.0)]);
    }

    #[test]
    fn test_repress_after_stretched_note() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x90, 60, 100], 100.0);
        keys.send(&[0x80, 60, 0], 100.0);
        keys.send(&[0x90, 60, 90], 100.5);
        keys.send(&[0x80, 60, 0], 150.0);
        clock.set(300.0);

        let take = recorder.stop();
        assert!(check_note_list(&take).is_ok());
        assert_eq!(take, vec![Note::new(60, 90, 100.0, 150.0)]);
    }

    #[test]
    fn test_repress_at_release_instant_stays_separate() {
        let (mut recorder, clock) = recorder_at(0.0);
        let mut input = VirtualInput::new("keys");
        let keys = input.clone();

        recorder.start(&mut input).unwrap();
        keys.send(&[0x90, 60, 100], 0.0);
        keys.send(&[0x80, 60, 0], 100.0);
        keys.send(&[0x90, 60, 80], 100.0);
        keys.send(&[0x80, 60, 0], 200.0);
        clock.set(300.0);

        let take = recorder.stop();
        assert!(check_note_list(&take).is_ok());
        assert_eq!(
            take,
            vec![Note::new(60, 100, 0.0, 99.0), Note::new(60, 80, 100.0, 200.0)]
        );
    }
}
