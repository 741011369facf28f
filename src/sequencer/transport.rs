// Transport - record/play/pause/seek control over the canonical note list
// Owns the time cursor and mediates between recorder, merge and player

use crate::audio::anchor::SharedAnchor;
use crate::clock::SharedClock;
use crate::config::SchedulerConfig;
use crate::display::NoteDisplay;
use crate::error::{EngineError, Result};
use crate::midi::input::MidiInputSource;
use crate::midi::output::{self, SharedOutput};
use crate::sequencer::merge::merge;
use crate::sequencer::midi_recorder::MidiRecorder;
use crate::sequencer::note::{Note, NoteList, check_note_list, clone_list};
use crate::sequencer::player::{PlayOptions, PlaybackScheduler, TickOutcome};

/// Snapshot of the transport
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TransportState {
    /// Cursor used as the start offset of the next record or play
    pub current_time: f64,
    pub is_recording: bool,
    pub is_playing: bool,
}

/// Transport controller
///
/// Recording and playing are mutually exclusive: starting one stops the
/// other. Everything runs on the host thread; `tick` must be called about
/// once per scheduler interval.
pub struct TransportController {
    clock: SharedClock,
    notes: NoteList,
    cursor: f64,
    cursor_before_play: f64,
    playing: bool,
    recorder: MidiRecorder,
    player: PlaybackScheduler,
    output: Option<SharedOutput>,
    anchor: Option<SharedAnchor>,
    display: Box<dyn NoteDisplay>,
}

impl TransportController {
    pub fn new(clock: SharedClock, config: SchedulerConfig, display: Box<dyn NoteDisplay>) -> Self {
        Self {
            recorder: MidiRecorder::new(clock.clone()),
            player: PlaybackScheduler::new(clock.clone(), config),
            clock,
            notes: NoteList::new(),
            cursor: 0.0,
            cursor_before_play: 0.0,
            playing: false,
            output: None,
            anchor: None,
            display,
        }
    }

    pub fn state(&self) -> TransportState {
        TransportState {
            current_time: self.cursor,
            is_recording: self.recorder.is_recording(),
            is_playing: self.playing,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn cursor(&self) -> f64 {
        self.cursor
    }

    /// The canonical note list
    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn set_output(&mut self, output: Option<SharedOutput>) {
        self.output = output;
    }

    pub fn has_output(&self) -> bool {
        self.output.is_some()
    }

    /// Set or remove the audio anchor; takes effect on the next record or play
    pub fn set_anchor(&mut self, anchor: Option<SharedAnchor>) {
        self.anchor = anchor;
        self.refresh_notes();
    }

    pub fn anchor_duration(&self) -> Option<f64> {
        self.anchor.as_ref().map(|a| a.borrow().duration_ms())
    }

    /// Start recording from the cursor
    ///
    /// With an audio anchor, a note-less playback session drives the audio
    /// from the cursor. The recorder and the anchor start at two different
    /// instants; their difference is folded into the cursor so recorded
    /// notes line up with what was heard.
    pub fn record(&mut self, source: &mut dyn MidiInputSource) -> Result<()> {
        if self.recorder.is_recording() {
            tracing::debug!("record ignored, already recording");
            return Ok(());
        }
        if self.playing {
            self.pause();
        }

        let recorder_start = self.recorder.start(source)?;

        if let Some(anchor) = self.anchor.clone() {
            let options = PlayOptions {
                anchor: Some(anchor),
                on_stop: None,
            };
            match self.player.play(&[], None, self.cursor, options) {
                Ok(origin) => {
                    self.cursor += recorder_start - (origin + self.cursor);
                }
                Err(e) => {
                    self.recorder.stop();
                    return Err(e);
                }
            }
        }

        tracing::info!(cursor = self.cursor, source = %source.id(), "recording");
        self.display.start_continuous_time_update(self.cursor.max(0.0));
        Ok(())
    }

    /// Finish the take and merge it into the canonical list
    ///
    /// Returns the number of notes the take contributed. Notes are shifted by
    /// the cursor; anything that would start before 0 is clipped, and notes
    /// ending at or before 0 are dropped.
    pub fn stop_recording(&mut self) -> usize {
        if !self.recorder.is_recording() {
            return 0;
        }

        let take = self.recorder.stop();
        if self.player.is_active() {
            self.player.stop();
        }

        let offset = self.cursor;
        let shifted: NoteList = take
            .iter()
            .map(|n| n.shifted(offset))
            .filter(|n| n.end > 0.0)
            .map(|mut n| {
                n.start = n.start.max(0.0);
                n
            })
            .collect();

        self.notes = merge(&self.notes, &shifted);
        self.cursor = self.cursor.max(0.0);

        tracing::info!(
            recorded = take.len(),
            kept = shifted.len(),
            total = self.notes.len(),
            "recording merged"
        );

        self.display.stop_continuous_time_update();
        self.refresh_notes();
        self.display.show_time(self.cursor);
        shifted.len()
    }

    /// Play the canonical list from the cursor; no-op if already playing
    pub fn play(&mut self) -> Result<()> {
        if self.playing {
            return Ok(());
        }

        // An in-progress take may add notes, so it needs an output too
        let pending = self.notes.iter().any(|n| n.start >= self.cursor);
        if self.output.is_none() && (pending || self.recorder.is_recording()) {
            return Err(EngineError::NoMidiOutput);
        }

        if self.recorder.is_recording() {
            self.stop_recording();
        }

        let options = PlayOptions {
            anchor: self.anchor.clone(),
            on_stop: None,
        };
        self.player
            .play(&self.notes, self.output.clone(), self.cursor, options)?;
        self.cursor_before_play = self.cursor;

        if !self.player.is_active() {
            // Nothing left after the cursor
            self.end_of_playback();
            return Ok(());
        }

        self.playing = true;
        tracing::info!(cursor = self.cursor, "playing");
        self.display.start_continuous_time_update(self.cursor);
        Ok(())
    }

    /// Stop playback and keep the reached position as the cursor
    pub fn pause(&mut self) -> f64 {
        if !self.playing {
            return self.cursor;
        }

        let position = self.player.stop();
        self.playing = false;
        self.cursor = position.max(self.cursor_before_play);

        tracing::info!(cursor = self.cursor, "paused");
        self.display.stop_continuous_time_update();
        self.display.show_time(self.cursor);
        self.cursor
    }

    /// Stop playback and return to where it started
    pub fn pause_keep_spot(&mut self) -> f64 {
        if !self.playing {
            return self.cursor;
        }

        self.player.stop();
        self.playing = false;
        self.cursor = self.cursor_before_play;

        tracing::info!(cursor = self.cursor, "paused, cursor kept");
        self.display.stop_continuous_time_update();
        self.display.show_time(self.cursor);
        self.cursor
    }

    /// Full stop: ends recording or playback and rewinds to 0
    pub fn stop(&mut self) {
        if self.recorder.is_recording() {
            self.stop_recording();
        }
        self.player.stop();
        self.playing = false;
        self.cursor = 0.0;

        tracing::info!("stopped");
        self.display.stop_continuous_time_update();
        self.display.show_time(0.0);
    }

    pub fn toggle_play_pause(&mut self) -> Result<()> {
        if self.playing {
            self.pause();
            Ok(())
        } else {
            self.play()
        }
    }

    /// Move the cursor; only allowed while idle
    pub fn seek(&mut self, ms: f64) -> Result<()> {
        if self.recorder.is_recording() {
            return Err(EngineError::TransportBusy("recording"));
        }
        if self.playing {
            return Err(EngineError::TransportBusy("playing"));
        }

        self.cursor = if ms.is_finite() { ms.max(0.0) } else { 0.0 };
        self.display.show_time(self.cursor);
        Ok(())
    }

    /// Remove the first note equal to `note` in every field
    pub fn delete_note(&mut self, note: &Note) -> bool {
        match self.notes.iter().position(|n| n == note) {
            Some(index) => {
                self.notes.remove(index);
                self.refresh_notes();
                true
            }
            None => false,
        }
    }

    pub fn delete_note_at(&mut self, index: usize) -> Result<Note> {
        if index >= self.notes.len() {
            return Err(EngineError::NoteIndexOutOfRange {
                index,
                len: self.notes.len(),
            });
        }
        let removed = self.notes.remove(index);
        self.refresh_notes();
        Ok(removed)
    }

    /// Replace the note at `index`
    ///
    /// The edited note is merged against the remaining notes, so it absorbs
    /// any same-pitch note it now overlaps and lands at its sorted position.
    pub fn update_note(&mut self, index: usize, note: Note) -> Result<()> {
        if index >= self.notes.len() {
            return Err(EngineError::NoteIndexOutOfRange {
                index,
                len: self.notes.len(),
            });
        }
        note.validate(index)?;

        let mut rest = clone_list(&self.notes);
        rest.remove(index);
        self.notes = merge(&rest, &[note]);
        self.refresh_notes();
        Ok(())
    }

    /// Replace the canonical list; rejected lists leave the current one untouched
    pub fn load_notes(&mut self, notes: NoteList) -> Result<()> {
        check_note_list(&notes)?;
        self.notes = notes;
        tracing::info!(notes = self.notes.len(), "note list loaded");
        self.refresh_notes();
        Ok(())
    }

    /// Playhead for display purposes
    ///
    /// During playback the value never drops below the position playback
    /// was started from.
    pub fn display_time(&self) -> f64 {
        if self.recorder.is_recording() {
            (self.cursor + self.recorder.time()).max(0.0)
        } else if self.playing {
            self.player.time().max(self.cursor_before_play)
        } else {
            self.cursor
        }
    }

    /// Drive the engine: drain recorder input, run the scheduler, update the display
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.recorder.is_recording() {
            self.recorder.poll();
        }

        let outcome = self.player.poll()?;
        if let TickOutcome::Finished { .. } = outcome {
            if self.playing {
                self.end_of_playback();
            }
        }

        if self.playing || self.recorder.is_recording() {
            let time = self.display_time();
            self.display.show_time(time);
        }
        Ok(outcome)
    }

    /// Note-Off on every channel and pitch
    pub fn panic(&mut self) -> Result<()> {
        match &self.output {
            Some(out) => output::panic(&mut *out.borrow_mut()),
            None => Err(EngineError::NoMidiOutput),
        }
    }

    /// Milliseconds on the engine clock
    pub fn now(&self) -> f64 {
        self.clock.now()
    }

    fn end_of_playback(&mut self) {
        self.playing = false;
        self.cursor = 0.0;
        tracing::info!("playback finished");
        self.display.stop_continuous_time_update();
        self.display.show_time(0.0);
    }

    fn refresh_notes(&mut self) {
        let duration = self.anchor_duration();
        self.display.show_notes(&self.notes, duration);
    }
}
