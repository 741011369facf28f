// Playback scheduler - replays a note list with lookahead scheduling
// Phase-locked to an optional audio anchor through a fixed sync pad

use crate::audio::anchor::SharedAnchor;
use crate::clock::SharedClock;
use crate::config::SchedulerConfig;
use crate::error::{EngineError, Result};
use crate::midi::output::{SharedOutput, send_note_off, send_note_on};
use crate::sequencer::note::{Note, NoteList, clone_list};

/// Called with the playback position when scheduling stops
pub type StopCallback = Box<dyn FnMut(f64)>;

#[derive(Default)]
pub struct PlayOptions {
    /// Audio to start in lock-step with the notes
    pub anchor: Option<SharedAnchor>,
    pub on_stop: Option<StopCallback>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Stopped,
    Scheduling,
}

/// Result of a scheduling tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// Not scheduling
    Inactive,
    /// `poll` called before the interval elapsed
    Waiting,
    /// Tick ran; `emitted` notes were handed to the output
    Running { emitted: usize },
    /// Every note was emitted and the timeline end has passed
    Finished { position: f64 },
}

/// Lookahead MIDI scheduler
///
/// Every tick (`interval_ms`) it sends all notes starting within
/// `lookahead_ms` of the playhead, timestamped on the engine clock. The
/// output is expected to hold future messages until they are due. A
/// lookahead of four intervals keeps jitter-tolerant headroom while stop and
/// seek stay responsive.
pub struct PlaybackScheduler {
    clock: SharedClock,
    config: SchedulerConfig,
    state: SchedulerState,
    notes: NoteList,
    next_index: usize,
    origin_time: f64,
    end_time: f64,
    next_tick_at: f64,
    output: Option<SharedOutput>,
    anchor: Option<SharedAnchor>,
    on_stop: Option<StopCallback>,
}

impl PlaybackScheduler {
    pub fn new(clock: SharedClock, config: SchedulerConfig) -> Self {
        Self {
            clock,
            config,
            state: SchedulerState::Stopped,
            notes: NoteList::new(),
            next_index: 0,
            origin_time: 0.0,
            end_time: 0.0,
            next_tick_at: 0.0,
            output: None,
            anchor: None,
            on_stop: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == SchedulerState::Scheduling
    }

    /// Engine-clock instant corresponding to timeline position 0
    pub fn origin_time(&self) -> f64 {
        self.origin_time
    }

    /// Timeline position after which playback ends
    pub fn end_time(&self) -> f64 {
        self.end_time
    }

    /// Notes not yet handed to the output
    pub fn remaining(&self) -> usize {
        self.notes.len().saturating_sub(self.next_index)
    }

    /// Start playing `notes` from timeline position `start_time`
    ///
    /// Restarts if already scheduling. Returns the origin instant
    /// (`now - start_time + sync_pad`) so callers can reconcile other clocks
    /// against it. The first tick runs immediately.
    pub fn play(
        &mut self,
        notes: &[Note],
        output: Option<SharedOutput>,
        start_time: f64,
        options: PlayOptions,
    ) -> Result<f64> {
        if self.state == SchedulerState::Scheduling {
            self.stop();
        }

        let next_index = notes
            .iter()
            .position(|n| n.start >= start_time)
            .unwrap_or(notes.len());

        if next_index < notes.len() && output.is_none() {
            return Err(EngineError::NoMidiOutput);
        }

        let now = self.clock.now();
        let sync_pad = self.config.sync_pad_ms;
        let origin = now - start_time + sync_pad;

        let mut end_time = notes.iter().map(|n| n.end).fold(0.0, f64::max);
        if let Some(anchor) = &options.anchor {
            let mut player = anchor.borrow_mut();
            player.start_at(now + sync_pad, start_time)?;
            end_time = end_time.max(player.duration_ms());
        }

        self.notes = clone_list(notes);
        self.next_index = next_index;
        self.origin_time = origin;
        self.end_time = end_time;
        self.next_tick_at = now;
        self.output = output;
        self.anchor = options.anchor;
        self.on_stop = options.on_stop;
        self.state = SchedulerState::Scheduling;

        tracing::debug!(
            start_time,
            origin,
            end_time,
            notes = self.remaining(),
            "playback scheduled"
        );

        self.tick()?;
        Ok(origin)
    }

    /// Tick if the interval has elapsed since the last one
    pub fn poll(&mut self) -> Result<TickOutcome> {
        if self.state != SchedulerState::Scheduling {
            return Ok(TickOutcome::Inactive);
        }
        if self.clock.now() < self.next_tick_at {
            return Ok(TickOutcome::Waiting);
        }
        self.tick()
    }

    /// Run one scheduling pass now
    pub fn tick(&mut self) -> Result<TickOutcome> {
        if self.state != SchedulerState::Scheduling {
            return Ok(TickOutcome::Inactive);
        }

        let now = self.clock.now();
        self.next_tick_at = now + self.config.interval_ms;

        let position = now - self.origin_time;
        let section_end = position + self.config.lookahead_ms;
        let channel = self.config.channel;
        let mut emitted = 0;

        while let Some(note) = self.notes.get(self.next_index) {
            if note.start > section_end {
                break;
            }
            let note = *note;

            if let Some(output) = &self.output {
                let mut output = output.borrow_mut();
                send_note_on(
                    &mut *output,
                    channel,
                    note.pitch,
                    note.velocity,
                    self.origin_time + note.start,
                )?;
                send_note_off(&mut *output, channel, note.pitch, self.origin_time + note.end)?;
            }

            self.next_index += 1;
            emitted += 1;
        }

        if self.next_index >= self.notes.len() && position >= self.end_time {
            let position = self.finish(now);
            return Ok(TickOutcome::Finished { position });
        }

        Ok(TickOutcome::Running { emitted })
    }

    /// Stop scheduling and return the playback position
    ///
    /// When already stopped nothing happens and 0 is returned, the same
    /// value `time` reports for an inactive scheduler.
    pub fn stop(&mut self) -> f64 {
        if self.state != SchedulerState::Scheduling {
            return 0.0;
        }
        let now = self.clock.now();
        self.finish(now)
    }

    /// Playback position, 0 when stopped
    ///
    /// Lies up to `sync_pad_ms` before the requested start right after
    /// `play`; clamp against the start for a display value.
    pub fn time(&self) -> f64 {
        match self.state {
            SchedulerState::Scheduling => self.clock.now() - self.origin_time,
            SchedulerState::Stopped => 0.0,
        }
    }

    fn finish(&mut self, now: f64) -> f64 {
        let position = now - self.origin_time;
        self.state = SchedulerState::Stopped;

        if let Some(anchor) = self.anchor.take() {
            anchor.borrow_mut().stop();
        }
        if let Some(output) = self.output.take() {
            output.borrow_mut().clear();
        }
        self.notes.clear();
        self.next_index = 0;

        tracing::debug!(position, "playback stopped");

        if let Some(mut on_stop) = self.on_stop.take() {
            on_stop(position);
        }
        position
    }
}
