// Display collaborator - what the transport pushes to whatever renders notes

use crate::sequencer::note::Note;

/// Receiver for note list and playhead updates
///
/// Edits travel the other way as plain calls on the transport controller
/// (`delete_note`, `update_note`, `seek`, `toggle_play_pause`).
pub trait NoteDisplay {
    /// The canonical list changed; `anchor_duration` is the audio length in ms, if any
    fn show_notes(&mut self, notes: &[Note], anchor_duration: Option<f64>);

    fn show_time(&mut self, ms: f64);

    /// Playhead starts moving; it never goes below `min_time` until stopped
    fn start_continuous_time_update(&mut self, min_time: f64);

    fn stop_continuous_time_update(&mut self);
}

/// Display that ignores everything
#[derive(Debug, Default)]
pub struct NullDisplay;

impl NoteDisplay for NullDisplay {
    fn show_notes(&mut self, _notes: &[Note], _anchor_duration: Option<f64>) {}
    fn show_time(&mut self, _ms: f64) {}
    fn start_continuous_time_update(&mut self, _min_time: f64) {}
    fn stop_continuous_time_update(&mut self) {}
}

/// Headless display that reports through `tracing`
///
/// Time updates are only logged when the playhead moved by at least
/// `time_step_ms` since the last report.
#[derive(Debug)]
pub struct LogDisplay {
    time_step_ms: f64,
    last_reported: Option<f64>,
    running: bool,
}

impl LogDisplay {
    pub fn new(time_step_ms: f64) -> Self {
        Self {
            time_step_ms,
            last_reported: None,
            running: false,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }
}

impl Default for LogDisplay {
    fn default() -> Self {
        Self::new(1000.0)
    }
}

impl NoteDisplay for LogDisplay {
    fn show_notes(&mut self, notes: &[Note], anchor_duration: Option<f64>) {
        let length = notes.iter().map(|n| n.end).fold(0.0, f64::max);
        tracing::info!(
            notes = notes.len(),
            length_ms = length.max(anchor_duration.unwrap_or(0.0)),
            "note list updated"
        );
        for note in notes {
            tracing::debug!(
                "{:>4} {:>3} {:>10.1} -> {:>10.1}",
                note.note_name(),
                note.velocity,
                note.start,
                note.end
            );
        }
    }

    fn show_time(&mut self, ms: f64) {
        let due = match self.last_reported {
            Some(last) => (ms - last).abs() >= self.time_step_ms,
            None => true,
        };
        if due {
            tracing::info!(time_ms = ms.round(), "playhead");
            self.last_reported = Some(ms);
        }
    }

    fn start_continuous_time_update(&mut self, min_time: f64) {
        self.running = true;
        self.last_reported = None;
        tracing::debug!(min_time, "continuous time update started");
    }

    fn stop_continuous_time_update(&mut self) {
        if self.running {
            self.running = false;
            tracing::debug!("continuous time update stopped");
        }
    }
}
