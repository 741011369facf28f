// Note representation for the recorder and scheduler
// A note is a pitch sounding over a closed interval of milliseconds

use crate::error::{FieldProblem, NoteListError};
use serde::{Deserialize, Serialize};

/// A recorded note interval
///
/// Times are milliseconds relative to the recording/playback origin.
/// Serialized with the persisted field names (`note` for the pitch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI note number (0-127, where 60 = C4)
    #[serde(rename = "note")]
    pub pitch: u8,

    /// MIDI velocity at onset (0-127)
    pub velocity: u8,

    pub start: f64,

    /// Always strictly greater than `start`
    pub end: f64,
}

/// Notes ordered by `start`, without same-pitch overlaps
pub type NoteList = Vec<Note>;

impl Note {
    pub fn new(pitch: u8, velocity: u8, start: f64, end: f64) -> Self {
        Self {
            pitch,
            velocity,
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    /// Same note moved by `offset` ms
    pub fn shifted(&self, offset: f64) -> Self {
        Self {
            start: self.start + offset,
            end: self.end + offset,
            ..*self
        }
    }

    /// Range checks on a single note; `index` is only used for reporting
    pub fn validate(&self, index: usize) -> Result<(), NoteListError> {
        if self.pitch > 127 {
            return Err(NoteListError::field(index, "note", FieldProblem::OutOfRange));
        }
        if self.velocity > 127 {
            return Err(NoteListError::field(
                index,
                "velocity",
                FieldProblem::OutOfRange,
            ));
        }
        if !self.start.is_finite() {
            return Err(NoteListError::field(index, "start", FieldProblem::NotANumber));
        }
        if !self.end.is_finite() {
            return Err(NoteListError::field(index, "end", FieldProblem::NotANumber));
        }
        if self.start < 0.0 {
            return Err(NoteListError::field(index, "start", FieldProblem::Negative));
        }
        if self.end <= self.start {
            return Err(NoteListError::field(
                index,
                "end",
                FieldProblem::EndNotAfterStart,
            ));
        }
        Ok(())
    }

    /// Get the note name (e.g., "C4", "A#5")
    pub fn note_name(&self) -> String {
        const NOTE_NAMES: [&str; 12] = [
            "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
        ];

        let octave = (self.pitch / 12) as i32 - 1;
        let note_index = (self.pitch % 12) as usize;

        format!("{}{}", NOTE_NAMES[note_index], octave)
    }
}

/// Independent copy of a note list
///
/// Used at every handoff so the receiver can mutate its list without
/// touching the sender's.
pub fn clone_list(notes: &[Note]) -> NoteList {
    notes.to_vec()
}

/// Same pitch and the closed intervals touch or intersect
///
/// `a.end == b.start` counts as overlapping: two strokes meeting at the
/// same instant are one note.
pub fn overlaps(a: &Note, b: &Note) -> bool {
    a.pitch == b.pitch && !(a.end < b.start || b.end < a.start)
}

/// Check the note list invariant: each note valid, ascending `start`, and
/// no same-pitch overlap with any earlier note
pub fn check_note_list(notes: &[Note]) -> Result<(), NoteListError> {
    // Per pitch: (index, end) of the earlier note reaching furthest
    let mut furthest: [Option<(usize, f64)>; 128] = [None; 128];
    let mut previous_start = f64::NEG_INFINITY;

    for (index, note) in notes.iter().enumerate() {
        note.validate(index)?;

        if note.start < previous_start {
            return Err(NoteListError::field(index, "start", FieldProblem::OutOfOrder));
        }
        previous_start = note.start;

        let slot = &mut furthest[note.pitch as usize];
        if let Some((other, end)) = *slot {
            // Sorted by start, so an earlier note overlaps iff it ends at or after our start
            if end >= note.start {
                return Err(NoteListError::field(
                    index,
                    "start",
                    FieldProblem::Overlaps { other },
                ));
            }
        }
        if slot.map_or(true, |(_, end)| note.end > end) {
            *slot = Some((index, note.end));
        }
    }

    Ok(())
}
