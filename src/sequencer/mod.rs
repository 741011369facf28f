// Sequencer module - note model, take recording, merge, playback and transport

pub mod merge;
pub mod midi_recorder;
pub mod note;
pub mod player;
pub mod transport;

pub use merge::merge;
pub use midi_recorder::{MidiRecorder, RecorderState};
pub use note::{Note, NoteList, check_note_list, clone_list, overlaps};
pub use player::{PlayOptions, PlaybackScheduler, SchedulerState, TickOutcome};
pub use transport::{TransportController, TransportState};
