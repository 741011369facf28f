// MyMusic Recorder - Library exports for the CLI, tests and benchmarks

pub mod audio;
pub mod clock;
pub mod config;
pub mod display;
pub mod error;
pub mod messaging;
pub mod midi;
pub mod project;
pub mod sequencer;

// Re-export commonly used types for convenience
pub use audio::{
    AnchorPlayer, AudioAnchor, CpalAnchorPlayer, SharedAnchor, load_anchor, resample_anchor,
};
pub use clock::{Clock, ManualClock, MonotonicClock, SharedClock};
pub use config::{EngineConfig, MidiConfig, SchedulerConfig};
pub use display::{LogDisplay, NoteDisplay, NullDisplay};
pub use error::{EngineError, FieldProblem, NoteListError, Result};
pub use midi::{
    CollectingOutput, HardwareInput, MidiEvent, MidiInputSource, MidiOutput, SharedOutput,
    TimedMidiMessage, VirtualInput,
};
pub use sequencer::{
    MidiRecorder, Note, NoteList, PlayOptions, PlaybackScheduler, TickOutcome,
    TransportController, TransportState, merge,
};
