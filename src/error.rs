// Error types shared by the recorder, scheduler and transport

use std::fmt;

/// Result alias used across the engine
pub type Result<T> = std::result::Result<T, EngineError>;

/// Engine error types
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("No MIDI output selected")]
    NoMidiOutput,

    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("MIDI port '{0}' not found")]
    PortNotFound(String),

    #[error("Audio device error: {0}")]
    AudioDevice(String),

    #[error("Audio decode error: {0}")]
    AudioDecode(String),

    #[error("Resampling error: {0}")]
    Resample(String),

    #[error("Invalid note list: {0}")]
    InvalidNoteList(#[from] NoteListError),

    #[error("Note index {index} out of range (list has {len} notes)")]
    NoteIndexOutOfRange { index: usize, len: usize },

    #[error("Transport busy: {0}")]
    TransportBusy(&'static str),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<midir::InitError> for EngineError {
    fn from(e: midir::InitError) -> Self {
        EngineError::MidiDevice(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiInput>> for EngineError {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        EngineError::MidiPort(e.to_string())
    }
}

impl From<midir::ConnectError<midir::MidiOutput>> for EngineError {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        EngineError::MidiPort(e.to_string())
    }
}

impl From<midir::SendError> for EngineError {
    fn from(e: midir::SendError) -> Self {
        EngineError::MidiPort(e.to_string())
    }
}

impl From<cpal::BuildStreamError> for EngineError {
    fn from(e: cpal::BuildStreamError) -> Self {
        EngineError::AudioDevice(e.to_string())
    }
}

impl From<cpal::PlayStreamError> for EngineError {
    fn from(e: cpal::PlayStreamError) -> Self {
        EngineError::AudioDevice(e.to_string())
    }
}

impl From<cpal::DefaultStreamConfigError> for EngineError {
    fn from(e: cpal::DefaultStreamConfigError) -> Self {
        EngineError::AudioDevice(e.to_string())
    }
}

impl From<symphonia::core::errors::Error> for EngineError {
    fn from(e: symphonia::core::errors::Error) -> Self {
        EngineError::AudioDecode(e.to_string())
    }
}

impl From<rubato::ResamplerConstructionError> for EngineError {
    fn from(e: rubato::ResamplerConstructionError) -> Self {
        EngineError::Resample(e.to_string())
    }
}

impl From<rubato::ResampleError> for EngineError {
    fn from(e: rubato::ResampleError) -> Self {
        EngineError::Resample(e.to_string())
    }
}

/// What is wrong with a single field of a note list entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldProblem {
    /// Entry is not an object at all
    NotAnObject,
    Missing,
    NotANumber,
    Negative,
    /// Pitch or velocity outside 0-127, or not an integer
    OutOfRange,
    /// `end` is not strictly after `start`
    EndNotAfterStart,
    /// `start` is smaller than the previous entry's start
    OutOfOrder,
    /// Same pitch interval touches or intersects an earlier entry
    Overlaps { other: usize },
}

impl fmt::Display for FieldProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldProblem::NotAnObject => write!(f, "is not an object"),
            FieldProblem::Missing => write!(f, "is missing"),
            FieldProblem::NotANumber => write!(f, "is not a number"),
            FieldProblem::Negative => write!(f, "is negative"),
            FieldProblem::OutOfRange => write!(f, "must be an integer between 0 and 127"),
            FieldProblem::EndNotAfterStart => write!(f, "must be greater than start"),
            FieldProblem::OutOfOrder => write!(f, "is before the previous note's start"),
            FieldProblem::Overlaps { other } => {
                write!(f, "overlaps note {} with the same pitch", other)
            }
        }
    }
}

/// Validation failure of a note list, naming the offending entry and field
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NoteListError {
    #[error("note list must be an array")]
    NotAList,

    #[error("note {index}: `{field}` {problem}")]
    Field {
        index: usize,
        field: &'static str,
        problem: FieldProblem,
    },
}

impl NoteListError {
    pub fn field(index: usize, field: &'static str, problem: FieldProblem) -> Self {
        NoteListError::Field {
            index,
            field,
            problem,
        }
    }
}
