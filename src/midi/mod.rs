// MIDI I/O - event decoding, input subscriptions, scheduled output

pub mod device;
pub mod event;
pub mod input;
pub mod output;

pub use event::{MidiEvent, TimedMidiMessage};
pub use input::{HardwareInput, InputListener, MidiInputSource, VirtualInput};
pub use output::{
    CollectingOutput, HardwareOutput, MidiOutput, ScheduledOutput, SharedOutput, panic,
};
