// MIDI note events - decoding from and encoding to raw bytes

/// Note-On status nibble (0b1001)
pub const NOTE_ON: u8 = 0x90;
/// Note-Off status nibble (0b1000)
pub const NOTE_OFF: u8 = 0x80;

/// The MIDI messages the recorder and scheduler care about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8, velocity: u8 },
}

impl MidiEvent {
    /// Parse a raw MIDI message
    ///
    /// Note-On with velocity 0 is reported as Note-Off. Anything that is not
    /// a complete note message returns `None`.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 3 {
            return None;
        }

        let status = bytes[0];
        let channel = status & 0x0F;
        let note = bytes[1];
        let velocity = bytes[2];

        // Data bytes have the high bit clear
        if note > 127 || velocity > 127 {
            return None;
        }

        match status & 0xF0 {
            NOTE_ON if velocity == 0 => Some(MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            }),
            NOTE_ON => Some(MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            }),
            NOTE_OFF => Some(MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            }),
            _ => None,
        }
    }

    /// Encode as a 3-byte channel voice message
    pub fn to_bytes(&self) -> [u8; 3] {
        match *self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => [NOTE_ON | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => [NOTE_OFF | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
        }
    }

    pub fn note(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { note, .. } | MidiEvent::NoteOff { note, .. } => note,
        }
    }
}

/// Raw MIDI message stamped with the engine clock at arrival
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimedMidiMessage {
    data: [u8; 3],
    len: u8,
    /// Arrival time in engine-clock milliseconds
    pub timestamp: f64,
}

impl TimedMidiMessage {
    /// Keep at most the first three bytes; longer messages are never note events
    pub fn new(bytes: &[u8], timestamp: f64) -> Self {
        let mut data = [0u8; 3];
        let len = bytes.len().min(3);
        data[..len].copy_from_slice(&bytes[..len]);

        Self {
            data,
            len: len as u8,
            timestamp,
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    pub fn event(&self) -> Option<MidiEvent> {
        MidiEvent::from_bytes(self.bytes())
    }
}
