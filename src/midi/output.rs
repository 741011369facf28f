// MIDI Output - time-stamped sends, hardware dispatch queue and panic

use crate::error::{EngineError, Result};
use crate::midi::event::{MidiEvent, NOTE_OFF, NOTE_ON};
use midir::{MidiOutput as MidirOutput, MidiOutputConnection};
use std::cell::RefCell;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::rc::Rc;

/// Destination for MIDI messages scheduled on the engine clock
pub trait MidiOutput {
    /// Send `message` so that it sounds at engine time `at` (ms).
    /// `at <= 0` means as soon as possible.
    fn send(&mut self, message: &[u8], at: f64) -> Result<()>;

    /// Drop messages that were scheduled but not yet delivered.
    /// Outputs without a queue have nothing to do.
    fn clear(&mut self) {}
}

/// Output handle shared between the transport (owner) and the scheduler
pub type SharedOutput = Rc<RefCell<dyn MidiOutput>>;

pub fn send_note_on(
    output: &mut dyn MidiOutput,
    channel: u8,
    note: u8,
    velocity: u8,
    at: f64,
) -> Result<()> {
    let bytes = MidiEvent::NoteOn {
        channel,
        note,
        velocity,
    }
    .to_bytes();
    output.send(&bytes, at)
}

pub fn send_note_off(output: &mut dyn MidiOutput, channel: u8, note: u8, at: f64) -> Result<()> {
    let bytes = MidiEvent::NoteOff {
        channel,
        note,
        velocity: 0,
    }
    .to_bytes();
    output.send(&bytes, at)
}

/// Note-Off for every pitch on every channel, immediately
pub fn panic(output: &mut dyn MidiOutput) -> Result<()> {
    for channel in 0..16u8 {
        for note in 0..128u8 {
            send_note_off(output, channel, note, 0.0)?;
        }
    }
    tracing::debug!("MIDI panic sent");
    Ok(())
}

fn is_note_off(message: &[u8]) -> bool {
    match message {
        [status, _, velocity, ..] => {
            let kind = status & 0xF0;
            kind == NOTE_OFF || (kind == NOTE_ON && *velocity == 0)
        }
        _ => false,
    }
}

/// Something that can put bytes on the wire right now
pub trait MessageSink {
    fn send_now(&mut self, message: &[u8]) -> Result<()>;
}

impl MessageSink for MidiOutputConnection {
    fn send_now(&mut self, message: &[u8]) -> Result<()> {
        self.send(message)?;
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct PendingMessage {
    at: f64,
    seq: u64,
    message: Vec<u8>,
}

impl PartialEq for PendingMessage {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PendingMessage {}

impl PartialOrd for PendingMessage {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingMessage {
    // Time first, then submission order so equal timestamps keep FIFO order
    fn cmp(&self, other: &Self) -> Ordering {
        self.at
            .total_cmp(&other.at)
            .then_with(|| self.seq.cmp(&other.seq))
    }
}

/// Queue that holds future messages until the host loop flushes them
///
/// midir sends immediately, so scheduling ahead is emulated here: the
/// scheduler enqueues with future timestamps and `flush(now)` delivers what
/// is due.
pub struct ScheduledOutput<S: MessageSink> {
    sink: S,
    pending: BinaryHeap<Reverse<PendingMessage>>,
    next_seq: u64,
}

impl<S: MessageSink> ScheduledOutput<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            pending: BinaryHeap::new(),
            next_seq: 0,
        }
    }

    /// Deliver every message due at or before `now`; returns how many were sent
    pub fn flush(&mut self, now: f64) -> Result<usize> {
        let mut sent = 0;

        while let Some(Reverse(next)) = self.pending.peek() {
            if next.at > now {
                break;
            }
            if let Some(Reverse(due)) = self.pending.pop() {
                self.sink.send_now(&due.message)?;
                sent += 1;
            }
        }

        Ok(sent)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Time of the next queued message, if any
    pub fn next_due(&self) -> Option<f64> {
        self.pending.peek().map(|Reverse(p)| p.at)
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }
}

impl<S: MessageSink> MidiOutput for ScheduledOutput<S> {
    fn send(&mut self, message: &[u8], at: f64) -> Result<()> {
        if at <= 0.0 {
            return self.sink.send_now(message);
        }

        self.pending.push(Reverse(PendingMessage {
            at,
            seq: self.next_seq,
            message: message.to_vec(),
        }));
        self.next_seq += 1;
        Ok(())
    }

    /// Pending Note-Offs are released right away so no started note hangs;
    /// pending Note-Ons are discarded.
    fn clear(&mut self) {
        let drained = std::mem::take(&mut self.pending).into_sorted_vec();

        // into_sorted_vec on Reverse<_> is descending in time
        for Reverse(pending) in drained.into_iter().rev() {
            if is_note_off(&pending.message) {
                if let Err(e) = self.sink.send_now(&pending.message) {
                    tracing::warn!("Failed to release note while clearing output: {}", e);
                }
            }
        }
    }
}

/// midir output port behind a dispatch queue
pub type HardwareOutput = ScheduledOutput<MidiOutputConnection>;

pub fn open_hardware_output(port_name: &str, client_name: &str) -> Result<HardwareOutput> {
    let midi_out = MidirOutput::new(client_name)?;

    let ports = midi_out.ports();
    let port = ports
        .iter()
        .find(|p| {
            midi_out
                .port_name(p)
                .map(|name| name == port_name)
                .unwrap_or(false)
        })
        .ok_or_else(|| EngineError::PortNotFound(port_name.to_string()))?;

    let connection = midi_out.connect(port, "mymusic-recorder-output")?;
    tracing::info!(port = %port_name, "MIDI output connected");

    Ok(ScheduledOutput::new(connection))
}

/// A message captured by `CollectingOutput`
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub message: Vec<u8>,
    pub at: f64,
}

impl SentMessage {
    pub fn event(&self) -> Option<MidiEvent> {
        MidiEvent::from_bytes(&self.message)
    }
}

/// Output that records everything sent to it (dry runs and tests)
#[derive(Debug, Default)]
pub struct CollectingOutput {
    messages: Vec<SentMessage>,
    clear_count: usize,
}

impl CollectingOutput {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Rc<RefCell<CollectingOutput>> {
        Rc::new(RefCell::new(Self::new()))
    }

    pub fn messages(&self) -> &[SentMessage] {
        &self.messages
    }

    pub fn note_ons(&self) -> Vec<&SentMessage> {
        self.messages
            .iter()
            .filter(|m| matches!(m.event(), Some(MidiEvent::NoteOn { .. })))
            .collect()
    }

    pub fn note_offs(&self) -> Vec<&SentMessage> {
        self.messages
            .iter()
            .filter(|m| matches!(m.event(), Some(MidiEvent::NoteOff { .. })))
            .collect()
    }

    /// How many times `clear` was requested
    pub fn clear_count(&self) -> usize {
        self.clear_count
    }

    pub fn take(&mut self) -> Vec<SentMessage> {
        std::mem::take(&mut self.messages)
    }
}

impl MidiOutput for CollectingOutput {
    fn send(&mut self, message: &[u8], at: f64) -> Result<()> {
        self.messages.push(SentMessage {
            message: message.to_vec(),
            at,
        });
        Ok(())
    }

    fn clear(&mut self) {
        self.clear_count += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct WireLog {
        sent: Vec<Vec<u8>>,
    }

    impl MessageSink for WireLog {
        fn send_now(&mut self, message: &[u8]) -> Result<()> {
            self.sent.push(message.to_vec());
            Ok(())
        }
    }

    #[test]
    fn test_panic_covers_all_channels_and_pitches() {
        let mut output = CollectingOutput::new();
        panic(&mut output).unwrap();

        assert_eq!(output.messages().len(), 128 * 16);
        assert!(output.messages().iter().all(|m| m.at == 0.0));
        assert_eq!(output.messages()[0].message, vec![0x80, 0, 0]);
        assert_eq!(output.messages().last().unwrap().message, vec![0x8F, 127, 0]);
    }

    #[test]
    fn test_scheduled_output_flushes_in_time_order() {
        let mut output = ScheduledOutput::new(WireLog::default());

        send_note_off(&mut output, 0, 60, 200.0).unwrap();
        send_note_on(&mut output, 0, 60, 100, 100.0).unwrap();
        send_note_on(&mut output, 0, 62, 100, 100.0).unwrap();
        assert_eq!(output.pending_len(), 3);
        assert_eq!(output.next_due(), Some(100.0));

        assert_eq!(output.flush(99.0).unwrap(), 0);
        assert_eq!(output.flush(150.0).unwrap(), 2);
        // Same timestamp keeps submission order
        assert_eq!(output.sink().sent, vec![vec![0x90, 60, 100], vec![0x90, 62, 100]]);

        assert_eq!(output.flush(200.0).unwrap(), 1);
        assert_eq!(output.pending_len(), 0);
    }

    #[test]
    fn test_scheduled_output_immediate_send() {
        let mut output = ScheduledOutput::new(WireLog::default());
        send_note_off(&mut output, 1, 64, 0.0).unwrap();

        assert_eq!(output.pending_len(), 0);
        assert_eq!(output.sink().sent, vec![vec![0x81, 64, 0]]);
    }

    #[test]
    fn test_clear_releases_pending_note_offs() {
        let mut output = ScheduledOutput::new(WireLog::default());

        send_note_on(&mut output, 0, 60, 100, 100.0).unwrap();
        send_note_off(&mut output, 0, 60, 300.0).unwrap();
        send_note_on(&mut output, 0, 64, 100, 400.0).unwrap();
        send_note_off(&mut output, 0, 64, 500.0).unwrap();

        output.flush(150.0).unwrap();
        output.clear();

        assert_eq!(output.pending_len(), 0);
        assert_eq!(
            output.sink().sent,
            vec![vec![0x90, 60, 100], vec![0x80, 60, 0], vec![0x80, 64, 0]]
        );
    }
}
