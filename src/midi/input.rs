// MIDI Input - subscription to note events from hardware or in-process sources

use crate::clock::SharedClock;
use crate::config::MidiConfig;
use crate::error::{EngineError, Result};
use crate::messaging::channels::{InputConsumer, InputProducer, create_input_channel};
use crate::midi::event::TimedMidiMessage;
use midir::{MidiInput as MidirInput, MidiInputConnection};
use ringbuf::traits::{Consumer, Producer};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A source of timestamped MIDI messages the recorder can bind to
///
/// `id` identifies the source across calls so a recorder can tell whether a
/// new `start` targets the source it is already listening to.
pub trait MidiInputSource {
    fn id(&self) -> &str;

    /// Attach a listener. Dropping the returned handle detaches it.
    fn subscribe(&mut self) -> Result<Box<dyn InputListener>>;
}

/// Handle to an attached listener; yields messages in arrival order
pub trait InputListener {
    fn try_next(&mut self) -> Option<TimedMidiMessage>;
}

/// Hardware MIDI input port opened through midir
pub struct HardwareInput {
    port_name: String,
    client_name: String,
    capacity: usize,
    clock: SharedClock,
}

impl HardwareInput {
    pub fn new(port_name: impl Into<String>, clock: SharedClock, config: &MidiConfig) -> Self {
        Self {
            port_name: port_name.into(),
            client_name: config.client_name.clone(),
            capacity: config.input_buffer_capacity,
            clock,
        }
    }
}

impl MidiInputSource for HardwareInput {
    fn id(&self) -> &str {
        &self.port_name
    }

    fn subscribe(&mut self) -> Result<Box<dyn InputListener>> {
        let midi_in = MidirInput::new(&self.client_name)?;

        let ports = midi_in.ports();
        let port = ports
            .iter()
            .find(|p| {
                midi_in
                    .port_name(p)
                    .map(|name| name == self.port_name)
                    .unwrap_or(false)
            })
            .ok_or_else(|| EngineError::PortNotFound(self.port_name.clone()))?;

        let (mut producer, consumer) = create_input_channel(self.capacity);
        let clock = Arc::clone(&self.clock);

        let connection = midi_in.connect(
            port,
            "mymusic-recorder-input",
            move |_timestamp, message, _| {
                // Runs on the midir thread: stamp with the engine clock and hand off
                let msg = TimedMidiMessage::new(message, clock.now());
                if producer.try_push(msg).is_err() {
                    tracing::warn!("MIDI input buffer full, event dropped");
                }
            },
            (),
        )?;

        tracing::info!(port = %self.port_name, "MIDI input connected");

        Ok(Box::new(HardwareListener {
            _connection: connection,
            consumer,
        }))
    }
}

struct HardwareListener {
    // Closing the midir connection on drop is the unsubscribe
    _connection: MidiInputConnection<()>,
    consumer: InputConsumer,
}

impl InputListener for HardwareListener {
    fn try_next(&mut self) -> Option<TimedMidiMessage> {
        self.consumer.try_pop()
    }
}

/// In-process input source
///
/// Clones share the same endpoint: one clone is handed to the recorder, the
/// other is kept to inject messages. Only the most recent subscription
/// receives messages.
#[derive(Clone)]
pub struct VirtualInput {
    id: String,
    capacity: usize,
    sender: Arc<Mutex<Option<InputProducer>>>,
    subscribers: Arc<AtomicUsize>,
}

impl VirtualInput {
    pub fn new(id: impl Into<String>) -> Self {
        Self::with_capacity(id, MidiConfig::default().input_buffer_capacity)
    }

    pub fn with_capacity(id: impl Into<String>, capacity: usize) -> Self {
        Self {
            id: id.into(),
            capacity,
            sender: Arc::new(Mutex::new(None)),
            subscribers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Deliver a raw message; returns false if nobody listens or the buffer is full
    pub fn send(&self, bytes: &[u8], timestamp: f64) -> bool {
        match self.sender.lock() {
            Ok(mut sender) => match sender.as_mut() {
                Some(tx) => tx.try_push(TimedMidiMessage::new(bytes, timestamp)).is_ok(),
                None => false,
            },
            Err(_) => false,
        }
    }

    /// Number of live listener handles
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.load(Ordering::Relaxed)
    }
}

impl MidiInputSource for VirtualInput {
    fn id(&self) -> &str {
        &self.id
    }

    fn subscribe(&mut self) -> Result<Box<dyn InputListener>> {
        let (producer, consumer) = create_input_channel(self.capacity);

        if let Ok(mut sender) = self.sender.lock() {
            *sender = Some(producer);
        }
        self.subscribers.fetch_add(1, Ordering::Relaxed);

        Ok(Box::new(VirtualListener {
            consumer,
            sender: Arc::clone(&self.sender),
            subscribers: Arc::clone(&self.subscribers),
        }))
    }
}

struct VirtualListener {
    consumer: InputConsumer,
    sender: Arc<Mutex<Option<InputProducer>>>,
    subscribers: Arc<AtomicUsize>,
}

impl InputListener for VirtualListener {
    fn try_next(&mut self) -> Option<TimedMidiMessage> {
        self.consumer.try_pop()
    }
}

impl Drop for VirtualListener {
    fn drop(&mut self) {
        if self.subscribers.fetch_sub(1, Ordering::Relaxed) == 1 {
            if let Ok(mut sender) = self.sender.lock() {
                *sender = None;
            }
        }
    }
}
