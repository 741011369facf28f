// Communication channels lock-free
// The midir callback thread pushes, the host-loop thread drains

use crate::midi::event::TimedMidiMessage;
use ringbuf::{HeapRb, traits::Split};

pub type InputProducer = ringbuf::HeapProd<TimedMidiMessage>;
pub type InputConsumer = ringbuf::HeapCons<TimedMidiMessage>;

pub fn create_input_channel(capacity: usize) -> (InputProducer, InputConsumer) {
    let rb = HeapRb::<TimedMidiMessage>::new(capacity);
    rb.split()
}
