// Lock-free channels between device callbacks and the host loop

pub mod channels;

pub use channels::{InputConsumer, InputProducer, create_input_channel};
