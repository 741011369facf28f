// Audio anchor - the reference recording played in lock-step with MIDI

use crate::error::Result;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

/// Decoded audio buffer, interleaved f32 samples
#[derive(Debug, Clone)]
pub struct AudioAnchor {
    samples: Arc<Vec<f32>>,
    sample_rate: u32,
    channels: u16,
}

impl AudioAnchor {
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Self {
        Self {
            samples: Arc::new(samples),
            sample_rate: sample_rate.max(1),
            channels: channels.max(1),
        }
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn duration_ms(&self) -> f64 {
        self.frames() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Frame index for a position in ms (not clamped)
    pub fn frame_at_ms(&self, ms: f64) -> f64 {
        ms.max(0.0) * self.sample_rate as f64 / 1000.0
    }

    /// Sample of `channel` at `frame`; out-of-range frames are silent.
    /// Channels beyond the buffer's reuse its last channel (mono fan-out).
    pub fn sample(&self, frame: usize, channel: usize) -> f32 {
        let channels = self.channels as usize;
        let channel = channel.min(channels - 1);
        self.samples
            .get(frame * channels + channel)
            .copied()
            .unwrap_or(0.0)
    }
}

/// Plays an anchor buffer on a clock the engine can schedule against
pub trait AnchorPlayer {
    fn duration_ms(&self) -> f64;

    /// Begin playback at engine time `at` (ms), `offset_ms` into the buffer
    fn start_at(&mut self, at: f64, offset_ms: f64) -> Result<()>;

    /// Stop playback; no-op when not playing
    fn stop(&mut self);

    fn is_playing(&self) -> bool;
}

pub type SharedAnchor = Rc<RefCell<dyn AnchorPlayer>>;
