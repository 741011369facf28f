// Anchor playback - plays the decoded recording on the default cpal device
//
// The anchor is resampled to the device rate when the player is built. The
// stream runs from construction and renders silence until a start is
// scheduled. Engine time is mapped to device frames by counting rendered
// frames: a start at engine time `at` becomes a start frame that lies
// `at - now` ms after the frames already rendered.

use crate::audio::anchor::{AnchorPlayer, AudioAnchor};
use crate::audio::resample::resample_anchor;
use crate::clock::SharedClock;
use crate::error::{EngineError, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, FromSample, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Playback position shared with the audio callback
#[derive(Debug, Default)]
struct PlayCursor {
    /// Device frame at which playback begins
    start_frame: Option<u64>,
    /// Next frame to play from the anchor buffer
    position: usize,
}

/// Fill `data` (interleaved, `channels` per frame) from `anchor`
///
/// `first_frame` is the device frame index of `data[0]`; the anchor must
/// already be at the device rate. Returns true while audio is pending.
fn render<T>(
    cursor: &mut PlayCursor,
    anchor: &AudioAnchor,
    first_frame: u64,
    data: &mut [T],
    channels: usize,
) -> bool
where
    T: Sample + FromSample<f32>,
{
    let total = anchor.frames();

    for (i, frame) in data.chunks_mut(channels).enumerate() {
        let device_frame = first_frame + i as u64;
        let sounding = matches!(cursor.start_frame, Some(start) if device_frame >= start);

        if sounding && cursor.position < total {
            for (ch, out) in frame.iter_mut().enumerate() {
                *out = T::from_sample(anchor.sample(cursor.position, ch));
            }
            cursor.position += 1;
        } else {
            for out in frame.iter_mut() {
                *out = T::from_sample(0.0f32);
            }
        }
    }

    if cursor.position >= total {
        cursor.start_frame = None;
    }
    cursor.start_frame.is_some()
}

/// Plays an `AudioAnchor` through the default output device
pub struct CpalAnchorPlayer {
    anchor: AudioAnchor,
    clock: SharedClock,
    device_rate: u32,
    cursor: Arc<Mutex<PlayCursor>>,
    frames_rendered: Arc<AtomicU64>,
    _stream: Stream,
}

impl CpalAnchorPlayer {
    pub fn new(anchor: AudioAnchor, clock: SharedClock) -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| EngineError::AudioDevice("No audio output device found".to_string()))?;

        let supported_config = device.default_output_config()?;
        let sample_format = supported_config.sample_format();
        let config: StreamConfig = supported_config.into();
        let device_rate = config.sample_rate.0;
        let anchor = resample_anchor(&anchor, device_rate)?;

        tracing::info!(
            device = %device.name().unwrap_or_else(|_| "Unknown".to_string()),
            sample_rate = device_rate,
            channels = config.channels,
            ?sample_format,
            "audio output opened"
        );

        let cursor = Arc::new(Mutex::new(PlayCursor::default()));
        let frames_rendered = Arc::new(AtomicU64::new(0));

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &config,
                anchor.clone(),
                Arc::clone(&cursor),
                Arc::clone(&frames_rendered),
            ),
            SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &config,
                anchor.clone(),
                Arc::clone(&cursor),
                Arc::clone(&frames_rendered),
            ),
            SampleFormat::U16 => Self::build_stream::<u16>(
                &device,
                &config,
                anchor.clone(),
                Arc::clone(&cursor),
                Arc::clone(&frames_rendered),
            ),
            other => {
                return Err(EngineError::AudioDevice(format!(
                    "Unsupported sample format: {:?}. Supported formats: F32, I16, U16",
                    other
                )));
            }
        }?;

        stream.play()?;

        Ok(Self {
            anchor,
            clock,
            device_rate,
            cursor,
            frames_rendered,
            _stream: stream,
        })
    }

    pub fn anchor(&self) -> &AudioAnchor {
        &self.anchor
    }

    fn build_stream<T>(
        device: &Device,
        config: &StreamConfig,
        anchor: AudioAnchor,
        cursor: Arc<Mutex<PlayCursor>>,
        frames_rendered: Arc<AtomicU64>,
    ) -> Result<Stream>
    where
        T: SizedSample + FromSample<f32> + Send + 'static,
    {
        let channels = config.channels as usize;

        let stream = device.build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                // No allocations, no blocking locks
                let frames = (data.len() / channels) as u64;
                let first_frame = frames_rendered.fetch_add(frames, Ordering::Relaxed);

                if let Ok(mut cursor) = cursor.try_lock() {
                    render(&mut cursor, &anchor, first_frame, data, channels);
                } else {
                    for sample in data.iter_mut() {
                        *sample = Sample::from_sample::<f32>(0.0);
                    }
                }
            },
            move |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )?;

        Ok(stream)
    }
}

impl AnchorPlayer for CpalAnchorPlayer {
    fn duration_ms(&self) -> f64 {
        self.anchor.duration_ms()
    }

    fn start_at(&mut self, at: f64, offset_ms: f64) -> Result<()> {
        let delay_ms = (at - self.clock.now()).max(0.0);
        let delay_frames = (delay_ms * self.device_rate as f64 / 1000.0).round() as u64;
        let start_frame = self.frames_rendered.load(Ordering::Relaxed) + delay_frames;

        match self.cursor.lock() {
            Ok(mut cursor) => {
                cursor.start_frame = Some(start_frame);
                cursor.position = self.anchor.frame_at_ms(offset_ms).round() as usize;
            }
            Err(_) => {
                return Err(EngineError::AudioDevice(
                    "Audio playback state poisoned".to_string(),
                ));
            }
        }

        tracing::debug!(delay_ms, offset_ms, "anchor playback scheduled");
        Ok(())
    }

    fn stop(&mut self) {
        if let Ok(mut cursor) = self.cursor.lock() {
            cursor.start_frame = None;
        }
    }

    fn is_playing(&self) -> bool {
        match self.cursor.lock() {
            Ok(cursor) => cursor.start_frame.is_some(),
            Err(_) => false,
        }
    }
}
