// Resampling - converts the anchor to the output device rate once, up front

use crate::audio::anchor::AudioAnchor;
use crate::error::Result;
use rubato::{FftFixedIn, Resampler};

const CHUNK_SIZE: usize = 1024;
const SUB_CHUNKS: usize = 2;

/// Resample `anchor` to `target_rate`
///
/// The resampler delay is trimmed and the result cut to the exact converted
/// length, so the duration is preserved. Same-rate anchors are returned as is.
pub fn resample_anchor(anchor: &AudioAnchor, target_rate: u32) -> Result<AudioAnchor> {
    let source_rate = anchor.sample_rate();
    let frames = anchor.frames();
    if source_rate == target_rate || frames == 0 {
        return Ok(anchor.clone());
    }

    let channels = anchor.channels() as usize;
    let planar: Vec<Vec<f32>> = (0..channels)
        .map(|ch| (0..frames).map(|frame| anchor.sample(frame, ch)).collect())
        .collect();

    let mut resampler = FftFixedIn::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        CHUNK_SIZE,
        SUB_CHUNKS,
        channels,
    )?;

    let delay = resampler.output_delay();
    let expected = (frames as f64 * target_rate as f64 / source_rate as f64).round() as usize;
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay + CHUNK_SIZE); channels];

    // Feed zero padding past the end until the delayed tail is flushed out
    let mut pos = 0;
    while output[0].len() < expected + delay {
        let needed = resampler.input_frames_next();
        let chunk: Vec<Vec<f32>> = planar
            .iter()
            .map(|channel| {
                let mut block = vec![0.0f32; needed];
                if pos < frames {
                    let n = needed.min(frames - pos);
                    block[..n].copy_from_slice(&channel[pos..pos + n]);
                }
                block
            })
            .collect();

        let processed = resampler.process(&chunk, None)?;
        for (out, block) in output.iter_mut().zip(processed) {
            out.extend_from_slice(&block);
        }
        pos += needed;
    }

    let mut samples = Vec::with_capacity(expected * channels);
    for frame in delay..delay + expected {
        for channel in &output {
            samples.push(channel[frame]);
        }
    }

    tracing::debug!(source_rate, target_rate, frames, resampled = expected, "anchor resampled");
    Ok(AudioAnchor::new(samples, target_rate, anchor.channels()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(frequency: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_same_rate_untouched() {
        let anchor = AudioAnchor::new(vec![0.1, 0.2, 0.3], 48_000, 1);
        let resampled = resample_anchor(&anchor, 48_000).unwrap();
        assert_eq!(resampled.samples(), anchor.samples());
        assert_eq!(resampled.sample_rate(), 48_000);
    }

    #[test]
    fn test_resample_keeps_duration() {
        // 100ms at 44.1kHz
        let anchor = AudioAnchor::new(sine(1000.0, 44_100, 4410), 44_100, 1);
        let resampled = resample_anchor(&anchor, 48_000).unwrap();

        assert_eq!(resampled.sample_rate(), 48_000);
        assert_eq!(resampled.frames(), 4800);
        assert_eq!(resampled.duration_ms(), anchor.duration_ms());
    }

    #[test]
    fn test_resample_keeps_signal_level() {
        let anchor = AudioAnchor::new(sine(1000.0, 44_100, 44_100), 44_100, 1);
        let resampled = resample_anchor(&anchor, 48_000).unwrap();

        // Away from the edges the sine keeps its amplitude
        let middle = &resampled.samples()[4800..43_200];
        let peak = middle.iter().fold(0.0f32, |m, s| m.max(s.abs()));
        assert!(peak > 0.95 && peak < 1.05, "peak {}", peak);
    }

    #[test]
    fn test_resample_stereo_keeps_channels_apart() {
        let frames = 8000;
        let mut samples = Vec::with_capacity(frames * 2);
        for _ in 0..frames {
            samples.push(0.5);
            samples.push(-0.5);
        }
        let anchor = AudioAnchor::new(samples, 8000, 2);
        let resampled = resample_anchor(&anchor, 16_000).unwrap();

        assert_eq!(resampled.channels(), 2);
        assert_eq!(resampled.frames(), 16_000);
        assert!((resampled.sample(8000, 0) - 0.5).abs() < 0.01);
        assert!((resampled.sample(8000, 1) + 0.5).abs() < 0.01);
    }
}
