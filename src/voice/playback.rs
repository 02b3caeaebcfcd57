//! Audio playback to speakers

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleRate, StreamConfig};

use super::{AudioClip, AudioSink};
use crate::{Error, Result};

/// Extra time allowed past a clip's length before giving up on completion
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Plays audio to the default output device
///
/// Each call opens a short-lived output stream at the clip's sample rate, so
/// the player itself holds no device handles and can move between threads.
pub struct AudioPlayback {
    device_name: String,
}

impl AudioPlayback {
    /// Create a new audio playback instance
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
        let device_name = device.name().unwrap_or_default();

        tracing::debug!(device = %device_name, "audio playback initialized");

        Ok(Self { device_name })
    }

    /// Name of the output device found at startup
    #[must_use]
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    /// Play samples in a blocking manner
    fn play_samples_blocking(samples: Vec<f32>, sample_rate: u32) -> Result<()> {
        if samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = output_config(&device, sample_rate)?;
        let channels = config.channels as usize;

        let sample_count = samples.len();
        let samples = Arc::new(samples);
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let stream = {
            let samples = Arc::clone(&samples);
            let position = Arc::clone(&position);
            let finished = Arc::clone(&finished);

            device
                .build_output_stream(
                    &config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                        for frame in data.chunks_mut(channels) {
                            let pos = position.load(Ordering::Relaxed);
                            let sample = samples.get(pos).copied().unwrap_or_else(|| {
                                finished.store(true, Ordering::Release);
                                0.0
                            });

                            for out in frame.iter_mut() {
                                *out = sample;
                            }

                            if pos < samples.len() {
                                position.store(pos + 1, Ordering::Relaxed);
                            }
                        }
                    },
                    |err| {
                        tracing::error!(error = %err, "audio playback error");
                    },
                    None,
                )
                .map_err(|e| Error::Audio(e.to_string()))?
        };

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Poll for completion with timeout
        let duration_ms = (sample_count as u64 * 1000) / u64::from(sample_rate.max(1));
        let timeout = Duration::from_millis(duration_ms) + DRAIN_GRACE;
        let start = Instant::now();

        while !finished.load(Ordering::Acquire) {
            if start.elapsed() > timeout {
                tracing::warn!("playback did not drain before timeout");
                break;
            }
            std::thread::sleep(Duration::from_millis(10));
        }

        drop(stream);
        tracing::trace!(samples = sample_count, "chunk played");

        Ok(())
    }
}

impl AudioSink for AudioPlayback {
    fn play(&self, clip: &AudioClip) -> Result<()> {
        Self::play_samples_blocking(clip.samples().to_vec(), clip.sample_rate())
    }
}

/// Pick an output config at `sample_rate`, preferring mono then stereo
fn output_config(device: &Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |channels: u16| {
        device.supported_output_configs().ok().and_then(|mut configs| {
            configs.find(|c| {
                c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        })
    };

    let supported = supports(1)
        .or_else(|| supports(2))
        .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

    Ok(supported.with_sample_rate(rate).config())
}
