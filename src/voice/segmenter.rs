//! Energy-based speech endpointing
//!
//! Splits a continuous sample stream into phrases: speech starts when RMS
//! energy crosses the threshold, and ends after a run of silence. The
//! threshold comes from ambient-noise calibration.

use std::time::Duration;

/// Energy threshold used before calibration
const DEFAULT_THRESHOLD: f32 = 0.03;

/// Calibrated thresholds never drop below this
const MIN_THRESHOLD: f32 = 0.01;

/// Ambient RMS is scaled by this to get the speech threshold
const AMBIENT_MULTIPLIER: f32 = 1.5;

/// Minimum speech to count as a phrase (0.3 s at 16 kHz)
const MIN_SPEECH_SAMPLES: usize = 4800;

/// Silence that ends a phrase (0.8 s at 16 kHz)
const PAUSE_SAMPLES: usize = 12800;

/// State of the segmenter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentState {
    /// Waiting for speech
    Idle,
    /// Inside a phrase, accumulating
    Speaking,
    /// Phrase ended by a pause
    Complete,
}

/// Detects phrase boundaries in audio
#[derive(Debug)]
pub struct SpeechSegmenter {
    threshold: f32,
    sample_rate: u32,
    state: SegmentState,
    speech_buffer: Vec<f32>,
    silence_counter: usize,
}

impl SpeechSegmenter {
    /// Create a segmenter with the default threshold
    #[must_use]
    pub const fn new(sample_rate: u32) -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            sample_rate,
            state: SegmentState::Idle,
            speech_buffer: Vec::new(),
            silence_counter: 0,
        }
    }

    /// Set the threshold from a sample of room noise
    ///
    /// Returns the new threshold
    pub fn calibrate(&mut self, ambient: &[f32]) -> f32 {
        let ambient_energy = calculate_energy(ambient);
        self.threshold = (ambient_energy * AMBIENT_MULTIPLIER).max(MIN_THRESHOLD);

        tracing::debug!(
            ambient_energy,
            threshold = self.threshold,
            samples = ambient.len(),
            "segmenter calibrated"
        );
        self.threshold
    }

    /// Feed samples; returns the state after processing them
    pub fn process(&mut self, samples: &[f32]) -> SegmentState {
        if samples.is_empty() {
            return self.state;
        }

        let energy = calculate_energy(samples);
        let is_speech = energy > self.threshold;

        match self.state {
            SegmentState::Idle => {
                if is_speech {
                    self.state = SegmentState::Speaking;
                    self.speech_buffer.clear();
                    self.speech_buffer.extend_from_slice(samples);
                    self.silence_counter = 0;
                    tracing::trace!(energy, "speech onset");
                }
            }
            SegmentState::Speaking => {
                self.speech_buffer.extend_from_slice(samples);

                if is_speech {
                    self.silence_counter = 0;
                } else {
                    self.silence_counter += samples.len();
                }

                if self.silence_counter > PAUSE_SAMPLES {
                    if self.speech_buffer.len() > MIN_SPEECH_SAMPLES + self.silence_counter {
                        tracing::debug!(samples = self.speech_buffer.len(), "phrase complete");
                        self.state = SegmentState::Complete;
                    } else {
                        // Too short to be a phrase, just a noise blip
                        tracing::trace!("discarding short blip");
                        self.reset();
                    }
                }
            }
            SegmentState::Complete => {}
        }

        self.state
    }

    /// Length of audio accumulated in the current phrase
    #[must_use]
    pub fn phrase_duration(&self) -> Duration {
        super::clip::samples_duration(self.speech_buffer.len(), self.sample_rate)
    }

    /// Get the accumulated speech buffer
    #[must_use]
    pub fn speech_buffer(&self) -> &[f32] {
        &self.speech_buffer
    }

    /// Take the phrase, returning the segmenter to idle
    pub fn take_phrase(&mut self) -> Vec<f32> {
        let phrase = std::mem::take(&mut self.speech_buffer);
        self.reset();
        phrase
    }

    /// Reset to idle, dropping any partial phrase
    pub fn reset(&mut self) {
        self.state = SegmentState::Idle;
        self.speech_buffer.clear();
        self.silence_counter = 0;
    }

    /// Get current state
    #[must_use]
    pub const fn state(&self) -> SegmentState {
        self.state
    }

    /// Current speech energy threshold
    #[must_use]
    pub const fn threshold(&self) -> f32 {
        self.threshold
    }
}

/// Calculate RMS energy of audio samples
#[allow(clippy::cast_precision_loss)]
#[must_use]
pub fn calculate_energy(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }

    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_energy_calculation() {
        let silence = vec![0.0f32; 100];
        assert!(calculate_energy(&silence) < 0.001);

        let loud = vec![0.5f32; 100];
        assert!(calculate_energy(&loud) > 0.4);
    }

    #[test]
    fn test_calibration_floor() {
        let mut segmenter = SpeechSegmenter::new(16000);
        let threshold = segmenter.calibrate(&[0.0; 1600]);
        assert!((threshold - MIN_THRESHOLD).abs() < f32::EPSILON);
    }

    #[test]
    fn test_calibration_scales_noise() {
        let mut segmenter = SpeechSegmenter::new(16000);
        let threshold = segmenter.calibrate(&[0.1; 1600]);
        assert!((threshold - 0.15).abs() < 1e-4);
    }
}
