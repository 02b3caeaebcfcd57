//! Voice processing module
//!
//! Handles audio capture, endpointing, STT, TTS, and playback. The
//! conversation core only sees the collaborator traits defined here, so
//! hardware and cloud backends can be swapped for fakes in tests.

mod capture;
mod clip;
mod microphone;
mod playback;
mod segmenter;
mod stt;
mod tts;

use std::time::Duration;

use async_trait::async_trait;

use crate::Result;

pub use capture::{AudioCapture, SAMPLE_RATE, samples_to_wav};
pub use clip::{AudioClip, decode_mp3};
pub use microphone::MicrophoneSource;
pub use playback::AudioPlayback;
pub use segmenter::{SegmentState, SpeechSegmenter, calculate_energy};
pub use stt::SpeechToText;
pub use tts::TextToSpeech;

/// Audio of one captured phrase, ready for transcription
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedAudio {
    /// Mono f32 samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
}

impl CapturedAudio {
    /// Wrap captured samples
    #[must_use]
    pub const fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// Length of the captured phrase
    #[must_use]
    pub fn duration(&self) -> Duration {
        clip::samples_duration(self.samples.len(), self.sample_rate)
    }
}

/// Result of waiting for one phrase
#[derive(Debug, Clone, PartialEq)]
pub enum Listened {
    /// A phrase was captured
    Speech(CapturedAudio),
    /// No speech started before the timeout
    Silence,
}

/// Options forwarded to the synthesis backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisOptions {
    /// Language code (e.g. "en")
    pub language: String,
    /// Speak at a reduced rate
    pub slow: bool,
}

impl Default for SynthesisOptions {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            slow: false,
        }
    }
}

/// Source of raw speech (microphone or a scripted fake)
#[async_trait]
pub trait SpeechSource: Send {
    /// Wait up to `timeout` for speech to start, then capture one phrase of
    /// at most `phrase_limit`
    ///
    /// # Errors
    ///
    /// Returns error if the audio device fails
    async fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Listened>;
}

/// Speech-to-text backend
#[async_trait]
pub trait Transcriber: Send + Sync {
    /// Transcribe a captured phrase
    ///
    /// # Errors
    ///
    /// Returns `Error::Unintelligible` when nothing could be recognized and a
    /// transport error when the service could not be reached
    async fn transcribe(&self, audio: &CapturedAudio) -> Result<String>;
}

/// Text-to-speech backend
#[async_trait]
pub trait Synthesizer: Send + Sync {
    /// Synthesize the full clip for `text`
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<AudioClip>;
}

/// Blocking audio output
pub trait AudioSink: Send + Sync {
    /// Play a clip to completion, blocking the calling thread
    ///
    /// # Errors
    ///
    /// Returns error if playback fails
    fn play(&self, clip: &AudioClip) -> Result<()>;
}
