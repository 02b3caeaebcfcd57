//! Microphone-backed speech source

use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{AudioCapture, CapturedAudio, Listened, SAMPLE_RATE, SegmentState, SpeechSegmenter, SpeechSource};
use crate::Result;

/// How often the capture buffer is drained (100ms at 16kHz)
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Listens on the default input device and cuts phrases by energy
pub struct MicrophoneSource {
    capture: AudioCapture,
    segmenter: SpeechSegmenter,
}

impl MicrophoneSource {
    /// Open and start the default input device
    ///
    /// # Errors
    ///
    /// Returns error if the device cannot be opened
    pub fn open() -> Result<Self> {
        let mut capture = AudioCapture::new()?;
        capture.start()?;

        Ok(Self {
            capture,
            segmenter: SpeechSegmenter::new(SAMPLE_RATE),
        })
    }

    /// Sample room noise for `duration` and derive the speech threshold
    ///
    /// Returns the calibrated threshold
    pub async fn calibrate(&mut self, duration: Duration) -> f32 {
        tracing::info!(secs = duration.as_secs_f32(), "calibrating for ambient noise");

        self.capture.clear_buffer();
        tokio::time::sleep(duration).await;
        let ambient = self.capture.take_buffer();
        let threshold = self.segmenter.calibrate(&ambient);

        tracing::info!(threshold, "calibration complete");
        threshold
    }

    fn finish_phrase(&mut self) -> Listened {
        let samples = self.segmenter.take_phrase();
        Listened::Speech(CapturedAudio::new(samples, SAMPLE_RATE))
    }
}

#[async_trait]
impl SpeechSource for MicrophoneSource {
    async fn listen(&mut self, timeout: Duration, phrase_limit: Duration) -> Result<Listened> {
        self.segmenter.reset();
        self.capture.clear_buffer();
        let started = Instant::now();

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;
            let samples = self.capture.take_buffer();

            match self.segmenter.process(&samples) {
                SegmentState::Complete => return Ok(self.finish_phrase()),
                SegmentState::Speaking if self.segmenter.phrase_duration() >= phrase_limit => {
                    tracing::debug!("phrase time limit reached");
                    return Ok(self.finish_phrase());
                }
                SegmentState::Idle if started.elapsed() >= timeout => return Ok(Listened::Silence),
                _ => {}
            }
        }
    }
}
