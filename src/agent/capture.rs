//! Continuous listen-transcribe loop

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::controller::InterruptOutcome;
use super::coordinator::InterruptCoordinator;
use crate::Error;
use crate::voice::{Listened, SpeechSource, Transcriber};

/// Pause after an unexpected failure so a broken device does not spin
const FAILURE_BACKOFF: Duration = Duration::from_millis(250);

/// Listening bounds for one iteration
#[derive(Debug, Clone, Copy)]
pub struct ListenTimeouts {
    /// Wait for speech onset
    pub recognition: Duration,
    /// Longest phrase captured
    pub phrase_limit: Duration,
}

/// What happened in one capture iteration
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureEvent {
    /// An utterance was handed to the coordinator
    Queued {
        text: String,
        interrupt: InterruptOutcome,
    },
    /// No speech started within the recognition timeout
    Silence,
    /// Speech was captured but nothing could be recognized
    Unintelligible,
    /// The transcription service could not be reached
    TransportError(String),
    /// Any other failure, already logged
    Failed(String),
    /// The dispatcher is gone; the loop cannot continue
    RelayClosed,
}

/// Listens, transcribes and forwards utterances until shut down
pub struct CaptureLoop {
    source: Box<dyn SpeechSource>,
    transcriber: Arc<dyn Transcriber>,
    coordinator: InterruptCoordinator,
    timeouts: ListenTimeouts,
}

impl CaptureLoop {
    #[must_use]
    pub fn new(
        source: Box<dyn SpeechSource>,
        transcriber: Arc<dyn Transcriber>,
        coordinator: InterruptCoordinator,
        timeouts: ListenTimeouts,
    ) -> Self {
        Self {
            source,
            transcriber,
            coordinator,
            timeouts,
        }
    }

    /// Run until `shutdown` turns true or the relay closes
    ///
    /// The signal is checked once per iteration; an in-flight listen or
    /// transcription is allowed to finish.
    pub async fn run(mut self, shutdown: watch::Receiver<bool>) {
        tracing::info!("capture loop started");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }
            match self.run_once().await {
                CaptureEvent::RelayClosed => {
                    tracing::warn!("input relay closed, stopping capture loop");
                    break;
                }
                CaptureEvent::Failed(_) => tokio::time::sleep(FAILURE_BACKOFF).await,
                _ => {}
            }
        }

        tracing::info!("capture loop stopped");
    }

    /// Capture and forward at most one utterance
    pub async fn run_once(&mut self) -> CaptureEvent {
        let listened = self
            .source
            .listen(self.timeouts.recognition, self.timeouts.phrase_limit)
            .await;

        let audio = match listened {
            Ok(Listened::Speech(audio)) => audio,
            Ok(Listened::Silence) => return CaptureEvent::Silence,
            Err(e) => {
                tracing::error!(error = %e, "audio capture failed");
                return CaptureEvent::Failed(e.to_string());
            }
        };

        tracing::debug!(secs = audio.duration().as_secs_f32(), "phrase captured, transcribing");

        let text = match self.transcriber.transcribe(&audio).await {
            Ok(text) => text,
            Err(Error::Unintelligible) => {
                tracing::warn!("could not understand audio");
                return CaptureEvent::Unintelligible;
            }
            Err(e) if e.is_transport() => {
                tracing::warn!(error = %e, "speech recognition service unavailable");
                return CaptureEvent::TransportError(e.to_string());
            }
            Err(e) => {
                tracing::error!(error = %e, "transcription failed");
                return CaptureEvent::Failed(e.to_string());
            }
        };

        let text = text.trim();
        if text.is_empty() {
            tracing::warn!("could not understand audio");
            return CaptureEvent::Unintelligible;
        }

        tracing::info!(text = %text, "user said");

        match self.coordinator.on_utterance(text).await {
            Ok(interrupt) => CaptureEvent::Queued {
                text: text.to_string(),
                interrupt,
            },
            Err(_) => CaptureEvent::RelayClosed,
        }
    }
}
