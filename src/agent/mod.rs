//! Conversation core
//!
//! Three activities run at once: the [`CaptureLoop`] listens and transcribes,
//! the [`Dispatcher`] reasons about each utterance and starts speaking, and
//! each playback session plays its reply chunk by chunk. Utterances cross from
//! capture to dispatch only through the input relay; playback is stopped only
//! through the [`PlaybackController`].

mod capture;
mod controller;
mod coordinator;
mod dispatcher;
mod relay;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};

pub use capture::{CaptureEvent, CaptureLoop, ListenTimeouts};
pub use controller::{
    InterruptOutcome, PlaybackController, PlaybackOptions, SessionEnd, SessionState,
};
pub use coordinator::InterruptCoordinator;
pub use dispatcher::{Dispatcher, TurnReport};
pub use relay::{InputRelay, Poll, RelayReceiver, RelaySender, Utterance};

use crate::config::{AgentConfig, VoiceConfig};
use crate::context::ConversationHistory;
use crate::reasoning::Reasoner;
use crate::voice::{AudioSink, SpeechSource, SynthesisOptions, Synthesizer, Transcriber};

/// How long shutdown waits for the capture loop's current iteration
const CAPTURE_JOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Backends the agent is assembled from
pub struct Components {
    pub source: Box<dyn SpeechSource>,
    pub transcriber: Arc<dyn Transcriber>,
    pub synthesizer: Arc<dyn Synthesizer>,
    pub sink: Arc<dyn AudioSink>,
    pub reasoner: Arc<dyn Reasoner>,
}

/// Timing and sizing for one agent run
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub listen: ListenTimeouts,
    pub playback: PlaybackOptions,
    pub history_limit: usize,
    pub poll_timeout: Duration,
    /// Spoken once before listening starts
    pub greeting: Option<String>,
}

impl AgentSettings {
    /// Derive settings from loaded configuration
    #[must_use]
    pub fn from_config(voice: &VoiceConfig, agent: &AgentConfig) -> Self {
        let greeting = agent.greeting.trim();

        Self {
            listen: ListenTimeouts {
                recognition: voice.recognition_timeout,
                phrase_limit: voice.phrase_time_limit,
            },
            playback: PlaybackOptions {
                chunk_length: voice.audio_chunk_length,
                interrupt_timeout: voice.interrupt_timeout,
                synthesis: SynthesisOptions {
                    language: voice.tts_language.clone(),
                    slow: voice.tts_slow,
                },
            },
            history_limit: agent.conversation_history_limit,
            poll_timeout: agent.queue_timeout,
            greeting: (!greeting.is_empty()).then(|| greeting.to_string()),
        }
    }
}

/// Fully wired spoken-dialogue loop
pub struct VoiceAgent {
    capture: CaptureLoop,
    dispatcher: Dispatcher,
    controller: PlaybackController,
    greeting: Option<String>,
}

impl VoiceAgent {
    /// Wire components together
    #[must_use]
    pub fn new(components: Components, settings: AgentSettings) -> Self {
        let controller = PlaybackController::new(
            components.synthesizer,
            components.sink,
            settings.playback,
        );
        let (relay_tx, relay_rx) = InputRelay::new();

        let coordinator = InterruptCoordinator::new(controller.clone(), relay_tx);
        let capture = CaptureLoop::new(
            components.source,
            components.transcriber,
            coordinator,
            settings.listen,
        );
        let dispatcher = Dispatcher::new(
            components.reasoner,
            controller.clone(),
            relay_rx,
            settings.history_limit,
            settings.poll_timeout,
        );

        Self {
            capture,
            dispatcher,
            controller,
            greeting: settings.greeting,
        }
    }

    /// Report every finished turn on `tx`
    #[must_use]
    pub fn with_notify(mut self, tx: mpsc::UnboundedSender<TurnReport>) -> Self {
        self.dispatcher = self.dispatcher.with_notify(tx);
        self
    }

    /// Handle for observing or stopping playback
    #[must_use]
    pub fn controller(&self) -> PlaybackController {
        self.controller.clone()
    }

    /// Run until `shutdown` turns true
    ///
    /// Speaks the greeting, starts the capture loop on its own task and runs
    /// the dispatcher on this one. On shutdown any playback is interrupted.
    /// Returns the final conversation history.
    pub async fn run(self, shutdown: watch::Receiver<bool>) -> ConversationHistory {
        let Self {
            capture,
            mut dispatcher,
            controller,
            greeting,
        } = self;

        if let Some(greeting) = greeting {
            tracing::info!(reply = %greeting, "assistant reply");
            if let Err(e) = controller.speak(&greeting) {
                tracing::error!(error = %e, "failed to speak greeting");
            }
        }

        let capture_task = tokio::spawn(capture.run(shutdown.clone()));

        dispatcher.run(shutdown).await;

        match tokio::time::timeout(CAPTURE_JOIN_TIMEOUT, capture_task).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::error!(error = %e, "capture task failed"),
            Err(_) => tracing::warn!("capture loop still busy at shutdown"),
        }

        controller.interrupt().await;
        tracing::info!("agent stopped");

        dispatcher.history().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_from_config() {
        let voice = VoiceConfig::default();
        let agent = AgentConfig::default();
        let settings = AgentSettings::from_config(&voice, &agent);

        assert_eq!(settings.playback.chunk_length, Duration::from_millis(500));
        assert_eq!(settings.playback.interrupt_timeout, Duration::from_secs(1));
        assert_eq!(settings.listen.phrase_limit, Duration::from_secs(15));
        assert_eq!(settings.history_limit, 10);
        assert!(settings.greeting.is_some());
    }

    #[test]
    fn test_blank_greeting_disabled() {
        let agent = AgentConfig {
            greeting: "  ".to_string(),
            ..AgentConfig::default()
        };
        let settings = AgentSettings::from_config(&VoiceConfig::default(), &agent);
        assert!(settings.greeting.is_none());
    }
}
