//! Turn processing loop
//!
//! The dispatcher is the only owner of the conversation history. Each turn
//! runs to completion before the next utterance is taken off the relay, so
//! history appends and reads never interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use uuid::Uuid;

use super::controller::{InterruptOutcome, PlaybackController};
use super::relay::{Poll, RelayReceiver, Utterance};
use crate::context::ConversationHistory;
use crate::reasoning::{HealthAssessment, Reasoner, fallback_response};
use crate::{Error, Result};

/// Outcome of one processed turn
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub user_input: String,
    pub assessment: HealthAssessment,
    pub reply: String,
    /// The backend failed and the fallback reply was used
    pub fallback: bool,
    /// Playback session started for the reply, if speaking succeeded
    pub session: Option<Uuid>,
}

/// Drains the input relay and answers each utterance
pub struct Dispatcher {
    reasoner: Arc<dyn Reasoner>,
    controller: PlaybackController,
    relay: RelayReceiver,
    history: ConversationHistory,
    poll_timeout: Duration,
    notify: Option<mpsc::UnboundedSender<TurnReport>>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(
        reasoner: Arc<dyn Reasoner>,
        controller: PlaybackController,
        relay: RelayReceiver,
        history_limit: usize,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            reasoner,
            controller,
            relay,
            history: ConversationHistory::new(history_limit),
            poll_timeout,
            notify: None,
        }
    }

    /// Send a [`TurnReport`] on `tx` after every turn
    #[must_use]
    pub fn with_notify(mut self, tx: mpsc::UnboundedSender<TurnReport>) -> Self {
        self.notify = Some(tx);
        self
    }

    /// Conversation so far
    #[must_use]
    pub const fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Poll the relay until `shutdown` turns true or every sender is gone
    ///
    /// A turn already in progress when shutdown is signalled runs to the end.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) {
        tracing::info!(poll_ms = self.poll_timeout.as_millis(), "dispatcher started");

        loop {
            let stopping = *shutdown.borrow();
            if stopping {
                break;
            }

            match self.relay.recv_timeout(self.poll_timeout).await {
                Poll::Item(utterance) => {
                    let report = self.process_turn(utterance).await;
                    if let Some(tx) = &self.notify {
                        // Listener may have gone away; the turn itself is done
                        let _ = tx.send(report);
                    }
                }
                Poll::Empty => {}
                Poll::Closed => {
                    tracing::info!("input relay closed");
                    break;
                }
            }
        }

        tracing::info!(turns = self.history.len() / 2, "dispatcher stopped");
    }

    /// Run one full turn for `utterance`
    ///
    /// Never fails: a backend error or panic is replaced by the fallback
    /// reply and a playback error is logged. A reply from an earlier turn
    /// that is still playing is stopped before the new one starts.
    pub async fn process_turn(&mut self, utterance: Utterance) -> TurnReport {
        let user_input = utterance.text;
        tracing::debug!(
            queued_ms = (chrono::Utc::now() - utterance.received_at).num_milliseconds(),
            "processing utterance"
        );

        self.history.add_user_message(user_input.clone());
        let context = self.history.context();

        let ((assessment, reply), fallback) = match self.reason(context, &user_input).await {
            Ok(response) => (response, false),
            Err(e) => {
                tracing::warn!(error = %e, "reasoning failed, using fallback reply");
                (fallback_response(), true)
            }
        };

        tracing::info!(
            risk = %assessment.risk_level,
            requires_vet = assessment.requires_vet,
            symptoms = %assessment.symptoms_summary(),
            safety_flags = ?assessment.safety_flags,
            "health assessment"
        );

        self.history.add_assistant_message(reply.clone());

        // A reply still playing from a queued earlier turn is superseded
        if self.controller.interrupt().await == InterruptOutcome::TimedOut {
            tracing::warn!("previous reply still playing, speaking over it");
        }

        tracing::info!(reply = %reply, "assistant reply");
        let session = match self.controller.speak(&reply) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::error!(error = %e, "failed to start speaking reply");
                None
            }
        };

        TurnReport {
            user_input,
            assessment,
            reply,
            fallback,
            session,
        }
    }

    /// Call the reasoner on its own task; a panic surfaces as an error
    async fn reason(
        &self,
        context: String,
        user_input: &str,
    ) -> Result<(HealthAssessment, String)> {
        let reasoner = Arc::clone(&self.reasoner);
        let input = user_input.to_string();

        tokio::spawn(async move { reasoner.analyze_and_respond(&context, &input).await })
            .await
            .map_err(|e| Error::Reasoning(format!("reasoning task failed: {e}")))?
    }
}
