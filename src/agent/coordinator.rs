//! Barge-in handling between capture and dispatch

use super::controller::{InterruptOutcome, PlaybackController};
use super::relay::{RelaySender, Utterance};
use crate::Result;

/// Stops playback when the user starts talking, then queues what they said
///
/// The utterance is queued even if playback fails to stop in time, so user
/// speech is never dropped.
#[derive(Clone)]
pub struct InterruptCoordinator {
    controller: PlaybackController,
    relay: RelaySender,
}

impl InterruptCoordinator {
    #[must_use]
    pub const fn new(controller: PlaybackController, relay: RelaySender) -> Self {
        Self { controller, relay }
    }

    /// Handle one recognized utterance
    ///
    /// # Errors
    ///
    /// Returns error if the input relay has been closed
    pub async fn on_utterance(&self, text: &str) -> Result<InterruptOutcome> {
        let outcome = if self.controller.is_speaking() {
            tracing::info!("user barged in, stopping playback");
            self.controller.interrupt().await
        } else {
            InterruptOutcome::Idle
        };

        if outcome == InterruptOutcome::TimedOut {
            tracing::warn!("queueing utterance while playback may still be audible");
        }

        self.relay.send(Utterance::new(text))?;
        Ok(outcome)
    }
}
