//! Utterance handoff from capture to dispatch

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;

use crate::{Error, Result};

/// One transcribed unit of user speech
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Utterance {
    pub text: String,
    pub received_at: DateTime<Utc>,
}

impl Utterance {
    /// Stamp `text` with the current time
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            received_at: Utc::now(),
        }
    }
}

/// Result of a bounded poll on the relay
#[derive(Debug)]
pub enum Poll {
    /// An utterance arrived
    Item(Utterance),
    /// Nothing arrived within the wait
    Empty,
    /// Every sender is gone and the queue is drained
    Closed,
}

/// Constructor for the FIFO utterance channel
pub struct InputRelay;

impl InputRelay {
    /// Create a connected sender/receiver pair
    #[must_use]
    #[allow(clippy::new_ret_no_self)]
    pub fn new() -> (RelaySender, RelayReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RelaySender { tx }, RelayReceiver { rx })
    }
}

/// Producer half, cloned into whoever hands off utterances
#[derive(Debug, Clone)]
pub struct RelaySender {
    tx: mpsc::UnboundedSender<Utterance>,
}

impl RelaySender {
    /// Enqueue an utterance
    ///
    /// # Errors
    ///
    /// Returns error if the receiver has been dropped
    pub fn send(&self, utterance: Utterance) -> Result<()> {
        self.tx
            .send(utterance)
            .map_err(|_| Error::Channel("input relay closed".to_string()))
    }

    /// Whether the receiving side is gone
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Consumer half, owned by the dispatcher
#[derive(Debug)]
pub struct RelayReceiver {
    rx: mpsc::UnboundedReceiver<Utterance>,
}

impl RelayReceiver {
    /// Wait up to `wait` for the next utterance
    pub async fn recv_timeout(&mut self, wait: Duration) -> Poll {
        match tokio::time::timeout(wait, self.rx.recv()).await {
            Ok(Some(utterance)) => Poll::Item(utterance),
            Ok(None) => Poll::Closed,
            Err(_) => Poll::Empty,
        }
    }

    /// Take an utterance if one is already queued
    pub fn try_recv(&mut self) -> Option<Utterance> {
        self.rx.try_recv().ok()
    }

    /// Number of queued utterances
    #[must_use]
    pub fn len(&self) -> usize {
        self.rx.len()
    }

    /// Whether the queue is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fifo_order() {
        let (tx, mut rx) = InputRelay::new();
        for text in ["one", "two", "three"] {
            tx.send(Utterance::new(text)).unwrap();
        }
        assert_eq!(rx.len(), 3);

        let mut seen = Vec::new();
        while let Poll::Item(u) = rx.recv_timeout(Duration::from_millis(10)).await {
            seen.push(u.text);
        }
        assert_eq!(seen, vec!["one", "two", "three"]);
    }

    #[tokio::test]
    async fn test_empty_poll_times_out() {
        let (_tx, mut rx) = InputRelay::new();
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(5)).await,
            Poll::Empty
        ));
    }

    #[tokio::test]
    async fn test_closed_after_drain() {
        let (tx, mut rx) = InputRelay::new();
        tx.send(Utterance::new("last")).unwrap();
        drop(tx);

        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(5)).await,
            Poll::Item(_)
        ));
        assert!(matches!(
            rx.recv_timeout(Duration::from_millis(5)).await,
            Poll::Closed
        ));
    }

    #[test]
    fn test_send_after_receiver_dropped() {
        let (tx, rx) = InputRelay::new();
        drop(rx);
        assert!(tx.is_closed());
        assert!(matches!(tx.send(Utterance::new("lost")), Err(Error::Channel(_))));
    }
}
