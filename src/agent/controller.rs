//! Interruptible chunked playback
//!
//! Each call to [`PlaybackController::speak`] spawns a session task that
//! synthesizes the full clip, splits it into fixed-length chunks and plays them
//! one at a time. The session checks its stop channel before every chunk, so
//! an interrupt lands within one chunk length.
//!
//! Sessions talk to the controller only through two `watch` channels: a stop
//! channel the controller writes and a state channel the session writes. A
//! `watch` keeps its last value, so a stop sent between two checks is still
//! seen by the next one.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use crate::voice::{AudioSink, SynthesisOptions, Synthesizer};
use crate::{Error, Result};

/// Playback tuning
#[derive(Debug, Clone)]
pub struct PlaybackOptions {
    /// Length of each playback chunk
    pub chunk_length: Duration,
    /// Upper bound on waiting for a stopped session to finish
    pub interrupt_timeout: Duration,
    /// Language and speed passed to the synthesizer
    pub synthesis: SynthesisOptions,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            chunk_length: Duration::from_millis(500),
            interrupt_timeout: Duration::from_secs(1),
            synthesis: SynthesisOptions::default(),
        }
    }
}

/// How a session ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEnd {
    /// Every chunk was played
    Completed,
    /// A stop request cut playback short after `played` chunks
    Interrupted { played: usize, total: usize },
    /// Synthesis or playback failed
    Failed(String),
}

/// Lifecycle of one playback session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Synthesizing,
    /// Playing chunk index `chunk` of `total`
    Playing { chunk: usize, total: usize },
    Finished(SessionEnd),
}

impl SessionState {
    /// Whether the session has reached a terminal state
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self, Self::Finished(_))
    }
}

/// Which side won the race in [`PlaybackController::interrupt`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterruptOutcome {
    /// Nothing was speaking
    Idle,
    /// Every active session finished within the timeout
    Stopped,
    /// The timeout elapsed first
    TimedOut,
}

struct SessionHandle {
    id: Uuid,
    stop: watch::Sender<bool>,
    state: watch::Receiver<SessionState>,
}

impl SessionHandle {
    fn is_active(&self) -> bool {
        !self.state.borrow().is_finished()
    }
}

struct Inner {
    synthesizer: Arc<dyn Synthesizer>,
    sink: Arc<dyn AudioSink>,
    options: PlaybackOptions,
    sessions: Mutex<Vec<SessionHandle>>,
}

/// Starts, observes and stops playback sessions
///
/// Cheap to clone; clones share the same set of sessions.
#[derive(Clone)]
pub struct PlaybackController {
    inner: Arc<Inner>,
}

impl PlaybackController {
    /// Create a controller over a synthesizer and an output sink
    #[must_use]
    pub fn new(
        synthesizer: Arc<dyn Synthesizer>,
        sink: Arc<dyn AudioSink>,
        options: PlaybackOptions,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                synthesizer,
                sink,
                options,
                sessions: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Playback settings in use
    #[must_use]
    pub fn options(&self) -> &PlaybackOptions {
        &self.inner.options
    }

    /// Start speaking `text` in a new session and return immediately
    ///
    /// A session already in progress is not cancelled; callers are expected
    /// to interrupt first. Overlap is logged and both sessions are tracked.
    ///
    /// # Errors
    ///
    /// Returns error if `text` is blank or no tokio runtime is running
    pub fn speak(&self, text: &str) -> Result<Uuid> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Playback("nothing to speak".to_string()));
        }

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| Error::Playback(format!("no async runtime: {e}")))?;

        let id = Uuid::new_v4();
        let (stop_tx, stop_rx) = watch::channel(false);
        let (state_tx, state_rx) = watch::channel(SessionState::Synthesizing);

        {
            let mut sessions = self.sessions();
            sessions.retain(SessionHandle::is_active);
            if !sessions.is_empty() {
                tracing::warn!(
                    active = sessions.len(),
                    "speak called while another session is still playing"
                );
            }
            sessions.push(SessionHandle {
                id,
                stop: stop_tx,
                state: state_rx,
            });
        }

        tracing::debug!(session = %id, chars = text.len(), "starting playback session");
        runtime.spawn(run_session(
            id,
            text.to_string(),
            Arc::clone(&self.inner.synthesizer),
            Arc::clone(&self.inner.sink),
            self.inner.options.clone(),
            stop_rx,
            state_tx,
        ));

        Ok(id)
    }

    /// Stop every active session and wait, bounded by the interrupt timeout
    pub async fn interrupt(&self) -> InterruptOutcome {
        let pending = self.signal_stop();
        if pending.is_empty() {
            return InterruptOutcome::Idle;
        }

        tracing::debug!(sessions = pending.len(), "interrupting playback");
        if wait_all(pending, Some(self.inner.options.interrupt_timeout)).await {
            InterruptOutcome::Stopped
        } else {
            tracing::warn!(
                timeout_ms = self.inner.options.interrupt_timeout.as_millis(),
                "playback did not stop before interrupt timeout"
            );
            InterruptOutcome::TimedOut
        }
    }

    /// Signal every active session to stop without waiting
    ///
    /// Returns the number of sessions signalled.
    pub fn request_stop(&self) -> usize {
        self.signal_stop().len()
    }

    /// Whether any session is synthesizing or playing
    #[must_use]
    pub fn is_speaking(&self) -> bool {
        self.sessions().iter().any(SessionHandle::is_active)
    }

    /// Number of sessions not yet finished
    #[must_use]
    pub fn active_sessions(&self) -> usize {
        self.sessions().iter().filter(|s| s.is_active()).count()
    }

    /// Current state of a session, if still tracked
    #[must_use]
    pub fn session_state(&self, id: Uuid) -> Option<SessionState> {
        self.sessions()
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.state.borrow().clone())
    }

    /// Wait until every active session has finished
    ///
    /// Returns `true` if nothing is left playing, `false` if `timeout` elapsed
    /// first. Returns immediately when nothing is playing.
    pub async fn wait_until_finished(&self, timeout: Option<Duration>) -> bool {
        let pending: Vec<_> = self
            .sessions()
            .iter()
            .filter(|s| s.is_active())
            .map(|s| s.state.clone())
            .collect();

        wait_all(pending, timeout).await
    }

    /// Send stop to active sessions and return their state receivers
    fn signal_stop(&self) -> Vec<watch::Receiver<SessionState>> {
        self.sessions()
            .iter()
            .filter(|s| s.is_active())
            .map(|s| {
                s.stop.send_replace(true);
                s.state.clone()
            })
            .collect()
    }

    fn sessions(&self) -> std::sync::MutexGuard<'_, Vec<SessionHandle>> {
        self.inner
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Wait for every receiver to report a terminal state
async fn wait_all(pending: Vec<watch::Receiver<SessionState>>, timeout: Option<Duration>) -> bool {
    if pending.is_empty() {
        return true;
    }

    let all_finished = async move {
        for mut state in pending {
            // A closed channel means the session task is gone
            let _ = state.wait_for(SessionState::is_finished).await;
        }
    };

    match timeout {
        Some(limit) => tokio::time::timeout(limit, all_finished).await.is_ok(),
        None => {
            all_finished.await;
            true
        }
    }
}

/// Publishes session state and guarantees a terminal state on exit
struct SessionGuard {
    id: Uuid,
    state: watch::Sender<SessionState>,
    finished: bool,
}

impl SessionGuard {
    fn publish(&self, state: SessionState) {
        self.state.send_replace(state);
    }

    fn finish(mut self, end: SessionEnd) {
        tracing::debug!(session = %self.id, end = ?end, "playback session finished");
        self.state.send_replace(SessionState::Finished(end));
        self.finished = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(session = %self.id, "playback session exited without finishing");
            self.state.send_replace(SessionState::Finished(SessionEnd::Failed(
                "session ended unexpectedly".to_string(),
            )));
        }
    }
}

async fn run_session(
    id: Uuid,
    text: String,
    synthesizer: Arc<dyn Synthesizer>,
    sink: Arc<dyn AudioSink>,
    options: PlaybackOptions,
    stop: watch::Receiver<bool>,
    state: watch::Sender<SessionState>,
) {
    let session = SessionGuard {
        id,
        state,
        finished: false,
    };

    let clip = match synthesizer.synthesize(&text, &options.synthesis).await {
        Ok(clip) => clip,
        Err(e) => {
            tracing::error!(session = %id, error = %e, "speech synthesis failed");
            session.finish(SessionEnd::Failed(e.to_string()));
            return;
        }
    };

    let chunks = clip.into_chunks(options.chunk_length);
    let total = chunks.len();
    tracing::debug!(session = %id, chunks = total, "speech synthesized");

    for (index, chunk) in chunks.into_iter().enumerate() {
        let stop_requested = *stop.borrow();
        if stop_requested {
            tracing::info!(session = %id, played = index, total, "playback interrupted");
            session.finish(SessionEnd::Interrupted {
                played: index,
                total,
            });
            return;
        }

        session.publish(SessionState::Playing {
            chunk: index,
            total,
        });

        let sink = Arc::clone(&sink);
        let played = tokio::task::spawn_blocking(move || sink.play(&chunk)).await;

        match played {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(session = %id, chunk = index, error = %e, "chunk playback failed");
                session.finish(SessionEnd::Failed(e.to_string()));
                return;
            }
            Err(e) => {
                tracing::error!(session = %id, chunk = index, error = %e, "playback worker failed");
                session.finish(SessionEnd::Failed(e.to_string()));
                return;
            }
        }
    }

    session.finish(SessionEnd::Completed);
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::voice::AudioClip;

    struct ToneSynth {
        samples: usize,
    }

    #[async_trait]
    impl Synthesizer for ToneSynth {
        async fn synthesize(&self, _text: &str, _options: &SynthesisOptions) -> Result<AudioClip> {
            Ok(AudioClip::new(vec![0.1; self.samples], 1000))
        }
    }

    struct FailingSynth;

    #[async_trait]
    impl Synthesizer for FailingSynth {
        async fn synthesize(&self, _text: &str, _options: &SynthesisOptions) -> Result<AudioClip> {
            Err(Error::Tts("voice unavailable".to_string()))
        }
    }

    #[derive(Default)]
    struct CountingSink {
        played: AtomicUsize,
    }

    impl AudioSink for CountingSink {
        fn play(&self, _clip: &AudioClip) -> Result<()> {
            self.played.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn options() -> PlaybackOptions {
        PlaybackOptions {
            chunk_length: Duration::from_millis(100),
            interrupt_timeout: Duration::from_secs(1),
            synthesis: SynthesisOptions::default(),
        }
    }

    #[tokio::test]
    async fn test_plays_every_chunk() {
        let sink = Arc::new(CountingSink::default());
        let controller = PlaybackController::new(
            Arc::new(ToneSynth { samples: 450 }),
            Arc::clone(&sink) as Arc<dyn AudioSink>,
            options(),
        );

        let id = controller.speak("hello").unwrap();
        assert!(controller.wait_until_finished(Some(Duration::from_secs(2))).await);

        assert_eq!(sink.played.load(Ordering::SeqCst), 5);
        assert_eq!(
            controller.session_state(id),
            Some(SessionState::Finished(SessionEnd::Completed))
        );
        assert!(!controller.is_speaking());
    }

    #[tokio::test]
    async fn test_synthesis_failure_clears_speaking() {
        let controller = PlaybackController::new(
            Arc::new(FailingSynth),
            Arc::new(CountingSink::default()),
            options(),
        );

        let id = controller.speak("hello").unwrap();
        assert!(controller.wait_until_finished(Some(Duration::from_secs(1))).await);
        assert!(matches!(
            controller.session_state(id),
            Some(SessionState::Finished(SessionEnd::Failed(_)))
        ));
        assert_eq!(controller.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_blank_text_rejected() {
        let controller = PlaybackController::new(
            Arc::new(ToneSynth { samples: 10 }),
            Arc::new(CountingSink::default()),
            options(),
        );
        assert!(matches!(controller.speak("   "), Err(Error::Playback(_))));
        assert!(!controller.is_speaking());
    }

    #[test]
    fn test_speak_outside_runtime_fails() {
        let controller = PlaybackController::new(
            Arc::new(ToneSynth { samples: 10 }),
            Arc::new(CountingSink::default()),
            options(),
        );
        assert!(controller.speak("hello").is_err());
        assert_eq!(controller.active_sessions(), 0);
    }

    #[tokio::test]
    async fn test_interrupt_idle_is_noop() {
        let controller = PlaybackController::new(
            Arc::new(ToneSynth { samples: 10 }),
            Arc::new(CountingSink::default()),
            options(),
        );
        assert_eq!(controller.interrupt().await, InterruptOutcome::Idle);
        assert_eq!(controller.request_stop(), 0);
    }

    #[test]
    fn test_guard_publishes_failure_on_drop() {
        let (tx, rx) = watch::channel(SessionState::Synthesizing);
        drop(SessionGuard {
            id: Uuid::new_v4(),
            state: tx,
            finished: false,
        });
        assert!(matches!(
            *rx.borrow(),
            SessionState::Finished(SessionEnd::Failed(_))
        ));
    }
}
