//! Shared test utilities
//!
//! Hardware-free stand-ins for the speech, synthesis, playback and reasoning
//! backends.

#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::mpsc;

use vetline::agent::{PlaybackController, PlaybackOptions};
use vetline::reasoning::{HealthAssessment, Reasoner, RiskLevel, SymptomAnalysis};
use vetline::voice::{
    AudioClip, AudioSink, CapturedAudio, Listened, SpeechSource, SynthesisOptions, Synthesizer,
    Transcriber,
};
use vetline::{Error, Result};

/// Sample rate of fake clips; 100 ms chunks hold 100 samples
pub const CLIP_RATE: u32 = 1000;

/// Chunk length paired with [`CLIP_RATE`]
pub const CHUNK: Duration = Duration::from_millis(100);

/// Playback options for tests
#[must_use]
pub fn playback_options(interrupt_timeout: Duration) -> PlaybackOptions {
    PlaybackOptions {
        chunk_length: CHUNK,
        interrupt_timeout,
        synthesis: SynthesisOptions::default(),
    }
}

/// Poll `condition` until it holds or `limit` elapses
pub async fn wait_until(limit: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while !condition() {
        if start.elapsed() > limit {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    true
}

// --- Speech input ---

/// Speech source fed from a channel
pub struct ScriptedSource {
    rx: mpsc::UnboundedReceiver<Result<Listened>>,
}

#[async_trait]
impl SpeechSource for ScriptedSource {
    async fn listen(&mut self, timeout: Duration, _phrase_limit: Duration) -> Result<Listened> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(item)) => item,
            Ok(None) => {
                tokio::time::sleep(timeout).await;
                Ok(Listened::Silence)
            }
            Err(_) => Ok(Listened::Silence),
        }
    }
}

/// Transcriber that returns queued results in order
#[derive(Clone, Default)]
pub struct QueuedTranscriber {
    results: Arc<Mutex<VecDeque<Result<String>>>>,
}

#[async_trait]
impl Transcriber for QueuedTranscriber {
    async fn transcribe(&self, _audio: &CapturedAudio) -> Result<String> {
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(Error::Unintelligible))
    }
}

/// Drives a [`ScriptedSource`] and its [`QueuedTranscriber`] together
#[derive(Clone)]
pub struct Script {
    tx: mpsc::UnboundedSender<Result<Listened>>,
    transcriber: QueuedTranscriber,
}

impl Script {
    fn phrase(&self, result: Result<String>) {
        self.transcriber.results.lock().unwrap().push_back(result);
        let audio = CapturedAudio::new(vec![0.2; 160], 16_000);
        self.tx.send(Ok(Listened::Speech(audio))).unwrap();
    }

    /// The user says `text`
    pub fn say(&self, text: &str) {
        self.phrase(Ok(text.to_string()));
    }

    /// Speech that cannot be transcribed
    pub fn mumble(&self) {
        self.phrase(Err(Error::Unintelligible));
    }

    /// Speech whose transcription hits a service error
    pub fn service_down(&self) {
        self.phrase(Err(Error::Stt("503 Service Unavailable".to_string())));
    }

    /// The audio device itself fails
    pub fn device_error(&self) {
        self.tx
            .send(Err(Error::Audio("input stream lost".to_string())))
            .unwrap();
    }
}

/// Build a scripted source, its transcriber and the script handle
#[must_use]
pub fn scripted_speech() -> (ScriptedSource, QueuedTranscriber, Script) {
    let (tx, rx) = mpsc::unbounded_channel();
    let transcriber = QueuedTranscriber::default();
    let script = Script {
        tx,
        transcriber: transcriber.clone(),
    };
    (ScriptedSource { rx }, transcriber, script)
}

// --- Speech output ---

/// Synthesizer producing a clip of exactly `chunks` playback chunks
pub struct FixedSynth {
    chunks: usize,
    pub spoken: Mutex<Vec<String>>,
}

impl FixedSynth {
    #[must_use]
    pub fn new(chunks: usize) -> Self {
        Self {
            chunks,
            spoken: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl Synthesizer for FixedSynth {
    async fn synthesize(&self, text: &str, _options: &SynthesisOptions) -> Result<AudioClip> {
        self.spoken.lock().unwrap().push(text.to_string());
        Ok(AudioClip::new(vec![0.1; self.chunks * 100], CLIP_RATE))
    }
}

/// Sink that counts chunks, optionally slowly, optionally stopping itself
#[derive(Default)]
pub struct RecordingSink {
    delay: Duration,
    played: AtomicUsize,
    stop_after: Option<usize>,
    controller: OnceLock<PlaybackController>,
}

impl RecordingSink {
    /// Sink that takes `delay` per chunk
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Sink that requests a stop right after chunk `k` has played
    #[must_use]
    pub fn stopping_after(k: usize) -> Self {
        Self {
            stop_after: Some(k),
            ..Self::default()
        }
    }

    /// Controller to signal when `stop_after` is reached
    pub fn attach(&self, controller: &PlaybackController) {
        let _ = self.controller.set(controller.clone());
    }

    /// Chunks played so far
    #[must_use]
    pub fn played(&self) -> usize {
        self.played.load(Ordering::SeqCst)
    }
}

impl AudioSink for RecordingSink {
    fn play(&self, _clip: &AudioClip) -> Result<()> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        let played = self.played.fetch_add(1, Ordering::SeqCst) + 1;

        if self.stop_after == Some(played) {
            if let Some(controller) = self.controller.get() {
                controller.request_stop();
            }
        }
        Ok(())
    }
}

/// Controller over a [`FixedSynth`] and a shared [`RecordingSink`]
#[must_use]
pub fn controller_with(
    chunks: usize,
    sink: &Arc<RecordingSink>,
    interrupt_timeout: Duration,
) -> PlaybackController {
    let controller = PlaybackController::new(
        Arc::new(FixedSynth::new(chunks)),
        Arc::clone(sink) as Arc<dyn AudioSink>,
        playback_options(interrupt_timeout),
    );
    sink.attach(&controller);
    controller
}

// --- Reasoning ---

/// Assessment returned by [`ScriptedReasoner`] on success
#[must_use]
pub fn low_risk_assessment() -> HealthAssessment {
    HealthAssessment {
        health_overview: "Likely minor".to_string(),
        symptom_analysis: SymptomAnalysis {
            symptoms_identified: vec!["sneezing".to_string()],
            pet_type: Some("cat".to_string()),
            ..SymptomAnalysis::default()
        },
        risk_level: RiskLevel::Low,
        recommendations: vec!["Monitor for a few days".to_string()],
        safety_flags: Vec::new(),
        requires_vet: false,
    }
}

/// Reasoner that echoes input and fails or panics on chosen turns (1-based)
#[derive(Default)]
pub struct ScriptedReasoner {
    fail_on: HashSet<usize>,
    panic_on: HashSet<usize>,
    turns: AtomicUsize,
    pub contexts: Mutex<Vec<String>>,
}

impl ScriptedReasoner {
    #[must_use]
    pub fn failing_on(turns: &[usize]) -> Self {
        Self {
            fail_on: turns.iter().copied().collect(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn panicking_on(turns: &[usize]) -> Self {
        Self {
            panic_on: turns.iter().copied().collect(),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Reasoner for ScriptedReasoner {
    async fn analyze_and_respond(
        &self,
        context: &str,
        user_input: &str,
    ) -> Result<(HealthAssessment, String)> {
        let turn = self.turns.fetch_add(1, Ordering::SeqCst) + 1;
        self.contexts.lock().unwrap().push(context.to_string());

        assert!(!self.panic_on.contains(&turn), "reasoner blew up on turn {turn}");
        if self.fail_on.contains(&turn) {
            return Err(Error::Reasoning("upstream returned 500".to_string()));
        }
        Ok((low_risk_assessment(), format!("reply to {user_input}")))
    }
}
