//! Vetline - real-time spoken pet-health triage with barge-in
//!
//! This library provides the pieces of a voice conversation loop:
//! - Voice processing (microphone endpointing, STT, TTS, chunked playback)
//! - A reasoning backend that returns a structured health assessment
//! - The conversation core that lets the user interrupt a reply mid-sentence
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  utterance   ┌──────────────┐  relay   ┌──────────────┐
//! │ Capture Loop │─────────────▶│  Interrupt   │─────────▶│  Dispatcher  │
//! │ listen + STT │              │ Coordinator  │          │  reasoning   │
//! └──────────────┘              └──────┬───────┘          └──────┬───────┘
//!                                      │ stop                    │ speak
//!                               ┌──────▼─────────────────────────▼───────┐
//!                               │ Playback Controller (session per reply) │
//!                               └─────────────────────────────────────────┘
//! ```

pub mod agent;
pub mod config;
pub mod context;
pub mod error;
pub mod reasoning;
pub mod voice;

pub use agent::{
    AgentSettings, Components, InterruptOutcome, PlaybackController, TurnReport, VoiceAgent,
};
pub use config::Config;
pub use context::ConversationHistory;
pub use error::{Error, Result};
pub use reasoning::{HealthAssessment, PerplexityReasoner, Reasoner, RiskLevel};
