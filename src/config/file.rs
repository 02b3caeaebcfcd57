//! TOML configuration file loading
//!
//! Supports `~/.config/vetline/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VetlineConfigFile {
    /// Reasoning backend configuration
    #[serde(default)]
    pub llm: LlmFileConfig,

    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Conversation loop configuration
    #[serde(default)]
    pub agent: AgentFileConfig,

    /// API keys for external services
    #[serde(default)]
    pub api_keys: ApiKeysFileConfig,
}

/// LLM-related configuration
#[derive(Debug, Default, Deserialize)]
pub struct LlmFileConfig {
    /// Model identifier (e.g. "sonar")
    pub model: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// API base URL
    pub base_url: Option<String>,

    /// Seconds before a completion request is abandoned
    pub request_timeout_secs: Option<f64>,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Seconds to wait for speech to start
    pub recognition_timeout_secs: Option<f64>,

    /// Max seconds for one continuous phrase
    pub phrase_time_limit_secs: Option<f64>,

    /// Seconds of room noise sampled for calibration
    pub ambient_noise_secs: Option<f64>,

    /// TTS language code (e.g. "en")
    pub tts_language: Option<String>,

    /// Speak at a reduced rate
    pub tts_slow: Option<bool>,

    /// Playback chunk length in milliseconds
    pub audio_chunk_ms: Option<u64>,

    /// Max seconds to wait for playback to stop on barge-in
    pub interrupt_timeout_secs: Option<f64>,

    /// STT provider ("whisper" or "deepgram")
    pub stt_provider: Option<String>,

    /// STT model (e.g. "whisper-1")
    pub stt_model: Option<String>,

    /// TTS provider ("openai" or "elevenlabs")
    pub tts_provider: Option<String>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "alloy")
    pub tts_voice: Option<String>,

    /// Seconds before an STT or TTS request is abandoned
    pub request_timeout_secs: Option<f64>,
}

/// Conversation loop configuration
#[derive(Debug, Default, Deserialize)]
pub struct AgentFileConfig {
    /// Number of user/assistant exchanges kept in history
    pub conversation_history_limit: Option<usize>,

    /// Seconds the dispatcher waits on the input queue per poll
    pub queue_timeout_secs: Option<f64>,

    /// Greeting spoken at startup
    pub greeting: Option<String>,
}

/// API keys configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiKeysFileConfig {
    pub perplexity: Option<String>,
    pub openai: Option<String>,
    pub elevenlabs: Option<String>,
    pub deepgram: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `VetlineConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VetlineConfigFile {
    config_file_path().map_or_else(VetlineConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults with a warning.
pub fn load_from(path: &Path) -> VetlineConfigFile {
    if !path.exists() {
        return VetlineConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VetlineConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VetlineConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/vetline/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("vetline").join("config.toml"))
}
