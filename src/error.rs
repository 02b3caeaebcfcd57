//! Error types for the vetline voice agent

use thiserror::Error;

/// Result type alias for vetline operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in the voice agent
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio device error
    #[error("audio error: {0}")]
    Audio(String),

    /// Speech-to-text backend error
    #[error("STT error: {0}")]
    Stt(String),

    /// Speech was captured but could not be transcribed
    #[error("speech could not be understood")]
    Unintelligible,

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Reasoning backend error
    #[error("reasoning error: {0}")]
    Reasoning(String),

    /// Playback session error
    #[error("playback error: {0}")]
    Playback(String),

    /// Channel closed or unusable
    #[error("channel error: {0}")]
    Channel(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl Error {
    /// Whether this error came from talking to a remote speech service
    #[must_use]
    pub const fn is_transport(&self) -> bool {
        matches!(self, Self::Stt(_) | Self::Http(_))
    }
}
