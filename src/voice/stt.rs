//! Speech-to-text (STT) processing

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::{CapturedAudio, Transcriber, samples_to_wav};
use crate::config::{ApiKeys, SttProvider, VoiceConfig, http_client};
use crate::{Error, Result};

/// Response from `OpenAI` Whisper transcription API
#[derive(serde::Deserialize)]
struct WhisperResponse {
    text: String,
}

/// Response from Deepgram transcription API
#[derive(serde::Deserialize)]
struct DeepgramResponse {
    results: DeepgramResults,
}

#[derive(serde::Deserialize)]
struct DeepgramResults {
    channels: Vec<DeepgramChannel>,
}

#[derive(serde::Deserialize)]
struct DeepgramChannel {
    alternatives: Vec<DeepgramAlternative>,
}

#[derive(serde::Deserialize)]
struct DeepgramAlternative {
    transcript: String,
}

/// Transcribes speech to text
pub struct SpeechToText {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    language: String,
    provider: SttProvider,
}

impl SpeechToText {
    /// Create a new STT instance using `OpenAI` Whisper
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new_whisper(
        api_key: Option<&SecretString>,
        model: String,
        language: String,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = require_key(api_key, "OpenAI API key required for Whisper")?;

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            model,
            language,
            provider: SttProvider::Whisper,
        })
    }

    /// Create a new STT instance using Deepgram
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new_deepgram(
        api_key: Option<&SecretString>,
        model: String,
        language: String,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = require_key(api_key, "Deepgram API key required")?;

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            model,
            language,
            provider: SttProvider::Deepgram,
        })
    }

    /// Create the backend selected in configuration
    ///
    /// # Errors
    ///
    /// Returns error if the selected provider's API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let model = voice.stt_model.clone();
        let language = voice.tts_language.clone();
        let timeout = voice.request_timeout;

        match voice.stt_provider {
            SttProvider::Whisper => {
                Self::new_whisper(keys.openai.as_ref(), model, language, timeout)
            }
            SttProvider::Deepgram => {
                Self::new_deepgram(keys.deepgram.as_ref(), model, language, timeout)
            }
        }
    }

    /// Transcribe WAV audio to text
    ///
    /// # Errors
    ///
    /// Returns error if transcription fails
    pub async fn transcribe_wav(&self, audio: &[u8]) -> Result<String> {
        let text = match self.provider {
            SttProvider::Whisper => self.transcribe_whisper(audio).await?,
            SttProvider::Deepgram => self.transcribe_deepgram(audio).await?,
        };

        let text = text.trim();
        if text.is_empty() {
            return Err(Error::Unintelligible);
        }
        Ok(text.to_string())
    }

    /// Transcribe using `OpenAI` Whisper
    async fn transcribe_whisper(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Whisper transcription");

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(audio.to_vec())
                    .file_name("audio.wav")
                    .mime_str("audio/wav")
                    .map_err(|e| Error::Stt(e.to_string()))?,
            )
            .text("model", self.model.clone())
            .text("language", self.language.clone());

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/transcriptions")
            .bearer_auth(self.api_key.expose_secret())
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, timed_out = e.is_timeout(), "Whisper request failed");
                Error::Stt(format!("Whisper request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Whisper API error");
            return Err(Error::Stt(format!("Whisper API error {status}: {body}")));
        }

        let result: WhisperResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse response");
            e
        })?;

        tracing::debug!(transcript = %result.text, "transcription complete");
        Ok(result.text)
    }

    /// Transcribe using Deepgram
    async fn transcribe_deepgram(&self, audio: &[u8]) -> Result<String> {
        tracing::debug!(audio_bytes = audio.len(), "starting Deepgram transcription");

        let url = format!(
            "https://api.deepgram.com/v1/listen?model={}&language={}&punctuate=true",
            self.model, self.language
        );

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Token {}", self.api_key.expose_secret()))
            .header("Content-Type", "audio/wav")
            .body(audio.to_vec())
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, timed_out = e.is_timeout(), "Deepgram request failed");
                Error::Stt(format!("Deepgram request failed: {e}"))
            })?;

        let status = response.status();
        tracing::debug!(status = %status, "received response");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, body = %body, "Deepgram API error");
            return Err(Error::Stt(format!("Deepgram API error {status}: {body}")));
        }

        let result: DeepgramResponse = response.json().await.map_err(|e| {
            tracing::error!(error = %e, "failed to parse Deepgram response");
            e
        })?;

        let transcript = result
            .results
            .channels
            .first()
            .and_then(|c| c.alternatives.first())
            .map(|a| a.transcript.clone())
            .unwrap_or_default();

        tracing::debug!(transcript = %transcript, "transcription complete");
        Ok(transcript)
    }
}

#[async_trait]
impl Transcriber for SpeechToText {
    async fn transcribe(&self, audio: &CapturedAudio) -> Result<String> {
        let wav = samples_to_wav(&audio.samples, audio.sample_rate)?;
        self.transcribe_wav(&wav).await
    }
}

/// Copy a configured key, rejecting a missing one
pub(super) fn require_key(key: Option<&SecretString>, message: &str) -> Result<SecretString> {
    key.map(|k| SecretString::from(k.expose_secret().to_owned()))
        .ok_or_else(|| Error::Config(message.to_string()))
}
