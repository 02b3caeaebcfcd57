//! Text-to-speech (TTS) processing

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};

use super::stt::require_key;
use super::{AudioClip, SynthesisOptions, Synthesizer, decode_mp3};
use crate::config::{ApiKeys, TtsProvider, VoiceConfig, http_client};
use crate::{Error, Result};

/// `OpenAI` speaking rate used when slow speech is requested
const SLOW_SPEED: f32 = 0.75;

/// Synthesizes speech from text
pub struct TextToSpeech {
    client: reqwest::Client,
    api_key: SecretString,
    voice: String,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a new TTS instance using `OpenAI`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new_openai(
        api_key: Option<&SecretString>,
        voice: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = require_key(api_key, "OpenAI API key required for TTS")?;

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            voice,
            model,
            provider: TtsProvider::OpenAi,
        })
    }

    /// Create a new TTS instance using `ElevenLabs`
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new_elevenlabs(
        api_key: Option<&SecretString>,
        voice_id: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        let api_key = require_key(api_key, "ElevenLabs API key required for TTS")?;

        Ok(Self {
            client: http_client(timeout)?,
            api_key,
            voice: voice_id,
            model,
            provider: TtsProvider::ElevenLabs,
        })
    }

    /// Create the backend selected in configuration
    ///
    /// # Errors
    ///
    /// Returns error if the selected provider's API key is missing
    pub fn from_config(voice: &VoiceConfig, keys: &ApiKeys) -> Result<Self> {
        let model = voice.tts_model.clone();
        let voice_id = voice.tts_voice.clone();
        let timeout = voice.request_timeout;

        match voice.tts_provider {
            TtsProvider::OpenAi => Self::new_openai(keys.openai.as_ref(), voice_id, model, timeout),
            TtsProvider::ElevenLabs => {
                Self::new_elevenlabs(keys.elevenlabs.as_ref(), voice_id, model, timeout)
            }
        }
    }

    /// Synthesize text to MP3 bytes
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize_mp3(&self, text: &str, options: &SynthesisOptions) -> Result<Vec<u8>> {
        match self.provider {
            TtsProvider::OpenAi => self.synthesize_openai(text, options).await,
            TtsProvider::ElevenLabs => self.synthesize_elevenlabs(text, options).await,
        }
    }

    /// Synthesize using `OpenAI` TTS
    ///
    /// The model detects language from the text itself.
    async fn synthesize_openai(&self, text: &str, options: &SynthesisOptions) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct TtsRequest<'a> {
            model: &'a str,
            input: &'a str,
            voice: &'a str,
            response_format: &'a str,
            speed: f32,
        }

        let request = TtsRequest {
            model: &self.model,
            input: text,
            voice: &self.voice,
            response_format: "mp3",
            speed: if options.slow { SLOW_SPEED } else { 1.0 },
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/audio/speech")
            .bearer_auth(self.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await.map_err(|e| request_error(&e))?;
        Ok(audio.to_vec())
    }

    /// Synthesize using `ElevenLabs` TTS
    async fn synthesize_elevenlabs(&self, text: &str, options: &SynthesisOptions) -> Result<Vec<u8>> {
        #[derive(serde::Serialize)]
        struct VoiceSettings {
            speed: f32,
        }

        #[derive(serde::Serialize)]
        struct ElevenLabsRequest<'a> {
            text: &'a str,
            model_id: &'a str,
            language_code: &'a str,
            voice_settings: VoiceSettings,
        }

        let url = format!(
            "https://api.elevenlabs.io/v1/text-to-speech/{}",
            self.voice
        );

        let request = ElevenLabsRequest {
            text,
            model_id: &self.model,
            language_code: &options.language,
            voice_settings: VoiceSettings {
                speed: if options.slow { 0.8 } else { 1.0 },
            },
        };

        let response = self
            .client
            .post(&url)
            .header("xi-api-key", self.api_key.expose_secret())
            .header("Accept", "audio/mpeg")
            .json(&request)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("ElevenLabs TTS error {status}: {body}")));
        }

        let audio = response.bytes().await.map_err(|e| request_error(&e))?;
        Ok(audio.to_vec())
    }
}

fn request_error(e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Tts(format!("request timed out: {e}"))
    } else {
        Error::Tts(format!("request failed: {e}"))
    }
}

#[async_trait]
impl Synthesizer for TextToSpeech {
    async fn synthesize(&self, text: &str, options: &SynthesisOptions) -> Result<AudioClip> {
        tracing::debug!(chars = text.len(), language = %options.language, "synthesizing speech");

        let mp3 = self.synthesize_mp3(text, options).await?;
        let clip = decode_mp3(&mp3)?;

        if clip.is_empty() {
            return Err(Error::Tts("synthesized audio is empty".to_string()));
        }
        Ok(clip)
    }
}
