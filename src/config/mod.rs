//! Configuration management for the voice agent
//!
//! Values resolve as env > TOML file > default.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::{Error, Result};

use file::VetlineConfigFile;

/// Default Perplexity model
const DEFAULT_MODEL: &str = "sonar";

/// Default Perplexity API base URL
const DEFAULT_BASE_URL: &str = "https://api.perplexity.ai";

/// Default bound on one request to a remote backend
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Spoken once when the agent starts
pub const DEFAULT_GREETING: &str = "Hello! I'm here to help you understand your pet's symptoms. \
     Please tell me what's concerning you about your pet today.";

/// Voice agent configuration
#[derive(Debug)]
pub struct Config {
    /// Reasoning backend configuration
    pub llm: LlmConfig,

    /// Voice processing configuration
    pub voice: VoiceConfig,

    /// Conversation loop configuration
    pub agent: AgentConfig,

    /// Speech service API keys
    pub api_keys: ApiKeys,
}

/// Reasoning backend configuration
#[derive(Debug)]
pub struct LlmConfig {
    /// Perplexity API key (`PERPLEXITY_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Model identifier
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// API base URL
    pub base_url: String,

    /// Bound on each completion request
    pub request_timeout: Duration,
}

/// Speech-to-text backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SttProvider {
    /// `OpenAI` Whisper
    Whisper,
    /// Deepgram
    Deepgram,
}

impl SttProvider {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "whisper" | "openai" => Ok(Self::Whisper),
            "deepgram" => Ok(Self::Deepgram),
            other => Err(Error::Config(format!("unknown STT provider: {other}"))),
        }
    }
}

/// Text-to-speech backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TtsProvider {
    /// `OpenAI` speech
    OpenAi,
    /// `ElevenLabs`
    ElevenLabs,
}

impl TtsProvider {
    fn parse(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "elevenlabs" => Ok(Self::ElevenLabs),
            other => Err(Error::Config(format!("unknown TTS provider: {other}"))),
        }
    }
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// How long to wait for speech to start
    pub recognition_timeout: Duration,

    /// Max length of one continuous phrase
    pub phrase_time_limit: Duration,

    /// Room noise sampled for threshold calibration
    pub ambient_noise_duration: Duration,

    /// TTS language code
    pub tts_language: String,

    /// Speak at a reduced rate
    pub tts_slow: bool,

    /// Playback chunk length; interrupts land on chunk boundaries
    pub audio_chunk_length: Duration,

    /// Max wait for playback to stop on barge-in
    pub interrupt_timeout: Duration,

    /// STT backend
    pub stt_provider: SttProvider,

    /// STT model (e.g. "whisper-1", "nova-2")
    pub stt_model: String,

    /// TTS backend
    pub tts_provider: TtsProvider,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Bound on each STT or TTS request
    pub request_timeout: Duration,
}

impl Default for VoiceConfig {
    fn default() -> Self {
        Self {
            recognition_timeout: Duration::from_secs(1),
            phrase_time_limit: Duration::from_secs(15),
            ambient_noise_duration: Duration::from_secs(2),
            tts_language: "en".to_string(),
            tts_slow: false,
            audio_chunk_length: Duration::from_millis(500),
            interrupt_timeout: Duration::from_secs(1),
            stt_provider: SttProvider::Whisper,
            stt_model: "whisper-1".to_string(),
            tts_provider: TtsProvider::OpenAi,
            tts_model: "tts-1".to_string(),
            tts_voice: "alloy".to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// Conversation loop configuration
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Number of user/assistant exchanges kept in history
    pub conversation_history_limit: usize,

    /// Dispatcher's bounded wait on the input queue
    pub queue_timeout: Duration,

    /// Greeting spoken at startup
    pub greeting: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            conversation_history_limit: 10,
            queue_timeout: Duration::from_millis(500),
            greeting: DEFAULT_GREETING.to_string(),
        }
    }
}

/// API keys for speech services
#[derive(Debug, Default)]
pub struct ApiKeys {
    /// `OpenAI` API key (Whisper and TTS)
    pub openai: Option<SecretString>,

    /// `ElevenLabs` API key
    pub elevenlabs: Option<SecretString>,

    /// Deepgram API key
    pub deepgram: Option<SecretString>,
}

impl Config {
    /// Load configuration from `.env`, the config file and the environment
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn load() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "loaded .env");
        }

        let fc = file::load_config_file();
        Self::resolve(fc, |name| std::env::var(name).ok())
    }

    /// Resolve configuration from a file overlay and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a value is present but invalid
    pub fn resolve<F>(fc: VetlineConfigFile, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let secret = |name: &str, fallback: Option<String>| {
            env(name)
                .or(fallback)
                .filter(|k| !k.trim().is_empty())
                .map(SecretString::from)
        };

        let llm = LlmConfig {
            api_key: secret("PERPLEXITY_API_KEY", fc.api_keys.perplexity),
            model: env("PERPLEXITY_MODEL")
                .or(fc.llm.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            temperature: parse_env(&env, "LLM_TEMPERATURE")?
                .or(fc.llm.temperature)
                .unwrap_or(0.3),
            base_url: env("PERPLEXITY_BASE_URL")
                .or(fc.llm.base_url)
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            request_timeout: seconds(
                parse_env(&env, "PERPLEXITY_TIMEOUT")?.or(fc.llm.request_timeout_secs),
            )?
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT),
        };

        let api_keys = ApiKeys {
            openai: secret("OPENAI_API_KEY", fc.api_keys.openai),
            elevenlabs: secret("ELEVENLABS_API_KEY", fc.api_keys.elevenlabs),
            deepgram: secret("DEEPGRAM_API_KEY", fc.api_keys.deepgram),
        };

        // Voice config (env > toml > default)
        let defaults = VoiceConfig::default();
        let fv = fc.voice;
        let voice = VoiceConfig {
            recognition_timeout: seconds(
                parse_env(&env, "VETLINE_RECOGNITION_TIMEOUT")?.or(fv.recognition_timeout_secs),
            )?
            .unwrap_or(defaults.recognition_timeout),
            phrase_time_limit: seconds(
                parse_env(&env, "VETLINE_PHRASE_TIME_LIMIT")?.or(fv.phrase_time_limit_secs),
            )?
            .unwrap_or(defaults.phrase_time_limit),
            ambient_noise_duration: seconds(
                parse_env(&env, "VETLINE_AMBIENT_NOISE_DURATION")?.or(fv.ambient_noise_secs),
            )?
            .unwrap_or(defaults.ambient_noise_duration),
            tts_language: env("VETLINE_TTS_LANGUAGE")
                .or(fv.tts_language)
                .unwrap_or(defaults.tts_language),
            tts_slow: env("VETLINE_TTS_SLOW")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .or(fv.tts_slow)
                .unwrap_or(defaults.tts_slow),
            audio_chunk_length: parse_env::<u64, _>(&env, "VETLINE_AUDIO_CHUNK_MS")?
                .or(fv.audio_chunk_ms)
                .map_or(defaults.audio_chunk_length, Duration::from_millis),
            interrupt_timeout: seconds(
                parse_env(&env, "VETLINE_INTERRUPT_TIMEOUT")?.or(fv.interrupt_timeout_secs),
            )?
            .unwrap_or(defaults.interrupt_timeout),
            stt_provider: env("VETLINE_STT_PROVIDER")
                .or(fv.stt_provider)
                .map(|p| SttProvider::parse(&p))
                .transpose()?
                .unwrap_or(defaults.stt_provider),
            stt_model: env("VETLINE_STT_MODEL")
                .or(fv.stt_model)
                .unwrap_or(defaults.stt_model),
            tts_provider: env("VETLINE_TTS_PROVIDER")
                .or(fv.tts_provider)
                .map(|p| TtsProvider::parse(&p))
                .transpose()?
                .unwrap_or(defaults.tts_provider),
            tts_model: env("VETLINE_TTS_MODEL")
                .or(fv.tts_model)
                .unwrap_or(defaults.tts_model),
            tts_voice: env("VETLINE_TTS_VOICE")
                .or(fv.tts_voice)
                .unwrap_or(defaults.tts_voice),
            request_timeout: seconds(
                parse_env(&env, "VETLINE_REQUEST_TIMEOUT")?.or(fv.request_timeout_secs),
            )?
            .unwrap_or(defaults.request_timeout),
        };

        let agent_defaults = AgentConfig::default();
        let agent = AgentConfig {
            conversation_history_limit: parse_env(&env, "VETLINE_HISTORY_LIMIT")?
                .or(fc.agent.conversation_history_limit)
                .unwrap_or(agent_defaults.conversation_history_limit),
            queue_timeout: seconds(
                parse_env(&env, "VETLINE_QUEUE_TIMEOUT")?.or(fc.agent.queue_timeout_secs),
            )?
            .unwrap_or(agent_defaults.queue_timeout),
            greeting: env("VETLINE_GREETING")
                .or(fc.agent.greeting)
                .unwrap_or(agent_defaults.greeting),
        };

        let config = Self {
            llm,
            voice,
            agent,
            api_keys,
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that every duration and limit is usable
    ///
    /// # Errors
    ///
    /// Returns error naming the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.voice.audio_chunk_length.is_zero() {
            return Err(Error::Config("audio chunk length must be positive".to_string()));
        }
        if self.voice.phrase_time_limit.is_zero() {
            return Err(Error::Config("phrase time limit must be positive".to_string()));
        }
        if self.agent.conversation_history_limit == 0 {
            return Err(Error::Config(
                "conversation history limit must be at least 1".to_string(),
            ));
        }
        if self.llm.request_timeout.is_zero() || self.voice.request_timeout.is_zero() {
            return Err(Error::Config("request timeout must be positive".to_string()));
        }
        if self.agent.queue_timeout.is_zero() {
            return Err(Error::Config("queue timeout must be positive".to_string()));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(Error::Config(format!(
                "temperature {} outside 0.0..=2.0",
                self.llm.temperature
            )));
        }
        Ok(())
    }
}

/// HTTP client whose requests fail after `timeout`
///
/// # Errors
///
/// Returns error if the client cannot be built
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))
}

/// Parse an optional env value, rejecting values that are present but malformed
fn parse_env<T, F>(env: &F, name: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    F: Fn(&str) -> Option<String>,
{
    env(name)
        .map(|raw| {
            raw.trim()
                .parse()
                .map_err(|_| Error::Config(format!("invalid value for {name}: {raw}")))
        })
        .transpose()
}

/// Convert optional fractional seconds into a duration
fn seconds(value: Option<f64>) -> Result<Option<Duration>> {
    value
        .map(|s| {
            Duration::try_from_secs_f64(s)
                .map_err(|_| Error::Config(format!("invalid duration: {s}s")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(VetlineConfigFile::default(), env_from(&[])).unwrap();

        assert!(config.llm.api_key.is_none());
        assert_eq!(config.llm.model, "sonar");
        assert_eq!(config.voice.recognition_timeout, Duration::from_secs(1));
        assert_eq!(config.voice.phrase_time_limit, Duration::from_secs(15));
        assert_eq!(config.voice.audio_chunk_length, Duration::from_millis(500));
        assert_eq!(config.voice.interrupt_timeout, Duration::from_secs(1));
        assert_eq!(config.agent.conversation_history_limit, 10);
        assert_eq!(config.agent.queue_timeout, Duration::from_millis(500));
        assert_eq!(config.voice.stt_provider, SttProvider::Whisper);
        assert_eq!(config.voice.tts_provider, TtsProvider::OpenAi);
        assert_eq!(config.llm.request_timeout, Duration::from_secs(30));
        assert_eq!(config.voice.request_timeout, Duration::from_secs(30));
    }

    #[test]
    fn test_request_timeouts_configurable() {
        let mut fc = VetlineConfigFile::default();
        fc.llm.request_timeout_secs = Some(12.0);

        let config = Config::resolve(fc, env_from(&[("VETLINE_REQUEST_TIMEOUT", "7.5")])).unwrap();
        assert_eq!(config.llm.request_timeout, Duration::from_secs(12));
        assert_eq!(config.voice.request_timeout, Duration::from_millis(7500));

        let zero = Config::resolve(
            VetlineConfigFile::default(),
            env_from(&[("PERPLEXITY_TIMEOUT", "0")]),
        );
        assert!(matches!(zero, Err(Error::Config(_))));
    }

    #[test]
    fn test_env_overrides_file() {
        let mut fc = VetlineConfigFile::default();
        fc.llm.model = Some("from-file".to_string());
        fc.voice.audio_chunk_ms = Some(200);
        fc.api_keys.perplexity = Some("file-key".to_string());

        let config = Config::resolve(
            fc,
            env_from(&[
                ("PERPLEXITY_MODEL", "from-env"),
                ("PERPLEXITY_API_KEY", "env-key"),
                ("VETLINE_TTS_PROVIDER", "elevenlabs"),
            ]),
        )
        .unwrap();

        assert_eq!(config.llm.model, "from-env");
        assert_eq!(
            config.llm.api_key.as_ref().map(|k| k.expose_secret()),
            Some("env-key")
        );
        assert_eq!(config.voice.audio_chunk_length, Duration::from_millis(200));
        assert_eq!(config.voice.tts_provider, TtsProvider::ElevenLabs);
    }

    #[test]
    fn test_blank_key_is_missing() {
        let config =
            Config::resolve(VetlineConfigFile::default(), env_from(&[("PERPLEXITY_API_KEY", "  ")]))
                .unwrap();
        assert!(config.llm.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        let bad_number = Config::resolve(
            VetlineConfigFile::default(),
            env_from(&[("VETLINE_AUDIO_CHUNK_MS", "fast")]),
        );
        assert!(matches!(bad_number, Err(Error::Config(_))));

        let zero_chunk = Config::resolve(
            VetlineConfigFile::default(),
            env_from(&[("VETLINE_AUDIO_CHUNK_MS", "0")]),
        );
        assert!(matches!(zero_chunk, Err(Error::Config(_))));

        let zero_history = Config::resolve(
            VetlineConfigFile::default(),
            env_from(&[("VETLINE_HISTORY_LIMIT", "0")]),
        );
        assert!(matches!(zero_history, Err(Error::Config(_))));

        let unknown_provider = Config::resolve(
            VetlineConfigFile::default(),
            env_from(&[("VETLINE_STT_PROVIDER", "carrier-pigeon")]),
        );
        assert!(matches!(unknown_provider, Err(Error::Config(_))));
    }
}
