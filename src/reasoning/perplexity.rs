//! Perplexity chat-completions client

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use super::{HealthAssessment, Reasoner, prompts};
use crate::config::{LlmConfig, http_client};
use crate::{Error, Result};

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Two-step reasoner backed by the Perplexity API
///
/// The first call asks for a JSON assessment, the second turns that
/// assessment into a spoken reply.
pub struct PerplexityReasoner {
    client: reqwest::Client,
    api_key: SecretString,
    model: String,
    temperature: f32,
    base_url: String,
}

impl PerplexityReasoner {
    /// Create a reasoner from LLM settings
    ///
    /// # Errors
    ///
    /// Returns error if no API key is configured or the HTTP client cannot
    /// be built
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_ref()
            .map(|k| SecretString::from(k.expose_secret().to_owned()))
            .ok_or_else(|| {
                Error::Config("PERPLEXITY_API_KEY not found in environment variables".to_string())
            })?;

        Ok(Self {
            client: http_client(config.request_timeout)?,
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Model in use
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| request_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Reasoning(format!("Perplexity API error {status}: {body}")));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    request_error(&e)
                } else {
                    Error::Reasoning(format!("invalid completion response: {e}"))
                }
            })?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| Error::Reasoning("completion returned no choices".to_string()))
    }
}

fn request_error(e: &reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Reasoning(format!("completion request timed out: {e}"))
    } else {
        Error::Reasoning(format!("completion request failed: {e}"))
    }
}

#[async_trait]
impl Reasoner for PerplexityReasoner {
    async fn analyze_and_respond(
        &self,
        context: &str,
        user_input: &str,
    ) -> Result<(HealthAssessment, String)> {
        tracing::debug!(model = %self.model, "requesting structured assessment");
        let raw = self
            .complete(
                &prompts::triage_system_prompt(),
                &prompts::triage_user_prompt(context, user_input),
            )
            .await?;
        let assessment = HealthAssessment::from_model_output(&raw)?;

        let structured = serde_json::to_string_pretty(&assessment)?;
        tracing::debug!(risk = %assessment.risk_level, "requesting spoken reply");
        let reply = self
            .complete(&prompts::spoken_system_prompt(&structured, user_input), user_input)
            .await?;

        let reply = reply.trim();
        if reply.is_empty() {
            return Err(Error::Reasoning("empty spoken reply".to_string()));
        }

        Ok((assessment, reply.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn llm_config(api_key: Option<&str>) -> LlmConfig {
        LlmConfig {
            api_key: api_key.map(|k| SecretString::from(k.to_string())),
            model: "sonar".to_string(),
            temperature: 0.3,
            base_url: "https://api.perplexity.ai/".to_string(),
            request_timeout: std::time::Duration::from_secs(30),
        }
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = PerplexityReasoner::new(&llm_config(None)).err();
        assert!(matches!(err, Some(Error::Config(_))));
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let reasoner = PerplexityReasoner::new(&llm_config(Some("pplx-test"))).unwrap();
        assert_eq!(reasoner.base_url, "https://api.perplexity.ai");
        assert_eq!(reasoner.model(), "sonar");
    }

    #[test]
    fn test_request_serialization() {
        let body = ChatRequest {
            model: "sonar",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            temperature: 0.3,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["model"], "sonar");
    }
}
