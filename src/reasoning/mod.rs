//! Reasoning backend
//!
//! Turns the conversation so far plus the newest user turn into a structured
//! [`HealthAssessment`] and the reply text to speak.

mod assessment;
mod perplexity;
pub mod prompts;

use async_trait::async_trait;

pub use assessment::{HealthAssessment, RiskLevel, SymptomAnalysis};
pub use perplexity::PerplexityReasoner;

use crate::Result;

/// Produces an assessment and a spoken reply for one turn
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Analyze `user_input` in light of `context`
    ///
    /// `context` is the formatted conversation history, which already ends
    /// with the current user turn.
    ///
    /// Implementations should report failures as errors rather than panic.
    /// The dispatcher turns a panic into a fallback turn, but release builds
    /// abort on panic.
    ///
    /// # Errors
    ///
    /// Returns error if the backend call or response parsing fails
    async fn analyze_and_respond(
        &self,
        context: &str,
        user_input: &str,
    ) -> Result<(HealthAssessment, String)>;
}

/// Fallback pair substituted when the backend fails
#[must_use]
pub fn fallback_response() -> (HealthAssessment, String) {
    (
        HealthAssessment::fallback(),
        prompts::CLARIFICATION_REPLY.to_string(),
    )
}
