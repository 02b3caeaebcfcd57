//! Prompt text for the two-step triage chain

/// Spoken when the backend fails and the fallback assessment is used
pub const CLARIFICATION_REPLY: &str = "I want to make sure I understand correctly. \
     Could you tell me more about what's happening with your pet? \
     If symptoms seem serious, please contact a vet right away.";

const TRIAGE_SYSTEM: &str = "You are a veterinary triage assistant that analyzes pet symptoms.

Safety rules:
1. Never give a definitive diagnosis.
2. Always recommend a vet visit for serious symptoms.
3. Treat these as emergencies: difficulty breathing, seizures, severe bleeding, \
suspected poisoning, collapse or inability to stand, severe trauma, a bloated or \
distended abdomen, continuous vomiting or diarrhea with blood.
4. Include a disclaimer that this does not replace professional veterinary care.

Risk levels:
- EMERGENCY: life-threatening, the pet needs a vet immediately
- HIGH: serious, vet visit within 24 hours
- MODERATE: concerning, schedule a vet appointment
- LOW: minor, monitor and give home-care tips

Analyze the conversation and answer with a single JSON object only.";

const ASSESSMENT_FORMAT: &str = r#"The JSON object must have exactly these fields:
{
  "health_overview": string,
  "symptom_analysis": {
    "symptoms_identified": [string],
    "duration": string or null,
    "severity_indicators": [string],
    "pet_type": string or null,
    "age_mentioned": string or null
  },
  "risk_level": "LOW" | "MODERATE" | "HIGH" | "EMERGENCY",
  "recommendations": [string],
  "safety_flags": [string],
  "requires_vet": boolean
}"#;

const SPOKEN_SYSTEM: &str = "You are a caring veterinary assistant talking out loud to a \
worried pet owner. Turn the structured analysis below into a warm spoken reply.

Tone: empathetic, plain language, no jargon, no definitive diagnosis, never dismissive.

Length by risk level:
- EMERGENCY: 3-4 sentences, urgent but calm, send them to an emergency vet now
- HIGH: 3 sentences, express concern, vet within 24 hours
- MODERATE: 2-3 sentences, suggest a vet appointment
- LOW: 2 sentences, a home-care tip and reassurance

Always acknowledge the owner's concern, give the next step, and mention naturally \
that this is not a replacement for professional veterinary care. Reply with the \
spoken words only, no lists or markdown.";

/// System prompt for the structured analysis step
#[must_use]
pub fn triage_system_prompt() -> String {
    format!("{TRIAGE_SYSTEM}\n\n{ASSESSMENT_FORMAT}")
}

/// User prompt for the structured analysis step
#[must_use]
pub fn triage_user_prompt(conversation: &str, user_input: &str) -> String {
    let conversation = if conversation.is_empty() {
        "(no earlier messages)"
    } else {
        conversation
    };

    format!(
        "Conversation history:\n{conversation}\n\nLatest user input: {user_input}\n\n\
         Provide the structured health assessment."
    )
}

/// System prompt for the spoken reply step
#[must_use]
pub fn spoken_system_prompt(structured_json: &str, user_input: &str) -> String {
    format!(
        "{SPOKEN_SYSTEM}\n\nStructured analysis:\n{structured_json}\n\n\
         Owner's latest message: {user_input}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_triage_prompt_includes_schema() {
        let prompt = triage_system_prompt();
        assert!(prompt.contains("\"requires_vet\": boolean"));
        assert!(prompt.contains("EMERGENCY"));
    }

    #[test]
    fn test_user_prompt_marks_empty_history() {
        let prompt = triage_user_prompt("", "my cat sneezes");
        assert!(prompt.contains("(no earlier messages)"));
        assert!(prompt.contains("Latest user input: my cat sneezes"));

        let prompt = triage_user_prompt("User: hi", "my cat sneezes");
        assert!(prompt.contains("User: hi"));
    }

    #[test]
    fn test_spoken_prompt_embeds_analysis() {
        let prompt = spoken_system_prompt("{\"risk_level\":\"LOW\"}", "is it bad?");
        assert!(prompt.contains("{\"risk_level\":\"LOW\"}"));
        assert!(prompt.ends_with("Owner's latest message: is it bad?"));
    }
}
