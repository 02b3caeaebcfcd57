//! Structured health assessment returned by the reasoning backend

use std::fmt;

use serde::{Deserialize, Serialize};

/// Triage urgency
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    /// Minor symptoms, monitor at home
    Low,
    /// Concerning, schedule a vet appointment
    Moderate,
    /// Serious, vet within 24 hours
    High,
    /// Life-threatening, emergency vet now
    Emergency,
}

impl RiskLevel {
    /// Upper-case wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Moderate => "MODERATE",
            Self::High => "HIGH",
            Self::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Symptom breakdown
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymptomAnalysis {
    #[serde(default)]
    pub symptoms_identified: Vec<String>,
    #[serde(default)]
    pub duration: Option<String>,
    #[serde(default)]
    pub severity_indicators: Vec<String>,
    #[serde(default)]
    pub pet_type: Option<String>,
    #[serde(default)]
    pub age_mentioned: Option<String>,
}

/// Overall assessment with safety guardrails
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthAssessment {
    pub health_overview: String,
    pub symptom_analysis: SymptomAnalysis,
    pub risk_level: RiskLevel,
    #[serde(default)]
    pub recommendations: Vec<String>,
    #[serde(default)]
    pub safety_flags: Vec<String>,
    pub requires_vet: bool,
}

impl HealthAssessment {
    /// Safe assessment used when the backend fails
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            health_overview: "Unable to fully analyze, please consult vet".to_string(),
            symptom_analysis: SymptomAnalysis {
                symptoms_identified: vec!["Unable to parse".to_string()],
                ..SymptomAnalysis::default()
            },
            risk_level: RiskLevel::Moderate,
            recommendations: vec!["Please consult with a veterinarian".to_string()],
            safety_flags: vec!["This is not professional veterinary advice".to_string()],
            requires_vet: true,
        }
    }

    /// Parse an assessment out of model output
    ///
    /// Tolerates markdown fences and prose around the JSON object.
    ///
    /// # Errors
    ///
    /// Returns error if no valid assessment object is present
    pub fn from_model_output(content: &str) -> crate::Result<Self> {
        let json = extract_json_object(content).ok_or_else(|| {
            crate::Error::Reasoning("model output contains no JSON object".to_string())
        })?;
        Ok(serde_json::from_str(json)?)
    }

    /// Symptoms joined for display
    #[must_use]
    pub fn symptoms_summary(&self) -> String {
        self.symptom_analysis.symptoms_identified.join(", ")
    }
}

/// Slice from the first `{` to the last `}`
fn extract_json_object(content: &str) -> Option<&str> {
    let start = content.find('{')?;
    let end = content.rfind('}')?;
    (end > start).then(|| &content[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "health_overview": "Mild stomach upset",
        "symptom_analysis": {
            "symptoms_identified": ["vomiting"],
            "duration": "one day",
            "pet_type": "dog"
        },
        "risk_level": "LOW",
        "recommendations": ["Offer small amounts of water"],
        "safety_flags": [],
        "requires_vet": false
    }"#;

    #[test]
    fn test_parse_plain_json() {
        let assessment = HealthAssessment::from_model_output(SAMPLE).unwrap();
        assert_eq!(assessment.risk_level, RiskLevel::Low);
        assert_eq!(assessment.symptom_analysis.pet_type.as_deref(), Some("dog"));
        assert!(assessment.symptom_analysis.severity_indicators.is_empty());
        assert!(!assessment.requires_vet);
    }

    #[test]
    fn test_parse_fenced_json() {
        let wrapped = format!("Here is the analysis:\n```json\n{SAMPLE}\n```\nStay safe.");
        let assessment = HealthAssessment::from_model_output(&wrapped).unwrap();
        assert_eq!(assessment.symptoms_summary(), "vomiting");
    }

    #[test]
    fn test_unknown_risk_level_rejected() {
        let bad = SAMPLE.replace("\"LOW\"", "\"SEVERE\"");
        assert!(HealthAssessment::from_model_output(&bad).is_err());
    }

    #[test]
    fn test_no_json_rejected() {
        let err = HealthAssessment::from_model_output("I cannot help with that").unwrap_err();
        assert!(matches!(err, crate::Error::Reasoning(_)));
    }

    #[test]
    fn test_fallback_requires_vet() {
        let fallback = HealthAssessment::fallback();
        assert_eq!(fallback.risk_level, RiskLevel::Moderate);
        assert!(fallback.requires_vet);
        assert_eq!(fallback.symptoms_summary(), "Unable to parse");
    }

    #[test]
    fn test_risk_level_serializes_upper_case() {
        assert_eq!(serde_json::to_string(&RiskLevel::Emergency).unwrap(), "\"EMERGENCY\"");
        assert_eq!(RiskLevel::High.to_string(), "HIGH");
    }
}
