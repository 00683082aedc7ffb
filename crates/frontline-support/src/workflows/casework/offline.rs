use serde::Serialize;
use std::fmt;

use super::domain::UrgencyTier;

const OFFLINE_URGENT_KEYWORDS: [&str; 4] = ["emergency", "urgent", "critical", "severe"];
const OFFLINE_MEDICAL_KEYWORDS: [&str; 3] = ["medical", "health", "doctor"];

/// Coarse service hint used by the degraded path. Deliberately narrower
/// than the full catalog taxonomy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OfflineServiceHint {
    Medical,
    General,
}

impl OfflineServiceHint {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::General => "general",
        }
    }
}

impl fmt::Display for OfflineServiceHint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Recommendation payload returned by the degraded path.
#[derive(Debug, Clone, Serialize)]
pub struct OfflineRecommendation {
    pub urgency: UrgencyTier,
    pub recommended_service: OfflineServiceHint,
    pub message: String,
    pub next_steps: String,
}

/// Standalone two-tier classifier for when the full pipeline is
/// unavailable. Pure function: no ports, no persistence, shares no state
/// with the workflow engine. The urgency scale is intentionally coarser
/// than full triage (high or medium only).
pub fn offline_recommendation(description: &str) -> OfflineRecommendation {
    let lowered = description.to_lowercase();

    let urgency = if OFFLINE_URGENT_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        UrgencyTier::High
    } else {
        UrgencyTier::Medium
    };

    let recommended_service = if OFFLINE_MEDICAL_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        OfflineServiceHint::Medical
    } else {
        OfflineServiceHint::General
    };

    OfflineRecommendation {
        urgency,
        recommended_service,
        message: "Processed in offline mode with simplified logic".to_string(),
        next_steps: "Please visit the nearest service center or call when connection is restored"
            .to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urgent_keywords_map_to_high() {
        for description in [
            "this is an emergency",
            "urgent housing issue",
            "critical medication shortage",
            "severe reaction",
        ] {
            let recommendation = offline_recommendation(description);
            assert_eq!(recommendation.urgency, UrgencyTier::High);
        }
    }

    #[test]
    fn everything_else_is_medium_never_low_or_critical() {
        let recommendation = offline_recommendation("routine paperwork question");
        assert_eq!(recommendation.urgency, UrgencyTier::Medium);
    }

    #[test]
    fn medical_keywords_select_the_medical_hint() {
        assert_eq!(
            offline_recommendation("need a doctor").recommended_service,
            OfflineServiceHint::Medical
        );
        assert_eq!(
            offline_recommendation("general question").recommended_service,
            OfflineServiceHint::General
        );
    }

    #[test]
    fn advisory_strings_are_fixed() {
        let recommendation = offline_recommendation("anything");
        assert_eq!(
            recommendation.message,
            "Processed in offline mode with simplified logic"
        );
        assert!(recommendation.next_steps.contains("nearest service center"));
    }
}
