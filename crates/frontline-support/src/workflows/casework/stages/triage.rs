use super::StageError;
use crate::workflows::casework::domain::{
    CaseProgress, CaseStatus, PipelineStage, ServiceKind, UpdateKind, UrgencyTier,
};
use crate::workflows::casework::ports::CaseStore;
use crate::workflows::casework::state::{CaseState, StageOutput, TriageOutput};

// Keyword rules are evaluated in fixed priority order, first match wins.
// The precedence is deliberately preserved from the original rule set even
// where it can surprise (a description containing both "emergency" and
// "check-up" is always critical).
const CRITICAL_KEYWORDS: [&str; 5] = [
    "emergency",
    "urgent",
    "critical",
    "severe",
    "life-threatening",
];
const HIGH_KEYWORDS: [&str; 4] = ["pain", "injury", "bleeding", "fever"];
const MEDIUM_KEYWORDS: [&str; 3] = ["appointment", "consultation", "check-up"];

const MEDICAL_KEYWORDS: [&str; 6] = ["medical", "doctor", "hospital", "health", "pain", "injury"];
const EMERGENCY_KEYWORDS: [&str; 4] = ["emergency", "police", "fire", "ambulance"];
const SOCIAL_KEYWORDS: [&str; 4] = ["social", "welfare", "benefits", "housing"];

fn contains_any(description: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| description.contains(keyword))
}

pub(crate) fn classify_urgency(description: &str) -> UrgencyTier {
    let lowered = description.to_lowercase();
    if contains_any(&lowered, &CRITICAL_KEYWORDS) {
        UrgencyTier::Critical
    } else if contains_any(&lowered, &HIGH_KEYWORDS) {
        UrgencyTier::High
    } else if contains_any(&lowered, &MEDIUM_KEYWORDS) {
        UrgencyTier::Medium
    } else {
        UrgencyTier::Low
    }
}

pub(crate) fn classify_service_kind(description: &str) -> ServiceKind {
    let lowered = description.to_lowercase();
    if contains_any(&lowered, &MEDICAL_KEYWORDS) {
        ServiceKind::Medical
    } else if contains_any(&lowered, &EMERGENCY_KEYWORDS) {
        ServiceKind::Emergency
    } else if contains_any(&lowered, &SOCIAL_KEYWORDS) {
        ServiceKind::Social
    } else {
        ServiceKind::Administrative
    }
}

/// Classifies urgency and service type from the case description and
/// persists the triage result.
pub(crate) struct TriageStage;

impl TriageStage {
    pub(crate) async fn run<S: CaseStore + ?Sized>(
        state: &mut CaseState,
        store: &S,
    ) -> Result<(), StageError> {
        let urgency = classify_urgency(&state.description);
        let service_kind = classify_service_kind(&state.description);
        let estimated_duration = urgency.estimated_duration_minutes();
        let notes = format!(
            "Automated triage: {urgency} priority, {service_kind} service needed"
        );

        store
            .save_case_progress(
                state.case_id,
                CaseProgress {
                    urgency: Some(urgency),
                    status: Some(CaseStatus::Triaged),
                    triage_notes: Some(notes.clone()),
                    estimated_duration: Some(estimated_duration),
                    ..CaseProgress::default()
                },
            )
            .await?;
        store
            .append_update(
                state.case_id,
                format!("Case triaged as {urgency} priority requiring {service_kind} service"),
                UpdateKind::Triage,
                PipelineStage::Triage,
            )
            .await?;

        state.urgency = Some(urgency);
        state.advance_status(CaseStatus::Triaged);
        state.record_output(
            PipelineStage::Triage,
            StageOutput::Triage(TriageOutput {
                urgency,
                service_kind,
                estimated_duration,
                notes,
            }),
        );
        state.push_message(format!(
            "Triage completed: {urgency} priority case requiring {service_kind} service"
        ));

        Ok(())
    }
}
