use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::domain::{
    AppointmentDetails, CaseId, CaseRecord, CaseStatus, CitizenSnapshot, PipelineStage, ServiceId,
    ServiceKind, UrgencyTier,
};
use super::stages::StageError;

/// Mutable record threaded through the pipeline. One instance exists per
/// engine run, owned exclusively by the engine for the run's duration; the
/// durable record of what happened lives in the persisted rows, not here.
#[derive(Debug, Clone)]
pub struct CaseState {
    pub case_id: CaseId,
    pub citizen: CitizenSnapshot,
    pub description: String,
    pub urgency: Option<UrgencyTier>,
    pub assigned_service_id: Option<ServiceId>,
    pub appointment: Option<AppointmentDetails>,
    stage_outputs: BTreeMap<PipelineStage, StageOutput>,
    status: CaseStatus,
    error_condition: Option<StageError>,
    message_log: Vec<String>,
    pub offline_mode: bool,
}

impl CaseState {
    pub fn new(case: &CaseRecord, citizen: CitizenSnapshot, offline_mode: bool) -> Self {
        Self {
            case_id: case.id,
            citizen,
            description: case.description.clone(),
            urgency: case.urgency,
            assigned_service_id: None,
            appointment: None,
            stage_outputs: BTreeMap::new(),
            status: case.status,
            error_condition: None,
            message_log: Vec::new(),
            offline_mode,
        }
    }

    pub fn status(&self) -> CaseStatus {
        self.status
    }

    /// Move the status forward. Regressions are ignored so replayed or
    /// out-of-order writes can never walk a case backwards.
    pub fn advance_status(&mut self, next: CaseStatus) {
        if next.rank() > self.status.rank() {
            self.status = next;
        }
    }

    /// Record a terminal stage failure. Once set, the engine runs no
    /// further stages.
    pub fn fail(&mut self, error: StageError) {
        self.status = CaseStatus::Failed;
        self.error_condition = Some(error);
    }

    pub fn error_condition(&self) -> Option<&StageError> {
        self.error_condition.as_ref()
    }

    /// Append one stage's result payload. Keys are unique; the first write
    /// for a stage wins.
    pub fn record_output(&mut self, stage: PipelineStage, output: StageOutput) {
        self.stage_outputs.entry(stage).or_insert(output);
    }

    pub fn output(&self, stage: PipelineStage) -> Option<&StageOutput> {
        self.stage_outputs.get(&stage)
    }

    pub fn triage_output(&self) -> Option<&TriageOutput> {
        match self.stage_outputs.get(&PipelineStage::Triage) {
            Some(StageOutput::Triage(output)) => Some(output),
            _ => None,
        }
    }

    pub fn stage_outputs(&self) -> &BTreeMap<PipelineStage, StageOutput> {
        &self.stage_outputs
    }

    pub fn push_message(&mut self, message: String) {
        self.message_log.push(message);
    }

    pub fn messages(&self) -> &[String] {
        &self.message_log
    }

    pub(crate) fn into_parts(
        self,
    ) -> (
        BTreeMap<PipelineStage, StageOutput>,
        Option<AppointmentDetails>,
        Vec<String>,
        CaseStatus,
        Option<StageError>,
    ) {
        (
            self.stage_outputs,
            self.appointment,
            self.message_log,
            self.status,
            self.error_condition,
        )
    }
}

/// Result payload appended by a stage that ran.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageOutput {
    Triage(TriageOutput),
    Guidance(GuidanceOutput),
    Booking(AppointmentDetails),
    Followup(FollowupOutput),
    EquityTracking(EquityOutput),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageOutput {
    pub urgency: UrgencyTier,
    pub service_kind: ServiceKind,
    pub estimated_duration: u32,
    pub notes: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuidanceOutput {
    pub service_id: ServiceId,
    pub service_name: String,
    pub service_location: String,
    pub service_contact: String,
    pub department: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FollowupOutput {
    pub confirmation_message: String,
    pub confirmation_sent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityOutput {
    pub metrics_updated: bool,
    pub recorded_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::super::domain::{CitizenId, UrgencyTier};
    use super::*;
    use chrono::Utc;

    fn sample_state() -> CaseState {
        let case = CaseRecord {
            id: CaseId(1),
            citizen_id: CitizenId(1),
            title: "Checkup".to_string(),
            description: "I need a routine visit".to_string(),
            urgency: None,
            status: CaseStatus::Submitted,
            assigned_service_id: None,
            triage_notes: None,
            estimated_duration: None,
            created_at: Utc::now(),
        };
        let citizen = CitizenSnapshot {
            name: "John Doe".to_string(),
            email: "john.doe@example.com".to_string(),
            phone: None,
            address: None,
        };
        CaseState::new(&case, citizen, false)
    }

    #[test]
    fn status_never_regresses() {
        let mut state = sample_state();
        state.advance_status(CaseStatus::Scheduled);
        state.advance_status(CaseStatus::Triaged);
        assert_eq!(state.status(), CaseStatus::Scheduled);
    }

    #[test]
    fn fail_sets_failed_status_and_error() {
        let mut state = sample_state();
        state.advance_status(CaseStatus::Triaged);
        state.fail(StageError::NoServiceAvailable(ServiceKind::Medical));
        assert_eq!(state.status(), CaseStatus::Failed);
        assert!(state.error_condition().is_some());
    }

    #[test]
    fn stage_outputs_keep_first_write_per_stage() {
        let mut state = sample_state();
        state.record_output(
            PipelineStage::Triage,
            StageOutput::Triage(TriageOutput {
                urgency: UrgencyTier::Low,
                service_kind: ServiceKind::Administrative,
                estimated_duration: 15,
                notes: "first".to_string(),
            }),
        );
        state.record_output(
            PipelineStage::Triage,
            StageOutput::Triage(TriageOutput {
                urgency: UrgencyTier::Critical,
                service_kind: ServiceKind::Medical,
                estimated_duration: 60,
                notes: "second".to_string(),
            }),
        );

        let output = state.triage_output().expect("triage output recorded");
        assert_eq!(output.notes, "first");
        assert_eq!(state.stage_outputs().len(), 1);
    }
}
