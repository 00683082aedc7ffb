use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaseId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CitizenId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServiceId(pub u64);

impl fmt::Display for CaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for CitizenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ServiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordinal urgency classification driving duration estimates and scheduling
/// offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyTier {
    Low,
    Medium,
    High,
    Critical,
}

impl UrgencyTier {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Estimated appointment duration in minutes, a direct lookup on the tier.
    pub const fn estimated_duration_minutes(self) -> u32 {
        match self {
            Self::Critical => 60,
            Self::High => 45,
            Self::Medium => 30,
            Self::Low => 15,
        }
    }

    /// Scheduling offset from "now" used by the booking stage.
    pub fn booking_offset(self) -> Duration {
        match self {
            Self::Critical => Duration::hours(1),
            Self::High => Duration::hours(4),
            Self::Medium => Duration::days(1),
            Self::Low => Duration::days(3),
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for UrgencyTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Lifecycle of a case. Advances monotonically in pipeline order, or jumps
/// to `Failed` when a stage halts the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaseStatus {
    Submitted,
    Triaged,
    Assigned,
    Scheduled,
    Completed,
    Failed,
}

impl CaseStatus {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Submitted => "submitted",
            Self::Triaged => "triaged",
            Self::Assigned => "assigned",
            Self::Scheduled => "scheduled",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub(crate) const fn rank(self) -> u8 {
        match self {
            Self::Submitted => 0,
            Self::Triaged => 1,
            Self::Assigned => 2,
            Self::Scheduled => 3,
            Self::Completed => 4,
            Self::Failed => 5,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "submitted" => Some(Self::Submitted),
            "triaged" => Some(Self::Triaged),
            "assigned" => Some(Self::Assigned),
            "scheduled" => Some(Self::Scheduled),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for CaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category of external provider a case may be routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceKind {
    Medical,
    Emergency,
    Social,
    Administrative,
}

impl ServiceKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Medical => "medical",
            Self::Emergency => "emergency",
            Self::Social => "social",
            Self::Administrative => "administrative",
        }
    }
}

impl fmt::Display for ServiceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One ordered step in the fixed processing pipeline. Variant order is
/// execution order, which the derived `Ord` relies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Triage,
    Guidance,
    Booking,
    Followup,
    EquityTracking,
}

impl PipelineStage {
    pub const fn ordered() -> [Self; 5] {
        [
            Self::Triage,
            Self::Guidance,
            Self::Booking,
            Self::Followup,
            Self::EquityTracking,
        ]
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Triage => "triage",
            Self::Guidance => "guidance",
            Self::Booking => "booking",
            Self::Followup => "followup",
            Self::EquityTracking => "equity_tracking",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Category recorded with each case update row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateKind {
    Triage,
    Assignment,
    Booking,
    Confirmation,
    Failure,
}

/// Citizen row as the persistence layer stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenRecord {
    pub id: CitizenId,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub emergency_contact: Option<String>,
}

/// Read-only copy of citizen contact fields, captured once at pipeline start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CitizenSnapshot {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

impl CitizenSnapshot {
    pub fn from_record(record: &CitizenRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            phone: record.phone.clone(),
            address: record.address.clone(),
        }
    }
}

/// External provider entity. Read-only to the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: ServiceId,
    pub name: String,
    pub kind: ServiceKind,
    pub department: String,
    pub location: String,
    pub contact_info: String,
    pub capacity_per_hour: u32,
    pub is_emergency: bool,
}

/// Case row as the persistence layer stores it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseRecord {
    pub id: CaseId,
    pub citizen_id: CitizenId,
    pub title: String,
    pub description: String,
    pub urgency: Option<UrgencyTier>,
    pub status: CaseStatus,
    pub assigned_service_id: Option<ServiceId>,
    pub triage_notes: Option<String>,
    pub estimated_duration: Option<u32>,
    pub created_at: DateTime<Utc>,
}

/// Partial case update handed to the persistence port; `None` fields are
/// left untouched.
#[derive(Debug, Clone, Default)]
pub struct CaseProgress {
    pub urgency: Option<UrgencyTier>,
    pub status: Option<CaseStatus>,
    pub assigned_service_id: Option<ServiceId>,
    pub triage_notes: Option<String>,
    pub estimated_duration: Option<u32>,
}

/// Appointment row created by the booking stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRecord {
    pub case_id: CaseId,
    pub service_id: ServiceId,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub notes: String,
    pub confirmation_sent: bool,
}

/// Appointment summary carried in `CaseState` and outcome events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentDetails {
    pub service_name: String,
    pub location: String,
    pub scheduled_time: DateTime<Utc>,
    pub duration_minutes: u32,
    pub contact: String,
}

/// Human-readable progress row appended by each stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseUpdateRecord {
    pub case_id: CaseId,
    pub message: String,
    pub kind: UpdateKind,
    pub stage: PipelineStage,
    pub created_at: DateTime<Utc>,
}

/// Daily per-service demand counter used for oversight reporting.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DemandMetric {
    pub service_id: ServiceId,
    pub date: NaiveDate,
    pub demand_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_is_a_pure_function_of_tier() {
        assert_eq!(UrgencyTier::Critical.estimated_duration_minutes(), 60);
        assert_eq!(UrgencyTier::High.estimated_duration_minutes(), 45);
        assert_eq!(UrgencyTier::Medium.estimated_duration_minutes(), 30);
        assert_eq!(UrgencyTier::Low.estimated_duration_minutes(), 15);
    }

    #[test]
    fn booking_offsets_follow_the_fixed_table() {
        assert_eq!(UrgencyTier::Critical.booking_offset(), Duration::hours(1));
        assert_eq!(UrgencyTier::High.booking_offset(), Duration::hours(4));
        assert_eq!(UrgencyTier::Medium.booking_offset(), Duration::days(1));
        assert_eq!(UrgencyTier::Low.booking_offset(), Duration::days(3));
    }

    #[test]
    fn pipeline_stage_order_matches_execution_order() {
        let ordered = PipelineStage::ordered();
        let mut sorted = ordered;
        sorted.sort();
        assert_eq!(ordered, sorted);
        assert_eq!(ordered[0], PipelineStage::Triage);
        assert_eq!(ordered[4], PipelineStage::EquityTracking);
    }

    #[test]
    fn status_parse_round_trips_labels() {
        for status in [
            CaseStatus::Submitted,
            CaseStatus::Triaged,
            CaseStatus::Assigned,
            CaseStatus::Scheduled,
            CaseStatus::Completed,
            CaseStatus::Failed,
        ] {
            assert_eq!(CaseStatus::parse(status.label()), Some(status));
        }
        assert_eq!(CaseStatus::parse("in_review"), None);
    }
}
