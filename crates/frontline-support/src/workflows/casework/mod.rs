//! Citizen case processing: a fixed five-stage pipeline (triage, service
//! matching, booking, confirmation, demand tracking) threaded over a mutable
//! [`CaseState`], with per-case subscribers notified as progress occurs.

pub mod domain;
mod engine;
pub mod events;
pub mod offline;
pub mod ports;
mod stages;
mod state;

pub use domain::{
    AppointmentDetails, AppointmentRecord, CaseId, CaseProgress, CaseRecord, CaseStatus,
    CaseUpdateRecord, CitizenId, CitizenRecord, CitizenSnapshot, DemandMetric, PipelineStage,
    ServiceId, ServiceKind, ServiceRecord, UpdateKind, UrgencyTier,
};
pub use engine::{CaseOutcome, CaseWorkflowEngine};
pub use events::{CaseEvent, EventPublisher, SubscriptionId};
pub use offline::{offline_recommendation, OfflineRecommendation, OfflineServiceHint};
pub use ports::{CaseStore, ServiceCatalog, StoreError};
pub use stages::StageError;
pub use state::{
    CaseState, EquityOutput, FollowupOutput, GuidanceOutput, StageOutput, TriageOutput,
};
