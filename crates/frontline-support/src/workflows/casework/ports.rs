use async_trait::async_trait;
use chrono::NaiveDate;

use super::domain::{
    AppointmentRecord, CaseId, CaseProgress, CaseRecord, CitizenId, CitizenRecord, PipelineStage,
    ServiceId, ServiceKind, ServiceRecord, UpdateKind,
};

/// Error enumeration for the persistence and catalog ports.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("{0} not found")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Persistence port the pipeline commits its side effects through. Each
/// method is a suspension point; no other part of a run may block.
#[async_trait]
pub trait CaseStore: Send + Sync {
    async fn load_case(&self, id: CaseId) -> Result<Option<CaseRecord>, StoreError>;

    async fn load_citizen(&self, id: CitizenId) -> Result<CitizenRecord, StoreError>;

    /// Apply the populated fields of `progress` to the case row.
    async fn save_case_progress(
        &self,
        id: CaseId,
        progress: CaseProgress,
    ) -> Result<(), StoreError>;

    async fn append_update(
        &self,
        id: CaseId,
        message: String,
        kind: UpdateKind,
        stage: PipelineStage,
    ) -> Result<(), StoreError>;

    async fn create_appointment(&self, appointment: AppointmentRecord) -> Result<(), StoreError>;

    /// Mark the case's appointment as confirmed. Idempotent.
    async fn confirm_appointment(&self, case_id: CaseId) -> Result<(), StoreError>;

    /// Add `delta` to the demand counter for `(service_id, date)`, creating
    /// the row when absent. The read-check-increment must be one atomic
    /// unit; concurrent callers for the same key must not lose increments.
    async fn record_demand(
        &self,
        service_id: ServiceId,
        date: NaiveDate,
        delta: u64,
    ) -> Result<(), StoreError>;
}

/// Read-only service catalog.
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    /// Services of the given kind, in stable ascending-id order. When
    /// `emergency_only` is set, only emergency-flagged services qualify.
    async fn find_services(
        &self,
        kind: ServiceKind,
        emergency_only: bool,
    ) -> Result<Vec<ServiceRecord>, StoreError>;

    async fn load_service(&self, id: ServiceId) -> Result<Option<ServiceRecord>, StoreError>;
}
