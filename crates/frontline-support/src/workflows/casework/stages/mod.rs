mod booking;
mod equity;
mod followup;
mod guidance;
mod triage;

pub(crate) use booking::BookingStage;
pub(crate) use equity::EquityTrackingStage;
pub(crate) use followup::FollowupStage;
pub(crate) use guidance::GuidanceStage;
pub(crate) use triage::TriageStage;

use super::domain::{CaseId, PipelineStage, ServiceId, ServiceKind};
use super::ports::StoreError;

/// Terminal failure raised by a stage or the engine boundary. Every variant
/// halts the run; there is no retry and no partial success.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StageError {
    #[error("case {0} not found")]
    CaseNotFound(CaseId),
    #[error("no available services for {0}")]
    NoServiceAvailable(ServiceKind),
    #[error("assigned service {0} not found")]
    ServiceNotFound(ServiceId),
    #[error("stage {stage} requires output from {needs}")]
    MissingDependency {
        stage: PipelineStage,
        needs: PipelineStage,
    },
    #[error("stage {0} exceeded its time budget")]
    Timeout(PipelineStage),
    #[error(transparent)]
    Store(#[from] StoreError),
}
