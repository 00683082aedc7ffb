use chrono::Utc;
use tracing::warn;

use super::StageError;
use crate::workflows::casework::domain::PipelineStage;
use crate::workflows::casework::ports::CaseStore;
use crate::workflows::casework::state::{CaseState, EquityOutput, StageOutput};

/// Bumps the per-(service, day) demand counter for oversight reporting.
///
/// Advisory telemetry only: a case without an assigned service is a no-op,
/// and a store failure is logged rather than halting a pipeline that has
/// already scheduled the citizen.
pub(crate) struct EquityTrackingStage;

impl EquityTrackingStage {
    pub(crate) async fn run<S: CaseStore + ?Sized>(
        state: &mut CaseState,
        store: &S,
    ) -> Result<(), StageError> {
        let mut metrics_updated = false;

        if let Some(service_id) = state.assigned_service_id {
            let today = Utc::now().date_naive();
            match store.record_demand(service_id, today, 1).await {
                Ok(()) => metrics_updated = true,
                Err(error) => {
                    warn!(case_id = %state.case_id, service_id = %service_id, %error,
                        "demand metric update failed");
                }
            }
        }

        state.record_output(
            PipelineStage::EquityTracking,
            StageOutput::EquityTracking(EquityOutput {
                metrics_updated,
                recorded_at: Utc::now(),
            }),
        );
        if metrics_updated {
            state.push_message("Service demand metrics updated".to_string());
        }

        Ok(())
    }
}
