use super::StageError;
use crate::workflows::casework::domain::{
    CaseProgress, CaseStatus, PipelineStage, UpdateKind, UrgencyTier,
};
use crate::workflows::casework::ports::{CaseStore, ServiceCatalog};
use crate::workflows::casework::state::{CaseState, GuidanceOutput, StageOutput};

/// Matches the triaged case to a concrete service from the catalog.
///
/// Selection is the first result in catalog iteration order (stable by
/// ascending id); capacity, load, and geography are not weighed.
pub(crate) struct GuidanceStage;

impl GuidanceStage {
    pub(crate) async fn run<S, C>(
        state: &mut CaseState,
        store: &S,
        catalog: &C,
    ) -> Result<(), StageError>
    where
        S: CaseStore + ?Sized,
        C: ServiceCatalog + ?Sized,
    {
        let triage = state
            .triage_output()
            .cloned()
            .ok_or(StageError::MissingDependency {
                stage: PipelineStage::Guidance,
                needs: PipelineStage::Triage,
            })?;

        let emergency_only = matches!(triage.urgency, UrgencyTier::High | UrgencyTier::Critical);
        let services = catalog
            .find_services(triage.service_kind, emergency_only)
            .await?;
        let selected = services
            .first()
            .ok_or(StageError::NoServiceAvailable(triage.service_kind))?;

        store
            .save_case_progress(
                state.case_id,
                CaseProgress {
                    status: Some(CaseStatus::Assigned),
                    assigned_service_id: Some(selected.id),
                    ..CaseProgress::default()
                },
            )
            .await?;
        store
            .append_update(
                state.case_id,
                format!(
                    "Case assigned to {} at {}",
                    selected.name, selected.location
                ),
                UpdateKind::Assignment,
                PipelineStage::Guidance,
            )
            .await?;

        state.assigned_service_id = Some(selected.id);
        state.advance_status(CaseStatus::Assigned);
        state.record_output(
            PipelineStage::Guidance,
            StageOutput::Guidance(GuidanceOutput {
                service_id: selected.id,
                service_name: selected.name.clone(),
                service_location: selected.location.clone(),
                service_contact: selected.contact_info.clone(),
                department: selected.department.clone(),
            }),
        );
        state.push_message(format!(
            "Case assigned to {} in {}",
            selected.name, selected.department
        ));

        Ok(())
    }
}
