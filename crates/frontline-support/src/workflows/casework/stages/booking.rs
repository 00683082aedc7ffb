use chrono::Utc;

use super::StageError;
use crate::workflows::casework::domain::{
    AppointmentDetails, AppointmentRecord, CaseProgress, CaseStatus, PipelineStage, UpdateKind,
};
use crate::workflows::casework::ports::{CaseStore, ServiceCatalog};
use crate::workflows::casework::state::{CaseState, StageOutput};

/// Books an appointment slot at the assigned service.
///
/// The scheduled time is "now" plus a fixed offset keyed on urgency; no
/// real slot or capacity check is performed.
pub(crate) struct BookingStage;

impl BookingStage {
    pub(crate) async fn run<S, C>(
        state: &mut CaseState,
        store: &S,
        catalog: &C,
    ) -> Result<(), StageError>
    where
        S: CaseStore + ?Sized,
        C: ServiceCatalog + ?Sized,
    {
        let service_id = state
            .assigned_service_id
            .ok_or(StageError::MissingDependency {
                stage: PipelineStage::Booking,
                needs: PipelineStage::Guidance,
            })?;
        let triage = state
            .triage_output()
            .cloned()
            .ok_or(StageError::MissingDependency {
                stage: PipelineStage::Booking,
                needs: PipelineStage::Triage,
            })?;

        let service = catalog
            .load_service(service_id)
            .await?
            .ok_or(StageError::ServiceNotFound(service_id))?;

        let urgency = triage.urgency;
        let scheduled_time = Utc::now() + urgency.booking_offset();

        store
            .create_appointment(AppointmentRecord {
                case_id: state.case_id,
                service_id,
                scheduled_time,
                duration_minutes: triage.estimated_duration,
                notes: format!("Auto-booked {urgency} priority appointment"),
                confirmation_sent: false,
            })
            .await?;
        store
            .save_case_progress(
                state.case_id,
                CaseProgress {
                    status: Some(CaseStatus::Scheduled),
                    ..CaseProgress::default()
                },
            )
            .await?;
        store
            .append_update(
                state.case_id,
                format!(
                    "Appointment scheduled for {} at {}",
                    scheduled_time.format("%Y-%m-%d %H:%M"),
                    service.name
                ),
                UpdateKind::Booking,
                PipelineStage::Booking,
            )
            .await?;

        let details = AppointmentDetails {
            service_name: service.name,
            location: service.location,
            scheduled_time,
            duration_minutes: triage.estimated_duration,
            contact: service.contact_info,
        };
        state.appointment = Some(details.clone());
        state.advance_status(CaseStatus::Scheduled);
        state.record_output(PipelineStage::Booking, StageOutput::Booking(details));
        state.push_message(format!(
            "Appointment booked for {}",
            scheduled_time.format("%B %d, %Y at %H:%M")
        ));

        Ok(())
    }
}
