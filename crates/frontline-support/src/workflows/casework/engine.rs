use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{info, warn};

use super::domain::{
    AppointmentDetails, CaseId, CaseProgress, CaseStatus, CitizenSnapshot, PipelineStage,
    UpdateKind,
};
use super::events::{CaseEvent, EventPublisher};
use super::ports::{CaseStore, ServiceCatalog};
use super::stages::{
    BookingStage, EquityTrackingStage, FollowupStage, GuidanceStage, StageError, TriageStage,
};
use super::state::{CaseState, StageOutput};

/// Terminal payload delivered to subscribers and returned by [`CaseWorkflowEngine::run`].
#[derive(Debug, Clone, Serialize)]
pub struct CaseOutcome {
    pub success: bool,
    pub case_id: CaseId,
    pub final_status: CaseStatus,
    pub stage_outputs: BTreeMap<PipelineStage, StageOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<AppointmentDetails>,
    #[serde(rename = "message_log")]
    pub messages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CaseOutcome {
    fn rejected(case_id: CaseId, error: &StageError) -> Self {
        Self {
            success: false,
            case_id,
            final_status: CaseStatus::Failed,
            stage_outputs: BTreeMap::new(),
            appointment: None,
            messages: Vec::new(),
            error: Some(error.to_string()),
        }
    }

    fn from_state(state: CaseState) -> Self {
        let case_id = state.case_id;
        let (stage_outputs, appointment, messages, final_status, error_condition) =
            state.into_parts();
        Self {
            success: error_condition.is_none(),
            case_id,
            final_status,
            stage_outputs,
            appointment,
            messages,
            error: error_condition.map(|error| error.to_string()),
        }
    }
}

/// Orchestrates the fixed stage order over one case at a time.
///
/// Stages are strictly sequential within a run because each consumes the
/// previous stage's output; separate cases run on independent detached
/// tasks with no ordering guarantee between them. Exactly one terminal
/// event is published per run, success or failure.
pub struct CaseWorkflowEngine<S, C> {
    store: Arc<S>,
    catalog: Arc<C>,
    publisher: EventPublisher,
    stage_timeout: Option<Duration>,
}

impl<S, C> Clone for CaseWorkflowEngine<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            catalog: Arc::clone(&self.catalog),
            publisher: self.publisher.clone(),
            stage_timeout: self.stage_timeout,
        }
    }
}

impl<S, C> CaseWorkflowEngine<S, C>
where
    S: CaseStore + 'static,
    C: ServiceCatalog + 'static,
{
    pub fn new(store: Arc<S>, catalog: Arc<C>, publisher: EventPublisher) -> Self {
        Self {
            store,
            catalog,
            publisher,
            stage_timeout: None,
        }
    }

    /// Bound each stage call; a stage that overruns is halted through the
    /// same error path as any other stage failure.
    pub fn with_stage_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.stage_timeout = timeout;
        self
    }

    pub fn publisher(&self) -> &EventPublisher {
        &self.publisher
    }

    /// Fire-and-forget entry point: the caller gets control back
    /// immediately while the run proceeds on a detached task, delivering
    /// its outcome through the publisher.
    pub fn start(&self, case_id: CaseId, offline_mode: bool) {
        let engine = self.clone();
        tokio::spawn(async move {
            engine.run(case_id, offline_mode).await;
        });
    }

    /// Run the full pipeline for one case and publish the terminal event.
    pub async fn run(&self, case_id: CaseId, offline_mode: bool) -> CaseOutcome {
        let outcome = self.execute(case_id, offline_mode).await;

        if outcome.success {
            info!(%case_id, status = %outcome.final_status, "case pipeline completed");
        } else {
            warn!(%case_id, error = outcome.error.as_deref().unwrap_or("unknown"),
                "case pipeline halted");
        }

        self.publisher.publish(
            case_id,
            &CaseEvent::CaseProcessed {
                outcome: outcome.clone(),
            },
        );
        outcome
    }

    async fn execute(&self, case_id: CaseId, offline_mode: bool) -> CaseOutcome {
        let mut state = match self.load_state(case_id, offline_mode).await {
            Ok(state) => state,
            Err(error) => return CaseOutcome::rejected(case_id, &error),
        };

        for stage in PipelineStage::ordered() {
            match self.run_stage(stage, &mut state).await {
                Ok(()) => {
                    let message = state.messages().last().cloned().unwrap_or_default();
                    self.publisher.publish(
                        case_id,
                        &CaseEvent::StageCompleted {
                            case_id,
                            stage,
                            status: state.status(),
                            message,
                        },
                    );
                }
                Err(error) => {
                    state.push_message(format!("Processing halted at {stage}: {error}"));
                    state.fail(error.clone());
                    self.persist_failure(case_id, stage, &error).await;
                    break;
                }
            }
        }

        if state.error_condition().is_none() {
            match self
                .store
                .save_case_progress(
                    case_id,
                    CaseProgress {
                        status: Some(CaseStatus::Completed),
                        ..CaseProgress::default()
                    },
                )
                .await
            {
                Ok(()) => state.advance_status(CaseStatus::Completed),
                Err(error) => state.fail(StageError::Store(error)),
            }
        }

        CaseOutcome::from_state(state)
    }

    async fn load_state(
        &self,
        case_id: CaseId,
        offline_mode: bool,
    ) -> Result<CaseState, StageError> {
        let case = self
            .store
            .load_case(case_id)
            .await?
            .ok_or(StageError::CaseNotFound(case_id))?;
        let citizen = self.store.load_citizen(case.citizen_id).await?;
        Ok(CaseState::new(
            &case,
            CitizenSnapshot::from_record(&citizen),
            offline_mode,
        ))
    }

    async fn run_stage(
        &self,
        stage: PipelineStage,
        state: &mut CaseState,
    ) -> Result<(), StageError> {
        let store = self.store.as_ref();
        let catalog = self.catalog.as_ref();

        let call = async {
            match stage {
                PipelineStage::Triage => TriageStage::run(state, store).await,
                PipelineStage::Guidance => GuidanceStage::run(state, store, catalog).await,
                PipelineStage::Booking => BookingStage::run(state, store, catalog).await,
                PipelineStage::Followup => FollowupStage::run(state, store).await,
                PipelineStage::EquityTracking => EquityTrackingStage::run(state, store).await,
            }
        };

        match self.stage_timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => Err(StageError::Timeout(stage)),
            },
            None => call.await,
        }
    }

    /// Best-effort persistence of the failed terminal state. The run is
    /// already halting; a store error here is logged, not propagated.
    async fn persist_failure(&self, case_id: CaseId, stage: PipelineStage, error: &StageError) {
        let progress = CaseProgress {
            status: Some(CaseStatus::Failed),
            ..CaseProgress::default()
        };
        if let Err(store_error) = self.store.save_case_progress(case_id, progress).await {
            warn!(%case_id, error = %store_error, "failed to persist halted case status");
        }
        if let Err(store_error) = self
            .store
            .append_update(
                case_id,
                format!("Case processing halted: {error}"),
                UpdateKind::Failure,
                stage,
            )
            .await
        {
            warn!(%case_id, error = %store_error, "failed to append halt update");
        }
    }
}
