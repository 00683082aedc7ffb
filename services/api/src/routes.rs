use crate::infra::{AppState, CaseFilter, NewCase, NewCitizen, NewService};
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, Query};
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use chrono::{DateTime, Duration, Utc};
use frontline_support::error::AppError;
use frontline_support::workflows::casework::{
    offline_recommendation, AppointmentRecord, CaseEvent, CaseId, CaseStatus, CaseUpdateRecord,
    CitizenId, CitizenRecord, DemandMetric, OfflineRecommendation, ServiceKind, ServiceRecord,
    StoreError, UrgencyTier,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeMap;
use tracing::debug;

#[derive(Debug, Deserialize)]
pub(crate) struct CitizenCreateRequest {
    pub(crate) name: String,
    pub(crate) email: String,
    #[serde(default)]
    pub(crate) phone: Option<String>,
    #[serde(default)]
    pub(crate) address: Option<String>,
    #[serde(default)]
    pub(crate) emergency_contact: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CaseCreateRequest {
    pub(crate) citizen_id: CitizenId,
    pub(crate) title: String,
    pub(crate) description: String,
    #[serde(default)]
    pub(crate) offline_mode: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct CaseSubmittedResponse {
    pub(crate) case_id: CaseId,
    pub(crate) status: &'static str,
    pub(crate) message: &'static str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CaseListQuery {
    #[serde(default)]
    pub(crate) status: Option<CaseStatus>,
    #[serde(default)]
    pub(crate) urgency: Option<UrgencyTier>,
    #[serde(default)]
    pub(crate) skip: usize,
    #[serde(default)]
    pub(crate) limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CaseSummaryResponse {
    pub(crate) id: CaseId,
    pub(crate) title: String,
    pub(crate) status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) urgency: Option<UrgencyTier>,
    pub(crate) citizen_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) assigned_service: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) appointment_time: Option<DateTime<Utc>>,
    pub(crate) created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CaseDetailResponse {
    pub(crate) id: CaseId,
    pub(crate) title: String,
    pub(crate) description: String,
    pub(crate) status: CaseStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) urgency: Option<UrgencyTier>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) triage_notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) estimated_duration: Option<u32>,
    pub(crate) created_at: DateTime<Utc>,
    pub(crate) citizen: CitizenRecord,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) assigned_service: Option<ServiceRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) appointment: Option<AppointmentRecord>,
    pub(crate) updates: Vec<CaseUpdateRecord>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceCreateRequest {
    pub(crate) name: String,
    pub(crate) kind: ServiceKind,
    pub(crate) department: String,
    pub(crate) location: String,
    pub(crate) contact_info: String,
    pub(crate) capacity_per_hour: u32,
    #[serde(default)]
    pub(crate) is_emergency: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OfflineCaseRequest {
    pub(crate) description: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct DashboardStatsResponse {
    pub(crate) total_cases: usize,
    pub(crate) pending_cases: usize,
    pub(crate) completed_cases: usize,
    pub(crate) services_utilization: BTreeMap<String, f64>,
}

pub(crate) fn router() -> axum::Router {
    axum::Router::new()
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route(
            "/api/v1/citizens",
            axum::routing::post(create_citizen_endpoint),
        )
        .route(
            "/api/v1/citizens/:citizen_id",
            axum::routing::get(get_citizen_endpoint),
        )
        .route(
            "/api/v1/cases",
            axum::routing::post(submit_case_endpoint).get(list_cases_endpoint),
        )
        .route(
            "/api/v1/cases/offline",
            axum::routing::post(offline_case_endpoint),
        )
        .route(
            "/api/v1/cases/:case_id",
            axum::routing::get(get_case_endpoint),
        )
        .route(
            "/api/v1/services",
            axum::routing::get(list_services_endpoint).post(create_service_endpoint),
        )
        .route(
            "/api/v1/dashboard/stats",
            axum::routing::get(dashboard_stats_endpoint),
        )
        .route(
            "/api/v1/dashboard/metrics",
            axum::routing::get(dashboard_metrics_endpoint),
        )
        .route(
            "/ws/cases/:case_id",
            axum::routing::get(case_events_endpoint),
        )
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

pub(crate) async fn create_citizen_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CitizenCreateRequest>,
) -> Result<(StatusCode, Json<CitizenRecord>), AppError> {
    let citizen = state.store.create_citizen(NewCitizen {
        name: payload.name,
        email: payload.email,
        phone: payload.phone,
        address: payload.address,
        emergency_contact: payload.emergency_contact,
    })?;
    Ok((StatusCode::CREATED, Json(citizen)))
}

pub(crate) async fn get_citizen_endpoint(
    Extension(state): Extension<AppState>,
    Path(citizen_id): Path<u64>,
) -> Result<Json<CitizenRecord>, AppError> {
    let citizen = state
        .store
        .citizen(CitizenId(citizen_id))
        .ok_or_else(|| StoreError::NotFound(format!("citizen {citizen_id}")))?;
    Ok(Json(citizen))
}

/// Accepts the case, kicks off the pipeline on a detached task, and returns
/// immediately. Progress is observable via the case detail endpoint or the
/// per-case WebSocket stream.
pub(crate) async fn submit_case_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<CaseCreateRequest>,
) -> Result<(StatusCode, Json<CaseSubmittedResponse>), AppError> {
    let case = state.store.create_case(NewCase {
        citizen_id: payload.citizen_id,
        title: payload.title,
        description: payload.description,
    })?;

    state.engine.start(case.id, payload.offline_mode);
    debug!(case_id = %case.id, "case accepted for background processing");

    Ok((
        StatusCode::ACCEPTED,
        Json(CaseSubmittedResponse {
            case_id: case.id,
            status: "processing",
            message: "Case submitted successfully",
        }),
    ))
}

pub(crate) async fn list_cases_endpoint(
    Extension(state): Extension<AppState>,
    Query(query): Query<CaseListQuery>,
) -> Json<Vec<CaseSummaryResponse>> {
    let listings = state.store.list_cases(CaseFilter {
        status: query.status,
        urgency: query.urgency,
        skip: query.skip,
        limit: query.limit,
    });

    Json(
        listings
            .into_iter()
            .map(|listing| CaseSummaryResponse {
                id: listing.case.id,
                title: listing.case.title,
                status: listing.case.status,
                urgency: listing.case.urgency,
                citizen_name: listing.citizen_name,
                assigned_service: listing.assigned_service,
                appointment_time: listing.appointment_time,
                created_at: listing.case.created_at,
            })
            .collect(),
    )
}

pub(crate) async fn get_case_endpoint(
    Extension(state): Extension<AppState>,
    Path(case_id): Path<u64>,
) -> Result<Json<CaseDetailResponse>, AppError> {
    let detail = state
        .store
        .case_detail(CaseId(case_id))
        .ok_or_else(|| StoreError::NotFound(format!("case {case_id}")))?;

    Ok(Json(CaseDetailResponse {
        id: detail.case.id,
        title: detail.case.title,
        description: detail.case.description,
        status: detail.case.status,
        urgency: detail.case.urgency,
        triage_notes: detail.case.triage_notes,
        estimated_duration: detail.case.estimated_duration,
        created_at: detail.case.created_at,
        citizen: detail.citizen,
        assigned_service: detail.service,
        appointment: detail.appointment,
        updates: detail.updates,
    }))
}

/// Degraded-mode processing: classifies the description locally and returns
/// guidance without touching the store or the pipeline.
pub(crate) async fn offline_case_endpoint(
    Json(payload): Json<OfflineCaseRequest>,
) -> Json<OfflineRecommendation> {
    Json(offline_recommendation(&payload.description))
}

pub(crate) async fn list_services_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<Vec<ServiceRecord>> {
    Json(state.store.services())
}

pub(crate) async fn create_service_endpoint(
    Extension(state): Extension<AppState>,
    Json(payload): Json<ServiceCreateRequest>,
) -> (StatusCode, Json<ServiceRecord>) {
    let service = state.store.create_service(NewService {
        name: payload.name,
        kind: payload.kind,
        department: payload.department,
        location: payload.location,
        contact_info: payload.contact_info,
        capacity_per_hour: payload.capacity_per_hour,
        is_emergency: payload.is_emergency,
    });
    (StatusCode::CREATED, Json(service))
}

pub(crate) async fn dashboard_stats_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<DashboardStatsResponse> {
    let counters = state.store.dashboard_counters();
    Json(DashboardStatsResponse {
        total_cases: counters.total_cases,
        pending_cases: counters.pending_cases,
        completed_cases: counters.completed_cases,
        services_utilization: counters.services_utilization,
    })
}

/// Demand rows recorded since yesterday, for the oversight dashboard.
pub(crate) async fn dashboard_metrics_endpoint(
    Extension(state): Extension<AppState>,
) -> Json<Vec<DemandMetric>> {
    let since = Utc::now().date_naive() - Duration::days(1);
    Json(state.store.demand_metrics_since(since))
}

pub(crate) async fn case_events_endpoint(
    Extension(state): Extension<AppState>,
    Path(case_id): Path<u64>,
    upgrade: WebSocketUpgrade,
) -> impl IntoResponse {
    upgrade.on_upgrade(move |socket| stream_case_events(socket, state, CaseId(case_id)))
}

/// Forwards pipeline events for one case over the socket as JSON text
/// frames. The stream ends after the terminal event or when the client
/// goes away; either way the subscription is removed.
async fn stream_case_events(mut socket: WebSocket, state: AppState, case_id: CaseId) {
    let publisher = state.engine.publisher().clone();
    let (subscription, mut events) = publisher.subscribe(case_id);

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                let Ok(payload) = serde_json::to_string(&event) else { break };
                if socket.send(Message::Text(payload)).await.is_err() {
                    break;
                }
                if matches!(event, CaseEvent::CaseProcessed { .. }) {
                    break;
                }
            }
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    publisher.unsubscribe(case_id, subscription);
    let _ = socket.close().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::InMemoryStore;
    use frontline_support::workflows::casework::{CaseWorkflowEngine, EventPublisher};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    fn test_state() -> AppState {
        let store = Arc::new(InMemoryStore::default());
        store.seed_demo_data();
        let engine = CaseWorkflowEngine::new(store.clone(), store.clone(), EventPublisher::new());
        AppState {
            store,
            engine,
            readiness: Arc::new(AtomicBool::new(true)),
            metrics: Arc::new(
                PrometheusBuilder::new()
                    .build_recorder()
                    .handle(),
            ),
        }
    }

    #[tokio::test]
    async fn citizen_creation_rejects_duplicate_email() {
        let state = test_state();

        let first = create_citizen_endpoint(
            Extension(state.clone()),
            Json(CitizenCreateRequest {
                name: "Ada Citizen".to_string(),
                email: "ada@example.com".to_string(),
                phone: None,
                address: None,
                emergency_contact: None,
            }),
        )
        .await
        .expect("first registration succeeds");
        assert_eq!(first.0, StatusCode::CREATED);

        let duplicate = create_citizen_endpoint(
            Extension(state),
            Json(CitizenCreateRequest {
                name: "Ada Again".to_string(),
                email: "ADA@example.com".to_string(),
                phone: None,
                address: None,
                emergency_contact: None,
            }),
        )
        .await;
        assert!(matches!(
            duplicate,
            Err(AppError::Store(StoreError::Conflict(_)))
        ));
    }

    #[tokio::test]
    async fn case_submission_is_accepted_and_processed_in_background() {
        let state = test_state();

        let (status, Json(body)) = submit_case_endpoint(
            Extension(state.clone()),
            Json(CaseCreateRequest {
                citizen_id: CitizenId(1),
                title: "Chest pain".to_string(),
                description: "Severe chest pain and difficulty breathing".to_string(),
                offline_mode: false,
            }),
        )
        .await
        .expect("submission accepted");

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body.status, "processing");

        // The run is detached; poll the store until it reaches a terminal
        // status.
        let mut final_status = CaseStatus::Submitted;
        for _ in 0..50 {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            if let Some(detail) = state.store.case_detail(body.case_id) {
                final_status = detail.case.status;
                if matches!(final_status, CaseStatus::Completed | CaseStatus::Failed) {
                    break;
                }
            }
        }
        assert_eq!(final_status, CaseStatus::Completed);

        let detail = state.store.case_detail(body.case_id).expect("case exists");
        assert_eq!(detail.case.urgency, Some(UrgencyTier::Critical));
        assert!(detail.appointment.expect("appointment booked").confirmation_sent);
    }

    #[tokio::test]
    async fn case_submission_for_unknown_citizen_is_rejected() {
        let state = test_state();

        let result = submit_case_endpoint(
            Extension(state),
            Json(CaseCreateRequest {
                citizen_id: CitizenId(99),
                title: "Anything".to_string(),
                description: "Anything".to_string(),
                offline_mode: false,
            }),
        )
        .await;

        assert!(matches!(
            result,
            Err(AppError::Store(StoreError::NotFound(_)))
        ));
    }

    #[tokio::test]
    async fn case_listing_filters_by_status() {
        let state = test_state();
        for title in ["First", "Second"] {
            state
                .store
                .create_case(NewCase {
                    citizen_id: CitizenId(1),
                    title: title.to_string(),
                    description: "paperwork".to_string(),
                })
                .expect("case created");
        }

        let Json(all) = list_cases_endpoint(
            Extension(state.clone()),
            Query(CaseListQuery {
                status: None,
                urgency: None,
                skip: 0,
                limit: None,
            }),
        )
        .await;
        assert_eq!(all.len(), 2);

        let Json(completed) = list_cases_endpoint(
            Extension(state),
            Query(CaseListQuery {
                status: Some(CaseStatus::Completed),
                urgency: None,
                skip: 0,
                limit: None,
            }),
        )
        .await;
        assert!(completed.is_empty());
    }

    #[tokio::test]
    async fn offline_endpoint_answers_without_store_access() {
        let Json(recommendation) = offline_case_endpoint(Json(OfflineCaseRequest {
            description: "urgent medical help needed".to_string(),
        }))
        .await;

        assert_eq!(recommendation.urgency, UrgencyTier::High);
        assert_eq!(
            recommendation.message,
            "Processed in offline mode with simplified logic"
        );
    }

    #[tokio::test]
    async fn router_serves_health_and_maps_missing_case_to_404() {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let app = router().layer(Extension(test_state()));

        let health = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(health.status(), StatusCode::OK);

        let missing = app
            .oneshot(
                Request::builder()
                    .uri("/api/v1/cases/999")
                    .body(Body::empty())
                    .expect("request builds"),
            )
            .await
            .expect("router responds");
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn dashboard_stats_reflect_seeded_catalog() {
        let state = test_state();

        let Json(stats) = dashboard_stats_endpoint(Extension(state)).await;

        assert_eq!(stats.total_cases, 0);
        assert_eq!(stats.services_utilization.len(), 5);
        assert!(stats
            .services_utilization
            .values()
            .all(|utilization| *utilization == 0.0));
    }
}
