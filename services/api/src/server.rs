use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryStore};
use crate::routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use frontline_support::config::AppConfig;
use frontline_support::error::AppError;
use frontline_support::telemetry;
use frontline_support::workflows::casework::{CaseWorkflowEngine, EventPublisher};
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let store = Arc::new(InMemoryStore::default());
    store.seed_demo_data();
    let engine = CaseWorkflowEngine::new(store.clone(), store.clone(), EventPublisher::new())
        .with_stage_timeout(config.pipeline.stage_timeout);

    let app_state = AppState {
        store,
        engine,
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let app = routes::router()
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "citizen case service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
