use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryCalendarGateway, InMemorySolveRunRepository};
use crate::routes::with_loop_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loop_autopilot::config::AppConfig;
use loop_autopilot::error::AppError;
use loop_autopilot::telemetry;
use loop_autopilot::workflows::interview_loop::LoopAutopilotService;
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
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let repository = Arc::new(InMemorySolveRunRepository::default());
    let calendar = Arc::new(InMemoryCalendarGateway::default());
    let loop_service = Arc::new(LoopAutopilotService::new(
        repository,
        calendar,
        config.solver.clone(),
    ));

    let app = with_loop_routes(loop_service.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    let policy = loop_service.solver().policy();
    info!(
        ?config.environment,
        %addr,
        slot_granularity_minutes = policy.slot_granularity_minutes,
        max_days_span = policy.max_days_span,
        "loop autopilot ready"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
