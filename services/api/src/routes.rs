use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Extension;
use axum::Json;
use loop_autopilot::workflows::interview_loop::{
    loop_router, CalendarGateway, LoopAutopilotService, SolveRunRepository,
};
use serde_json::json;
use std::sync::Arc;

pub(crate) fn with_loop_routes<R, C>(service: Arc<LoopAutopilotService<R, C>>) -> axum::Router
where
    R: SolveRunRepository + 'static,
    C: CalendarGateway + 'static,
{
    loop_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{InMemoryCalendarGateway, InMemorySolveRunRepository};
    use axum::body::Body;
    use axum::http::Request;
    use loop_autopilot::workflows::interview_loop::SchedulingPolicy;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::sync::atomic::AtomicBool;
    use tower::ServiceExt;

    fn app(ready: bool) -> axum::Router {
        let service = LoopAutopilotService::new(
            Arc::new(InMemorySolveRunRepository::default()),
            Arc::new(InMemoryCalendarGateway::default()),
            SchedulingPolicy::default(),
        );
        let state = AppState {
            readiness: Arc::new(AtomicBool::new(ready)),
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_loop_routes(Arc::new(service)).layer(Extension(state))
    }

    async fn json_body(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json payload")
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = app(true)
            .oneshot(Request::get("/health").body(Body::empty()).expect("request"))
            .await
            .expect("health response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "status": "ok" }));
    }

    #[tokio::test]
    async fn readiness_follows_the_flag() {
        let waiting = app(false)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("ready response");
        assert_eq!(waiting.status(), StatusCode::SERVICE_UNAVAILABLE);

        let ready = app(true)
            .oneshot(Request::get("/ready").body(Body::empty()).expect("request"))
            .await
            .expect("ready response");
        assert_eq!(ready.status(), StatusCode::OK);
        assert_eq!(json_body(ready).await, json!({ "status": "ready" }));
    }

    #[tokio::test]
    async fn metrics_are_plain_text() {
        let response = app(true)
            .oneshot(Request::get("/metrics").body(Body::empty()).expect("request"))
            .await
            .expect("metrics response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .map(|value| value.as_bytes()),
            Some("text/plain; version=0.0.4".as_bytes())
        );
    }

    #[tokio::test]
    async fn loop_routes_fetch_schedules_from_the_calendar() {
        let payload = json!({
            "sessions": [{
                "id": "screen",
                "order": 1,
                "name": "Recruiter screen",
                "duration_minutes": 30,
                "interviewer_pool": { "emails": ["ana@example.com"] }
            }],
            "candidate_blocks": [
                { "start_at": "2025-03-04T14:00:00Z", "end_at": "2025-03-04T15:00:00Z" }
            ]
        });
        let request = Request::post("/api/v1/loops/solve")
            .header("content-type", "application/json")
            .header("idempotency-key", "routes-test")
            .body(Body::from(payload.to_string()))
            .expect("request");

        let response = app(true).oneshot(request).await.expect("solve response");

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["result"]["status"], json!("SOLVED"));
        assert_eq!(body["result"]["metadata"]["graph_api_calls"], json!(1));
    }
}
