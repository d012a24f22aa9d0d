use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{LoopSolveRequest, SolveId};
use super::repository::{CalendarGateway, SolveRunRepository};
use super::service::{LoopAutopilotService, LoopServiceError};

pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub solution_id: String,
}

/// Router builder exposing the solve, status, and commit endpoints.
pub fn loop_router<R, C>(service: Arc<LoopAutopilotService<R, C>>) -> Router
where
    R: SolveRunRepository + 'static,
    C: CalendarGateway + 'static,
{
    Router::new()
        .route("/api/v1/loops/solve", post(solve_handler::<R, C>))
        .route("/api/v1/loops/solves/:solve_id", get(status_handler::<R, C>))
        .route(
            "/api/v1/loops/solves/:solve_id/commit",
            post(commit_handler::<R, C>),
        )
        .with_state(service)
}

pub(crate) async fn solve_handler<R, C>(
    State(service): State<Arc<LoopAutopilotService<R, C>>>,
    headers: HeaderMap,
    axum::Json(request): axum::Json<LoopSolveRequest>,
) -> Response
where
    R: SolveRunRepository + 'static,
    C: CalendarGateway + 'static,
{
    let idempotency_key = headers
        .get(IDEMPOTENCY_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    // The search is CPU bound, keep it off the async workers.
    let solved =
        tokio::task::spawn_blocking(move || service.solve(&idempotency_key, request)).await;

    match solved {
        Ok(Ok(run)) => (StatusCode::OK, axum::Json(run)).into_response(),
        Ok(Err(err)) => error_response(err),
        Err(join_error) => {
            error!(error = %join_error, "loop solve task failed");
            let payload = json!({ "error": "solver task failed" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn status_handler<R, C>(
    State(service): State<Arc<LoopAutopilotService<R, C>>>,
    Path(solve_id): Path<String>,
) -> Response
where
    R: SolveRunRepository + 'static,
    C: CalendarGateway + 'static,
{
    match service.get(&SolveId(solve_id)) {
        Ok(run) => (StatusCode::OK, axum::Json(run)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn commit_handler<R, C>(
    State(service): State<Arc<LoopAutopilotService<R, C>>>,
    Path(solve_id): Path<String>,
    axum::Json(request): axum::Json<CommitRequest>,
) -> Response
where
    R: SolveRunRepository + 'static,
    C: CalendarGateway + 'static,
{
    match service.commit(&SolveId(solve_id), &request.solution_id) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(err) => error_response(err),
    }
}

fn error_response(err: LoopServiceError) -> Response {
    let status = match &err {
        LoopServiceError::SolveNotFound(_) | LoopServiceError::SolutionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        LoopServiceError::NotSolved { .. } => StatusCode::CONFLICT,
        LoopServiceError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };

    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}
