//! HTTP surface of the daemon.
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/healthz` | Store readiness |
//! | GET | `/api/status/camel/{projectId}` | Runtime status rows of a project |
//! | GET | `/api/devmode/reload/{projectId}` | Push project files and reload its devmode container |

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

use podwatch_probe::RuntimeClient;
use podwatch_reconcile::{ReconcileError, ReloadOrchestrator};
use podwatch_state::StatusStore;

/// Shared state for API handlers.
pub struct ApiState<C> {
    pub store: Arc<dyn StatusStore>,
    pub environment: String,
    pub reload: Arc<ReloadOrchestrator<C>>,
}

impl<C> Clone for ApiState<C> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            environment: self.environment.clone(),
            reload: self.reload.clone(),
        }
    }
}

/// Response wrapper for consistent API format.
#[derive(serde::Serialize)]
struct ApiResponse<T: serde::Serialize> {
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl<T: serde::Serialize> ApiResponse<T> {
    fn ok(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data: Some(data),
            error: None,
        })
    }
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
}

pub fn build_router<C: RuntimeClient>(state: ApiState<C>) -> Router {
    Router::new()
        .route("/healthz", get(healthz::<C>))
        .route("/api/status/camel/{project_id}", get(list_camel_statuses::<C>))
        .route("/api/devmode/reload/{project_id}", get(reload_project::<C>))
        .with_state(state)
}

/// GET /healthz
async fn healthz<C: RuntimeClient>(State(state): State<ApiState<C>>) -> impl IntoResponse {
    if state.store.is_ready() {
        ApiResponse::ok("ready").into_response()
    } else {
        error_response("store not ready", StatusCode::SERVICE_UNAVAILABLE).into_response()
    }
}

/// GET /api/status/camel/{project_id}
async fn list_camel_statuses<C: RuntimeClient>(
    State(state): State<ApiState<C>>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    match state.store.list_camel_statuses(&project_id, &state.environment) {
        Ok(statuses) => ApiResponse::ok(statuses).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response(),
    }
}

/// GET /api/devmode/reload/{project_id}
async fn reload_project<C: RuntimeClient>(
    State(state): State<ApiState<C>>,
    Path(project_id): Path<String>,
) -> impl IntoResponse {
    match state.reload.reload_project_code(&project_id).await {
        Ok(outcome) => ApiResponse::ok(outcome).into_response(),
        Err(e @ ReconcileError::ReloadInProgress(_)) => {
            error_response(&e.to_string(), StatusCode::CONFLICT).into_response()
        }
        Err(e) => {
            warn!(project = %project_id, error = %e, "reload request failed");
            error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR).into_response()
        }
    }
}
