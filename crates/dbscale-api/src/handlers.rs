//! REST API handlers.
//!
//! Decision handlers decode the body, hand the request to the autoscaler and
//! map the outcome to a status code. Inspection handlers read `StateStore`.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use dbscale_autoscale::ScaleError;
use dbscale_core::{InstanceKey, ScalingRequest};

use crate::ApiState;
use crate::push::PushEnvelope;

/// History entries returned when no `limit` is given.
const DEFAULT_HISTORY_LIMIT: usize = 50;

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

fn error_response(msg: &str, status: StatusCode) -> Response {
    (
        status,
        Json(ApiResponse::<()> {
            success: false,
            data: None,
            error: Some(msg.to_string()),
        }),
    )
        .into_response()
}

fn scale_error_status(err: &ScaleError) -> StatusCode {
    match err {
        ScaleError::Resize { .. } => StatusCode::BAD_GATEWAY,
        ScaleError::StateRead { .. } | ScaleError::StateWrite { .. } => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

async fn decide(state: &ApiState, request: ScalingRequest) -> Response {
    match state.autoscaler.process(&request).await {
        Ok(report) => ApiResponse::ok(report).into_response(),
        Err(e) => error_response(&e.to_string(), scale_error_status(&e)),
    }
}

// ── Decisions ──────────────────────────────────────────────────

/// POST /api/v1/scale
pub async fn scale(State(state): State<ApiState>, body: Bytes) -> Response {
    match ScalingRequest::from_json(&body) {
        Ok(request) => decide(&state, request).await,
        Err(e) => {
            warn!(error = %e, "rejected malformed scaling request");
            error_response(&e.to_string(), StatusCode::BAD_REQUEST)
        }
    }
}

/// POST /api/v1/push
pub async fn push(State(state): State<ApiState>, body: Bytes) -> Response {
    let request = PushEnvelope::from_json(&body).and_then(|envelope| {
        debug!(message_id = ?envelope.message.message_id, "push message received");
        envelope.decode()
    });
    match request {
        Ok(request) => decide(&state, request).await,
        Err(e) => {
            warn!(error = %e, "rejected malformed push message");
            error_response(&e.to_string(), StatusCode::BAD_REQUEST)
        }
    }
}

// ── Inspection ─────────────────────────────────────────────────

/// Storage key for path ids, or a 400 response for unusable ids.
fn instance_key(project: &str, instance: &str) -> Result<String, Response> {
    InstanceKey::try_new(project, instance)
        .map(|key| key.table_key())
        .map_err(|e| error_response(&e.to_string(), StatusCode::BAD_REQUEST))
}

/// GET /api/v1/instances
pub async fn list_instances(State(state): State<ApiState>) -> Response {
    match state.store.list_states() {
        Ok(states) => ApiResponse::ok(states).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /api/v1/instances/{project}/{instance}/state
pub async fn get_state(
    State(state): State<ApiState>,
    Path((project, instance)): Path<(String, String)>,
) -> Response {
    let key = match instance_key(&project, &instance) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    match state.store.get_state(&key) {
        Ok(record) => ApiResponse::ok(record).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// DELETE /api/v1/instances/{project}/{instance}/state
///
/// Forgets the last scaling action so the next decision is not held back
/// by a cooldown. History is kept.
pub async fn delete_state(
    State(state): State<ApiState>,
    Path((project, instance)): Path<(String, String)>,
) -> Response {
    let key = match instance_key(&project, &instance) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    match state.store.delete_state(&key) {
        Ok(true) => ApiResponse::ok("deleted").into_response(),
        Ok(false) => error_response("no state for instance", StatusCode::NOT_FOUND),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[derive(Debug, serde::Deserialize)]
pub struct HistoryParams {
    pub limit: Option<usize>,
}

/// GET /api/v1/instances/{project}/{instance}/history?limit=N
pub async fn get_history(
    State(state): State<ApiState>,
    Path((project, instance)): Path<(String, String)>,
    Query(params): Query<HistoryParams>,
) -> Response {
    let key = match instance_key(&project, &instance) {
        Ok(key) => key,
        Err(resp) => return resp,
    };
    let limit = params.limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
    match state.store.list_history(&key, limit) {
        Ok(records) => ApiResponse::ok(records).into_response(),
        Err(e) => error_response(&e.to_string(), StatusCode::INTERNAL_SERVER_ERROR),
    }
}

/// GET /healthz
pub async fn healthz() -> impl IntoResponse {
    ApiResponse::ok("ok")
}
