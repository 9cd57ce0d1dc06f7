use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use common::protocol::{
    ClaimRequest, CreateTaskRequest, HeartbeatRequest, HeartbeatResponse, TransitionRequest,
};
use common::{Task, TaskId, TaskStatus};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::state::{AppState, UpdateError};

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/tasks", get(list_tasks).post(create_task))
        .route("/tasks/:id", get(get_task))
        .route("/tasks/status/:status", get(list_tasks_by_status))
        .route("/tasks/:id/status", put(transition_task))
        .route("/tasks/:id/claim", post(claim_task))
        .route("/tasks/:id/heartbeat", post(heartbeat))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

async fn create_task(
    State(state): State<AppState>,
    Json(req): Json<CreateTaskRequest>,
) -> Json<Task> {
    Json(state.create_task(req.filename))
}

async fn list_tasks(State(state): State<AppState>) -> Json<Vec<Task>> {
    Json(state.all_tasks())
}

async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
) -> Result<Json<Task>, StatusCode> {
    state.get_task(&id).map(Json).ok_or(StatusCode::NOT_FOUND)
}

// El token de status se deserializa con serde: un valor desconocido
// se rechaza con 400 en lugar de aceptarse en silencio.
async fn list_tasks_by_status(
    State(state): State<AppState>,
    Path(status): Path<TaskStatus>,
) -> Json<Vec<Task>> {
    Json(state.tasks_by_status(status))
}

async fn transition_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(req): Json<TransitionRequest>,
) -> Result<Json<Task>, StatusCode> {
    state.transition(&id, req).map(Json).map_err(|e| match e {
        UpdateError::NotFound => StatusCode::NOT_FOUND,
        UpdateError::Terminal | UpdateError::Conflict => StatusCode::CONFLICT,
    })
}

async fn claim_task(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(req): Json<ClaimRequest>,
) -> Result<Json<Task>, StatusCode> {
    match state.claim(&id, req) {
        Ok(task) => Ok(Json(task)),
        Err(UpdateError::NotFound) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::CONFLICT),
    }
}

async fn heartbeat(
    State(state): State<AppState>,
    Path(id): Path<TaskId>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<Json<HeartbeatResponse>, StatusCode> {
    if state.heartbeat(&id, &req.worker_id) {
        Ok(Json(HeartbeatResponse { ok: true }))
    } else {
        warn!(
            "heartbeat rechazado para la tarea {} del worker {}",
            id, req.worker_id
        );
        Err(StatusCode::FORBIDDEN)
    }
}
