//! Fabric RPC Handlers
//!
//! HTTP endpoints exposing the local `MemoryManager` to peers. Each handler
//! decodes its bincode body, calls into the manager, and maps the error
//! kinds onto HTTP statuses; the remote read/write handlers re-enter the
//! manager's own routing, so a request for a range this node no longer owns
//! is forwarded onward rather than rejected.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::Extension;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::de::DeserializeOwned;
use sysinfo::System;

use super::protocol::*;
use crate::error::MemoryError;
use crate::memory::MemoryManager;

/// Assembles the full per-node router.
pub fn router(manager: Arc<MemoryManager>) -> Router {
    Router::new()
        .route(ENDPOINT_READ_MEMORY, post(handle_read_memory))
        .route(ENDPOINT_WRITE_MEMORY, post(handle_write_memory))
        .route(ENDPOINT_TRANSFER_OWNERSHIP, post(handle_transfer_ownership))
        .route(ENDPOINT_RUN_TASK, post(handle_run_task))
        .route(ENDPOINT_HEALTH, get(handle_health))
        .layer(Extension(manager))
}

fn status_for(err: &MemoryError) -> StatusCode {
    match err {
        MemoryError::Unmapped(_) | MemoryError::NotAllocated(_) | MemoryError::UnknownPeer(_) => {
            StatusCode::NOT_FOUND
        }
        MemoryError::OutOfBounds { .. }
        | MemoryError::RangeTooSmall { .. }
        | MemoryError::LayoutOverlap => StatusCode::BAD_REQUEST,
        MemoryError::NoCapacity(_) => StatusCode::INSUFFICIENT_STORAGE,
        MemoryError::Transport(_) => StatusCode::BAD_GATEWAY,
    }
}

fn decode_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, Response> {
    bincode::deserialize(body).map_err(|e| {
        tracing::error!("Failed to decode request body: {}", e);
        (StatusCode::BAD_REQUEST, e.to_string()).into_response()
    })
}

fn encode_response<T: serde::Serialize>(value: &T) -> Response {
    match bincode::serialize(value) {
        Ok(payload) => (StatusCode::OK, payload).into_response(),
        Err(e) => {
            tracing::error!("Failed to encode response: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}

/// Serves a peer's read of a range this node owns (or forwards once more if
/// ownership moved on in the meantime).
pub async fn handle_read_memory(
    Extension(manager): Extension<Arc<MemoryManager>>,
    body: Bytes,
) -> Response {
    let request: ReadMemoryRequest = match decode_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match manager.read(request.address, request.size).await {
        Ok(data) => encode_response(&ReadMemoryResponse { data }),
        Err(e) => {
            tracing::error!("Remote read at {:#x} failed: {}", request.address, e);
            (status_for(&e), e.to_string()).into_response()
        }
    }
}

/// Serves a peer's write into a range this node owns.
pub async fn handle_write_memory(
    Extension(manager): Extension<Arc<MemoryManager>>,
    body: Bytes,
) -> Response {
    let request: WriteMemoryRequest = match decode_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match manager.write(request.address, &request.data).await {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!("Remote write at {:#x} failed: {}", request.address, e);
            (status_for(&e), e.to_string()).into_response()
        }
    }
}

/// Applies an ownership change announced by a peer to the local table.
pub async fn handle_transfer_ownership(
    Extension(manager): Extension<Arc<MemoryManager>>,
    body: Bytes,
) -> Response {
    let request: TransferOwnershipRequest = match decode_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    match manager.apply_transfer(request.start, request.size, &request.new_owner) {
        Ok(()) => StatusCode::OK.into_response(),
        Err(e) => {
            tracing::error!(
                "Applying transfer of [{:#x}, +{}) to {} failed: {}",
                request.start,
                request.size,
                request.new_owner,
                e
            );
            (status_for(&e), e.to_string()).into_response()
        }
    }
}

/// Accepts a task submission. Execution is delegated to the interpreter
/// sidecar; this handler only acknowledges the message.
pub async fn handle_run_task(body: Bytes) -> Response {
    let request: RunTaskRequest = match decode_body(&body) {
        Ok(request) => request,
        Err(response) => return response,
    };

    tracing::info!("Accepted task {} ({})", request.id, request.code_type);
    encode_response(&RunTaskResponse {
        result: format!("task {} executed", request.id),
        error: None,
    })
}

/// Liveness and capacity snapshot; also the target of peer connect probes.
pub async fn handle_health(
    Extension(manager): Extension<Arc<MemoryManager>>,
) -> Json<HealthResponse> {
    let mut sys = System::new();
    sys.refresh_memory();
    // sysinfo returns bytes for memory values.
    let mem_total_mb = sys.total_memory() / (1024 * 1024);
    let mem_used_mb = sys.used_memory() / (1024 * 1024);

    Json(HealthResponse {
        name: manager.name().to_string(),
        capacity: manager.capacity(),
        usage: manager.usage(),
        soft_limit: manager.soft_limit(),
        mem_used_mb,
        mem_total_mb,
    })
}
