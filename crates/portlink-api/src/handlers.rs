use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use portlink_control::codes;

use crate::middleware::ApiKeyContext;
use crate::models::*;
use crate::AppState;

/// HTTP status for a lifecycle error code.
fn status_for(error: Option<&str>) -> StatusCode {
    match error {
        Some(codes::NO_PORTS_AVAILABLE) => StatusCode::SERVICE_UNAVAILABLE,
        Some(codes::CONNECTION_NOT_FOUND) => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn not_found_outcome() -> (StatusCode, Json<OutcomeResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(OutcomeResponse {
            success: false,
            message: "Connection not found".to_string(),
            data: None,
            error: Some(codes::CONNECTION_NOT_FOUND.to_string()),
        }),
    )
}

/// Create a connection
#[utoipa::path(
    post,
    path = "/connection",
    responses(
        (status = 201, description = "Connection created", body = CreateConnectionResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 503, description = "No ports available", body = CreateConnectionResponse),
        (status = 500, description = "Internal server error", body = CreateConnectionResponse)
    ),
    security(("api_key" = [])),
    tag = "connections"
)]
pub async fn create_connection(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ApiKeyContext>,
) -> (StatusCode, Json<CreateConnectionResponse>) {
    debug!(api_key_id = %ctx.key_id, "creating connection");

    let resp = state.manager.create_connection(ctx.key_id).await;
    let status = if resp.success {
        StatusCode::CREATED
    } else {
        status_for(resp.error_code())
    };

    (status, Json(resp.into()))
}

/// List live connections for the authenticated key
#[utoipa::path(
    get,
    path = "/connection",
    responses(
        (status = 200, description = "Live connections", body = ListConnectionsResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ListConnectionsResponse)
    ),
    security(("api_key" = [])),
    tag = "connections"
)]
pub async fn list_connections(
    State(state): State<Arc<AppState>>,
    Extension(ctx): Extension<ApiKeyContext>,
) -> (StatusCode, Json<ListConnectionsResponse>) {
    let resp = state.manager.list_connections(ctx.key_id).await;
    let status = if resp.success {
        StatusCode::OK
    } else {
        status_for(resp.error_code())
    };

    (status, Json(resp.into()))
}

/// Stop a connection
#[utoipa::path(
    delete,
    path = "/connection/{id}",
    params(
        ("id" = String, Path, description = "Connection id")
    ),
    responses(
        (status = 200, description = "Stop outcome", body = OutcomeResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "Connection not found", body = OutcomeResponse),
        (status = 500, description = "Internal server error", body = OutcomeResponse)
    ),
    security(("api_key" = [])),
    tag = "connections"
)]
pub async fn stop_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> (StatusCode, Json<OutcomeResponse>) {
    debug!(connection_id = %id, "stopping connection");

    let Ok(id) = Uuid::parse_str(&id) else {
        return not_found_outcome();
    };

    let resp = state.manager.stop_connection(id).await;
    let status = if resp.success {
        StatusCode::OK
    } else {
        status_for(resp.error_code())
    };

    (status, Json(resp.into()))
}

/// Update a connection's status
#[utoipa::path(
    patch,
    path = "/connection/{id}",
    params(
        ("id" = String, Path, description = "Connection id")
    ),
    request_body = UpdateConnectionRequest,
    responses(
        (status = 200, description = "Update outcome", body = OutcomeResponse),
        (status = 401, description = "Missing or invalid API key", body = ErrorResponse),
        (status = 404, description = "Connection not found", body = OutcomeResponse),
        (status = 500, description = "Internal server error", body = OutcomeResponse)
    ),
    security(("api_key" = [])),
    tag = "connections"
)]
pub async fn update_connection(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<UpdateConnectionRequest>,
) -> (StatusCode, Json<OutcomeResponse>) {
    debug!(connection_id = %id, status = %body.status, "updating connection status");

    let Ok(id) = Uuid::parse_str(&id) else {
        return not_found_outcome();
    };

    let resp = state
        .manager
        .update_connection_status(id, &body.status)
        .await;
    let status = if resp.success {
        StatusCode::OK
    } else {
        status_for(resp.error_code())
    };

    (status, Json(resp.into()))
}

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 500, description = "Store unreachable", body = ErrorResponse)
    ),
    tag = "system"
)]
pub async fn health_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<HealthResponse>, (StatusCode, Json<ErrorResponse>)> {
    let (reserved, available) = state
        .manager
        .allocator()
        .store()
        .counts()
        .await
        .map_err(|e| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: format!("Database error: {}", e),
                }),
            )
        })?;

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        reserved_ports: reserved,
        available_ports: available,
    }))
}
