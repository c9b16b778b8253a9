//! API key authentication middleware
//!
//! Resolves the `x-api-key` header against the persisted `api_key` table and
//! injects the key id into request extensions. Handlers only ever see the
//! boolean outcome: an authorized request carries an `ApiKeyContext`.

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
    Json,
};
use chrono::Utc;
use portlink_db::entities::api_key;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{debug, error};
use uuid::Uuid;

use crate::models::ErrorResponse;
use crate::AppState;

/// Header clients present their key in.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Authenticated key context available to handlers.
#[derive(Debug, Clone)]
pub struct ApiKeyContext {
    /// Id of the resolved API key record
    pub key_id: Uuid,
}

fn unauthorized(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::UNAUTHORIZED,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

/// Require a valid, active, unexpired API key.
///
/// # Errors
/// Returns 401 if the header is missing, the key is unknown, disabled or
/// expired; 500 if the key store is unreachable.
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned)
        .ok_or_else(|| unauthorized("API key missing"))?;

    let record = api_key::Entity::find()
        .filter(api_key::Column::Key.eq(presented))
        .one(&state.db)
        .await
        .map_err(|e| {
            error!(error = %e, "API key lookup failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ErrorResponse {
                    error: "Internal server error".to_string(),
                }),
            )
        })?
        .ok_or_else(|| unauthorized("Invalid API key"))?;

    if !record.is_active {
        return Err(unauthorized("API key disabled"));
    }

    if let Some(expires_at) = record.expires_at {
        if expires_at < Utc::now() {
            return Err(unauthorized("API key expired"));
        }
    }

    let key_id = record.id;

    // Best-effort usage tracking; a failure here must not fail the request
    let mut active: api_key::ActiveModel = record.into();
    active.last_used_at = Set(Some(Utc::now()));
    if let Err(e) = active.update(&state.db).await {
        debug!(error = %e, "failed to record API key usage");
    }

    request.extensions_mut().insert(ApiKeyContext { key_id });

    Ok(next.run(request).await)
}
