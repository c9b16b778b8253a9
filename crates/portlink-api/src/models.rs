//! API models for the connection control surface
//!
//! The wire shapes here are compatibility contracts: the tagged
//! `{success, message, data?, error?}` envelope and the camelCase connection
//! fields match what existing clients of the broker parse.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use portlink_control::{ConnectionDetails, ConnectionSummary, ServiceResponse};

/// Bare error body used by the auth middleware (401/500)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Human-readable error description
    pub error: String,
}

/// Connection fields returned on create
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionData {
    /// Connection id
    pub id: Uuid,
    /// Broker address clients should reach
    pub address: String,
    /// Externally facing port
    pub external_port: u16,
    /// Internal port
    pub internal_port: u16,
    /// Current status (`connecting` right after create)
    pub status: String,
}

impl From<ConnectionDetails> for ConnectionData {
    fn from(details: ConnectionDetails) -> Self {
        Self {
            id: details.id,
            address: details.address,
            external_port: details.external_port,
            internal_port: details.internal_port,
            status: details.status,
        }
    }
}

/// Connection fields returned when listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionListItem {
    pub id: Uuid,
    pub status: String,
    pub address: String,
    pub external_port: u16,
    pub internal_port: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<ConnectionSummary> for ConnectionListItem {
    fn from(summary: ConnectionSummary) -> Self {
        Self {
            id: summary.id,
            status: summary.status,
            address: summary.address,
            external_port: summary.external_port,
            internal_port: summary.internal_port,
            last_seen_at: summary.last_seen_at,
            created_at: summary.created_at,
        }
    }
}

/// Tagged result envelope for connection operations
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateConnectionResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<ConnectionData>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ServiceResponse<ConnectionDetails>> for CreateConnectionResponse {
    fn from(resp: ServiceResponse<ConnectionDetails>) -> Self {
        Self {
            success: resp.success,
            message: resp.message,
            data: resp.data.map(ConnectionData::from),
            error: resp.error,
        }
    }
}

/// Tagged result envelope for stop/update
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OutcomeResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ServiceResponse<bool>> for OutcomeResponse {
    fn from(resp: ServiceResponse<bool>) -> Self {
        Self {
            success: resp.success,
            message: resp.message,
            data: resp.data,
            error: resp.error,
        }
    }
}

/// Tagged result envelope for listing
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ListConnectionsResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Vec<ConnectionListItem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<ServiceResponse<Vec<ConnectionSummary>>> for ListConnectionsResponse {
    fn from(resp: ServiceResponse<Vec<ConnectionSummary>>) -> Self {
        Self {
            success: resp.success,
            message: resp.message,
            data: resp
                .data
                .map(|items| items.into_iter().map(ConnectionListItem::from).collect()),
            error: resp.error,
        }
    }
}

/// Body of `PATCH /connection/{id}`
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateConnectionRequest {
    /// Worker-reported status, stored verbatim
    pub status: String,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// Service health status
    pub status: String,
    /// Service version
    pub version: String,
    /// Ports currently reserved by live connections
    pub reserved_ports: u64,
    /// Ports currently available in the pool
    pub available_ports: u64,
}
