//! Connection lifecycle manager
//!
//! Orchestrates the connection state machine end to end: reserves ports,
//! persists connection state and keeps the downstream worker informed through
//! lifecycle events. `stopped` is the only state driven locally; everything
//! else the worker reports is stored verbatim.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use portlink_db::entities::connection;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QuerySelect,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::events::{EventPublisher, LifecycleEvent};
use crate::pool::{PoolError, PortAllocator};
use crate::response::{codes, ServiceResponse};

pub const STATUS_CONNECTING: &str = "connecting";
pub const STATUS_CONNECTED: &str = "connected";
pub const STATUS_STOPPED: &str = "stopped";
pub const STATUS_ERROR: &str = "error";
pub const STATUS_INTERRUPTED: &str = "interrupted";

/// Each connection needs one external and one internal port.
const PORTS_PER_CONNECTION: usize = 2;

/// Connection fields returned to the caller on create.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub id: Uuid,
    pub address: String,
    pub external_port: u16,
    pub internal_port: u16,
    pub status: String,
}

/// Connection fields returned when listing a key's live connections.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionSummary {
    pub id: Uuid,
    pub status: String,
    pub address: String,
    pub external_port: u16,
    pub internal_port: u16,
    pub last_seen_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<connection::Model> for ConnectionSummary {
    fn from(model: connection::Model) -> Self {
        Self {
            id: model.id,
            status: model.status,
            address: model.address,
            external_port: model.external_port as u16,
            internal_port: model.internal_port as u16,
            last_seen_at: model.last_seen_at,
            created_at: model.created_at,
        }
    }
}

pub struct ConnectionManager {
    db: DatabaseConnection,
    allocator: PortAllocator,
    publisher: Arc<dyn EventPublisher>,
    server_url: String,
}

impl ConnectionManager {
    pub fn new(
        db: DatabaseConnection,
        allocator: PortAllocator,
        publisher: Arc<dyn EventPublisher>,
        config: &BrokerConfig,
    ) -> Self {
        Self {
            db,
            allocator,
            publisher,
            server_url: config.server_url.clone(),
        }
    }

    pub fn allocator(&self) -> &PortAllocator {
        &self.allocator
    }

    /// Create a connection: reserve two ports, persist the row, publish `start`.
    ///
    /// Every failure past allocation releases the reserved ports again, so a
    /// failed create never leaks pool capacity.
    pub async fn create_connection(&self, api_key_id: Uuid) -> ServiceResponse<ConnectionDetails> {
        let ports = match self.allocator.allocate(PORTS_PER_CONNECTION).await {
            Ok(ports) => ports,
            Err(PoolError::Exhausted {
                requested,
                available,
            }) => {
                warn!(requested, available, "connection rejected, pool exhausted");
                return ServiceResponse::err("No ports available", codes::NO_PORTS_AVAILABLE);
            }
            Err(e) => {
                error!(error = %e, "port allocation failed");
                return ServiceResponse::err("Internal server error", codes::SERVER_ERROR);
            }
        };

        let (external_port, internal_port) = (ports[0], ports[1]);
        let id = Uuid::new_v4();
        let now = Utc::now();

        let row = connection::ActiveModel {
            id: Set(id),
            api_key_id: Set(api_key_id),
            address: Set(self.server_url.clone()),
            external_port: Set(i32::from(external_port)),
            internal_port: Set(i32::from(internal_port)),
            status: Set(STATUS_CONNECTING.to_string()),
            last_seen_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        if let Err(e) = row.insert(&self.db).await {
            error!(error = %e, "failed to persist connection, releasing ports");
            self.release_quietly(&ports).await;
            return ServiceResponse::err("Internal server error", codes::SERVER_ERROR);
        }

        let event = LifecycleEvent::start(external_port, internal_port, id.to_string());
        if let Err(e) = self.publisher.publish(&event).await {
            // The worker never heard about this session, so the row must not
            // stay in `connecting` with the ports tied up.
            error!(connection_id = %id, error = %e, "start event publish failed, rolling back");
            self.mark_status(id, STATUS_ERROR).await;
            self.release_quietly(&ports).await;
            return ServiceResponse::err("Internal server error", codes::SERVER_ERROR);
        }

        info!(connection_id = %id, external_port, internal_port, "connection created");

        ServiceResponse::ok(
            "Connection created",
            ConnectionDetails {
                id,
                address: self.server_url.clone(),
                external_port,
                internal_port,
                status: STATUS_CONNECTING.to_string(),
            },
        )
    }

    /// Stop a connection: persist `stopped`, publish `stop`, release the ports.
    ///
    /// Stopping a connection that is already in a terminal state is a no-op
    /// success; ports are never double-released.
    pub async fn stop_connection(&self, id: Uuid) -> ServiceResponse<bool> {
        let conn = match connection::Entity::find_by_id(id).one(&self.db).await {
            Ok(Some(conn)) => conn,
            Ok(None) => {
                return ServiceResponse::err("Connection not found", codes::CONNECTION_NOT_FOUND);
            }
            Err(e) => {
                error!(error = %e, "failed to load connection");
                return ServiceResponse::err("Internal server error", codes::SERVER_ERROR);
            }
        };

        if conn.status != STATUS_CONNECTING && conn.status != STATUS_CONNECTED {
            return ServiceResponse::ok("Connection already stopped", true);
        }

        let ports = [conn.external_port as u16, conn.internal_port as u16];

        let mut active: connection::ActiveModel = conn.clone().into();
        active.status = Set(STATUS_STOPPED.to_string());
        active.updated_at = Set(Utc::now());
        if let Err(e) = active.update(&self.db).await {
            error!(connection_id = %id, error = %e, "failed to persist stop");
            return ServiceResponse::err("Internal server error", codes::SERVER_ERROR);
        }

        // A failed stop publish is logged but must not leave the ports reserved.
        let event = LifecycleEvent::stop(ports[0], ports[1], id.to_string());
        if let Err(e) = self.publisher.publish(&event).await {
            warn!(connection_id = %id, error = %e, "stop event publish failed");
        }

        self.release_quietly(&ports).await;

        info!(connection_id = %id, "connection stopped");
        ServiceResponse::ok("Connection stopped", true)
    }

    /// Persist a worker-reported status verbatim.
    ///
    /// The worker is the authority on `connected` and its failure substates;
    /// no transition validation happens here.
    pub async fn update_connection_status(&self, id: Uuid, status: &str) -> ServiceResponse<bool> {
        let conn = match connection::Entity::find_by_id(id).one(&self.db).await {
            Ok(Some(conn)) => conn,
            Ok(None) => {
                return ServiceResponse::err("Connection not found", codes::CONNECTION_NOT_FOUND);
            }
            Err(e) => {
                error!(error = %e, "failed to load connection");
                return ServiceResponse::err("Internal server error", codes::SERVER_ERROR);
            }
        };

        let now = Utc::now();
        let mut active: connection::ActiveModel = conn.into();
        active.status = Set(status.to_string());
        active.last_seen_at = Set(Some(now));
        active.updated_at = Set(now);

        if let Err(e) = active.update(&self.db).await {
            error!(connection_id = %id, error = %e, "failed to persist status update");
            return ServiceResponse::err("Internal server error", codes::SERVER_ERROR);
        }

        ServiceResponse::ok("Connection updated", true)
    }

    /// Live (non-terminal) connections for an API key, capped at 500 rows.
    pub async fn list_connections(&self, api_key_id: Uuid) -> ServiceResponse<Vec<ConnectionSummary>> {
        let result = connection::Entity::find()
            .filter(connection::Column::ApiKeyId.eq(api_key_id))
            .filter(connection::Column::Status.is_not_in([
                STATUS_STOPPED,
                STATUS_ERROR,
                STATUS_INTERRUPTED,
            ]))
            .limit(500)
            .all(&self.db)
            .await;

        match result {
            Ok(rows) => ServiceResponse::ok(
                "Connections listed",
                rows.into_iter().map(ConnectionSummary::from).collect(),
            ),
            Err(e) => {
                error!(error = %e, "failed to list connections");
                ServiceResponse::err("Internal server error", codes::SERVER_ERROR)
            }
        }
    }

    async fn mark_status(&self, id: Uuid, status: &str) {
        let active = connection::ActiveModel {
            id: Set(id),
            status: Set(status.to_string()),
            updated_at: Set(Utc::now()),
            ..Default::default()
        };
        if let Err(e) = active.update(&self.db).await {
            error!(connection_id = %id, error = %e, "failed to mark connection {}", status);
        }
    }

    async fn release_quietly(&self, ports: &[u16]) {
        if let Err(e) = self.allocator.release(ports).await {
            error!(?ports, error = %e, "failed to release ports, pool capacity leaked until retried");
        }
    }
}
