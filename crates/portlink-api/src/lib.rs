//! HTTP control surface for the portlink broker
//!
//! Thin axum layer over the connection lifecycle manager: three connection
//! operations plus health, all behind API key auth, with OpenAPI docs served
//! at `/swagger-ui`.

pub mod handlers;
pub mod middleware;
pub mod models;

use axum::{
    http::Method,
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::{net::SocketAddr, sync::Arc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use utoipa::{
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use portlink_control::ConnectionManager;
use sea_orm::DatabaseConnection;

/// Application state shared across handlers
pub struct AppState {
    pub manager: Arc<ConnectionManager>,
    pub db: DatabaseConnection,
}

/// Registers the `x-api-key` header scheme referenced by the path docs
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new(
                    middleware::auth::API_KEY_HEADER,
                ))),
            );
        }
    }
}

/// OpenAPI documentation
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Portlink Broker API",
        version = "0.1.0",
        description = "REST API for brokering ephemeral connections over a shared port pool",
        contact(
            name = "Portlink Team",
            email = "team@portlink.io"
        )
    ),
    paths(
        handlers::create_connection,
        handlers::list_connections,
        handlers::stop_connection,
        handlers::update_connection,
        handlers::health_check,
    ),
    components(
        schemas(
            models::ErrorResponse,
            models::ConnectionData,
            models::ConnectionListItem,
            models::CreateConnectionResponse,
            models::OutcomeResponse,
            models::ListConnectionsResponse,
            models::UpdateConnectionRequest,
            models::HealthResponse,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "connections", description = "Connection lifecycle endpoints"),
        (name = "system", description = "System health and info endpoints")
    )
)]
struct ApiDoc;

/// API server configuration
pub struct ApiServerConfig {
    /// Address to bind the API server
    pub bind_addr: SocketAddr,
    /// Enable CORS (for development)
    pub enable_cors: bool,
}

impl Default for ApiServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:4000".parse().expect("valid default bind addr"),
            enable_cors: false,
        }
    }
}

/// API Server
pub struct ApiServer {
    config: ApiServerConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    /// Create a new API server
    pub fn new(
        config: ApiServerConfig,
        manager: Arc<ConnectionManager>,
        db: DatabaseConnection,
    ) -> Self {
        let state = Arc::new(AppState { manager, db });

        Self { config, state }
    }

    /// Build the router with all routes
    pub fn build_router(&self) -> Router {
        let api_doc = ApiDoc::openapi();

        // PUBLIC routes (no authentication required)
        let public_router = Router::new()
            .route("/health", get(handlers::health_check))
            .with_state(self.state.clone());

        // PROTECTED routes (require a valid API key)
        let protected_router = Router::new()
            .route(
                "/connection",
                post(handlers::create_connection).get(handlers::list_connections),
            )
            .route(
                "/connection/{id}",
                axum::routing::delete(handlers::stop_connection)
                    .patch(handlers::update_connection),
            )
            .with_state(self.state.clone())
            .layer(axum_middleware::from_fn_with_state(
                self.state.clone(),
                middleware::require_api_key,
            ));

        let router = Router::new()
            .merge(SwaggerUi::new("/swagger-ui").url("/openapi.json", api_doc))
            .merge(public_router)
            .merge(protected_router);

        let mut router = router.layer(TraceLayer::new_for_http());

        if self.config.enable_cors {
            // Machine-to-machine API, no cookies involved
            let cors = CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::PATCH])
                .allow_headers(tower_http::cors::Any)
                .allow_origin(tower_http::cors::Any);
            router = router.layer(cors);
        }

        router
    }

    /// Start the API server
    pub async fn start(self) -> Result<(), anyhow::Error> {
        let router = self.build_router();

        info!("Starting API server on {}", self.config.bind_addr);
        info!(
            "OpenAPI spec: http://{}/openapi.json",
            self.config.bind_addr
        );

        let listener = tokio::net::TcpListener::bind(self.config.bind_addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| anyhow::anyhow!("Server error: {}", e))?;

        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to install shutdown signal handler");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_generation() {
        // Ensure OpenAPI spec can be generated without panics
        let _api_doc = ApiDoc::openapi();
    }
}
