//! Portlink broker daemon
//!
//! Brokers ephemeral network connections for clients: allocates exclusive
//! port pairs from a database-backed pool and hands lifecycle events to a
//! downstream worker over Kafka.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use portlink_api::{ApiServer, ApiServerConfig};
use portlink_control::{BrokerConfig, ConnectionManager, PortAllocator, PortPoolStore};
use portlink_events::KafkaEventPublisher;

/// Portlink - broker ephemeral connections over a shared port pool
#[derive(Parser, Debug)]
#[command(name = "portlink")]
#[command(about = "Portlink - broker ephemeral connections over a shared port pool")]
#[command(version)]
struct Args {
    /// Port the HTTP control surface listens on
    #[arg(long, env = "PORT", default_value_t = 4000)]
    port: u16,

    /// Database connection URL (SQLite or Postgres)
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite://portlink.db?mode=rwc")]
    database_url: String,

    /// Lowest port managed by the pool (inclusive)
    #[arg(long, env = "PORTRANGEMIN", default_value_t = 6000)]
    port_range_min: u16,

    /// Highest port managed by the pool (inclusive)
    #[arg(long, env = "PORTRANGEMAX", default_value_t = 7000)]
    port_range_max: u16,

    /// This broker's externally reachable address, stored on each connection
    #[arg(long, env = "SERVER_URL")]
    server_url: String,

    /// Kafka bootstrap address for lifecycle events
    #[arg(long, env = "KAFKA_URL", default_value = "kafka:9092")]
    kafka_url: String,

    /// Enable CORS on the API (for development)
    #[arg(long)]
    enable_cors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,
}

fn init_logging(log_level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();

    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!(
        "Starting portlink broker {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH")
    );

    if args.port_range_min > args.port_range_max {
        anyhow::bail!(
            "invalid port range: {} > {}",
            args.port_range_min,
            args.port_range_max
        );
    }

    let config = BrokerConfig {
        port_range_min: args.port_range_min,
        port_range_max: args.port_range_max,
        server_url: args.server_url.clone(),
        kafka_url: args.kafka_url.clone(),
    };

    info!("Connecting to database: {}", args.database_url);
    let db = portlink_db::connect(&args.database_url)
        .await
        .context("Failed to connect to database")?;

    portlink_db::migrate(&db)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run database migrations: {}", e))?;

    // The pool must be fully seeded before the HTTP surface accepts traffic
    let store = PortPoolStore::new(db.clone());
    store
        .initialize(config.port_range_min, config.port_range_max)
        .await
        .context("Failed to initialize port pool")?;
    info!(
        "Port pool ready: {}-{} ({} ports)",
        config.port_range_min,
        config.port_range_max,
        config.pool_size()
    );

    let publisher = Arc::new(
        KafkaEventPublisher::new(&config.kafka_url)
            .context("Failed to create Kafka producer")?,
    );
    info!("Lifecycle events go to Kafka at {}", config.kafka_url);

    let manager = Arc::new(ConnectionManager::new(
        db.clone(),
        PortAllocator::new(store),
        publisher,
        &config,
    ));

    let bind_addr: SocketAddr = ([0, 0, 0, 0], args.port).into();
    let server = ApiServer::new(
        ApiServerConfig {
            bind_addr,
            enable_cors: args.enable_cors,
        },
        manager,
        db,
    );

    server.start().await
}
