//! Persistence layer for the portlink broker
//!
//! SeaORM entities and migrations for the port pool, connection history and
//! API keys, plus `connect`/`migrate` helpers used by the daemon at startup.

pub mod entities;
pub mod migrator;

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use sea_orm_migration::MigratorTrait;

/// Connect to the broker database.
///
/// Store calls carry bounded timeouts so a dead database surfaces as an error
/// instead of hanging request handlers.
pub async fn connect(database_url: &str) -> Result<DatabaseConnection, DbErr> {
    let mut opt = ConnectOptions::new(database_url.to_owned());
    opt.connect_timeout(Duration::from_secs(5))
        .acquire_timeout(Duration::from_secs(5))
        .sqlx_logging(false);

    if database_url.contains(":memory:") {
        // A pooled in-memory SQLite database disappears when its last
        // connection is dropped, so pin the pool to a single live connection.
        opt.max_connections(1)
            .min_connections(1)
            .idle_timeout(Duration::from_secs(86400))
            .max_lifetime(Duration::from_secs(86400));
    } else {
        opt.max_connections(10);
    }

    Database::connect(opt).await
}

/// Run all pending migrations.
pub async fn migrate(db: &DatabaseConnection) -> Result<(), DbErr> {
    migrator::Migrator::up(db, None).await
}
