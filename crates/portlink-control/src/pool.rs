//! Port pool store and allocator
//!
//! The `port_pool` table is the sole source of truth for port availability.
//! Reservation goes through one conditional UPDATE inside a transaction, so
//! two concurrent allocations can never be granted overlapping ports: a batch
//! either reserves every requested port or rolls back untouched.

use chrono::{DateTime, Utc};
use portlink_db::entities::port_pool;
use rand::seq::SliceRandom;
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveValue::Set, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, TransactionTrait,
};
use thiserror::Error;
use tracing::{debug, info, warn};

/// How many times an allocation re-selects after losing a reservation race.
const MAX_ALLOCATE_ATTEMPTS: u32 = 5;

/// Batch size for pool initialization inserts, to stay under bind-parameter
/// limits on both SQLite and Postgres.
const INIT_CHUNK_SIZE: usize = 500;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("not enough available ports: requested {requested}, available {available}")]
    Exhausted { requested: usize, available: usize },

    #[error("port reservation kept conflicting after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("port pool store unavailable: {0}")]
    StoreUnavailable(#[from] DbErr),
}

/// Durable record of every managed port and its reservation state.
#[derive(Clone)]
pub struct PortPoolStore {
    db: DatabaseConnection,
}

impl PortPoolStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Idempotently ensure a row exists for every port in `[min, max]`.
    ///
    /// Rows already present (reserved or not) are left untouched, so re-running
    /// with the same range after a restart never disturbs live reservations.
    pub async fn initialize(&self, min: u16, max: u16) -> Result<(), DbErr> {
        let rows: Vec<port_pool::ActiveModel> = (min..=max)
            .map(|port| port_pool::ActiveModel {
                port: Set(i32::from(port)),
                reserved: Set(false),
                reserved_at: Set(None),
                released_at: Set(None),
            })
            .collect();

        for chunk in rows.chunks(INIT_CHUNK_SIZE) {
            port_pool::Entity::insert_many(chunk.to_vec())
                .on_conflict(
                    OnConflict::column(port_pool::Column::Port)
                        .do_nothing()
                        .to_owned(),
                )
                .do_nothing()
                .exec(&self.db)
                .await?;
        }

        info!("Port range {}-{} initialized in the database", min, max);
        Ok(())
    }

    /// All ports currently unreserved, in ascending order.
    pub async fn find_available(&self) -> Result<Vec<u16>, DbErr> {
        let rows = port_pool::Entity::find()
            .filter(port_pool::Column::Reserved.eq(false))
            .order_by_asc(port_pool::Column::Port)
            .all(&self.db)
            .await?;

        Ok(rows.into_iter().map(|row| row.port as u16).collect())
    }

    /// Atomically mark the given ports reserved.
    ///
    /// The UPDATE only matches rows still unreserved; if another caller took
    /// any port of the batch first, fewer rows are affected, the transaction
    /// rolls back and `Ok(false)` is returned. No partial reservation ever
    /// becomes visible.
    pub async fn reserve(&self, ports: &[u16]) -> Result<bool, DbErr> {
        if ports.is_empty() {
            return Ok(true);
        }

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let result = port_pool::Entity::update_many()
            .col_expr(port_pool::Column::Reserved, Expr::value(true))
            .col_expr(port_pool::Column::ReservedAt, Expr::value(Some(now)))
            .col_expr(
                port_pool::Column::ReleasedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(
                port_pool::Column::Port
                    .is_in(ports.iter().map(|&p| i32::from(p)))
                    .and(port_pool::Column::Reserved.eq(false)),
            )
            .exec(&txn)
            .await?;

        if result.rows_affected as usize == ports.len() {
            txn.commit().await?;
            Ok(true)
        } else {
            txn.rollback().await?;
            Ok(false)
        }
    }

    /// Mark the given ports unreserved. Idempotent and commutative; releasing
    /// an already-released port is a no-op.
    pub async fn release(&self, ports: &[u16]) -> Result<(), DbErr> {
        if ports.is_empty() {
            return Ok(());
        }

        port_pool::Entity::update_many()
            .col_expr(port_pool::Column::Reserved, Expr::value(false))
            .col_expr(port_pool::Column::ReleasedAt, Expr::value(Some(Utc::now())))
            .filter(port_pool::Column::Port.is_in(ports.iter().map(|&p| i32::from(p))))
            .exec(&self.db)
            .await?;

        Ok(())
    }

    /// `(reserved, available)` row counts, used by the health endpoint and the
    /// capacity-conservation tests.
    pub async fn counts(&self) -> Result<(u64, u64), DbErr> {
        let reserved = port_pool::Entity::find()
            .filter(port_pool::Column::Reserved.eq(true))
            .count(&self.db)
            .await?;
        let available = port_pool::Entity::find()
            .filter(port_pool::Column::Reserved.eq(false))
            .count(&self.db)
            .await?;
        Ok((reserved, available))
    }
}

/// Hands out mutually exclusive ports from the pool.
#[derive(Clone)]
pub struct PortAllocator {
    store: PortPoolStore,
}

impl PortAllocator {
    pub fn new(store: PortPoolStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PortPoolStore {
        &self.store
    }

    /// Reserve exactly `count` ports, chosen uniformly at random from the
    /// available set.
    ///
    /// Randomization spreads load across the range; it is not a security
    /// measure, so a non-cryptographic shuffle is fine. If the conditional
    /// reserve loses a race against a concurrent allocation, the whole
    /// selection is retried against a fresh snapshot of the available set.
    pub async fn allocate(&self, count: usize) -> Result<Vec<u16>, PoolError> {
        for attempt in 1..=MAX_ALLOCATE_ATTEMPTS {
            let mut available = self.store.find_available().await?;

            if available.len() < count {
                return Err(PoolError::Exhausted {
                    requested: count,
                    available: available.len(),
                });
            }

            available.shuffle(&mut rand::thread_rng());
            let chosen: Vec<u16> = available[..count].to_vec();

            if self.store.reserve(&chosen).await? {
                debug!(?chosen, "allocated ports");
                return Ok(chosen);
            }

            warn!(
                attempt,
                "port reservation conflicted with a concurrent allocation, retrying"
            );
        }

        Err(PoolError::Contention {
            attempts: MAX_ALLOCATE_ATTEMPTS,
        })
    }

    /// Return ports to the pool.
    pub async fn release(&self, ports: &[u16]) -> Result<(), PoolError> {
        self.store.release(ports).await?;
        debug!(?ports, "released ports");
        Ok(())
    }
}
