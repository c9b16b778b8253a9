//! PortPool entity: one row per managed port, toggled between reserved and free

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "port_pool")]
pub struct Model {
    /// Port number (primary key), within the configured range
    #[sea_orm(primary_key, auto_increment = false)]
    pub port: i32,

    /// True while the port is exclusively held by a connection
    pub reserved: bool,

    /// When the current (or last) reservation was taken
    pub reserved_at: Option<ChronoDateTimeUtc>,

    /// When the port was last released; NULL while reserved or never reserved
    pub released_at: Option<ChronoDateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
