//! Connection entity: a brokered session owning two ports for its active lifetime

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "connection")]
pub struct Model {
    /// Connection UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// API key this connection was created with
    pub api_key_id: Uuid,

    /// Broker's externally reachable address at creation time
    pub address: String,

    /// Externally facing port, drawn from the pool
    pub external_port: i32,

    /// Internal port, drawn from the pool
    pub internal_port: i32,

    /// `connecting` / `connected` / `stopped`, or any worker-reported value
    pub status: String,

    /// Last time the downstream worker reported on this connection
    pub last_seen_at: Option<ChronoDateTimeUtc>,

    pub created_at: ChronoDateTimeUtc,

    pub updated_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Connection belongs to an API key
    #[sea_orm(
        belongs_to = "super::api_key::Entity",
        from = "Column::ApiKeyId",
        to = "super::api_key::Column::Id",
        on_update = "Cascade",
        on_delete = "Cascade"
    )]
    ApiKey,
}

impl Related<super::api_key::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ApiKey.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
