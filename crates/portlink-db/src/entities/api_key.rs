//! ApiKey entity for authenticating broker clients

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "api_key")]
pub struct Model {
    /// API key UUID (primary key)
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// The opaque key value presented in the `x-api-key` header
    #[sea_orm(unique)]
    pub key: String,

    /// User-defined name for this key
    pub name: String,

    /// Whether the key is active
    pub is_active: bool,

    /// When the key expires (NULL = never expires)
    pub expires_at: Option<ChronoDateTimeUtc>,

    /// When the key was last used
    pub last_used_at: Option<ChronoDateTimeUtc>,

    /// When the key was created
    pub created_at: ChronoDateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Connections created with this key
    #[sea_orm(has_many = "super::connection::Entity")]
    Connection,
}

impl Related<super::connection::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Connection.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
