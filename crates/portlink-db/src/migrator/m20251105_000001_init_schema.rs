//! Initial schema: API keys, port pool and connection history

use sea_orm_migration::{prelude::*, schema::*};

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // ============================================================
        // 1. Create api_key table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(ApiKey::Table)
                    .if_not_exists()
                    .col(uuid(ApiKey::Id).primary_key())
                    .col(string_len(ApiKey::Key, 255).not_null().unique_key())
                    .col(string_len(ApiKey::Name, 255).not_null())
                    .col(boolean(ApiKey::IsActive).not_null().default(true))
                    .col(timestamp_with_time_zone_null(ApiKey::ExpiresAt))
                    .col(timestamp_with_time_zone_null(ApiKey::LastUsedAt))
                    .col(
                        timestamp_with_time_zone(ApiKey::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_api_key_key")
                    .table(ApiKey::Table)
                    .col(ApiKey::Key)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 2. Create port_pool table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(PortPool::Table)
                    .if_not_exists()
                    .col(integer(PortPool::Port).primary_key())
                    .col(boolean(PortPool::Reserved).not_null().default(false))
                    .col(timestamp_with_time_zone_null(PortPool::ReservedAt))
                    .col(timestamp_with_time_zone_null(PortPool::ReleasedAt))
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_port_pool_reserved")
                    .table(PortPool::Table)
                    .col(PortPool::Reserved)
                    .to_owned(),
            )
            .await?;

        // ============================================================
        // 3. Create connection table
        // ============================================================
        manager
            .create_table(
                Table::create()
                    .table(Connection::Table)
                    .if_not_exists()
                    .col(uuid(Connection::Id).primary_key())
                    .col(uuid(Connection::ApiKeyId).not_null())
                    .col(string_len(Connection::Address, 255).not_null())
                    .col(integer(Connection::ExternalPort).not_null())
                    .col(integer(Connection::InternalPort).not_null())
                    .col(
                        string_len(Connection::Status, 32)
                            .not_null()
                            .default("connecting"),
                    )
                    .col(timestamp_with_time_zone_null(Connection::LastSeenAt))
                    .col(
                        timestamp_with_time_zone(Connection::CreatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        timestamp_with_time_zone(Connection::UpdatedAt)
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_connection_api_key_id")
                            .from(Connection::Table, Connection::ApiKeyId)
                            .to(ApiKey::Table, ApiKey::Id)
                            .on_delete(ForeignKeyAction::Cascade)
                            .on_update(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_connection_api_key_id")
                    .table(Connection::Table)
                    .col(Connection::ApiKeyId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_connection_status")
                    .table(Connection::Table)
                    .col(Connection::Status)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Connection::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(PortPool::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(ApiKey::Table).to_owned())
            .await?;
        Ok(())
    }
}

#[derive(DeriveIden)]
enum ApiKey {
    Table,
    Id,
    Key,
    Name,
    IsActive,
    ExpiresAt,
    LastUsedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum PortPool {
    Table,
    Port,
    Reserved,
    ReservedAt,
    ReleasedAt,
}

#[derive(DeriveIden)]
enum Connection {
    Table,
    Id,
    ApiKeyId,
    Address,
    ExternalPort,
    InternalPort,
    Status,
    LastSeenAt,
    CreatedAt,
    UpdatedAt,
}
