//! Create engagement table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Engagement::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Engagement::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Engagement::UserId).string_len(32).not_null())
                    .col(
                        ColumnDef::new(Engagement::TargetId)
                            .string_len(32)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Engagement::TargetType)
                            .string_len(16)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Engagement::Kind).string_len(16).not_null())
                    .col(
                        ColumnDef::new(Engagement::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_engagement_user")
                            .from(Engagement::Table, Engagement::UserId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one fact per (user, target, type, kind) tuple
        manager
            .create_index(
                Index::create()
                    .name("idx_engagement_tuple")
                    .table(Engagement::Table)
                    .col(Engagement::UserId)
                    .col(Engagement::TargetId)
                    .col(Engagement::TargetType)
                    .col(Engagement::Kind)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: target_id (per-post totals repair)
        manager
            .create_index(
                Index::create()
                    .name("idx_engagement_target_id")
                    .table(Engagement::Table)
                    .col(Engagement::TargetId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Engagement::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Engagement {
    Table,
    Id,
    UserId,
    TargetId,
    TargetType,
    Kind,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
