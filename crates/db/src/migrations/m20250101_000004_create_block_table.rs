//! Create block table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Block::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Block::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Block::BlockerId).string_len(32).not_null())
                    .col(ColumnDef::new(Block::BlockeeId).string_len(32).not_null())
                    .col(ColumnDef::new(Block::Reason).string_len(256))
                    .col(
                        ColumnDef::new(Block::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_block_blocker")
                            .from(Block::Table, Block::BlockerId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_block_blockee")
                            .from(Block::Table, Block::BlockeeId)
                            .to(User::Table, User::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: (blocker_id, blockee_id)
        manager
            .create_index(
                Index::create()
                    .name("idx_block_blocker_blockee")
                    .table(Block::Table)
                    .col(Block::BlockerId)
                    .col(Block::BlockeeId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: blockee_id (reverse-direction lookups)
        manager
            .create_index(
                Index::create()
                    .name("idx_block_blockee_id")
                    .table(Block::Table)
                    .col(Block::BlockeeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Block::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Block {
    Table,
    Id,
    BlockerId,
    BlockeeId,
    Reason,
    CreatedAt,
}

#[derive(Iden)]
enum User {
    Table,
    Id,
}
