//! Block repository.

use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{Block, block};
use pulse_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, ModelTrait,
    QueryFilter, QueryOrder, QuerySelect,
};

/// Block repository for database operations.
#[derive(Clone)]
pub struct BlockRepository {
    db: Arc<DatabaseConnection>,
}

impl BlockRepository {
    /// Create a new block repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a block by blocker and blockee.
    pub async fn find_by_pair(
        &self,
        blocker_id: &str,
        blockee_id: &str,
    ) -> AppResult<Option<block::Model>> {
        Block::find()
            .filter(block::Column::BlockerId.eq(blocker_id))
            .filter(block::Column::BlockeeId.eq(blockee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is blocking another user.
    pub async fn is_blocking(&self, blocker_id: &str, blockee_id: &str) -> AppResult<bool> {
        Ok(self.find_by_pair(blocker_id, blockee_id).await?.is_some())
    }

    /// Check if either user is blocking the other (single query).
    pub async fn is_blocked_between(&self, user_a: &str, user_b: &str) -> AppResult<bool> {
        let found = Block::find()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(block::Column::BlockerId.eq(user_a))
                            .add(block::Column::BlockeeId.eq(user_b)),
                    )
                    .add(
                        Condition::all()
                            .add(block::Column::BlockerId.eq(user_b))
                            .add(block::Column::BlockeeId.eq(user_a)),
                    ),
            )
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(found.is_some())
    }

    /// Get the combined set of users blocked by or blocking a user.
    ///
    /// This is the suppression set applied to all feed and search results.
    pub async fn blocked_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let rows = Block::find()
            .filter(
                Condition::any()
                    .add(block::Column::BlockerId.eq(user_id))
                    .add(block::Column::BlockeeId.eq(user_id)),
            )
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|b| {
                if b.blocker_id == user_id {
                    b.blockee_id
                } else {
                    b.blocker_id
                }
            })
            .collect())
    }

    /// Create a new block.
    pub async fn create(&self, model: block::ActiveModel) -> AppResult<block::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
                AppError::Conflict("block already exists".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Delete a block by pair.
    pub async fn delete_by_pair(&self, blocker_id: &str, blockee_id: &str) -> AppResult<()> {
        let blocking = self.find_by_pair(blocker_id, blockee_id).await?;
        if let Some(b) = blocking {
            b.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Get users that a user is blocking (paginated).
    pub async fn find_blocking(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<block::Model>> {
        let mut query = Block::find()
            .filter(block::Column::BlockerId.eq(user_id))
            .order_by_desc(block::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(block::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_block(id: &str, blocker_id: &str, blockee_id: &str) -> block::Model {
        block::Model {
            id: id.to_string(),
            blocker_id: blocker_id.to_string(),
            blockee_id: blockee_id.to_string(),
            reason: None,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_is_blocking_true() {
        let b = create_test_block("b1", "user1", "user2");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[b.clone()]])
                .into_connection(),
        );

        let repo = BlockRepository::new(db);
        assert!(repo.is_blocking("user1", "user2").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_blocked_between_found() {
        let b = create_test_block("b1", "user2", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[b.clone()]])
                .into_connection(),
        );

        let repo = BlockRepository::new(db);
        assert!(repo.is_blocked_between("user1", "user2").await.unwrap());
    }

    #[tokio::test]
    async fn test_is_blocked_between_not_found() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([Vec::<block::Model>::new()])
                .into_connection(),
        );

        let repo = BlockRepository::new(db);
        assert!(!repo.is_blocked_between("user1", "user2").await.unwrap());
    }

    #[tokio::test]
    async fn test_blocked_ids_merges_both_directions() {
        let outbound = create_test_block("b1", "user1", "user2");
        let inbound = create_test_block("b2", "user3", "user1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[outbound, inbound]])
                .into_connection(),
        );

        let repo = BlockRepository::new(db);
        let ids = repo.blocked_ids("user1").await.unwrap();

        assert_eq!(ids.len(), 2);
        assert!(ids.contains("user2"));
        assert!(ids.contains("user3"));
    }
}
