//! Follow repository.

use std::collections::HashSet;
use std::sync::Arc;

use crate::entities::{Follow, follow};
use pulse_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, sea_query::Expr,
};

/// Follow repository for database operations.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a follow edge by follower and followee.
    pub async fn find_by_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find an active follow edge by follower and followee.
    pub async fn find_active_pair(
        &self,
        follower_id: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .filter(follow::Column::Status.eq(follow::FollowStatus::Active))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if a user is actively following another user.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        Ok(self
            .find_active_pair(follower_id, followee_id)
            .await?
            .is_some())
    }

    /// Create a new follow edge.
    ///
    /// A unique-constraint violation on `(follower_id, followee_id)` is
    /// surfaced as [`AppError::Conflict`] so callers can treat a concurrent
    /// duplicate insert as "already following".
    pub async fn create(&self, model: follow::ActiveModel) -> AppResult<follow::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
                AppError::Conflict("follow edge already exists".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Delete a follow edge by pair.
    pub async fn delete_by_pair(&self, follower_id: &str, followee_id: &str) -> AppResult<()> {
        let edge = self.find_by_pair(follower_id, followee_id).await?;
        if let Some(f) = edge {
            f.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
        }
        Ok(())
    }

    /// Stamp or clear the mutual-follow date on an edge.
    pub async fn set_mutual_date(
        &self,
        follower_id: &str,
        followee_id: &str,
        date: Option<chrono::DateTime<chrono::FixedOffset>>,
    ) -> AppResult<()> {
        Follow::update_many()
            .col_expr(follow::Column::MutualFollowAt, Expr::value(date))
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get the full set of user IDs a user actively follows.
    pub async fn following_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        let edges = Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .filter(follow::Column::Status.eq(follow::FollowStatus::Active))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(edges.into_iter().map(|f| f.followee_id).collect())
    }

    /// Get all active outbound edges whose follower is in the candidate set.
    ///
    /// One batched query; the full following-set of each candidate is needed
    /// by the mutual-connection calculator, so no followee filter is applied.
    pub async fn find_following_of_many(
        &self,
        follower_ids: &[String],
    ) -> AppResult<Vec<follow::Model>> {
        if follower_ids.is_empty() {
            return Ok(vec![]);
        }

        Follow::find()
            .filter(follow::Column::FollowerId.is_in(follower_ids.to_vec()))
            .filter(follow::Column::Status.eq(follow::FollowStatus::Active))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the active edges from any of `follower_ids` to a single followee.
    ///
    /// Batched "which of these users follow the viewer" check for search.
    pub async fn find_pairs_to(
        &self,
        follower_ids: &[String],
        followee_id: &str,
    ) -> AppResult<Vec<follow::Model>> {
        if follower_ids.is_empty() {
            return Ok(vec![]);
        }

        Follow::find()
            .filter(follow::Column::FollowerId.is_in(follower_ids.to_vec()))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .filter(follow::Column::Status.eq(follow::FollowStatus::Active))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count active followers of a user (source of truth for the
    /// denormalized `followers_count`).
    pub async fn count_followers(&self, user_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::FolloweeId.eq(user_id))
            .filter(follow::Column::Status.eq(follow::FollowStatus::Active))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count active following of a user (source of truth for the
    /// denormalized `following_count`).
    pub async fn count_following(&self, user_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .filter(follow::Column::Status.eq(follow::FollowStatus::Active))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get users that a user is following (paginated).
    pub async fn find_following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        let mut query = Follow::find()
            .filter(follow::Column::FollowerId.eq(user_id))
            .filter(follow::Column::Status.eq(follow::FollowStatus::Active))
            .order_by_desc(follow::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get users that are following a user (paginated).
    pub async fn find_followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        let mut query = Follow::find()
            .filter(follow::Column::FolloweeId.eq(user_id))
            .filter(follow::Column::Status.eq(follow::FollowStatus::Active))
            .order_by_desc(follow::Column::Id);

        if let Some(id) = until_id {
            query = query.filter(follow::Column::Id.lt(id));
        }

        query
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
