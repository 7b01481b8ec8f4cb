//! Engagement repository.

use std::collections::HashMap;
use std::sync::Arc;

use crate::entities::{Engagement, engagement};
use pulse_common::{AppError, AppResult};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
};

/// Engagement repository for database operations.
#[derive(Clone)]
pub struct EngagementRepository {
    db: Arc<DatabaseConnection>,
}

impl EngagementRepository {
    /// Create a new engagement repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an engagement fact by its identifying tuple.
    pub async fn find_by_tuple(
        &self,
        user_id: &str,
        target_id: &str,
        target_type: engagement::TargetType,
        kind: engagement::EngagementKind,
    ) -> AppResult<Option<engagement::Model>> {
        Engagement::find()
            .filter(engagement::Column::UserId.eq(user_id))
            .filter(engagement::Column::TargetId.eq(target_id))
            .filter(engagement::Column::TargetType.eq(target_type))
            .filter(engagement::Column::Kind.eq(kind))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if an engagement fact exists.
    pub async fn exists(
        &self,
        user_id: &str,
        target_id: &str,
        target_type: engagement::TargetType,
        kind: engagement::EngagementKind,
    ) -> AppResult<bool> {
        Ok(self
            .find_by_tuple(user_id, target_id, target_type, kind)
            .await?
            .is_some())
    }

    /// Bulk existence check: one query for a whole page of targets.
    ///
    /// Returns a map with an entry for every requested target ID.
    pub async fn bulk_check(
        &self,
        user_id: &str,
        target_ids: &[String],
        target_type: engagement::TargetType,
        kind: engagement::EngagementKind,
    ) -> AppResult<HashMap<String, bool>> {
        let mut result: HashMap<String, bool> = target_ids
            .iter()
            .map(|id| (id.clone(), false))
            .collect();

        if target_ids.is_empty() {
            return Ok(result);
        }

        let rows = Engagement::find()
            .filter(engagement::Column::UserId.eq(user_id))
            .filter(engagement::Column::TargetId.is_in(target_ids.to_vec()))
            .filter(engagement::Column::TargetType.eq(target_type))
            .filter(engagement::Column::Kind.eq(kind))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        for row in rows {
            result.insert(row.target_id, true);
        }

        Ok(result)
    }

    /// Create a new engagement fact.
    ///
    /// A unique-constraint violation maps to [`AppError::Conflict`] so
    /// callers can treat concurrent duplicate likes/bookmarks as idempotent.
    pub async fn create(&self, model: engagement::ActiveModel) -> AppResult<engagement::Model> {
        model.insert(self.db.as_ref()).await.map_err(|e| {
            if matches!(e.sql_err(), Some(sea_orm::SqlErr::UniqueConstraintViolation(_))) {
                AppError::Conflict("engagement already recorded".to_string())
            } else {
                AppError::Database(e.to_string())
            }
        })
    }

    /// Delete an engagement fact by its identifying tuple.
    pub async fn delete_by_tuple(
        &self,
        user_id: &str,
        target_id: &str,
        target_type: engagement::TargetType,
        kind: engagement::EngagementKind,
    ) -> AppResult<bool> {
        let fact = self
            .find_by_tuple(user_id, target_id, target_type, kind)
            .await?;
        if let Some(f) = fact {
            f.delete(self.db.as_ref())
                .await
                .map_err(|e| AppError::Database(e.to_string()))?;
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn create_test_engagement(id: &str, user_id: &str, target_id: &str) -> engagement::Model {
        engagement::Model {
            id: id.to_string(),
            user_id: user_id.to_string(),
            target_id: target_id.to_string(),
            target_type: engagement::TargetType::Post,
            kind: engagement::EngagementKind::Like,
            created_at: Utc::now().into(),
        }
    }

    #[tokio::test]
    async fn test_exists_true() {
        let fact = create_test_engagement("e1", "user1", "post1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[fact.clone()]])
                .into_connection(),
        );

        let repo = EngagementRepository::new(db);
        let result = repo
            .exists(
                "user1",
                "post1",
                engagement::TargetType::Post,
                engagement::EngagementKind::Like,
            )
            .await
            .unwrap();

        assert!(result);
    }

    #[tokio::test]
    async fn test_bulk_check_defaults_to_false() {
        let fact = create_test_engagement("e1", "user1", "post1");

        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[fact.clone()]])
                .into_connection(),
        );

        let repo = EngagementRepository::new(db);
        let targets = vec!["post1".to_string(), "post2".to_string()];
        let result = repo
            .bulk_check(
                "user1",
                &targets,
                engagement::TargetType::Post,
                engagement::EngagementKind::Like,
            )
            .await
            .unwrap();

        assert_eq!(result.len(), 2);
        assert_eq!(result.get("post1"), Some(&true));
        assert_eq!(result.get("post2"), Some(&false));
    }

    #[tokio::test]
    async fn test_bulk_check_empty_targets_skips_query() {
        let db = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());

        let repo = EngagementRepository::new(db);
        let result = repo
            .bulk_check(
                "user1",
                &[],
                engagement::TargetType::Post,
                engagement::EngagementKind::Bookmark,
            )
            .await
            .unwrap();

        assert!(result.is_empty());
    }
}
