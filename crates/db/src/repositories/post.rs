//! Post repository.

use std::sync::Arc;

use crate::entities::{Post, post};
use pulse_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect,
    sea_query::Expr, sea_query::extension::postgres::PgExpr,
};

/// Compound pagination cursor: posts strictly older than `(created_at, id)`.
///
/// Keyset pagination stays stable under concurrent inserts where offset
/// pagination would duplicate or skip rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostCursor {
    /// `created_at` of the last post on the previous page.
    pub created_at: chrono::DateTime<chrono::FixedOffset>,
    /// Tie-break ID of the last post on the previous page.
    pub post_id: String,
}

/// Post repository for database operations.
#[derive(Clone)]
pub struct PostRepository {
    db: Arc<DatabaseConnection>,
}

impl PostRepository {
    /// Create a new post repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find a post by ID.
    pub async fn find_by_id(&self, id: &str) -> AppResult<Option<post::Model>> {
        Post::find_by_id(id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a post by ID, returning an error if not found.
    pub async fn get_by_id(&self, id: &str) -> AppResult<post::Model> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::PostNotFound(id.to_string()))
    }

    /// Find posts by IDs.
    pub async fn find_by_ids(&self, ids: &[String]) -> AppResult<Vec<post::Model>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        Post::find()
            .filter(post::Column::Id.is_in(ids.to_vec()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the chronological following feed for a resolved author set.
    ///
    /// The author set is the viewer's active followees plus the viewer,
    /// already filtered against the block set, so followers-privacy posts
    /// from these authors are visible by construction.
    pub async fn find_following_feed(
        &self,
        author_ids: &[String],
        limit: u64,
        cursor: Option<&PostCursor>,
    ) -> AppResult<Vec<post::Model>> {
        if author_ids.is_empty() {
            return Ok(vec![]);
        }

        let mut condition = Condition::all()
            .add(post::Column::AuthorId.is_in(author_ids.to_vec()))
            .add(post::Column::Status.eq(post::PostStatus::Active))
            .add(
                Condition::any()
                    .add(post::Column::Privacy.eq(post::Privacy::Public))
                    .add(post::Column::Privacy.eq(post::Privacy::Followers)),
            );

        // Strictly older than the cursor, ties broken by id
        if let Some(c) = cursor {
            condition = condition.add(
                Condition::any()
                    .add(post::Column::CreatedAt.lt(c.created_at))
                    .add(
                        Condition::all()
                            .add(post::Column::CreatedAt.eq(c.created_at))
                            .add(post::Column::Id.lt(c.post_id.clone())),
                    ),
            );
        }

        Post::find()
            .filter(condition)
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get recent public posts ranked by engagement score (for-you candidates).
    pub async fn find_recent_ranked(
        &self,
        since: chrono::DateTime<chrono::FixedOffset>,
        exclude_author_ids: &[String],
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        let mut condition = Condition::all()
            .add(post::Column::Privacy.eq(post::Privacy::Public))
            .add(post::Column::Status.eq(post::PostStatus::Active))
            .add(post::Column::CreatedAt.gte(since));

        if !exclude_author_ids.is_empty() {
            condition = condition.add(post::Column::AuthorId.is_not_in(exclude_author_ids.to_vec()));
        }

        Post::find()
            .filter(condition)
            .order_by_desc(post::Column::EngagementScore)
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get recent posts from a set of authors, chronological (for-you
    /// following supplement).
    pub async fn find_recent_by_authors(
        &self,
        author_ids: &[String],
        since: chrono::DateTime<chrono::FixedOffset>,
        limit: u64,
    ) -> AppResult<Vec<post::Model>> {
        if author_ids.is_empty() {
            return Ok(vec![]);
        }

        Post::find()
            .filter(post::Column::AuthorId.is_in(author_ids.to_vec()))
            .filter(post::Column::Status.eq(post::PostStatus::Active))
            .filter(post::Column::CreatedAt.gte(since))
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get trending posts: recent, public, ordered purely by engagement
    /// score. Plain offset pagination.
    pub async fn find_trending(
        &self,
        since: chrono::DateTime<chrono::FixedOffset>,
        exclude_author_ids: &[String],
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        let mut condition = Condition::all()
            .add(post::Column::Privacy.eq(post::Privacy::Public))
            .add(post::Column::Status.eq(post::PostStatus::Active))
            .add(post::Column::CreatedAt.gte(since));

        if !exclude_author_ids.is_empty() {
            condition = condition.add(post::Column::AuthorId.is_not_in(exclude_author_ids.to_vec()));
        }

        Post::find()
            .filter(condition)
            .order_by_desc(post::Column::EngagementScore)
            .order_by_desc(post::Column::CreatedAt)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get posts by an author, gated by privacy.
    ///
    /// `include_follower_posts` is true for the profile owner and for
    /// viewers with an active follow edge to the owner.
    pub async fn find_by_author(
        &self,
        author_id: &str,
        include_follower_posts: bool,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        let mut condition = Condition::all()
            .add(post::Column::AuthorId.eq(author_id))
            .add(post::Column::Status.eq(post::PostStatus::Active));

        if !include_follower_posts {
            condition = condition.add(post::Column::Privacy.eq(post::Privacy::Public));
        }

        Post::find()
            .filter(condition)
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get public posts carrying a hashtag.
    pub async fn find_by_hashtag(
        &self,
        tag: &str,
        exclude_author_ids: &[String],
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        let tag_json = serde_json::json!([tag.to_lowercase()]);

        let mut condition = Condition::all()
            .add(post::Column::Privacy.eq(post::Privacy::Public))
            .add(post::Column::Status.eq(post::PostStatus::Active))
            .add(Expr::cust_with_values("tags @> $1", [tag_json]));

        if !exclude_author_ids.is_empty() {
            condition = condition.add(post::Column::AuthorId.is_not_in(exclude_author_ids.to_vec()));
        }

        Post::find()
            .filter(condition)
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Search public posts by text (case-insensitive substring).
    pub async fn search_text(
        &self,
        query: &str,
        exclude_author_ids: &[String],
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<post::Model>> {
        let pattern = format!("%{}%", escape_like(query));

        let mut condition = Condition::all()
            .add(post::Column::Privacy.eq(post::Privacy::Public))
            .add(post::Column::Status.eq(post::PostStatus::Active))
            .add(Expr::col(post::Column::Text).ilike(pattern));

        if !exclude_author_ids.is_empty() {
            condition = condition.add(post::Column::AuthorId.is_not_in(exclude_author_ids.to_vec()));
        }

        Post::find()
            .filter(condition)
            .order_by_desc(post::Column::CreatedAt)
            .order_by_desc(post::Column::Id)
            .limit(limit)
            .offset(offset)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Increment like count atomically (single UPDATE query, no fetch).
    pub async fn increment_likes_count(&self, post_id: &str) -> AppResult<()> {
        Post::update_many()
            .col_expr(
                post::Column::LikesCount,
                Expr::col(post::Column::LikesCount).add(1),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Decrement like count atomically, floored at zero.
    pub async fn decrement_likes_count(&self, post_id: &str) -> AppResult<()> {
        Post::update_many()
            .col_expr(
                post::Column::LikesCount,
                Expr::cust("GREATEST(likes_count - 1, 0)"),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Increment bookmark count atomically (single UPDATE query, no fetch).
    pub async fn increment_bookmarks_count(&self, post_id: &str) -> AppResult<()> {
        Post::update_many()
            .col_expr(
                post::Column::BookmarksCount,
                Expr::col(post::Column::BookmarksCount).add(1),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Decrement bookmark count atomically, floored at zero.
    pub async fn decrement_bookmarks_count(&self, post_id: &str) -> AppResult<()> {
        Post::update_many()
            .col_expr(
                post::Column::BookmarksCount,
                Expr::cust("GREATEST(bookmarks_count - 1, 0)"),
            )
            .filter(post::Column::Id.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Set the derived engagement score for a post.
    pub async fn set_engagement_score(&self, post_id: &str, score: f64) -> AppResult<()> {
        Post::update_many()
            .col_expr(post::Column::EngagementScore, Expr::value(score))
            .filter(post::Column::Id.eq(post_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }
}

/// Escape `%` and `_` for use inside a LIKE/ILIKE pattern.
fn escape_like(input: &str) -> String {
    input
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
