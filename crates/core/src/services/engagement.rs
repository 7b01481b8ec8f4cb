//! Engagement service.
//!
//! Likes and bookmarks are existence-only facts keyed by
//! `(user, target, target_type, kind)`; the post row owns the denormalized
//! totals and the derived engagement score. Every like mutation recomputes
//! the score so ranked feeds see fresh numbers.

use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::{engagement, post},
    repositories::{EngagementRepository, PostRepository},
};
use sea_orm::Set;

/// Recency-decayed weighted engagement score.
///
/// `score = (likes + comments*3 + reposts*5 + quotes*4 + views*0.01) / (age_hours + 1)`
#[must_use]
pub fn engagement_score(
    likes: i32,
    comments: i32,
    reposts: i32,
    quotes: i32,
    views: i32,
    age_hours: f64,
) -> f64 {
    let weighted = f64::from(likes)
        + f64::from(comments) * 3.0
        + f64::from(reposts) * 5.0
        + f64::from(quotes) * 4.0
        + f64::from(views) * 0.01;

    weighted / (age_hours.max(0.0) + 1.0)
}

/// Engagement service for business logic.
#[derive(Clone)]
pub struct EngagementService {
    engagement_repo: EngagementRepository,
    post_repo: PostRepository,
    id_gen: IdGenerator,
}

impl EngagementService {
    /// Create a new engagement service.
    #[must_use]
    pub fn new(engagement_repo: EngagementRepository, post_repo: PostRepository) -> Self {
        Self {
            engagement_repo,
            post_repo,
            id_gen: IdGenerator::new(),
        }
    }

    /// Like a post. Returns whether a new like was recorded.
    ///
    /// Idempotent: a duplicate like (including a concurrent retry hitting
    /// the unique tuple index) returns `false` without touching counts.
    pub async fn like(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        let post = self.post_repo.get_by_id(post_id).await?;

        let model = engagement::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            target_id: Set(post_id.to_string()),
            target_type: Set(engagement::TargetType::Post),
            kind: Set(engagement::EngagementKind::Like),
            created_at: Set(Utc::now().fixed_offset()),
        };

        match self.engagement_repo.create(model).await {
            Ok(_) => {}
            Err(AppError::Conflict(_)) => {
                tracing::debug!(user_id = %user_id, post_id = %post_id, "Already liked");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        self.post_repo.increment_likes_count(post_id).await?;
        self.recompute_score(&post, 1).await?;

        Ok(true)
    }

    /// Remove a like. Returns whether a like existed.
    pub async fn unlike(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        let post = self.post_repo.get_by_id(post_id).await?;

        let removed = self
            .engagement_repo
            .delete_by_tuple(
                user_id,
                post_id,
                engagement::TargetType::Post,
                engagement::EngagementKind::Like,
            )
            .await?;
        if !removed {
            return Ok(false);
        }

        self.post_repo.decrement_likes_count(post_id).await?;
        self.recompute_score(&post, -1).await?;

        Ok(true)
    }

    /// Bookmark a post. Returns whether a new bookmark was recorded.
    pub async fn bookmark(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        self.post_repo.get_by_id(post_id).await?;

        let model = engagement::ActiveModel {
            id: Set(self.id_gen.generate()),
            user_id: Set(user_id.to_string()),
            target_id: Set(post_id.to_string()),
            target_type: Set(engagement::TargetType::Post),
            kind: Set(engagement::EngagementKind::Bookmark),
            created_at: Set(Utc::now().fixed_offset()),
        };

        match self.engagement_repo.create(model).await {
            Ok(_) => {}
            Err(AppError::Conflict(_)) => {
                tracing::debug!(user_id = %user_id, post_id = %post_id, "Already bookmarked");
                return Ok(false);
            }
            Err(e) => return Err(e),
        }

        // Bookmarks don't feed the engagement score, only the count
        self.post_repo.increment_bookmarks_count(post_id).await?;

        Ok(true)
    }

    /// Remove a bookmark. Returns whether a bookmark existed.
    pub async fn unbookmark(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        self.post_repo.get_by_id(post_id).await?;

        let removed = self
            .engagement_repo
            .delete_by_tuple(
                user_id,
                post_id,
                engagement::TargetType::Post,
                engagement::EngagementKind::Bookmark,
            )
            .await?;
        if !removed {
            return Ok(false);
        }

        self.post_repo.decrement_bookmarks_count(post_id).await?;

        Ok(true)
    }

    /// Check whether a user has liked a post.
    pub async fn has_liked(&self, user_id: &str, post_id: &str) -> AppResult<bool> {
        self.engagement_repo
            .exists(
                user_id,
                post_id,
                engagement::TargetType::Post,
                engagement::EngagementKind::Like,
            )
            .await
    }

    /// Recompute and store a post's engagement score from a snapshot of the
    /// post row plus the like delta just applied.
    async fn recompute_score(
        &self,
        post: &post::Model,
        likes_delta: i32,
    ) -> AppResult<()> {
        let now = Utc::now().fixed_offset();
        let age_hours = (now - post.created_at).num_minutes() as f64 / 60.0;

        let score = engagement_score(
            (post.likes_count + likes_delta).max(0),
            post.comments_count,
            post.reposts_count,
            post.quotes_count,
            post.views_count,
            age_hours,
        );

        self.post_repo.set_engagement_score(&post.id, score).await
    }
}
