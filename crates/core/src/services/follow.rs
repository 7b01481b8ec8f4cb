//! Follow mutation service.
//!
//! The only writer of follow edges. Keeps the denormalized
//! `followers_count`/`following_count` on the user row consistent with the
//! edge table: optimistic increments right after the edge write, plus a
//! [`FollowService::reconcile`] recount path as the repair tool.

use crate::services::count_cache::{CountCache, FollowCounts, FollowState};
use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::follow,
    repositories::{BlockRepository, FollowRepository, UserRepository},
};
use sea_orm::Set;

/// Result of a follow operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowOutcome {
    /// Status of the edge after the operation.
    pub status: follow::FollowStatus,
    /// Both directions are now active.
    pub is_mutual: bool,
}

/// Follow state between a viewer and a target user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FollowStatusView {
    /// Viewer actively follows the target.
    pub is_following: bool,
    /// Both directions are active.
    pub is_mutual: bool,
}

/// Follow mutation service for business logic.
#[derive(Clone)]
pub struct FollowService {
    follow_repo: FollowRepository,
    block_repo: BlockRepository,
    user_repo: UserRepository,
    count_cache: Option<CountCache>,
    id_gen: IdGenerator,
}

impl FollowService {
    /// Create a new follow service without a cache tier.
    #[must_use]
    pub fn new(
        follow_repo: FollowRepository,
        block_repo: BlockRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            follow_repo,
            block_repo,
            user_repo,
            count_cache: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Attach the best-effort count cache.
    pub fn set_count_cache(&mut self, cache: CountCache) {
        self.count_cache = Some(cache);
    }

    /// Follow a user.
    ///
    /// Idempotent: re-following an existing active edge returns the current
    /// state without a duplicate write or count change. A duplicate-key
    /// conflict from a concurrent retry is treated the same way.
    pub async fn follow(
        &self,
        follower_id: &str,
        target_id: &str,
        source: &str,
    ) -> AppResult<FollowOutcome> {
        if follower_id == target_id {
            return Err(AppError::SelfFollow);
        }

        if self
            .block_repo
            .is_blocked_between(follower_id, target_id)
            .await?
        {
            return Err(AppError::Blocked(
                "Cannot follow across a block".to_string(),
            ));
        }

        // Idempotent fast path: edge already active
        if let Some(existing) = self
            .follow_repo
            .find_active_pair(follower_id, target_id)
            .await?
        {
            return Ok(FollowOutcome {
                status: existing.status,
                is_mutual: existing.mutual_follow_at.is_some(),
            });
        }

        // Both users must exist before we write an edge
        self.user_repo.get_by_id(follower_id).await?;
        self.user_repo.get_by_id(target_id).await?;

        let model = follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_id: Set(follower_id.to_string()),
            followee_id: Set(target_id.to_string()),
            status: Set(follow::FollowStatus::Active),
            source: Set(source.to_string()),
            mutual_follow_at: Set(None),
            created_at: Set(Utc::now().fixed_offset()),
        };

        match self.follow_repo.create(model).await {
            Ok(_) => {}
            // Concurrent retry hit the unique (follower, followee) index:
            // someone already created this edge, so the end state is the same
            Err(AppError::Conflict(_)) => {
                tracing::debug!(
                    follower_id = %follower_id,
                    target_id = %target_id,
                    "Duplicate follow edge, treating as already following"
                );
                let existing = self
                    .follow_repo
                    .find_active_pair(follower_id, target_id)
                    .await?;
                return Ok(FollowOutcome {
                    status: follow::FollowStatus::Active,
                    is_mutual: existing.is_some_and(|e| e.mutual_follow_at.is_some()),
                });
            }
            Err(e) => return Err(e),
        }

        // Optimistic fast path; reconcile() is the authoritative repair
        self.user_repo
            .increment_following_count(follower_id)
            .await?;
        self.user_repo.increment_followers_count(target_id).await?;

        // Reverse edge active means the pair just became mutual; stamp both
        // sides with the same date
        let reverse = self
            .follow_repo
            .find_active_pair(target_id, follower_id)
            .await?;
        let is_mutual = reverse.is_some();
        if is_mutual {
            let now = Some(Utc::now().fixed_offset());
            self.follow_repo
                .set_mutual_date(follower_id, target_id, now)
                .await?;
            self.follow_repo
                .set_mutual_date(target_id, follower_id, now)
                .await?;
        }

        self.invalidate_cache(follower_id, target_id).await;

        tracing::info!(
            follower_id = %follower_id,
            target_id = %target_id,
            is_mutual = is_mutual,
            "Created follow edge"
        );

        Ok(FollowOutcome {
            status: follow::FollowStatus::Active,
            is_mutual,
        })
    }

    /// Unfollow a user.
    ///
    /// Hard-deletes the edge, decrements both counts (floored at zero), and
    /// clears the mutual date on the reverse edge if present.
    pub async fn unfollow(&self, follower_id: &str, target_id: &str) -> AppResult<()> {
        if self
            .follow_repo
            .find_active_pair(follower_id, target_id)
            .await?
            .is_none()
        {
            return Err(AppError::NotFollowing);
        }

        self.follow_repo
            .delete_by_pair(follower_id, target_id)
            .await?;

        self.user_repo
            .decrement_following_count(follower_id)
            .await?;
        self.user_repo.decrement_followers_count(target_id).await?;

        // The reverse edge, if any, is no longer mutual
        if self
            .follow_repo
            .find_active_pair(target_id, follower_id)
            .await?
            .is_some()
        {
            self.follow_repo
                .set_mutual_date(target_id, follower_id, None)
                .await?;
        }

        self.invalidate_cache(follower_id, target_id).await;

        tracing::info!(
            follower_id = %follower_id,
            target_id = %target_id,
            "Removed follow edge"
        );

        Ok(())
    }

    /// Get the follow state between a viewer and a target.
    ///
    /// Serves from the count cache when possible; both direction lookups are
    /// issued concurrently on a miss.
    pub async fn follow_status(
        &self,
        viewer_id: &str,
        target_id: &str,
    ) -> AppResult<FollowStatusView> {
        if let Some(cache) = self.cache() {
            match cache.get_follow_state(viewer_id, target_id).await {
                Ok(Some(state)) => {
                    return Ok(FollowStatusView {
                        is_following: state.is_following,
                        is_mutual: state.is_mutual,
                    });
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(error = %e, "Follow state cache read failed"),
            }
        }

        let (forward, reverse) = tokio::join!(
            self.follow_repo.find_active_pair(viewer_id, target_id),
            self.follow_repo.find_active_pair(target_id, viewer_id),
        );
        let forward = forward?;
        let reverse = reverse?;

        let view = FollowStatusView {
            is_following: forward.is_some(),
            is_mutual: forward.is_some() && reverse.is_some(),
        };

        if let Some(cache) = self.cache() {
            let state = FollowState {
                is_following: view.is_following,
                is_mutual: view.is_mutual,
            };
            if let Err(e) = cache.set_follow_state(viewer_id, target_id, state).await {
                tracing::warn!(error = %e, "Follow state cache write failed");
            }
        }

        Ok(view)
    }

    /// Recompute both denormalized counts for a user from the edge table
    /// and write them back.
    ///
    /// The operational repair tool for count drift; also keeps the cache
    /// warm with the recomputed values.
    pub async fn reconcile(&self, user_id: &str) -> AppResult<FollowCounts> {
        let (followers, following) = tokio::join!(
            self.follow_repo.count_followers(user_id),
            self.follow_repo.count_following(user_id),
        );
        let followers = i64::try_from(followers?).unwrap_or(i64::MAX);
        let following = i64::try_from(following?).unwrap_or(i64::MAX);

        self.user_repo
            .set_follow_counts(user_id, followers, following)
            .await?;

        let counts = FollowCounts {
            followers,
            following,
        };

        if let Some(cache) = self.cache() {
            if let Err(e) = cache.set_counts(user_id, counts).await {
                tracing::warn!(error = %e, "Count cache write failed");
            }
        }

        tracing::info!(
            user_id = %user_id,
            followers = followers,
            following = following,
            "Reconciled follow counts"
        );

        Ok(counts)
    }

    /// Get users that a user is following (paginated).
    pub async fn get_following(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        self.follow_repo
            .find_following(user_id, limit, until_id)
            .await
    }

    /// Get followers of a user (paginated).
    pub async fn get_followers(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        self.follow_repo
            .find_followers(user_id, limit, until_id)
            .await
    }

    /// Check if a user is actively following another.
    pub async fn is_following(&self, follower_id: &str, followee_id: &str) -> AppResult<bool> {
        self.follow_repo
            .is_following(follower_id, followee_id)
            .await
    }

    fn cache(&self) -> Option<&CountCache> {
        self.count_cache.as_ref().filter(|c| c.available())
    }

    /// Best-effort invalidation of everything a follow mutation touches.
    async fn invalidate_cache(&self, user_a: &str, user_b: &str) {
        if let Some(cache) = self.cache() {
            if let Err(e) = cache.invalidate_pair(user_a, user_b).await {
                tracing::warn!(error = %e, "Count cache invalidation failed");
            }
        }
    }
}
