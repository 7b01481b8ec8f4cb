//! Blocking service.
//!
//! A block in either direction suppresses mutual visibility. Creating a
//! block cascade-deletes any follow edges between the two users and
//! recounts both users' denormalized follow counts from the edge table.

use crate::services::count_cache::CountCache;
use chrono::Utc;
use pulse_common::{AppError, AppResult, IdGenerator};
use pulse_db::{
    entities::block,
    repositories::{BlockRepository, FollowRepository, UserRepository},
};
use sea_orm::Set;
use std::collections::HashSet;

/// Blocking service for business logic.
#[derive(Clone)]
pub struct BlockService {
    block_repo: BlockRepository,
    follow_repo: FollowRepository,
    user_repo: UserRepository,
    count_cache: Option<CountCache>,
    id_gen: IdGenerator,
}

impl BlockService {
    /// Create a new blocking service.
    #[must_use]
    pub fn new(
        block_repo: BlockRepository,
        follow_repo: FollowRepository,
        user_repo: UserRepository,
    ) -> Self {
        Self {
            block_repo,
            follow_repo,
            user_repo,
            count_cache: None,
            id_gen: IdGenerator::new(),
        }
    }

    /// Attach the best-effort count cache.
    pub fn set_count_cache(&mut self, cache: CountCache) {
        self.count_cache = Some(cache);
    }

    /// Block a user.
    ///
    /// Removes any follow edges between the pair in both directions and
    /// recounts both users' follow counts. Blocking an already-blocked user
    /// is a no-op.
    pub async fn block(
        &self,
        blocker_id: &str,
        blockee_id: &str,
        reason: Option<String>,
    ) -> AppResult<()> {
        if blocker_id == blockee_id {
            return Err(AppError::BadRequest("Cannot block yourself".to_string()));
        }

        // Both users must exist
        self.user_repo.get_by_id(blocker_id).await?;
        self.user_repo.get_by_id(blockee_id).await?;

        let model = block::ActiveModel {
            id: Set(self.id_gen.generate()),
            blocker_id: Set(blocker_id.to_string()),
            blockee_id: Set(blockee_id.to_string()),
            reason: Set(reason),
            created_at: Set(Utc::now().fixed_offset()),
        };

        match self.block_repo.create(model).await {
            Ok(_) => {}
            Err(AppError::Conflict(_)) => {
                tracing::debug!(
                    blocker_id = %blocker_id,
                    blockee_id = %blockee_id,
                    "Block already exists"
                );
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        // Cascade: a block severs the follow relationship in both directions
        self.follow_repo
            .delete_by_pair(blocker_id, blockee_id)
            .await?;
        self.follow_repo
            .delete_by_pair(blockee_id, blocker_id)
            .await?;

        // Recount-and-set rather than guessing at decrements; the edge
        // table is the source of truth
        self.recount(blocker_id).await?;
        self.recount(blockee_id).await?;

        self.invalidate_cache(blocker_id, blockee_id).await;

        tracing::info!(
            blocker_id = %blocker_id,
            blockee_id = %blockee_id,
            "Created block"
        );

        Ok(())
    }

    /// Unblock a user.
    pub async fn unblock(&self, blocker_id: &str, blockee_id: &str) -> AppResult<()> {
        if self
            .block_repo
            .find_by_pair(blocker_id, blockee_id)
            .await?
            .is_none()
        {
            return Err(AppError::BadRequest("Not blocking this user".to_string()));
        }

        self.block_repo
            .delete_by_pair(blocker_id, blockee_id)
            .await?;

        self.invalidate_cache(blocker_id, blockee_id).await;

        tracing::info!(
            blocker_id = %blocker_id,
            blockee_id = %blockee_id,
            "Removed block"
        );

        Ok(())
    }

    /// Combined set of user IDs blocked by or blocking a user.
    ///
    /// Feed assembly and search subtract this set from every result.
    pub async fn blocked_ids(&self, user_id: &str) -> AppResult<HashSet<String>> {
        self.block_repo.blocked_ids(user_id).await
    }

    /// Whether a block exists in either direction between two users.
    pub async fn is_blocked_between(&self, user_a: &str, user_b: &str) -> AppResult<bool> {
        self.block_repo.is_blocked_between(user_a, user_b).await
    }

    /// Get users that a user is blocking (paginated).
    pub async fn get_blocking(
        &self,
        user_id: &str,
        limit: u64,
        until_id: Option<&str>,
    ) -> AppResult<Vec<block::Model>> {
        self.block_repo.find_blocking(user_id, limit, until_id).await
    }

    /// Recount both follow counts for a user from the edge table.
    async fn recount(&self, user_id: &str) -> AppResult<()> {
        let (followers, following) = tokio::join!(
            self.follow_repo.count_followers(user_id),
            self.follow_repo.count_following(user_id),
        );
        let followers = i64::try_from(followers?).unwrap_or(i64::MAX);
        let following = i64::try_from(following?).unwrap_or(i64::MAX);

        self.user_repo
            .set_follow_counts(user_id, followers, following)
            .await
    }

    async fn invalidate_cache(&self, user_a: &str, user_b: &str) {
        if let Some(cache) = self.count_cache.as_ref().filter(|c| c.available()) {
            if let Err(e) = cache.invalidate_pair(user_a, user_b).await {
                tracing::warn!(error = %e, "Count cache invalidation failed");
            }
        }
    }
}
