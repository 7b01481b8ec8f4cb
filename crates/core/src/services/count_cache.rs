//! Best-effort Redis cache for follower counts and follow-status pairs.
//!
//! The cache is never a correctness dependency: every miss or error falls
//! through to the database, and callers must treat every method here as
//! fallible-and-ignorable. Check [`CountCache::available`] before use.

use fred::clients::Client as RedisClient;
use fred::interfaces::{ClientLike, KeysInterface};
use fred::types::Expiration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Default TTL for cached follower/following counts: 5 minutes.
const COUNTS_TTL_SECS: i64 = 5 * 60;

/// Default TTL for cached pairwise follow state: 2 minutes.
const FOLLOW_STATE_TTL_SECS: i64 = 2 * 60;

/// Cached denormalized counts for a single user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowCounts {
    /// Number of active followers.
    pub followers: i64,
    /// Number of users actively followed.
    pub following: i64,
}

/// Cached follow state for an ordered (viewer, target) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowState {
    /// Viewer actively follows the target.
    pub is_following: bool,
    /// Both directions are active.
    pub is_mutual: bool,
}

/// Follower-count and follow-state cache backed by Redis.
#[derive(Clone)]
pub struct CountCache {
    redis: Arc<RedisClient>,
    counts_ttl_secs: i64,
    follow_state_ttl_secs: i64,
}

impl CountCache {
    /// Create a new count cache with default TTL settings.
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>) -> Self {
        Self {
            redis,
            counts_ttl_secs: COUNTS_TTL_SECS,
            follow_state_ttl_secs: FOLLOW_STATE_TTL_SECS,
        }
    }

    /// Create a new count cache with custom TTLs.
    #[must_use]
    pub const fn with_ttl(redis: Arc<RedisClient>, counts_ttl: Duration, state_ttl: Duration) -> Self {
        Self {
            redis,
            counts_ttl_secs: counts_ttl.as_secs() as i64,
            follow_state_ttl_secs: state_ttl.as_secs() as i64,
        }
    }

    /// Whether the cache can currently serve requests.
    ///
    /// Call sites skip the cache entirely when this is false instead of
    /// waiting on a dead connection.
    #[must_use]
    pub fn available(&self) -> bool {
        self.redis.is_connected()
    }

    fn counts_key(user_id: &str) -> String {
        format!("counts:{user_id}")
    }

    fn follow_key(viewer_id: &str, target_id: &str) -> String {
        format!("follow:{viewer_id}:{target_id}")
    }

    /// Get cached counts for a user. `Ok(None)` on miss.
    pub async fn get_counts(&self, user_id: &str) -> Result<Option<FollowCounts>, CountCacheError> {
        let key = Self::counts_key(user_id);

        let result: Option<String> = self
            .redis
            .get(key)
            .await
            .map_err(|e| CountCacheError::Redis(e.to_string()))?;

        match result {
            Some(json_str) => {
                let counts: FollowCounts = serde_json::from_str(&json_str)
                    .map_err(|e| CountCacheError::Serialization(e.to_string()))?;
                debug!(user_id = %user_id, "Count cache hit");
                Ok(Some(counts))
            }
            None => {
                debug!(user_id = %user_id, "Count cache miss");
                Ok(None)
            }
        }
    }

    /// Store counts for a user.
    pub async fn set_counts(
        &self,
        user_id: &str,
        counts: FollowCounts,
    ) -> Result<(), CountCacheError> {
        let key = Self::counts_key(user_id);
        let json_str = serde_json::to_string(&counts)
            .map_err(|e| CountCacheError::Serialization(e.to_string()))?;

        self.redis
            .set::<(), _, _>(
                key,
                json_str,
                Some(Expiration::EX(self.counts_ttl_secs)),
                None,
                false,
            )
            .await
            .map_err(|e| CountCacheError::Redis(e.to_string()))?;

        Ok(())
    }

    /// Drop cached counts for a user.
    pub async fn invalidate_counts(&self, user_id: &str) -> Result<(), CountCacheError> {
        let key = Self::counts_key(user_id);

        self.redis
            .del::<(), _>(key)
            .await
            .map_err(|e| CountCacheError::Redis(e.to_string()))?;

        Ok(())
    }

    /// Get cached follow state for a (viewer, target) pair. `Ok(None)` on miss.
    pub async fn get_follow_state(
        &self,
        viewer_id: &str,
        target_id: &str,
    ) -> Result<Option<FollowState>, CountCacheError> {
        let key = Self::follow_key(viewer_id, target_id);

        let result: Option<String> = self
            .redis
            .get(key)
            .await
            .map_err(|e| CountCacheError::Redis(e.to_string()))?;

        match result {
            Some(json_str) => {
                let state: FollowState = serde_json::from_str(&json_str)
                    .map_err(|e| CountCacheError::Serialization(e.to_string()))?;
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Store follow state for a (viewer, target) pair.
    pub async fn set_follow_state(
        &self,
        viewer_id: &str,
        target_id: &str,
        state: FollowState,
    ) -> Result<(), CountCacheError> {
        let key = Self::follow_key(viewer_id, target_id);
        let json_str = serde_json::to_string(&state)
            .map_err(|e| CountCacheError::Serialization(e.to_string()))?;

        self.redis
            .set::<(), _, _>(
                key,
                json_str,
                Some(Expiration::EX(self.follow_state_ttl_secs)),
                None,
                false,
            )
            .await
            .map_err(|e| CountCacheError::Redis(e.to_string()))?;

        Ok(())
    }

    /// Drop cached follow state for both directions of a pair.
    pub async fn invalidate_follow_state(
        &self,
        user_a: &str,
        user_b: &str,
    ) -> Result<(), CountCacheError> {
        let keys = vec![
            Self::follow_key(user_a, user_b),
            Self::follow_key(user_b, user_a),
        ];

        self.redis
            .del::<(), _>(keys)
            .await
            .map_err(|e| CountCacheError::Redis(e.to_string()))?;

        Ok(())
    }

    /// Drop every cache entry touched by a follow mutation between two users.
    pub async fn invalidate_pair(&self, user_a: &str, user_b: &str) -> Result<(), CountCacheError> {
        self.invalidate_counts(user_a).await?;
        self.invalidate_counts(user_b).await?;
        self.invalidate_follow_state(user_a, user_b).await?;
        Ok(())
    }
}

/// Count cache error type.
#[derive(Debug, thiserror::Error)]
pub enum CountCacheError {
    /// Redis operation failed.
    #[error("Redis error: {0}")]
    Redis(String),

    /// JSON serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_key_generation() {
        assert_eq!(CountCache::counts_key("u1"), "counts:u1");
    }

    #[test]
    fn test_follow_key_is_direction_sensitive() {
        assert_eq!(CountCache::follow_key("a", "b"), "follow:a:b");
        assert_ne!(
            CountCache::follow_key("a", "b"),
            CountCache::follow_key("b", "a")
        );
    }

    #[test]
    fn test_follow_counts_round_trip() {
        let counts = FollowCounts {
            followers: 10,
            following: 3,
        };
        let json = serde_json::to_string(&counts).unwrap();
        let back: FollowCounts = serde_json::from_str(&json).unwrap();
        assert_eq!(counts, back);
    }
}
