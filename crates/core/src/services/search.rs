//! User search with relevance ranking.
//!
//! Candidates come from a cheap text filter in the store; ranking happens
//! here by blending text match quality, social-graph proximity, and account
//! signals. Social context reads are independent and issued concurrently.

use crate::services::mutuals::MutualConnectionService;
use crate::services::relevance::{score, NormalizedQuery, SocialContext};
use pulse_common::{AppError, AppResult, EngineConfig};
use pulse_db::repositories::{BlockRepository, FollowRepository, UserRepository};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use validator::Validate;

/// Hard cap on candidate over-fetch regardless of requested page depth.
const MAX_CANDIDATE_FETCH: u64 = 200;

/// A user search request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserSearchRequest {
    /// Search query.
    #[validate(length(min = 1, max = 50, message = "Query must be 1-50 characters"))]
    pub query: String,
    /// Page size.
    #[validate(range(min = 1, max = 50, message = "Limit must be 1-50"))]
    pub limit: u64,
    /// Page offset.
    #[serde(default)]
    pub offset: u64,
    /// Searcher, when authenticated; enables the social-graph band.
    #[serde(default)]
    pub viewer_id: Option<String>,
}

/// A ranked search result row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedUser {
    /// User ID.
    pub id: String,
    /// Username.
    pub username: String,
    /// Display name.
    pub display_name: Option<String>,
    /// Avatar URL.
    pub avatar_url: Option<String>,
    /// Verified badge.
    pub is_verified: bool,
    /// Denormalized follower count.
    pub followers_count: i32,
    /// Searcher follows this user.
    pub is_following: bool,
    /// This user follows the searcher.
    pub follows_you: bool,
    /// Both directions active.
    pub is_mutual: bool,
    /// Shared follow-targets with the searcher.
    pub mutual_count: u32,
    /// Composite relevance score.
    pub relevance_score: f64,
}

/// One page of ranked search results.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserSearchResult {
    /// Ranked users for this page.
    pub users: Vec<RankedUser>,
    /// More results exist past this page.
    pub has_more: bool,
    /// Offset of the next page, when `has_more`.
    pub next_offset: Option<u64>,
}

/// User search service.
#[derive(Clone)]
pub struct UserSearchService {
    user_repo: UserRepository,
    follow_repo: FollowRepository,
    block_repo: BlockRepository,
    mutuals: MutualConnectionService,
    config: EngineConfig,
}

impl UserSearchService {
    /// Create a new user search service.
    #[must_use]
    pub const fn new(
        user_repo: UserRepository,
        follow_repo: FollowRepository,
        block_repo: BlockRepository,
        mutuals: MutualConnectionService,
        config: EngineConfig,
    ) -> Self {
        Self {
            user_repo,
            follow_repo,
            block_repo,
            mutuals,
            config,
        }
    }

    /// Search users, ranked by relevance.
    pub async fn search(&self, request: &UserSearchRequest) -> AppResult<UserSearchResult> {
        request.validate()?;

        let query = NormalizedQuery::new(&request.query);
        if query.is_empty() {
            return Err(AppError::Validation("Query must not be empty".to_string()));
        }
        if request.query.trim().len() > self.config.max_query_length {
            return Err(AppError::Validation(format!(
                "Query exceeds {} characters",
                self.config.max_query_length
            )));
        }
        let limit = request.limit.clamp(1, self.config.max_page_size);
        let offset = request.offset;

        // Over-fetch so ranking has enough candidates to page into; the
        // store only pre-sorts by follower count, not relevance
        let fetch_limit = ((offset + limit) * 3).min(MAX_CANDIDATE_FETCH);

        let fut = async {
            let mut candidates = self
                .user_repo
                .search_candidates(query.as_str(), fetch_limit)
                .await?;

            let mut contexts: HashMap<String, SocialContext> = HashMap::new();

            if let Some(viewer_id) = request.viewer_id.as_deref() {
                let blocked = self.block_repo.blocked_ids(viewer_id).await?;
                candidates.retain(|c| !blocked.contains(&c.id));

                let candidate_ids: Vec<String> =
                    candidates.iter().map(|c| c.id.clone()).collect();

                // Independent reads: outbound follow set and inbound edges
                let (following, inbound) = tokio::join!(
                    self.follow_repo.following_ids(viewer_id),
                    self.follow_repo.find_pairs_to(&candidate_ids, viewer_id),
                );
                let following = following?;
                let followers_of_viewer: HashSet<String> =
                    inbound?.into_iter().map(|e| e.follower_id).collect();

                // Mutual counts degrade to zero rather than failing the search
                let mutual_counts = match self
                    .mutuals
                    .mutual_counts(viewer_id, &candidate_ids)
                    .await
                {
                    Ok(counts) => counts,
                    Err(e) => {
                        tracing::warn!(error = %e, "Mutual-connection computation failed");
                        HashMap::new()
                    }
                };

                for candidate in &candidates {
                    contexts.insert(
                        candidate.id.clone(),
                        SocialContext {
                            is_following: following.contains(&candidate.id),
                            follows_you: followers_of_viewer.contains(&candidate.id),
                            mutual_count: mutual_counts.get(&candidate.id).copied().unwrap_or(0),
                        },
                    );
                }
            }

            let now = chrono::Utc::now().fixed_offset();
            let mut ranked: Vec<RankedUser> = candidates
                .into_iter()
                .map(|candidate| {
                    let ctx = contexts.get(&candidate.id).copied().unwrap_or_default();
                    let relevance_score = score(&candidate, &query, &ctx, now);
                    RankedUser {
                        id: candidate.id,
                        username: candidate.username,
                        display_name: candidate.display_name,
                        avatar_url: candidate.avatar_url,
                        is_verified: candidate.is_verified,
                        followers_count: candidate.followers_count,
                        is_following: ctx.is_following,
                        follows_you: ctx.follows_you,
                        is_mutual: ctx.is_mutual(),
                        mutual_count: ctx.mutual_count,
                        relevance_score,
                    }
                })
                .collect();

            sort_ranked(&mut ranked);
            Ok(paginate(ranked, offset, limit))
        };

        tokio::time::timeout(self.config.query_timeout(), fut)
            .await
            .map_err(|_| AppError::QueryTimeout("user search exceeded time budget".to_string()))?
    }
}

/// Descending score, ties broken by descending follower count.
fn sort_ranked(users: &mut [RankedUser]) {
    users.sort_by(|a, b| {
        b.relevance_score
            .partial_cmp(&a.relevance_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.followers_count.cmp(&a.followers_count))
    });
}

/// Slice one page out of the ranked list.
fn paginate(ranked: Vec<RankedUser>, offset: u64, limit: u64) -> UserSearchResult {
    let offset = offset as usize;
    let limit = limit as usize;

    let has_more = ranked.len() > offset + limit;
    let users: Vec<RankedUser> = ranked.into_iter().skip(offset).take(limit).collect();

    UserSearchResult {
        has_more,
        next_offset: has_more.then_some((offset + limit) as u64),
        users,
    }
}
