//! Mutual-connection calculator.
//!
//! Batch-computes, for a set of search candidates, how many of the
//! searcher's follow-targets each candidate also follows. Two queries
//! total regardless of candidate count.

use pulse_common::AppResult;
use pulse_db::repositories::FollowRepository;
use std::collections::{HashMap, HashSet};

/// Mutual-connection calculator.
#[derive(Clone)]
pub struct MutualConnectionService {
    follow_repo: FollowRepository,
    /// Above this many outbound follows the computation is skipped and every
    /// candidate reports zero mutuals. A documented approximation, not a
    /// correctness violation.
    ceiling: usize,
}

impl MutualConnectionService {
    /// Create a new calculator with the given fan-out ceiling.
    #[must_use]
    pub const fn new(follow_repo: FollowRepository, ceiling: usize) -> Self {
        Self {
            follow_repo,
            ceiling,
        }
    }

    /// Compute mutual-connection counts for each candidate.
    ///
    /// Every candidate ID maps to a count; absent graph data means zero.
    pub async fn mutual_counts(
        &self,
        searcher_id: &str,
        candidate_ids: &[String],
    ) -> AppResult<HashMap<String, u32>> {
        let mut counts: HashMap<String, u32> =
            candidate_ids.iter().map(|id| (id.clone(), 0)).collect();

        if candidate_ids.is_empty() {
            return Ok(counts);
        }

        let searcher_set = self.follow_repo.following_ids(searcher_id).await?;

        if searcher_set.is_empty() {
            return Ok(counts);
        }
        if searcher_set.len() > self.ceiling {
            tracing::debug!(
                searcher_id = %searcher_id,
                following = searcher_set.len(),
                ceiling = self.ceiling,
                "Skipping mutual computation above fan-out ceiling"
            );
            return Ok(counts);
        }

        // One batched query for the full following-set of every candidate
        let edges = self
            .follow_repo
            .find_following_of_many(candidate_ids)
            .await?;

        let mut candidate_sets: HashMap<&str, HashSet<&str>> = HashMap::new();
        for edge in &edges {
            candidate_sets
                .entry(edge.follower_id.as_str())
                .or_default()
                .insert(edge.followee_id.as_str());
        }

        for (candidate_id, count) in &mut counts {
            if let Some(candidate_set) = candidate_sets.get(candidate_id.as_str()) {
                // Membership checks over the searcher's set, not a full
                // pairwise intersection
                let mutuals = searcher_set
                    .iter()
                    .filter(|id| candidate_set.contains(id.as_str()))
                    .count();
                *count = u32::try_from(mutuals).unwrap_or(u32::MAX);
            }
        }

        Ok(counts)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_db::entities::follow;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn edge(follower: &str, followee: &str) -> follow::Model {
        follow::Model {
            id: format!("{follower}-{followee}"),
            follower_id: follower.to_string(),
            followee_id: followee.to_string(),
            status: follow::FollowStatus::Active,
            source: "test".to_string(),
            mutual_follow_at: None,
            created_at: Utc::now().fixed_offset(),
        }
    }

    fn service(db: MockDatabase, ceiling: usize) -> MutualConnectionService {
        MutualConnectionService::new(
            FollowRepository::new(Arc::new(db.into_connection())),
            ceiling,
        )
    }

    #[tokio::test]
    async fn test_empty_candidates_returns_empty_map() {
        let svc = service(MockDatabase::new(DatabaseBackend::Postgres), 2000);
        let counts = svc.mutual_counts("searcher", &[]).await.unwrap();
        assert!(counts.is_empty());
    }

    #[tokio::test]
    async fn test_searcher_follows_nobody_short_circuits() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<follow::Model>::new()]);
        let svc = service(db, 2000);

        let candidates = vec!["c1".to_string(), "c2".to_string()];
        let counts = svc.mutual_counts("searcher", &candidates).await.unwrap();

        assert_eq!(counts.get("c1"), Some(&0));
        assert_eq!(counts.get("c2"), Some(&0));
    }

    #[tokio::test]
    async fn test_fan_out_ceiling_short_circuits() {
        // Searcher follows 3 users but the ceiling is 2
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([vec![
            edge("searcher", "a"),
            edge("searcher", "b"),
            edge("searcher", "c"),
        ]]);
        let svc = service(db, 2);

        let candidates = vec!["c1".to_string()];
        let counts = svc.mutual_counts("searcher", &candidates).await.unwrap();

        assert_eq!(counts.get("c1"), Some(&0));
    }

    #[tokio::test]
    async fn test_mutual_counts_via_set_intersection() {
        // Searcher follows a, b, c. Candidate c1 follows a and b (2 mutual),
        // candidate c2 follows only d (0 mutual).
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![
                edge("searcher", "a"),
                edge("searcher", "b"),
                edge("searcher", "c"),
            ]])
            .append_query_results([vec![
                edge("c1", "a"),
                edge("c1", "b"),
                edge("c2", "d"),
            ]]);
        let svc = service(db, 2000);

        let candidates = vec!["c1".to_string(), "c2".to_string(), "c3".to_string()];
        let counts = svc.mutual_counts("searcher", &candidates).await.unwrap();

        assert_eq!(counts.get("c1"), Some(&2));
        assert_eq!(counts.get("c2"), Some(&0));
        assert_eq!(counts.get("c3"), Some(&0));
    }
}
