//! Feed assembly.
//!
//! Read-only projections over the post store: the chronological following
//! feed, the algorithmic for-you feed, the trending feed, and the filtered
//! hashtag/profile/text-search feeds. Every page gets per-post engagement
//! flags attached through one batched lookup per flag kind.

use pulse_common::{AppError, AppResult, EngineConfig};
use pulse_db::{
    entities::{engagement, post},
    repositories::{BlockRepository, EngagementRepository, FollowRepository, PostCursor, PostRepository},
};
use rand::Rng;
use std::collections::HashSet;
use std::future::Future;

/// A post annotated with the viewer's engagement state.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPost {
    /// The underlying post.
    pub post: post::Model,
    /// Viewer has liked this post.
    pub is_liked: bool,
    /// Viewer has bookmarked this post.
    pub is_bookmarked: bool,
}

/// One page of a cursor-paginated feed.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedPage {
    /// Posts in page order.
    pub posts: Vec<FeedPost>,
    /// Cursor for the next page; `None` when this page was short.
    pub next_cursor: Option<PostCursor>,
}

/// Feed assembler.
#[derive(Clone)]
pub struct FeedService {
    post_repo: PostRepository,
    follow_repo: FollowRepository,
    block_repo: BlockRepository,
    engagement_repo: EngagementRepository,
    config: EngineConfig,
}

impl FeedService {
    /// Create a new feed service.
    #[must_use]
    pub const fn new(
        post_repo: PostRepository,
        follow_repo: FollowRepository,
        block_repo: BlockRepository,
        engagement_repo: EngagementRepository,
        config: EngineConfig,
    ) -> Self {
        Self {
            post_repo,
            follow_repo,
            block_repo,
            engagement_repo,
            config,
        }
    }

    /// Chronological feed of posts from followed authors plus the viewer.
    ///
    /// Pagination is keyset on `(created_at, id)` so pages stay stable under
    /// concurrent inserts.
    pub async fn following_feed(
        &self,
        viewer_id: &str,
        limit: u64,
        cursor: Option<PostCursor>,
    ) -> AppResult<FeedPage> {
        let limit = self.clamp_limit(limit);

        self.with_timeout(async {
            let (following, blocked) = tokio::join!(
                self.follow_repo.following_ids(viewer_id),
                self.block_repo.blocked_ids(viewer_id),
            );
            let mut authors = following?;
            let blocked = blocked?;

            authors.insert(viewer_id.to_string());
            let author_ids: Vec<String> =
                authors.into_iter().filter(|id| !blocked.contains(id)).collect();

            let posts = self
                .post_repo
                .find_following_feed(&author_ids, limit, cursor.as_ref())
                .await?;

            let next_cursor = next_cursor(&posts, limit);
            let posts = self.attach_engagement(Some(viewer_id), posts).await?;

            Ok(FeedPage { posts, next_cursor })
        })
        .await
    }

    /// Algorithmic for-you feed.
    ///
    /// Engagement-ranked public posts from the configured window, over-fetched
    /// 2x, capped per author, topped up with recent posts from followed
    /// authors, then shuffled. The score decides eligibility, not final
    /// order: refreshing produces a fresh permutation on purpose.
    pub async fn for_you_feed(&self, viewer_id: &str, limit: u64) -> AppResult<Vec<FeedPost>> {
        let limit = self.clamp_limit(limit);

        self.with_timeout(async {
            let since = chrono::Utc::now().fixed_offset()
                - chrono::Duration::hours(self.config.for_you_window_hours);

            let (following, blocked) = tokio::join!(
                self.follow_repo.following_ids(viewer_id),
                self.block_repo.blocked_ids(viewer_id),
            );
            let following = following?;
            let blocked = blocked?;

            let exclude: Vec<String> = blocked.iter().cloned().collect();
            let candidates = self
                .post_repo
                .find_recent_ranked(since, &exclude, limit * 2)
                .await?;

            let mut pool = diversify(candidates, self.config.per_author_cap);

            // Following supplement: a slice of the page from authors the
            // viewer actually follows, so the feed never goes fully global
            let supplement_size = supplement_size(limit, self.config.following_supplement_ratio);
            if supplement_size > 0 && !following.is_empty() {
                let followed_authors: Vec<String> = following
                    .into_iter()
                    .filter(|id| !blocked.contains(id))
                    .collect();
                let supplement = self
                    .post_repo
                    .find_recent_by_authors(&followed_authors, since, supplement_size)
                    .await?;
                pool.extend(supplement);
            }

            let mut pool = dedupe_by_id(pool);
            shuffle(&mut pool, &mut rand::thread_rng());
            pool.truncate(limit as usize);

            self.attach_engagement(Some(viewer_id), pool).await
        })
        .await
    }

    /// Trending feed: recent public posts ordered purely by engagement
    /// score, offset-paginated, intentionally not diversified.
    pub async fn trending_feed(
        &self,
        viewer_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<FeedPost>> {
        let limit = self.clamp_limit(limit);

        self.with_timeout(async {
            let since = chrono::Utc::now().fixed_offset()
                - chrono::Duration::hours(self.config.trending_window_hours);

            let exclude = self.suppressed_authors(viewer_id).await?;
            let posts = self
                .post_repo
                .find_trending(since, &exclude, limit, offset)
                .await?;
            self.attach_engagement(viewer_id, posts).await
        })
        .await
    }

    /// Public posts carrying a hashtag, newest first.
    pub async fn hashtag_feed(
        &self,
        tag: &str,
        viewer_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<FeedPost>> {
        let limit = self.clamp_limit(limit);

        self.with_timeout(async {
            let exclude = self.suppressed_authors(viewer_id).await?;
            let posts = self
                .post_repo
                .find_by_hashtag(tag, &exclude, limit, offset)
                .await?;
            self.attach_engagement(viewer_id, posts).await
        })
        .await
    }

    /// Full-text search over public posts, newest first.
    pub async fn search_posts(
        &self,
        query: &str,
        viewer_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<FeedPost>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Validation("Query must not be empty".to_string()));
        }
        if query.len() > self.config.max_query_length {
            return Err(AppError::Validation(format!(
                "Query exceeds {} characters",
                self.config.max_query_length
            )));
        }
        let limit = self.clamp_limit(limit);

        self.with_timeout(async {
            let exclude = self.suppressed_authors(viewer_id).await?;
            let posts = self
                .post_repo
                .search_text(query, &exclude, limit, offset)
                .await?;
            self.attach_engagement(viewer_id, posts).await
        })
        .await
    }

    /// A user's profile posts, privacy-gated by the viewer's relationship
    /// to the profile owner.
    ///
    /// The owner sees everything; an active follower also sees
    /// followers-only posts; anyone else sees public posts. A blocked pair
    /// sees an empty page rather than an error.
    pub async fn profile_posts(
        &self,
        profile_owner_id: &str,
        viewer_id: Option<&str>,
        limit: u64,
        offset: u64,
    ) -> AppResult<Vec<FeedPost>> {
        let limit = self.clamp_limit(limit);

        self.with_timeout(async {
            let include_follower_posts = match viewer_id {
                Some(viewer) if viewer == profile_owner_id => true,
                Some(viewer) => {
                    if self
                        .block_repo
                        .is_blocked_between(viewer, profile_owner_id)
                        .await?
                    {
                        return Ok(vec![]);
                    }
                    self.follow_repo.is_following(viewer, profile_owner_id).await?
                }
                None => false,
            };

            let posts = self
                .post_repo
                .find_by_author(profile_owner_id, include_follower_posts, limit, offset)
                .await?;
            self.attach_engagement(viewer_id, posts).await
        })
        .await
    }

    /// Authors suppressed for this viewer: blocked in either direction.
    /// Anonymous viewers have nothing to suppress.
    async fn suppressed_authors(&self, viewer_id: Option<&str>) -> AppResult<Vec<String>> {
        match viewer_id {
            Some(viewer) => {
                let blocked = self.block_repo.blocked_ids(viewer).await?;
                Ok(blocked.into_iter().collect())
            }
            None => Ok(vec![]),
        }
    }

    /// Attach `{is_liked, is_bookmarked}` to each post through one batched
    /// engagement lookup per flag kind.
    async fn attach_engagement(
        &self,
        viewer_id: Option<&str>,
        posts: Vec<post::Model>,
    ) -> AppResult<Vec<FeedPost>> {
        let Some(viewer_id) = viewer_id else {
            return Ok(posts
                .into_iter()
                .map(|post| FeedPost {
                    post,
                    is_liked: false,
                    is_bookmarked: false,
                })
                .collect());
        };

        let ids: Vec<String> = posts.iter().map(|p| p.id.clone()).collect();

        let (likes, bookmarks) = tokio::join!(
            self.engagement_repo.bulk_check(
                viewer_id,
                &ids,
                engagement::TargetType::Post,
                engagement::EngagementKind::Like,
            ),
            self.engagement_repo.bulk_check(
                viewer_id,
                &ids,
                engagement::TargetType::Post,
                engagement::EngagementKind::Bookmark,
            ),
        );
        let likes = likes?;
        let bookmarks = bookmarks?;

        Ok(posts
            .into_iter()
            .map(|post| {
                let is_liked = likes.get(&post.id).copied().unwrap_or(false);
                let is_bookmarked = bookmarks.get(&post.id).copied().unwrap_or(false);
                FeedPost {
                    post,
                    is_liked,
                    is_bookmarked,
                }
            })
            .collect())
    }

    fn clamp_limit(&self, limit: u64) -> u64 {
        limit.clamp(1, self.config.max_page_size)
    }

    /// Fail fast with [`AppError::QueryTimeout`] instead of blocking the
    /// caller on a slow store query.
    async fn with_timeout<F, T>(&self, fut: F) -> AppResult<T>
    where
        F: Future<Output = AppResult<T>>,
    {
        tokio::time::timeout(self.config.query_timeout(), fut)
            .await
            .map_err(|_| AppError::QueryTimeout("feed query exceeded time budget".to_string()))?
    }
}

/// Keyset cursor for the page after `posts`, or `None` for a short page.
fn next_cursor(posts: &[post::Model], limit: u64) -> Option<PostCursor> {
    if (posts.len() as u64) < limit {
        return None;
    }
    posts.last().map(|p| PostCursor {
        created_at: p.created_at,
        post_id: p.id.clone(),
    })
}

/// Per-author cap: walk in ranked order, admit a post while its author is
/// under the cap, otherwise skip. Filters only, never reorders. A cap of
/// zero disables the limit.
fn diversify(posts: Vec<post::Model>, cap: usize) -> Vec<post::Model> {
    if cap == 0 {
        return posts;
    }

    let mut per_author: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    posts
        .into_iter()
        .filter(|post| {
            let count = per_author.entry(post.author_id.clone()).or_insert(0);
            if *count < cap {
                *count += 1;
                true
            } else {
                false
            }
        })
        .collect()
}

/// Drop later duplicates, keeping first-occurrence order.
fn dedupe_by_id(posts: Vec<post::Model>) -> Vec<post::Model> {
    let mut seen = HashSet::new();
    posts
        .into_iter()
        .filter(|post| seen.insert(post.id.clone()))
        .collect()
}

fn supplement_size(limit: u64, ratio: f64) -> u64 {
    (limit as f64 * ratio).round() as u64
}

/// Fisher-Yates shuffle. Fairness matters here, unpredictability does not.
fn shuffle<R: Rng>(posts: &mut [post::Model], rng: &mut R) {
    for i in (1..posts.len()).rev() {
        let j = rng.gen_range(0..=i);
        posts.swap(i, j);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use pulse_db::entities::block;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    fn test_post(id: &str, author_id: &str, score: f64) -> post::Model {
        post::Model {
            id: id.to_string(),
            author_id: author_id.to_string(),
            text: Some(format!("post {id}")),
            tags: serde_json::json!([]),
            privacy: post::Privacy::Public,
            status: post::PostStatus::Active,
            likes_count: 0,
            comments_count: 0,
            reposts_count: 0,
            quotes_count: 0,
            bookmarks_count: 0,
            views_count: 0,
            engagement_score: score,
            created_at: Utc::now().fixed_offset(),
            updated_at: None,
        }
    }

    fn test_config() -> EngineConfig {
        EngineConfig::default()
    }

    /// Service where viewer "v" blocks author "a". The block and post repos
    /// share one connection, so the post query only deserializes if the
    /// block set was fetched first.
    fn service_with_block_and_posts(posts: Vec<post::Model>) -> FeedService {
        let block = block::Model {
            id: "b1".to_string(),
            blocker_id: "v".to_string(),
            blockee_id: "a".to_string(),
            reason: None,
            created_at: Utc::now().fixed_offset(),
        };
        let shared = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([vec![block]])
                .append_query_results([posts])
                .into_connection(),
        );
        let engagement_db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([
                    Vec::<engagement::Model>::new(),
                    Vec::<engagement::Model>::new(),
                ])
                .into_connection(),
        );
        FeedService::new(
            PostRepository::new(Arc::clone(&shared)),
            FollowRepository::new(Arc::new(
                MockDatabase::new(DatabaseBackend::Postgres).into_connection(),
            )),
            BlockRepository::new(shared),
            EngagementRepository::new(engagement_db),
            test_config(),
        )
    }

    fn service_with(posts_db: MockDatabase) -> FeedService {
        let db1 = Arc::new(posts_db.into_connection());
        let db2 = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let db3 = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        let db4 = Arc::new(MockDatabase::new(DatabaseBackend::Postgres).into_connection());
        FeedService::new(
            PostRepository::new(db1),
            FollowRepository::new(db2),
            BlockRepository::new(db3),
            EngagementRepository::new(db4),
            test_config(),
        )
    }

    #[test]
    fn test_diversify_caps_each_author() {
        // 5 posts from X ranked highest, 3 from Y, cap 2
        let posts = vec![
            test_post("p1", "x", 50.0),
            test_post("p2", "x", 45.0),
            test_post("p3", "x", 40.0),
            test_post("p4", "x", 35.0),
            test_post("p5", "x", 30.0),
            test_post("p6", "y", 25.0),
            test_post("p7", "y", 20.0),
            test_post("p8", "y", 15.0),
        ];

        let result = diversify(posts, 2);

        let from_x = result.iter().filter(|p| p.author_id == "x").count();
        let from_y = result.iter().filter(|p| p.author_id == "y").count();
        assert_eq!(from_x, 2);
        assert_eq!(from_y, 2);
        // Order preserved: X's two best first
        assert_eq!(result[0].id, "p1");
        assert_eq!(result[1].id, "p2");
        assert_eq!(result[2].id, "p6");
    }

    #[test]
    fn test_diversify_never_reorders() {
        let posts = vec![
            test_post("p1", "a", 10.0),
            test_post("p2", "b", 9.0),
            test_post("p3", "a", 8.0),
            test_post("p4", "c", 7.0),
        ];

        let result = diversify(posts, 2);
        let ids: Vec<&str> = result.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p3", "p4"]);
    }

    #[test]
    fn test_dedupe_by_id_keeps_first_occurrence() {
        let posts = vec![
            test_post("p1", "a", 10.0),
            test_post("p2", "b", 9.0),
            test_post("p1", "a", 10.0),
        ];

        let result = dedupe_by_id(posts);
        assert_eq!(result.len(), 2);
        assert_eq!(result[0].id, "p1");
        assert_eq!(result[1].id, "p2");
    }

    #[test]
    fn test_shuffle_is_a_permutation() {
        let mut posts: Vec<post::Model> = (0..20)
            .map(|i| test_post(&format!("p{i}"), "a", f64::from(i)))
            .collect();
        let before: HashSet<String> = posts.iter().map(|p| p.id.clone()).collect();

        let mut rng = StdRng::seed_from_u64(42);
        shuffle(&mut posts, &mut rng);

        let after: HashSet<String> = posts.iter().map(|p| p.id.clone()).collect();
        assert_eq!(before, after);
        assert_eq!(posts.len(), 20);
    }

    #[test]
    fn test_shuffle_handles_trivial_inputs() {
        let mut rng = StdRng::seed_from_u64(1);

        let mut empty: Vec<post::Model> = vec![];
        shuffle(&mut empty, &mut rng);
        assert!(empty.is_empty());

        let mut single = vec![test_post("p1", "a", 1.0)];
        shuffle(&mut single, &mut rng);
        assert_eq!(single[0].id, "p1");
    }

    #[test]
    fn test_supplement_size_rounds() {
        assert_eq!(supplement_size(20, 0.3), 6);
        assert_eq!(supplement_size(10, 0.3), 3);
        assert_eq!(supplement_size(5, 0.3), 2);
        assert_eq!(supplement_size(10, 0.0), 0);
    }

    #[test]
    fn test_next_cursor_only_on_full_pages() {
        let posts = vec![test_post("p1", "a", 1.0), test_post("p2", "a", 1.0)];

        // Short page: no cursor
        assert!(next_cursor(&posts, 10).is_none());

        // Full page: cursor points at the last post
        let cursor = next_cursor(&posts, 2).unwrap();
        assert_eq!(cursor.post_id, "p2");
    }

    #[tokio::test]
    async fn test_trending_feed_without_viewer_defaults_flags() {
        let posts = vec![test_post("p1", "a", 9.0), test_post("p2", "b", 5.0)];
        let db = MockDatabase::new(DatabaseBackend::Postgres).append_query_results([posts]);

        let service = service_with(db);
        let feed = service.trending_feed(None, 10, 0).await.unwrap();

        assert_eq!(feed.len(), 2);
        assert!(!feed[0].is_liked);
        assert!(!feed[0].is_bookmarked);
    }

    #[test]
    fn test_diversify_zero_cap_admits_everything() {
        let posts = vec![
            test_post("p1", "a", 3.0),
            test_post("p2", "a", 2.0),
            test_post("p3", "a", 1.0),
        ];

        assert_eq!(diversify(posts, 0).len(), 3);
    }

    #[tokio::test]
    async fn test_trending_feed_excludes_blocked_authors() {
        let service = service_with_block_and_posts(vec![test_post("p2", "b", 5.0)]);
        let feed = service.trending_feed(Some("v"), 10, 0).await.unwrap();

        assert_eq!(feed.len(), 1);
        assert!(feed.iter().all(|p| p.post.author_id != "a"));
    }

    #[tokio::test]
    async fn test_hashtag_feed_excludes_blocked_authors() {
        let service = service_with_block_and_posts(vec![test_post("p3", "b", 2.0)]);
        let feed = service.hashtag_feed("rust", Some("v"), 10, 0).await.unwrap();

        assert_eq!(feed.len(), 1);
        assert!(feed.iter().all(|p| p.post.author_id != "a"));
    }

    #[tokio::test]
    async fn test_search_posts_excludes_blocked_authors() {
        let service = service_with_block_and_posts(vec![test_post("p4", "b", 1.0)]);
        let feed = service.search_posts("post", Some("v"), 10, 0).await.unwrap();

        assert_eq!(feed.len(), 1);
        assert!(feed.iter().all(|p| p.post.author_id != "a"));
    }

    #[tokio::test]
    async fn test_search_posts_rejects_empty_query() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));
        let result = service.search_posts("   ", None, 10, 0).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_search_posts_rejects_oversized_query() {
        let service = service_with(MockDatabase::new(DatabaseBackend::Postgres));
        let long_query = "x".repeat(500);
        let result = service.search_posts(&long_query, None, 10, 0).await;

        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
