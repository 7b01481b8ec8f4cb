//! Business logic services.

pub mod blocking;
pub mod count_cache;
pub mod engagement;
pub mod feed;
pub mod follow;
pub mod mutuals;
pub mod relevance;
pub mod search;

pub use blocking::BlockService;
pub use count_cache::{CountCache, CountCacheError, FollowCounts, FollowState};
pub use engagement::{engagement_score, EngagementService};
pub use feed::{FeedPage, FeedPost, FeedService};
pub use follow::{FollowOutcome, FollowService, FollowStatusView};
pub use mutuals::MutualConnectionService;
pub use relevance::{score, text_match_score, NormalizedQuery, SocialContext};
pub use search::{RankedUser, UserSearchRequest, UserSearchResult, UserSearchService};
