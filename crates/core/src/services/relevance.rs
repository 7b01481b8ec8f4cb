//! Search relevance scoring.
//!
//! Pure functions: identical inputs always produce the identical score.
//! The score is three additive bands — text match quality, social-graph
//! proximity, and account signals. Within the text band only the single
//! highest-priority rule that applies contributes, expressed as an ordered
//! rule list so the exact-match-beats-everything ordering stays auditable.

use chrono::{DateTime, FixedOffset};
use pulse_db::entities::user;

/// Social-graph context for a single candidate, from the searcher's view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SocialContext {
    /// Searcher actively follows the candidate.
    pub is_following: bool,
    /// Candidate actively follows the searcher.
    pub follows_you: bool,
    /// Number of the searcher's follow-targets the candidate also follows.
    pub mutual_count: u32,
}

impl SocialContext {
    /// Both directions active.
    #[must_use]
    pub const fn is_mutual(&self) -> bool {
        self.is_following && self.follows_you
    }
}

/// A search query normalized for matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedQuery {
    lower: String,
}

impl NormalizedQuery {
    /// Trim and lowercase a raw query string.
    #[must_use]
    pub fn new(raw: &str) -> Self {
        Self {
            lower: raw.trim().to_lowercase(),
        }
    }

    /// The normalized form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.lower
    }

    /// Whether anything is left after normalization.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lower.is_empty()
    }
}

/// One rule in the ordered text-match list.
struct TextRule {
    matches: fn(username: &str, display: &str, query: &str) -> bool,
    score: f64,
}

/// Ordered by priority; the first rule that matches wins.
const TEXT_RULES: &[TextRule] = &[
    TextRule {
        matches: |username, _, q| username == q,
        score: 100.0,
    },
    TextRule {
        matches: |_, display, q| !display.is_empty() && display == q,
        score: 95.0,
    },
    TextRule {
        matches: |username, _, q| username.starts_with(q),
        score: 80.0,
    },
    TextRule {
        matches: |_, display, q| display.starts_with(q),
        score: 75.0,
    },
    TextRule {
        matches: |username, _, q| username.contains(q),
        score: 50.0,
    },
    TextRule {
        matches: |_, display, q| display.contains(q),
        score: 45.0,
    },
];

/// Text-match band: 0–100, single highest-priority rule wins.
#[must_use]
pub fn text_match_score(username_lower: &str, display_name: Option<&str>, query: &NormalizedQuery) -> f64 {
    if query.is_empty() {
        return 0.0;
    }
    let display_lower = display_name.map(str::to_lowercase).unwrap_or_default();

    TEXT_RULES
        .iter()
        .find(|rule| (rule.matches)(username_lower, &display_lower, query.as_str()))
        .map_or(0.0, |rule| rule.score)
}

/// Social-graph band: follow direction plus a capped mutual-connection bonus.
#[must_use]
pub fn social_score(ctx: &SocialContext) -> f64 {
    let direction = if ctx.is_mutual() {
        35.0
    } else if ctx.is_following {
        30.0
    } else if ctx.follows_you {
        25.0
    } else {
        0.0
    };

    direction + (f64::from(ctx.mutual_count) * 2.0).min(20.0)
}

/// Account-signal band: verification, size with diminishing returns, recency.
#[must_use]
pub fn account_score(
    is_verified: bool,
    followers_count: i64,
    last_active_at: Option<DateTime<FixedOffset>>,
    now: DateTime<FixedOffset>,
) -> f64 {
    let mut score = 0.0;

    if is_verified {
        score += 15.0;
    }

    // log10 keeps mega-accounts from dominating purely on size
    let followers = followers_count.max(0) as f64;
    score += ((followers + 1.0).log10() * 5.0).min(25.0);

    if let Some(active) = last_active_at {
        let days = (now - active).num_days();
        if days <= 7 {
            score += 10.0;
        } else if days <= 30 {
            score += 5.0;
        }
    }

    score
}

/// Full relevance score for a candidate against a query and social context.
///
/// `now` is passed in rather than read from the clock so scoring stays
/// deterministic.
#[must_use]
pub fn score(
    candidate: &user::Model,
    query: &NormalizedQuery,
    ctx: &SocialContext,
    now: DateTime<FixedOffset>,
) -> f64 {
    text_match_score(&candidate.username_lower, candidate.display_name.as_deref(), query)
        + social_score(ctx)
        + account_score(
            candidate.is_verified,
            i64::from(candidate.followers_count),
            candidate.last_active_at,
            now,
        )
}
