//! Engine integration tests.
//!
//! These tests require a running `PostgreSQL` instance (Redis for the
//! count-cache test). Run with:
//! `cargo test --test engine_integration -- --ignored`
//!
//! See `pulse_db::test_utils` for the `TEST_DB_*` / `TEST_REDIS_*`
//! environment variables.

#![allow(clippy::unwrap_used)]

use chrono::Utc;
use fred::interfaces::ClientLike;
use pulse_core::{CountCache, FollowCounts, FollowService};
use pulse_db::entities::{follow, user};
use pulse_db::repositories::{BlockRepository, FollowRepository, UserRepository};
use pulse_db::test_utils::{TestDatabase, TestRedisConfig};
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;

fn user_model(id: &str, followers_count: i32, following_count: i32) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(id.to_string()),
        username: Set(id.to_string()),
        username_lower: Set(id.to_lowercase()),
        display_name: Set(None),
        bio: Set(None),
        avatar_url: Set(None),
        is_verified: Set(false),
        is_suspended: Set(false),
        followers_count: Set(followers_count),
        following_count: Set(following_count),
        posts_count: Set(0),
        last_active_at: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
        updated_at: Set(None),
    }
}

fn follow_model(id: &str, follower_id: &str, followee_id: &str) -> follow::ActiveModel {
    follow::ActiveModel {
        id: Set(id.to_string()),
        follower_id: Set(follower_id.to_string()),
        followee_id: Set(followee_id.to_string()),
        status: Set(follow::FollowStatus::Active),
        source: Set("search".to_string()),
        mutual_follow_at: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
    }
}

fn follow_service(conn: &Arc<sea_orm::DatabaseConnection>) -> FollowService {
    FollowService::new(
        FollowRepository::new(Arc::clone(conn)),
        BlockRepository::new(Arc::clone(conn)),
        UserRepository::new(Arc::clone(conn)),
    )
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_unfollow_round_trip_restores_counts() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.migrate().await.unwrap();
    let conn = db.conn.clone();

    // Pre-existing non-zero counts so the round trip proves exact restore,
    // not just reset-to-zero
    user_model("alice", 7, 3).insert(conn.as_ref()).await.unwrap();
    user_model("bob", 41, 12).insert(conn.as_ref()).await.unwrap();

    let users = UserRepository::new(Arc::clone(&conn));
    let service = follow_service(&conn);

    service.follow("alice", "bob", "search").await.unwrap();
    assert_eq!(users.get_by_id("alice").await.unwrap().following_count, 4);
    assert_eq!(users.get_by_id("bob").await.unwrap().followers_count, 42);

    service.unfollow("alice", "bob").await.unwrap();
    assert_eq!(users.get_by_id("alice").await.unwrap().following_count, 3);
    assert_eq!(users.get_by_id("bob").await.unwrap().followers_count, 41);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_reconcile_repairs_count_drift() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.migrate().await.unwrap();
    let conn = db.conn.clone();

    // Drifted denormalized counts
    user_model("carol", 999, 999).insert(conn.as_ref()).await.unwrap();
    user_model("dave", 0, 0).insert(conn.as_ref()).await.unwrap();
    user_model("erin", 0, 0).insert(conn.as_ref()).await.unwrap();

    let follows = FollowRepository::new(Arc::clone(&conn));
    follows.create(follow_model("f1", "dave", "carol")).await.unwrap();
    follows.create(follow_model("f2", "erin", "carol")).await.unwrap();
    follows.create(follow_model("f3", "carol", "dave")).await.unwrap();

    let service = follow_service(&conn);
    let counts = service.reconcile("carol").await.unwrap();
    assert_eq!(counts.followers, 2);
    assert_eq!(counts.following, 1);

    let users = UserRepository::new(Arc::clone(&conn));
    let carol = users.get_by_id("carol").await.unwrap();
    assert_eq!(carol.followers_count, 2);
    assert_eq!(carol.following_count, 1);

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running Redis instance"]
async fn test_count_cache_round_trip_and_invalidation() {
    let url = TestRedisConfig::default().redis_url();
    let config = fred::types::config::Config::from_url(&url).unwrap();
    let client = fred::clients::Client::new(config, None, None, None);
    client.connect();
    client.wait_for_connect().await.unwrap();

    let cache = CountCache::new(Arc::new(client));
    assert!(cache.available());

    let counts = FollowCounts {
        followers: 12,
        following: 5,
    };
    cache.set_counts("cache_user", counts).await.unwrap();
    assert_eq!(cache.get_counts("cache_user").await.unwrap(), Some(counts));

    cache.invalidate_counts("cache_user").await.unwrap();
    assert_eq!(cache.get_counts("cache_user").await.unwrap(), None);
}
