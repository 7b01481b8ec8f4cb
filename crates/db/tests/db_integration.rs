//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `pulse_test`)
//!   `TEST_DB_PASSWORD` (default: `pulse_test`)
//!   `TEST_DB_NAME` (default: `pulse_test`)

#![allow(clippy::unwrap_used)]

use chrono::{DateTime, Duration, FixedOffset, Utc};
use pulse_common::AppError;
use pulse_db::entities::{follow, post, user};
use pulse_db::repositories::{FollowRepository, PostCursor, PostRepository};
use pulse_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::{ActiveModelTrait, Set};
use std::collections::HashSet;
use std::sync::Arc;

fn user_model(id: &str) -> user::ActiveModel {
    user::ActiveModel {
        id: Set(id.to_string()),
        username: Set(id.to_string()),
        username_lower: Set(id.to_lowercase()),
        display_name: Set(None),
        bio: Set(None),
        avatar_url: Set(None),
        is_verified: Set(false),
        is_suspended: Set(false),
        followers_count: Set(0),
        following_count: Set(0),
        posts_count: Set(0),
        last_active_at: Set(None),
        created_at: Set(Utc::now().fixed_offset()),
        updated_at: Set(None),
    }
}

fn post_model(id: &str, author_id: &str, created_at: DateTime<FixedOffset>) -> post::ActiveModel {
    post::ActiveModel {
        id: Set(id.to_string()),
        author_id: Set(author_id.to_string()),
        text: Set(Some(format!("post {id}"))),
        tags: Set(serde_json::json!([])),
        privacy: Set(post::Privacy::Public),
        status: Set(post::PostStatus::Active),
        likes_count: Set(0),
        comments_count: Set(0),
        reposts_count: Set(0),
        quotes_count: Set(0),
        bookmarks_count: Set(0),
        views_count: Set(0),
        engagement_score: Set(0.0),
        created_at: Set(created_at),
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

#[test]
fn test_postgres_url_targets_maintenance_db() {
    let config = TestDbConfig::default();
    assert!(config.postgres_url().ends_with("/postgres"));
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_following_feed_cursor_chains_without_gaps() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.migrate().await.unwrap();
    let conn = db.conn.clone();

    user_model("author").insert(conn.as_ref()).await.unwrap();

    // 25 posts; pairs share a timestamp so the id tie-break is exercised
    let base = Utc::now().fixed_offset();
    for i in 0..25 {
        let at = base - Duration::seconds(i64::from(i / 2));
        post_model(&format!("p{i:02}"), "author", at)
            .insert(conn.as_ref())
            .await
            .unwrap();
    }

    let repo = PostRepository::new(conn);
    let authors = vec!["author".to_string()];

    let mut seen: Vec<(DateTime<FixedOffset>, String)> = Vec::new();
    let mut page_sizes = Vec::new();
    let mut cursor: Option<PostCursor> = None;
    loop {
        let page = repo
            .find_following_feed(&authors, 10, cursor.as_ref())
            .await
            .unwrap();
        if page.is_empty() {
            break;
        }
        page_sizes.push(page.len());

        // Strictly descending (created_at, id) within and across pages
        for p in &page {
            let key = (p.created_at, p.id.clone());
            if let Some(last) = seen.last() {
                assert!(key < *last, "feed not strictly descending at {key:?}");
            }
            seen.push(key);
        }

        let full = page.len() == 10;
        cursor = page.last().map(|p| PostCursor {
            created_at: p.created_at,
            post_id: p.id.clone(),
        });
        if !full {
            break;
        }
    }

    assert_eq!(page_sizes, vec![10, 10, 5]);
    assert_eq!(seen.len(), 25);
    let unique: HashSet<&String> = seen.iter().map(|(_, id)| id).collect();
    assert_eq!(unique.len(), 25, "cursor chaining duplicated a post");

    db.drop_database().await.unwrap();
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_duplicate_follow_edge_maps_to_conflict() {
    let db = TestDatabase::create_unique().await.unwrap();
    db.migrate().await.unwrap();
    let conn = db.conn.clone();

    user_model("u1").insert(conn.as_ref()).await.unwrap();
    user_model("u2").insert(conn.as_ref()).await.unwrap();

    let repo = FollowRepository::new(conn);
    repo.create(follow_model("f1", "u1", "u2")).await.unwrap();

    // Second edge for the same pair hits the unique index
    let second = repo.create(follow_model("f2", "u1", "u2")).await;
    assert!(matches!(second, Err(AppError::Conflict(_))));

    db.drop_database().await.unwrap();
}
