//! User entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "user")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Unique handle
    pub username: String,

    /// Lowercased handle (denormalized for case-insensitive lookup)
    pub username_lower: String,

    /// Display name
    #[sea_orm(nullable)]
    pub display_name: Option<String>,

    /// Profile bio
    #[sea_orm(column_type = "Text", nullable)]
    pub bio: Option<String>,

    #[sea_orm(nullable)]
    pub avatar_url: Option<String>,

    /// Verified badge
    #[sea_orm(default_value = false)]
    pub is_verified: bool,

    #[sea_orm(default_value = false)]
    pub is_suspended: bool,

    /// Follower count (denormalized; see `FollowService::reconcile`)
    #[sea_orm(default_value = 0)]
    pub followers_count: i32,

    /// Following count (denormalized; see `FollowService::reconcile`)
    #[sea_orm(default_value = 0)]
    pub following_count: i32,

    /// Post count (denormalized)
    #[sea_orm(default_value = 0)]
    pub posts_count: i32,

    /// Last activity timestamp (search recency signal)
    #[sea_orm(nullable)]
    pub last_active_at: Option<DateTimeWithTimeZone>,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::post::Entity")]
    Post,
}

impl Related<super::post::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Post.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
