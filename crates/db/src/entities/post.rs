//! Post entity.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Post privacy levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum Privacy {
    #[sea_orm(string_value = "public")]
    Public,
    #[sea_orm(string_value = "followers")]
    Followers,
}

/// Post lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
pub enum PostStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "deleted")]
    Deleted,
    #[sea_orm(string_value = "hidden")]
    Hidden,
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "post")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    /// Author user ID
    #[sea_orm(indexed)]
    pub author_id: String,

    /// Post text content
    #[sea_orm(column_type = "Text", nullable)]
    pub text: Option<String>,

    /// Hashtags
    #[sea_orm(column_type = "JsonBinary")]
    pub tags: Json,

    pub privacy: Privacy,

    pub status: PostStatus,

    /// Like count (denormalized)
    #[sea_orm(default_value = 0)]
    pub likes_count: i32,

    /// Comment count (denormalized)
    #[sea_orm(default_value = 0)]
    pub comments_count: i32,

    /// Repost count (denormalized)
    #[sea_orm(default_value = 0)]
    pub reposts_count: i32,

    /// Quote count (denormalized)
    #[sea_orm(default_value = 0)]
    pub quotes_count: i32,

    /// Bookmark count (denormalized)
    #[sea_orm(default_value = 0)]
    pub bookmarks_count: i32,

    /// View count (denormalized)
    #[sea_orm(default_value = 0)]
    pub views_count: i32,

    /// Recency-decayed weighted engagement sum, recomputed on every
    /// engagement mutation. Ranking key for the for-you and trending feeds.
    #[sea_orm(default_value = 0.0)]
    pub engagement_score: f64,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::AuthorId",
        to = "super::user::Column::Id"
    )]
    Author,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Author.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
