//! Database repositories.

pub mod block;
pub mod engagement;
pub mod follow;
pub mod post;
pub mod user;

pub use block::BlockRepository;
pub use engagement::EngagementRepository;
pub use follow::FollowRepository;
pub use post::{PostCursor, PostRepository};
pub use user::UserRepository;
