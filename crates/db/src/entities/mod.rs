//! Database entities.

pub mod block;
pub mod engagement;
pub mod follow;
pub mod post;
pub mod user;

pub use block::Entity as Block;
pub use engagement::Entity as Engagement;
pub use follow::Entity as Follow;
pub use post::Entity as Post;
pub use user::Entity as User;
