//! Core business logic for the pulse feed and relevance engine.

pub mod services;

pub use services::*;
