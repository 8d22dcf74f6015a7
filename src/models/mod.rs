//! Core data models for the photo vault.
//!
//! These entities map to database tables via `sqlx::FromRow` and serialize
//! as JSON via `serde`. Ownership fields (`user_id`, the first segment of an
//! object key) are what the access policies are evaluated against.

pub mod bucket;
pub mod object;
pub mod photo;
pub mod profile;
pub mod user;
