//! Represents a storage bucket: a top-level container for stored objects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Name of the bucket holding gallery images.
pub const PHOTOS_BUCKET: &str = "photos";

/// A storage bucket.
///
/// Public buckets serve reads to anyone; writes are always restricted to the
/// user named by the first segment of the object key.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct Bucket {
    /// Unique identifier for this bucket.
    pub id: Uuid,

    /// Bucket name: lowercase letters, digits, `-` and `.`.
    pub name: String,

    /// Whether objects in this bucket are readable without authentication.
    pub public: bool,

    /// When this bucket was created.
    pub created_at: DateTime<Utc>,
}
