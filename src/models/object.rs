//! Represents a stored file object held in a bucket.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Index entry for a single stored object.
///
/// The payload lives on disk; this row only records where it is and what it
/// looks like. Nothing ties it to a photo metadata record except the key.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
pub struct StoredObject {
    pub id: Uuid,

    /// Parent bucket.
    pub bucket_id: Uuid,

    /// Object key, `{user_id}/{file name}` by convention.
    pub key: String,

    /// First path segment of the key at upload time.
    pub owner_id: Option<String>,

    /// Content type declared by the uploader. Not verified.
    pub content_type: Option<String>,

    pub size_bytes: i64,

    /// Hex MD5 of the payload.
    pub etag: Option<String>,

    pub created_at: DateTime<Utc>,
}
