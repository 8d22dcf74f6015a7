//! Photo metadata records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Metadata for one uploaded image.
///
/// `file_path` is the key of the stored object in the photos bucket. The two
/// are written and removed by separate calls, so either may exist alone.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Photo {
    pub id: Uuid,

    /// Owning user.
    pub user_id: Uuid,

    /// Original file name as selected by the user.
    pub file_name: String,

    /// Storage key, prefixed by `user_id`.
    pub file_path: String,

    /// Size in bytes, when known.
    pub file_size: Option<i64>,

    pub created_at: DateTime<Utc>,
}

/// Insert payload for a photo metadata record.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct NewPhoto {
    pub user_id: Uuid,
    pub file_name: String,
    pub file_path: String,
    pub file_size: Option<i64>,
}
