//! Per-user profile record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One profile per user, provisioned when the user signs up.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Profile {
    pub id: Uuid,

    /// Owning user. Unique across profiles.
    pub user_id: Uuid,

    pub email: String,

    pub created_at: DateTime<Utc>,
}

/// Fields a user may change on their own profile.
#[derive(Deserialize, Debug, Clone)]
pub struct ProfileUpdate {
    pub email: Option<String>,
}
