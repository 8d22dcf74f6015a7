//! Users and authenticated sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A user account row, including the password hash.
#[derive(Clone, FromRow, Debug)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub created_at: DateTime<Utc>,
}

impl From<UserRecord> for User {
    fn from(rec: UserRecord) -> Self {
        Self {
            id: rec.id,
            email: rec.email,
            created_at: rec.created_at,
        }
    }
}

/// An authenticated session as handed to clients.
///
/// Clients pass this value into every call; there is no ambient
/// "current user".
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Session {
    pub access_token: String,
    pub token_type: String,
    pub expires_at: DateTime<Utc>,
    pub user: User,
}

/// Email + password credentials.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

/// Changes in authentication state, published on the identity event channel.
#[derive(Serialize, Clone, Debug, PartialEq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuthEvent {
    UserCreated { user_id: Uuid },
    SignedIn { user_id: Uuid },
    SignedOut { user_id: Uuid },
}
