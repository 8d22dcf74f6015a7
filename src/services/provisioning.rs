//! Profile auto-provisioning.
//!
//! Runs as the identity subsystem, not as an end user: it skips the profile
//! create policy and is only reachable from
//! [`IdentityService::sign_up`](super::identity_service::IdentityService::sign_up),
//! inside the transaction that creates the user. An error here aborts the
//! sign-up.

use crate::models::{profile::Profile, user::UserRecord};
use chrono::Utc;
use sqlx::{Sqlite, Transaction};
use tracing::debug;
use uuid::Uuid;

pub(super) async fn provision_profile(
    tx: &mut Transaction<'_, Sqlite>,
    user: &UserRecord,
) -> Result<Profile, sqlx::Error> {
    let profile = sqlx::query_as::<_, Profile>(
        "INSERT INTO profiles (id, user_id, email, created_at)
         VALUES (?, ?, ?, ?)
         RETURNING id, user_id, email, created_at",
    )
    .bind(Uuid::new_v4())
    .bind(user.id)
    .bind(&user.email)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await?;

    debug!(user_id = %user.id, profile_id = %profile.id, "provisioned profile");
    Ok(profile)
}
