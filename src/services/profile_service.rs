//! ProfileService: read and update the caller's own profile.
//!
//! Profiles are never inserted from here; see the provisioning step of
//! sign-up.

use super::{DataError, DataResult, normalize_email};
use crate::{
    access::{Action, Principal, Target, is_allowed},
    models::profile::{Profile, ProfileUpdate},
};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ProfileService {
    db: Arc<SqlitePool>,
}

impl ProfileService {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }

    /// Fetch the profile owned by `owner`, as seen by `principal`.
    ///
    /// Someone else's profile is reported as not found.
    pub async fn get_profile(&self, principal: Principal, owner: Uuid) -> DataResult<Profile> {
        let profile = sqlx::query_as::<_, Profile>(
            "SELECT id, user_id, email, created_at FROM profiles WHERE user_id = ?",
        )
        .bind(owner)
        .fetch_optional(&*self.db)
        .await?;

        profile
            .filter(|p| is_allowed(principal, Action::Read, Target::Profile { owner: p.user_id }))
            .ok_or(DataError::NotFound("profile"))
    }

    pub async fn update_profile(
        &self,
        principal: Principal,
        owner: Uuid,
        update: ProfileUpdate,
    ) -> DataResult<Profile> {
        if !is_allowed(principal, Action::Update, Target::Profile { owner }) {
            // Same outcome as updating a row that does not exist.
            return Err(DataError::NotFound("profile"));
        }

        let current = self.get_profile(principal, owner).await?;
        let email = match update.email {
            Some(raw) => normalize_email(&raw).ok_or_else(|| DataError::Invalid {
                field: "email",
                reason: format!("`{}` is not an email address", raw),
            })?,
            None => current.email,
        };

        let updated = sqlx::query_as::<_, Profile>(
            "UPDATE profiles SET email = ? WHERE user_id = ?
             RETURNING id, user_id, email, created_at",
        )
        .bind(&email)
        .bind(owner)
        .fetch_optional(&*self.db)
        .await?;

        updated.ok_or(DataError::NotFound("profile"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{TestApp, sign_up};

    #[tokio::test]
    async fn owner_reads_own_profile_only() {
        let app = TestApp::new().await;
        let alice = sign_up(&app, "alice@example.com").await;
        let bob = sign_up(&app, "bob@example.com").await;

        let profile = app
            .state
            .profiles
            .get_profile(Principal::User(alice.user.id), alice.user.id)
            .await
            .unwrap();
        assert_eq!(profile.email, "alice@example.com");

        let err = app
            .state
            .profiles
            .get_profile(Principal::User(bob.user.id), alice.user.id)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound("profile")));
    }

    #[tokio::test]
    async fn foreign_update_looks_like_missing_row() {
        let app = TestApp::new().await;
        let alice = sign_up(&app, "alice@example.com").await;
        let bob = sign_up(&app, "bob@example.com").await;

        let update = ProfileUpdate {
            email: Some("mallory@example.com".into()),
        };
        let err = app
            .state
            .profiles
            .update_profile(Principal::User(bob.user.id), alice.user.id, update)
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::NotFound("profile")));

        let missing = app
            .state
            .profiles
            .update_profile(
                Principal::User(bob.user.id),
                Uuid::new_v4(),
                ProfileUpdate { email: None },
            )
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), missing.to_string());
    }

    #[tokio::test]
    async fn owner_updates_email() {
        let app = TestApp::new().await;
        let alice = sign_up(&app, "alice@example.com").await;
        let me = Principal::User(alice.user.id);

        let updated = app
            .state
            .profiles
            .update_profile(
                me,
                alice.user.id,
                ProfileUpdate {
                    email: Some(" Alice.New@Example.com".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.email, "alice.new@example.com");

        let bad = app
            .state
            .profiles
            .update_profile(
                me,
                alice.user.id,
                ProfileUpdate {
                    email: Some("nope".into()),
                },
            )
            .await;
        assert!(matches!(bad, Err(DataError::Invalid { field: "email", .. })));
    }
}
