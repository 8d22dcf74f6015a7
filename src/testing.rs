//! Fixtures shared by the unit tests.

use crate::{
    db::memory_pool,
    models::user::{Credentials, Session},
    state::{AppState, ServiceSettings},
};
use std::sync::Arc;
use tempfile::TempDir;

pub(crate) const PASSWORD: &str = "correct horse battery";

/// In-memory database plus a temporary storage root.
pub(crate) struct TestApp {
    pub state: AppState,
    // Kept alive for the duration of the test.
    _storage: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        let storage = TempDir::new().expect("temp storage dir");
        let settings = ServiceSettings {
            storage_dir: storage.path().to_path_buf(),
            public_base_url: "http://localhost:3000".into(),
            jwt_secret: b"test-secret".to_vec(),
            token_ttl_secs: 3600,
        };
        let state = AppState::new(Arc::new(memory_pool().await), settings);
        Self {
            state,
            _storage: storage,
        }
    }
}

pub(crate) fn credentials(email: &str) -> Credentials {
    Credentials {
        email: email.into(),
        password: PASSWORD.into(),
    }
}

pub(crate) async fn sign_up(app: &TestApp, email: &str) -> Session {
    app.state
        .identity
        .sign_up(&credentials(email))
        .await
        .expect("sign up")
}
