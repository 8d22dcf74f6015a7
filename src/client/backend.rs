//! The backend surface the client talks to.
//!
//! [`Backend`] is the set of calls a gallery front end makes. It carries no
//! authorization logic of its own: every call forwards the session token and
//! lets the server side decide.

use crate::{
    access::Principal,
    models::{
        bucket::PHOTOS_BUCKET,
        object::StoredObject,
        photo::{NewPhoto, Photo},
        user::{Credentials, Session},
    },
    services::{DataError, identity_service::AuthError, storage_service::StorageError},
    state::AppState,
};
use bytes::Bytes;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[allow(async_fn_in_trait)]
pub trait Backend {
    async fn sign_up(&self, creds: &Credentials) -> BackendResult<Session>;
    async fn sign_in(&self, creds: &Credentials) -> BackendResult<Session>;
    async fn sign_out(&self, session: &Session) -> BackendResult<()>;
    async fn get_session(&self, access_token: &str) -> BackendResult<Session>;

    /// Newest first.
    async fn list_photos(&self, session: &Session, owner: Uuid) -> BackendResult<Vec<Photo>>;
    async fn insert_photo_metadata(
        &self,
        session: &Session,
        record: NewPhoto,
    ) -> BackendResult<Photo>;
    async fn delete_photo_metadata(&self, session: &Session, id: Uuid) -> BackendResult<Photo>;

    async fn upload_file(
        &self,
        session: &Session,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> BackendResult<StoredObject>;
    async fn remove_file(&self, session: &Session, path: &str) -> BackendResult<()>;

    fn public_url(&self, path: &str) -> String;
}

/// Calls the services in-process, against the photos bucket.
#[derive(Clone)]
pub struct LocalBackend {
    state: AppState,
}

impl LocalBackend {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    async fn principal(&self, session: &Session) -> BackendResult<Principal> {
        let ctx = self.state.identity.authenticate(&session.access_token).await?;
        Ok(ctx.principal())
    }
}

impl Backend for LocalBackend {
    async fn sign_up(&self, creds: &Credentials) -> BackendResult<Session> {
        Ok(self.state.identity.sign_up(creds).await?)
    }

    async fn sign_in(&self, creds: &Credentials) -> BackendResult<Session> {
        Ok(self.state.identity.sign_in(creds).await?)
    }

    async fn sign_out(&self, session: &Session) -> BackendResult<()> {
        Ok(self.state.identity.sign_out(&session.access_token).await?)
    }

    async fn get_session(&self, access_token: &str) -> BackendResult<Session> {
        Ok(self.state.identity.get_session(access_token).await?)
    }

    async fn list_photos(&self, session: &Session, owner: Uuid) -> BackendResult<Vec<Photo>> {
        let principal = self.principal(session).await?;
        Ok(self.state.photos.list_photos(principal, owner).await?)
    }

    async fn insert_photo_metadata(
        &self,
        session: &Session,
        record: NewPhoto,
    ) -> BackendResult<Photo> {
        let principal = self.principal(session).await?;
        Ok(self.state.photos.insert_photo(principal, record).await?)
    }

    async fn delete_photo_metadata(&self, session: &Session, id: Uuid) -> BackendResult<Photo> {
        let principal = self.principal(session).await?;
        Ok(self.state.photos.delete_photo(principal, id).await?)
    }

    async fn upload_file(
        &self,
        session: &Session,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> BackendResult<StoredObject> {
        let principal = self.principal(session).await?;
        let object = self
            .state
            .storage
            .upload_object(
                principal,
                PHOTOS_BUCKET,
                path,
                Some(content_type.to_string()),
                bytes,
            )
            .await?;
        Ok(object)
    }

    async fn remove_file(&self, session: &Session, path: &str) -> BackendResult<()> {
        let principal = self.principal(session).await?;
        self.state
            .storage
            .remove_object(principal, PHOTOS_BUCKET, path)
            .await?;
        Ok(())
    }

    fn public_url(&self, path: &str) -> String {
        self.state.storage.public_url(PHOTOS_BUCKET, path)
    }
}
