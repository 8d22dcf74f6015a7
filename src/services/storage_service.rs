//! src/services/storage_service.rs
//!
//! StorageService: bucketed object storage backed by SQLite for the object
//! index and local disk for payloads sharded beneath
//! `base_path/{bucket}/{shard}/{shard}/{key}`.
//!
//! Writes and deletes are gated by the object policy: the first segment of
//! the key must be the caller's id. Reads of public buckets are open.

use crate::{
    access::{AccessDenied, Action, Principal, Target, authorize, first_path_segment, is_allowed},
    models::{bucket::Bucket, object::StoredObject},
    services::is_unique_violation,
};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use md5::Context;
use sqlx::SqlitePool;
use std::{
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("bucket `{0}` not found")]
    BucketNotFound(String),
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    /// Also returned when the object exists but the caller may not see it.
    #[error("object `{key}` not found in bucket `{bucket}`")]
    ObjectNotFound { bucket: String, key: String },
    #[error("object `{key}` already exists in bucket `{bucket}`")]
    Duplicate { bucket: String, key: String },
    #[error("invalid object key")]
    InvalidObjectKey,
    #[error(transparent)]
    Denied(#[from] AccessDenied),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

const OBJECT_COLUMNS: &str =
    "id, bucket_id, key, owner_id, content_type, size_bytes, etag, created_at";

/// StorageService provides the file half of the photo workflow:
/// - Upload an object (streams bytes to disk and indexes it in SQLite)
/// - Get object (policy-checked read of metadata and payload)
/// - Remove object (drops the index row and the payload)
/// - Public URL construction
#[derive(Clone)]
pub struct StorageService {
    /// Shared SQLite connection pool used for the object index.
    pub db: Arc<SqlitePool>,

    /// Base directory on disk where object payloads are stored.
    pub base_path: PathBuf,

    /// Externally reachable origin used by [`StorageService::public_url`].
    pub public_base_url: String,
}

const MAX_OBJECT_KEY_LEN: usize = 1024;
const BUCKET_NAME_MIN_LEN: usize = 3;
const BUCKET_NAME_MAX_LEN: usize = 63;

impl StorageService {
    pub fn new(
        db: Arc<SqlitePool>,
        base_path: impl Into<PathBuf>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            db,
            base_path: base_path.into(),
            public_base_url: public_base_url.into(),
        }
    }

    /// Basic key validation to avoid trivial path traversal vectors.
    fn ensure_key_safe(&self, key: &str) -> StorageResult<()> {
        if key.is_empty() || key.len() > MAX_OBJECT_KEY_LEN {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.starts_with('/') || key.ends_with('/') || key.contains("..") {
            return Err(StorageError::InvalidObjectKey);
        }
        if key.split('/').any(str::is_empty) {
            return Err(StorageError::InvalidObjectKey);
        }
        if key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0')
        {
            return Err(StorageError::InvalidObjectKey);
        }
        Ok(())
    }

    /// Validate bucket name format.
    ///
    /// 3–63 characters of lowercase letters, digits, dots and hyphens,
    /// starting and ending with a letter or digit.
    fn ensure_bucket_name_safe(&self, name: &str) -> StorageResult<()> {
        let invalid = |reason: &str| StorageError::InvalidBucketName {
            name: name.to_string(),
            reason: reason.into(),
        };

        let len = name.len();
        if !(BUCKET_NAME_MIN_LEN..=BUCKET_NAME_MAX_LEN).contains(&len) {
            return Err(invalid("must be between 3 and 63 characters"));
        }
        if !name
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '.' | '-'))
        {
            return Err(invalid(
                "allowed characters are lowercase letters, digits, dots, and hyphens",
            ));
        }
        if name.starts_with(['.', '-']) || name.ends_with(['.', '-']) {
            return Err(invalid("must start and end with a lowercase letter or digit"));
        }
        if name.contains("..") {
            return Err(invalid("cannot contain consecutive dots"));
        }
        Ok(())
    }

    /// Compute the physical base folder path for a bucket.
    fn bucket_root(&self, bucket_name: &str) -> PathBuf {
        self.base_path.join(bucket_name)
    }

    /// Two-level shard identifiers from MD5(bucket/key), as lowercase hex.
    fn object_shards(bucket_name: &str, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", bucket_name, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Combines base_path/bucket/{shard}/{shard}/{key}.
    fn object_path(&self, bucket_name: &str, key: &str) -> PathBuf {
        let (shard_a, shard_b) = Self::object_shards(bucket_name, key);
        let mut path = self.bucket_root(bucket_name);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }

    async fn fetch_bucket(&self, bucket: &str) -> StorageResult<Bucket> {
        self.ensure_bucket_name_safe(bucket)?;
        sqlx::query_as::<_, Bucket>("SELECT id, name, public, created_at FROM buckets WHERE name = ?")
            .bind(bucket)
            .fetch_optional(&*self.db)
            .await?
            .ok_or_else(|| StorageError::BucketNotFound(bucket.to_string()))
    }

    async fn fetch_object(&self, bucket: &Bucket, key: &str) -> StorageResult<Option<StoredObject>> {
        let object = sqlx::query_as::<_, StoredObject>(&format!(
            "SELECT {OBJECT_COLUMNS} FROM objects WHERE bucket_id = ? AND key = ?"
        ))
        .bind(bucket.id)
        .bind(key)
        .fetch_optional(&*self.db)
        .await?;
        Ok(object)
    }

    /// Fetch an object the caller may read, hiding ones they may not.
    async fn fetch_readable(
        &self,
        principal: Principal,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(Bucket, StoredObject)> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let target = Target::Object {
            key,
            public: bucket_rec.public,
        };
        let object = self
            .fetch_object(&bucket_rec, key)
            .await?
            .filter(|_| is_allowed(principal, Action::Read, target))
            .ok_or_else(|| StorageError::ObjectNotFound {
                bucket: bucket.to_string(),
                key: key.to_string(),
            })?;
        Ok((bucket_rec, object))
    }

    /// Stream-upload a new object.
    ///
    /// - Writes bytes incrementally to a temporary file, computing size and MD5.
    /// - Claims the key with an index row; an existing key is a `Duplicate`.
    /// - Renames the temporary file into its final location.
    ///
    /// Existing objects are never overwritten.
    pub async fn upload_object_stream<S>(
        &self,
        principal: Principal,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        stream: S,
    ) -> StorageResult<StoredObject>
    where
        S: Stream<Item = io::Result<Bytes>> + Send,
    {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        authorize(
            principal,
            Action::Create,
            Target::Object {
                key,
                public: bucket_rec.public,
            },
        )?;

        let file_path = self.object_path(&bucket_rec.name, key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            StorageError::Io(io::Error::other("object path missing parent directory"))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        let (size_bytes, etag) = match write_temp(&tmp_path, stream).await {
            Ok(written) => written,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        };

        let inserted = sqlx::query_as::<_, StoredObject>(&format!(
            "INSERT INTO objects (id, bucket_id, key, owner_id, content_type, size_bytes, etag, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)
             RETURNING {OBJECT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(bucket_rec.id)
        .bind(key)
        .bind(first_path_segment(key))
        .bind(content_type)
        .bind(size_bytes)
        .bind(&etag)
        .bind(Utc::now())
        .fetch_one(&*self.db)
        .await;

        let object = match inserted {
            Ok(object) => object,
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                if is_unique_violation(&err) {
                    return Err(StorageError::Duplicate {
                        bucket: bucket.to_string(),
                        key: key.to_string(),
                    });
                }
                return Err(StorageError::Sqlx(err));
            }
        };

        if let Err(err) = fs::rename(&tmp_path, &file_path).await {
            let _ = fs::remove_file(&tmp_path).await;
            let _ = sqlx::query("DELETE FROM objects WHERE id = ?")
                .bind(object.id)
                .execute(&*self.db)
                .await;
            return Err(StorageError::Io(err));
        }

        debug!(bucket, key, size_bytes, "stored object");
        Ok(object)
    }

    /// Convenience wrapper for callers that already hold the whole payload.
    pub async fn upload_object(
        &self,
        principal: Principal,
        bucket: &str,
        key: &str,
        content_type: Option<String>,
        bytes: Bytes,
    ) -> StorageResult<StoredObject> {
        let stream = futures::stream::once(async move { Ok::<_, io::Error>(bytes) });
        self.upload_object_stream(principal, bucket, key, content_type, stream)
            .await
    }

    /// Fetch an object for reading.
    ///
    /// Returns metadata and an opened File handle ready for streaming out.
    pub async fn get_object_reader(
        &self,
        principal: Principal,
        bucket: &str,
        key: &str,
    ) -> StorageResult<(StoredObject, File)> {
        let (bucket_rec, object) = self.fetch_readable(principal, bucket, key).await?;

        let file_path = self.object_path(&bucket_rec.name, key);
        let file = File::open(&file_path).await.map_err(|err| {
            if err.kind() == ErrorKind::NotFound {
                StorageError::ObjectNotFound {
                    bucket: bucket.to_string(),
                    key: key.to_string(),
                }
            } else {
                StorageError::Io(err)
            }
        })?;

        Ok((object, file))
    }

    /// Fetch only object metadata.
    pub async fn get_object_metadata(
        &self,
        principal: Principal,
        bucket: &str,
        key: &str,
    ) -> StorageResult<StoredObject> {
        self.fetch_readable(principal, bucket, key)
            .await
            .map(|(_, object)| object)
    }

    /// Remove an object's index row and payload.
    ///
    /// A missing object and one the caller may not delete are reported the
    /// same way.
    pub async fn remove_object(
        &self,
        principal: Principal,
        bucket: &str,
        key: &str,
    ) -> StorageResult<StoredObject> {
        self.ensure_key_safe(key)?;
        let bucket_rec = self.fetch_bucket(bucket).await?;
        let target = Target::Object {
            key,
            public: bucket_rec.public,
        };
        let not_found = || StorageError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };

        let object = self
            .fetch_object(&bucket_rec, key)
            .await?
            .filter(|_| is_allowed(principal, Action::Delete, target))
            .ok_or_else(not_found)?;

        let result = sqlx::query("DELETE FROM objects WHERE id = ?")
            .bind(object.id)
            .execute(&*self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(not_found());
        }

        let file_path = self.object_path(&bucket_rec.name, key);
        match fs::remove_file(&file_path).await {
            Ok(_) => debug!("removed physical file {}", file_path.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                debug!("file {} already missing", file_path.display());
            }
            // The row is gone, so the object is gone as far as callers can
            // tell. The stray payload is only logged.
            Err(err) => warn!(
                "object {}/{} deleted but payload {} was left behind: {}",
                bucket_rec.name,
                key,
                file_path.display(),
                err
            ),
        }

        if let Some(parent) = file_path.parent() {
            let bucket_root = self.bucket_root(&bucket_rec.name);
            self.prune_empty_dirs(parent, &bucket_root).await;
        }

        Ok(object)
    }

    /// Link under which a public object can be fetched without credentials.
    pub fn public_url(&self, bucket: &str, key: &str) -> String {
        format!(
            "{}/storage/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            bucket,
            key
        )
    }

    /// Recursively remove empty directories up to the bucket root.
    async fn prune_empty_dirs(&self, start: &Path, stop: &Path) {
        let mut current = start.to_path_buf();
        while current.starts_with(stop) && current != stop {
            match fs::remove_dir(&current).await {
                Ok(_) => {
                    if let Some(parent) = current.parent() {
                        current = parent.to_path_buf();
                    } else {
                        break;
                    }
                }
                Err(err) if err.kind() == ErrorKind::NotFound => break,
                Err(err) if err.kind() == ErrorKind::DirectoryNotEmpty => break,
                Err(err) => {
                    debug!("failed to prune directory {}: {}", current.display(), err);
                    break;
                }
            }
        }
    }
}

/// Drain `stream` into a new file at `path`, returning its size and hex MD5.
async fn write_temp<S>(path: &Path, stream: S) -> io::Result<(i64, String)>
where
    S: Stream<Item = io::Result<Bytes>>,
{
    let mut file = File::create(path).await?;
    let mut size_bytes: i64 = 0;
    let mut digest = Context::new();
    pin_mut!(stream);
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as i64;
        digest.consume(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;
    Ok((size_bytes, format!("{:x}", digest.compute())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{models::bucket::PHOTOS_BUCKET, testing::TestApp};
    use tokio::io::AsyncReadExt;

    fn key_for(owner: Uuid, name: &str) -> String {
        format!("{}/{}", owner, name)
    }

    #[tokio::test]
    async fn owner_uploads_and_anyone_reads() {
        let app = TestApp::new().await;
        let storage = &app.state.storage;
        let alice = Uuid::new_v4();
        let key = key_for(alice, "a.png");

        let stored = storage
            .upload_object(
                Principal::User(alice),
                PHOTOS_BUCKET,
                &key,
                Some("image/png".into()),
                Bytes::from_static(b"pixels"),
            )
            .await
            .unwrap();
        assert_eq!(stored.size_bytes, 6);
        assert_eq!(stored.owner_id.as_deref(), Some(alice.to_string().as_str()));
        assert_eq!(stored.etag.as_deref(), Some(format!("{:x}", md5::compute(b"pixels")).as_str()));

        let (meta, mut file) = storage
            .get_object_reader(Principal::Anonymous, PHOTOS_BUCKET, &key)
            .await
            .unwrap();
        let mut body = Vec::new();
        file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"pixels");
        assert_eq!(meta.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn foreign_prefix_upload_is_denied() {
        let app = TestApp::new().await;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());

        let err = app
            .state
            .storage
            .upload_object(
                Principal::User(bob),
                PHOTOS_BUCKET,
                &key_for(alice, "evil.png"),
                None,
                Bytes::from_static(b"x"),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Denied(_)));

        let anon = app
            .state
            .storage
            .upload_object(
                Principal::Anonymous,
                PHOTOS_BUCKET,
                &key_for(alice, "anon.png"),
                None,
                Bytes::from_static(b"x"),
            )
            .await;
        assert!(matches!(anon, Err(StorageError::Denied(_))));
    }

    #[tokio::test]
    async fn foreign_delete_looks_like_missing_object() {
        let app = TestApp::new().await;
        let storage = &app.state.storage;
        let (alice, bob) = (Uuid::new_v4(), Uuid::new_v4());
        let key = key_for(alice, "keep.png");
        storage
            .upload_object(Principal::User(alice), PHOTOS_BUCKET, &key, None, Bytes::from_static(b"x"))
            .await
            .unwrap();

        let err = storage
            .remove_object(Principal::User(bob), PHOTOS_BUCKET, &key)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::ObjectNotFound { .. }));

        storage
            .get_object_metadata(Principal::Anonymous, PHOTOS_BUCKET, &key)
            .await
            .expect("object survives the foreign delete");
    }

    #[tokio::test]
    async fn owner_removes_object_and_payload() {
        let app = TestApp::new().await;
        let storage = &app.state.storage;
        let alice = Uuid::new_v4();
        let key = key_for(alice, "gone.png");
        storage
            .upload_object(Principal::User(alice), PHOTOS_BUCKET, &key, None, Bytes::from_static(b"x"))
            .await
            .unwrap();
        let path = storage.object_path(PHOTOS_BUCKET, &key);
        assert!(path.exists());

        storage
            .remove_object(Principal::User(alice), PHOTOS_BUCKET, &key)
            .await
            .unwrap();
        assert!(!path.exists());
        assert!(matches!(
            storage.get_object_metadata(Principal::Anonymous, PHOTOS_BUCKET, &key).await,
            Err(StorageError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn stuck_payload_does_not_fail_removal() {
        let app = TestApp::new().await;
        let storage = &app.state.storage;
        let alice = Uuid::new_v4();
        let key = key_for(alice, "stuck.png");
        storage
            .upload_object(Principal::User(alice), PHOTOS_BUCKET, &key, None, Bytes::from_static(b"x"))
            .await
            .unwrap();

        // A non-empty directory where the payload was cannot be removed as a file.
        let path = storage.object_path(PHOTOS_BUCKET, &key);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("keep"), b"k").unwrap();

        storage
            .remove_object(Principal::User(alice), PHOTOS_BUCKET, &key)
            .await
            .unwrap();
        assert!(path.exists());
        assert!(matches!(
            storage.get_object_metadata(Principal::Anonymous, PHOTOS_BUCKET, &key).await,
            Err(StorageError::ObjectNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn existing_keys_are_not_overwritten() {
        let app = TestApp::new().await;
        let storage = &app.state.storage;
        let alice = Uuid::new_v4();
        let key = key_for(alice, "same.png");
        let me = Principal::User(alice);

        storage
            .upload_object(me, PHOTOS_BUCKET, &key, None, Bytes::from_static(b"one"))
            .await
            .unwrap();
        let err = storage
            .upload_object(me, PHOTOS_BUCKET, &key, None, Bytes::from_static(b"two"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate { .. }));

        let (_, mut file) = storage.get_object_reader(me, PHOTOS_BUCKET, &key).await.unwrap();
        let mut body = Vec::new();
        file.read_to_end(&mut body).await.unwrap();
        assert_eq!(body, b"one");
    }

    #[tokio::test]
    async fn rejects_bad_keys_and_buckets() {
        let app = TestApp::new().await;
        let storage = &app.state.storage;
        let me = Principal::User(Uuid::new_v4());

        for key in ["", "/abs.png", "a/../b.png", "a//b.png", "dir/"] {
            let res = storage.get_object_metadata(me, PHOTOS_BUCKET, key).await;
            assert!(matches!(res, Err(StorageError::InvalidObjectKey)), "{key:?}");
        }
        assert!(matches!(
            storage.get_object_metadata(me, "Photos", "a/b.png").await,
            Err(StorageError::InvalidBucketName { .. })
        ));
        assert!(matches!(
            storage.get_object_metadata(me, "videos", "a/b.png").await,
            Err(StorageError::BucketNotFound(_))
        ));
    }

    #[tokio::test]
    async fn public_url_joins_base_bucket_and_key() {
        let app = TestApp::new().await;
        let url = app.state.storage.public_url(PHOTOS_BUCKET, "u/1.png");
        assert_eq!(url, "http://localhost:3000/storage/photos/u/1.png");
    }
}
