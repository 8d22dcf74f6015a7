use super::*;
use crate::{
    access::Principal,
    models::{bucket::PHOTOS_BUCKET, object::StoredObject},
    services::{DataError, storage_service::StorageError},
    testing::{PASSWORD, TestApp},
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Wraps a backend, counting calls and failing chosen steps on demand.
struct Scripted<B> {
    inner: B,
    calls: AtomicUsize,
    fail_insert: AtomicBool,
    fail_delete_metadata: AtomicBool,
}

impl<B> Scripted<B> {
    fn new(inner: B) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            fail_insert: AtomicBool::new(false),
            fail_delete_metadata: AtomicBool::new(false),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl<B: Backend> Backend for Scripted<B> {
    async fn sign_up(&self, creds: &Credentials) -> BackendResult<Session> {
        self.tick();
        self.inner.sign_up(creds).await
    }

    async fn sign_in(&self, creds: &Credentials) -> BackendResult<Session> {
        self.tick();
        self.inner.sign_in(creds).await
    }

    async fn sign_out(&self, session: &Session) -> BackendResult<()> {
        self.tick();
        self.inner.sign_out(session).await
    }

    async fn get_session(&self, access_token: &str) -> BackendResult<Session> {
        self.tick();
        self.inner.get_session(access_token).await
    }

    async fn list_photos(&self, session: &Session, owner: Uuid) -> BackendResult<Vec<Photo>> {
        self.tick();
        self.inner.list_photos(session, owner).await
    }

    async fn insert_photo_metadata(
        &self,
        session: &Session,
        record: NewPhoto,
    ) -> BackendResult<Photo> {
        self.tick();
        if self.fail_insert.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("insert dropped".into()));
        }
        self.inner.insert_photo_metadata(session, record).await
    }

    async fn delete_photo_metadata(&self, session: &Session, id: Uuid) -> BackendResult<Photo> {
        self.tick();
        if self.fail_delete_metadata.load(Ordering::SeqCst) {
            return Err(BackendError::Unavailable("delete dropped".into()));
        }
        self.inner.delete_photo_metadata(session, id).await
    }

    async fn upload_file(
        &self,
        session: &Session,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> BackendResult<StoredObject> {
        self.tick();
        self.inner.upload_file(session, path, bytes, content_type).await
    }

    async fn remove_file(&self, session: &Session, path: &str) -> BackendResult<()> {
        self.tick();
        self.inner.remove_file(session, path).await
    }

    fn public_url(&self, path: &str) -> String {
        self.inner.public_url(path)
    }
}

fn image(name: &str, size: usize) -> ImageFile {
    ImageFile {
        name: name.into(),
        content_type: "image/png".into(),
        bytes: Bytes::from(vec![7u8; size]),
    }
}

async fn client_with_user(app: &TestApp) -> (PhotoClient<Scripted<LocalBackend>>, Session) {
    let client = PhotoClient::new(Scripted::new(LocalBackend::new(app.state.clone())));
    let session = client.sign_up("alice@example.com", PASSWORD).await.unwrap();
    (client, session)
}

#[tokio::test]
async fn five_megabyte_image_uploads() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;

    let photo = client
        .upload(&session, image("Beach.JPG", 5 * 1024 * 1024))
        .await
        .unwrap();
    assert_eq!(photo.file_name, "Beach.JPG");
    assert_eq!(photo.file_size, Some(5 * 1024 * 1024));
    assert!(photo.file_path.starts_with(&format!("{}/", session.user.id)));
    assert!(photo.file_path.ends_with(".jpg"));

    let gallery = client.gallery(&session).await.unwrap();
    assert_eq!(gallery.len(), 1);
    assert_eq!(
        gallery[0].url,
        format!("http://localhost:3000/storage/photos/{}", photo.file_path)
    );
}

#[tokio::test]
async fn oversized_file_never_reaches_the_backend() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;
    let before = client.backend().calls();

    let err = client
        .upload(&session, image("huge.png", 11 * 1024 * 1024))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::TooLarge { .. })
    ));
    assert_eq!(client.backend().calls(), before);
}

#[tokio::test]
async fn non_image_is_only_rejected_client_side() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;
    let before = client.backend().calls();

    let text = ImageFile {
        name: "notes.png".into(),
        content_type: "text/plain".into(),
        bytes: Bytes::from_static(b"hello"),
    };
    let err = client.upload(&session, text.clone()).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Validation(ValidationError::NotAnImage { .. })
    ));
    assert_eq!(client.backend().calls(), before);

    // Going around the client, the server stores it anyway.
    let path = format!("{}/notes.png", session.user.id);
    let stored = client
        .backend()
        .upload_file(&session, &path, text.bytes, &text.content_type)
        .await
        .unwrap();
    assert_eq!(stored.content_type.as_deref(), Some("text/plain"));
}

#[tokio::test]
async fn gallery_is_newest_first() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;

    for name in ["one.png", "two.png", "three.png"] {
        client.upload(&session, image(name, 16)).await.unwrap();
    }
    let names: Vec<_> = client
        .gallery(&session)
        .await
        .unwrap()
        .into_iter()
        .map(|item| item.photo.file_name)
        .collect();
    assert_eq!(names, ["three.png", "two.png", "one.png"]);
}

#[tokio::test]
async fn same_content_twice_makes_two_photos() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;

    let results = client
        .upload_many(&session, vec![image("dup.png", 32), image("dup.png", 32)])
        .await;
    let photos: Vec<Photo> = results.into_iter().map(Result::unwrap).collect();
    assert_ne!(photos[0].id, photos[1].id);
    assert_ne!(photos[0].file_path, photos[1].file_path);
    assert_eq!(client.gallery(&session).await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_removes_file_and_record() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;
    let photo = client.upload(&session, image("bye.png", 8)).await.unwrap();

    client.delete(&session, &photo).await.unwrap();

    assert!(client.gallery(&session).await.unwrap().is_empty());
    assert!(matches!(
        app.state
            .storage
            .get_object_metadata(Principal::Anonymous, PHOTOS_BUCKET, &photo.file_path)
            .await,
        Err(StorageError::ObjectNotFound { .. })
    ));
}

#[tokio::test]
async fn failed_metadata_delete_leaves_dangling_record() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;
    let photo = client.upload(&session, image("half.png", 8)).await.unwrap();

    client
        .backend()
        .fail_delete_metadata
        .store(true, Ordering::SeqCst);
    let err = client.delete(&session, &photo).await.unwrap_err();
    assert!(matches!(err, ClientError::DanglingRecord { id, .. } if id == photo.id));
    assert_eq!(err.user_message(), "Delete failed.");

    // The record is still listed, pointing at a file that no longer exists.
    let gallery = client.gallery(&session).await.unwrap();
    assert_eq!(gallery.len(), 1);
    assert_eq!(gallery[0].photo.id, photo.id);
    assert!(
        app.state
            .storage
            .get_object_metadata(Principal::Anonymous, PHOTOS_BUCKET, &photo.file_path)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn dangling_record_can_be_deleted_on_retry() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;
    let photo = client.upload(&session, image("again.png", 8)).await.unwrap();

    client
        .backend()
        .fail_delete_metadata
        .store(true, Ordering::SeqCst);
    let err = client.delete(&session, &photo).await.unwrap_err();
    assert!(matches!(err, ClientError::DanglingRecord { .. }));

    client
        .backend()
        .fail_delete_metadata
        .store(false, Ordering::SeqCst);
    client.delete(&session, &photo).await.unwrap();
    assert!(client.gallery(&session).await.unwrap().is_empty());
}

#[tokio::test]
async fn retrying_someone_elses_photo_stays_not_found() {
    let app = TestApp::new().await;
    let (client, alice) = client_with_user(&app).await;
    let photo = client.upload(&alice, image("mine.png", 8)).await.unwrap();
    let bob = client.sign_up("bob@example.com", PASSWORD).await.unwrap();

    let err = client.delete(&bob, &photo).await.unwrap_err();
    assert!(matches!(
        err,
        ClientError::Backend(BackendError::Data(DataError::NotFound(_)))
    ));

    // Neither the record nor the file was touched.
    assert_eq!(client.gallery(&alice).await.unwrap().len(), 1);
    app.state
        .storage
        .get_object_metadata(Principal::Anonymous, PHOTOS_BUCKET, &photo.file_path)
        .await
        .unwrap();
}

#[tokio::test]
async fn failed_metadata_insert_leaves_orphaned_object() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;
    client.backend().fail_insert.store(true, Ordering::SeqCst);

    let err = client
        .upload(&session, image("lost.png", 8))
        .await
        .unwrap_err();
    let path = match err {
        ClientError::OrphanedObject { path, .. } => path,
        other => panic!("expected an orphaned object, got {other:?}"),
    };

    assert!(client.gallery(&session).await.unwrap().is_empty());
    app.state
        .storage
        .get_object_metadata(Principal::Anonymous, PHOTOS_BUCKET, &path)
        .await
        .expect("object stays behind");
}

#[tokio::test]
async fn session_lifecycle() {
    let app = TestApp::new().await;
    let (client, session) = client_with_user(&app).await;

    let restored = client.restore_session(&session.access_token).await.unwrap();
    assert_eq!(restored.user.id, session.user.id);

    client.sign_out(&session).await.unwrap();
    let err = client.gallery(&session).await.unwrap_err();
    assert!(matches!(err, ClientError::Backend(BackendError::Auth(_))));

    let again = client.sign_in("alice@example.com", PASSWORD).await.unwrap();
    assert_eq!(again.user.id, session.user.id);
}

#[test]
fn extensions_come_from_name_then_content_type() {
    assert_eq!(extension_for("IMG_1.JPEG", "image/jpeg"), "jpeg");
    assert_eq!(extension_for("scan", "image/webp"), "webp");
    assert_eq!(extension_for("scan", "image/png; charset=binary"), "png");
    assert_eq!(extension_for("scan.", "image/png"), "png");
    assert_eq!(extension_for("weird.", "nonsense"), "bin");
}

#[test]
fn storage_path_is_prefixed_by_owner() {
    let owner = Uuid::new_v4();
    let path = storage_path(owner, 1_700_000_000_000_000, "cat.gif", "image/gif");
    let (prefix, rest) = path.split_once('/').unwrap();
    assert_eq!(prefix, owner.to_string());
    assert_eq!(rest, "1700000000000000.gif");
}

#[tokio::test]
async fn stamps_strictly_increase() {
    let app = TestApp::new().await;
    let client = PhotoClient::new(LocalBackend::new(app.state.clone()));
    let a = client.next_stamp();
    let b = client.next_stamp();
    let c = client.next_stamp();
    assert!(a < b && b < c);
}
