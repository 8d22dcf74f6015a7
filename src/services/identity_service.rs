//! IdentityService: users, password hashing and session tokens.
//!
//! Access tokens are HS256 JWTs. Each one names a server-side session row in
//! its `sid` claim, and a token is only honoured while that row exists, so
//! signing out takes effect immediately instead of at token expiry.

use super::{is_unique_violation, normalize_email, provisioning};
use crate::{
    access::Principal,
    models::user::{AuthEvent, Credentials, Session, User, UserRecord},
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::{SqliteConnection, SqlitePool};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};
use uuid::Uuid;

const MIN_PASSWORD_LEN: usize = 6;
const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error("a user with this email address has already been registered")]
    EmailTaken,
    #[error("invalid email address")]
    InvalidEmail,
    #[error("password must be at least 6 characters")]
    WeakPassword,
    #[error("missing access token")]
    MissingToken,
    #[error("invalid access token")]
    InvalidToken,
    #[error("access token expired")]
    TokenExpired,
    #[error("profile provisioning failed: {0}")]
    Provisioning(#[source] sqlx::Error),
    #[error("password hashing failed: {0}")]
    Hash(String),
    #[error(transparent)]
    Token(#[from] jsonwebtoken::errors::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type AuthResult<T> = Result<T, AuthError>;

/// JWT claims carried by an access token.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: String,
    /// Session id.
    pub sid: String,
    pub email: String,
    pub iat: i64,
    pub exp: i64,
}

/// Who a verified token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub session_id: Uuid,
}

impl AuthContext {
    pub fn principal(&self) -> Principal {
        Principal::User(self.user_id)
    }
}

struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
}

#[derive(Clone)]
pub struct IdentityService {
    db: Arc<SqlitePool>,
    keys: Arc<TokenKeys>,
    token_ttl: Duration,
    events: broadcast::Sender<AuthEvent>,
}

impl IdentityService {
    pub fn new(db: Arc<SqlitePool>, secret: &[u8], token_ttl_secs: i64) -> Self {
        let mut validation = Validation::default();
        validation.leeway = 0;
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            db,
            keys: Arc::new(TokenKeys {
                encoding: EncodingKey::from_secret(secret),
                decoding: DecodingKey::from_secret(secret),
                validation,
            }),
            token_ttl: Duration::seconds(token_ttl_secs),
            events,
        }
    }

    /// Receive every future [`AuthEvent`].
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    /// Register a user, provision their profile and open a session.
    ///
    /// The user row, the profile row and the first session are written in one
    /// transaction; if any of them fails nothing is persisted.
    pub async fn sign_up(&self, creds: &Credentials) -> AuthResult<Session> {
        let email = normalize_email(&creds.email).ok_or(AuthError::InvalidEmail)?;
        if creds.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AuthError::WeakPassword);
        }
        let password_hash = hash_password(creds.password.clone()).await?;

        let user = UserRecord {
            id: Uuid::new_v4(),
            email,
            password_hash,
            created_at: Utc::now(),
        };

        let mut tx = self.db.begin().await?;
        match sqlx::query(
            "INSERT INTO users (id, email, password_hash, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user.id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.created_at)
        .execute(&mut *tx)
        .await
        {
            Ok(_) => {}
            Err(err) if is_unique_violation(&err) => return Err(AuthError::EmailTaken),
            Err(err) => return Err(AuthError::Sqlx(err)),
        }

        if let Err(err) = provisioning::provision_profile(&mut tx, &user).await {
            warn!(user_id = %user.id, "profile provisioning failed, rolling back sign-up: {}", err);
            tx.rollback().await?;
            return Err(AuthError::Provisioning(err));
        }
        let session = match self.start_session(&mut tx, user.into()).await {
            Ok(session) => session,
            Err(err) => {
                tx.rollback().await?;
                return Err(err);
            }
        };
        tx.commit().await?;

        info!(user_id = %session.user.id, "user created");
        self.publish(AuthEvent::UserCreated {
            user_id: session.user.id,
        });
        self.publish(AuthEvent::SignedIn {
            user_id: session.user.id,
        });
        Ok(session)
    }

    /// Verify credentials and open a new session.
    ///
    /// Unknown emails and wrong passwords produce the same error.
    pub async fn sign_in(&self, creds: &Credentials) -> AuthResult<Session> {
        let email = normalize_email(&creds.email).ok_or(AuthError::InvalidCredentials)?;
        let record = sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, password_hash, created_at FROM users WHERE email = ?",
        )
        .bind(&email)
        .fetch_optional(&*self.db)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

        if !verify_password(creds.password.clone(), record.password_hash.clone()).await? {
            debug!(user_id = %record.id, "password mismatch");
            return Err(AuthError::InvalidCredentials);
        }

        self.open_session(record.into()).await
    }

    /// End the session the token belongs to.
    pub async fn sign_out(&self, access_token: &str) -> AuthResult<()> {
        let ctx = self.authenticate(access_token).await?;
        sqlx::query("DELETE FROM sessions WHERE id = ?")
            .bind(ctx.session_id)
            .execute(&*self.db)
            .await?;
        info!(user_id = %ctx.user_id, "signed out");
        self.publish(AuthEvent::SignedOut {
            user_id: ctx.user_id,
        });
        Ok(())
    }

    /// Resolve a token back into the session it was issued for.
    pub async fn get_session(&self, access_token: &str) -> AuthResult<Session> {
        let ctx = self.authenticate(access_token).await?;
        let expires_at: DateTime<Utc> =
            sqlx::query_scalar("SELECT expires_at FROM sessions WHERE id = ?")
                .bind(ctx.session_id)
                .fetch_optional(&*self.db)
                .await?
                .ok_or(AuthError::InvalidToken)?;
        let user = self.fetch_user(ctx.user_id).await?;
        Ok(Session {
            access_token: access_token.to_string(),
            token_type: "bearer".into(),
            expires_at,
            user,
        })
    }

    /// Verify a token's signature and expiry, and that its session is live.
    pub async fn authenticate(&self, access_token: &str) -> AuthResult<AuthContext> {
        if access_token.is_empty() {
            return Err(AuthError::MissingToken);
        }
        let claims = jsonwebtoken::decode::<Claims>(
            access_token,
            &self.keys.decoding,
            &self.keys.validation,
        )
        .map(|data| data.claims)
        .map_err(|err| match err.kind() {
            ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?;

        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;
        let session_id = Uuid::parse_str(&claims.sid).map_err(|_| AuthError::InvalidToken)?;

        let row: Option<(Uuid, DateTime<Utc>)> =
            sqlx::query_as("SELECT user_id, expires_at FROM sessions WHERE id = ?")
                .bind(session_id)
                .fetch_optional(&*self.db)
                .await?;

        match row {
            Some((owner, _)) if owner != user_id => Err(AuthError::InvalidToken),
            Some((_, expires_at)) if expires_at <= Utc::now() => Err(AuthError::TokenExpired),
            Some(_) => Ok(AuthContext {
                user_id,
                session_id,
            }),
            None => Err(AuthError::InvalidToken),
        }
    }

    /// Delete the caller's account. Profile, photo rows and sessions cascade;
    /// stored objects are left in place.
    pub async fn delete_user(&self, access_token: &str) -> AuthResult<()> {
        let ctx = self.authenticate(access_token).await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(ctx.user_id)
            .execute(&*self.db)
            .await?;
        info!(user_id = %ctx.user_id, "user deleted");
        self.publish(AuthEvent::SignedOut {
            user_id: ctx.user_id,
        });
        Ok(())
    }

    async fn fetch_user(&self, id: Uuid) -> AuthResult<User> {
        sqlx::query_as::<_, UserRecord>(
            "SELECT id, email, password_hash, created_at FROM users WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?
        .map(User::from)
        .ok_or(AuthError::InvalidToken)
    }

    async fn open_session(&self, user: User) -> AuthResult<Session> {
        let mut conn = self.db.acquire().await?;
        let session = self.start_session(&mut conn, user).await?;
        self.publish(AuthEvent::SignedIn {
            user_id: session.user.id,
        });
        Ok(session)
    }

    /// Insert the session row and sign its token. Publishes nothing.
    async fn start_session(&self, conn: &mut SqliteConnection, user: User) -> AuthResult<Session> {
        let session_id = Uuid::new_v4();
        let now = Utc::now();
        let expires_at = now + self.token_ttl;

        sqlx::query("INSERT INTO sessions (id, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
            .bind(session_id)
            .bind(user.id)
            .bind(now)
            .bind(expires_at)
            .execute(&mut *conn)
            .await?;

        let claims = Claims {
            sub: user.id.to_string(),
            sid: session_id.to_string(),
            email: user.email.clone(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };
        let access_token = jsonwebtoken::encode(&Header::default(), &claims, &self.keys.encoding)?;

        debug!(user_id = %user.id, %session_id, "session opened");
        Ok(Session {
            access_token,
            token_type: "bearer".into(),
            expires_at,
            user,
        })
    }

    fn publish(&self, event: AuthEvent) {
        // No subscribers is the normal case for the HTTP server.
        let _ = self.events.send(event);
    }
}

async fn hash_password(password: String) -> AuthResult<String> {
    tokio::task::spawn_blocking(move || {
        let salt_bytes: [u8; 16] = rand::rng().random();
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| AuthError::Hash(e.to_string()))?;
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| AuthError::Hash(e.to_string()))
    })
    .await
    .map_err(|e| AuthError::Hash(e.to_string()))?
}

async fn verify_password(password: String, stored: String) -> AuthResult<bool> {
    tokio::task::spawn_blocking(move || {
        let parsed = PasswordHash::new(&stored).map_err(|e| AuthError::Hash(e.to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok())
    })
    .await
    .map_err(|e| AuthError::Hash(e.to_string()))?
}
