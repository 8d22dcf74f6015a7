use anyhow::{Context, Result};
use clap::Parser;
use std::env;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub jwt_secret: Option<String>,
    pub token_ttl_secs: i64,
    pub public_base_url: String,
}

// Keeps the signing secret out of startup logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("storage_dir", &self.storage_dir)
            .field("database_url", &self.database_url)
            .field("jwt_secret", &"<redacted>")
            .field("token_ttl_secs", &self.token_ttl_secs)
            .field("public_base_url", &self.public_base_url)
            .finish()
    }
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Personal photo storage API")]
pub struct Args {
    /// Host to bind to (overrides PHOTO_VAULT_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides PHOTO_VAULT_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where bucket payloads are stored (overrides PHOTO_VAULT_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides PHOTO_VAULT_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Base URL used to build public object links (overrides PHOTO_VAULT_PUBLIC_URL)
    #[arg(long)]
    pub public_base_url: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

const DEFAULT_TOKEN_TTL_SECS: i64 = 60 * 60;

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();

        // --- Environment fallback ---
        let env_host = env::var("PHOTO_VAULT_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_env("PHOTO_VAULT_PORT", 3000u16)?;
        let env_storage =
            env::var("PHOTO_VAULT_STORAGE_DIR").unwrap_or_else(|_| "./data/objects".into());
        let env_db = env::var("PHOTO_VAULT_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/photo_vault.db".into());
        let jwt_secret = env::var("PHOTO_VAULT_JWT_SECRET").ok();
        let token_ttl_secs = parse_env("PHOTO_VAULT_TOKEN_TTL_SECS", DEFAULT_TOKEN_TTL_SECS)?;
        if token_ttl_secs <= 0 {
            anyhow::bail!("PHOTO_VAULT_TOKEN_TTL_SECS must be positive");
        }

        let port = args.port.unwrap_or(env_port);
        let env_public = env::var("PHOTO_VAULT_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://localhost:{}", port));

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port,
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            jwt_secret,
            token_ttl_secs,
            public_base_url: args.public_base_url.unwrap_or(env_public),
        };

        Ok((cfg, args.migrate))
    }

    /// Signing secret for session tokens. Only needed when serving.
    pub fn require_jwt_secret(&self) -> Result<&str> {
        self.jwt_secret
            .as_deref()
            .filter(|secret| !secret.is_empty())
            .context("PHOTO_VAULT_JWT_SECRET must be set to sign session tokens")
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_env<T>(name: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", name, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", name)),
    }
}
