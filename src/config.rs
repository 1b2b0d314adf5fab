use anyhow::{Context, Result};
use clap::Parser;
use std::{env, str::FromStr};

const DEFAULT_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub storage_dir: String,
    pub database_url: String,
    pub api_prefix: String,
    pub cors_origins: Vec<String>,
    pub max_upload_bytes: usize,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug, Default)]
#[command(author, version, about = "Versioned artifact store API")]
pub struct Args {
    /// Host to bind to (overrides ARTIFACT_STORE_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides ARTIFACT_STORE_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where artifact payloads are stored (overrides ARTIFACT_STORE_STORAGE_DIR)
    #[arg(long)]
    pub storage_dir: Option<String>,

    /// Database URL (overrides ARTIFACT_STORE_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Path prefix for the API routes (overrides ARTIFACT_STORE_API_PREFIX)
    #[arg(long)]
    pub api_prefix: Option<String>,

    /// Allowed CORS origin, repeatable (overrides ARTIFACT_STORE_CORS_ORIGINS)
    #[arg(long = "cors-origin")]
    pub cors_origins: Vec<String>,

    /// Largest accepted request body in bytes (overrides ARTIFACT_STORE_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::merge(args, |key| env::var(key))?, migrate))
    }

    /// Merge parsed arguments over values looked up through `lookup`.
    fn merge<F>(args: Args, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("ARTIFACT_STORE_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = parse_var(&lookup, "ARTIFACT_STORE_PORT", 8000u16)?;
        let env_storage =
            lookup("ARTIFACT_STORE_STORAGE_DIR").unwrap_or_else(|_| "./data/blobs".into());
        let env_db = lookup("ARTIFACT_STORE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://./data/meta/artifact_store.db".into());
        let env_prefix = lookup("ARTIFACT_STORE_API_PREFIX").unwrap_or_else(|_| "/api".into());
        let env_origins = lookup("ARTIFACT_STORE_CORS_ORIGINS")
            .map(|raw| split_list(&raw))
            .unwrap_or_else(|_| vec!["http://localhost:5173".into()]);
        let env_max_upload =
            parse_var(&lookup, "ARTIFACT_STORE_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES)?;

        // --- Merge ---
        let cfg = Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            storage_dir: args.storage_dir.unwrap_or(env_storage),
            database_url: args.database_url.unwrap_or(env_db),
            api_prefix: normalize_prefix(&args.api_prefix.unwrap_or(env_prefix)),
            cors_origins: if args.cors_origins.is_empty() {
                env_origins
            } else {
                args.cors_origins
            },
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        };

        Ok(cfg)
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// `api`, `/api/` and `/api` all become `/api`; an empty prefix stays empty.
fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
