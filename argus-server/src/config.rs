//! Environment-driven server configuration.

use anyhow::{Context, Result};
use std::env;
use tracing::warn;

/// Default remote source API base.
const DEFAULT_SOURCE_API_BASE: &str = "https://api.github.com";

/// Runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_host: String,
    pub server_port: u16,
    pub database_url: String,
    pub jwt_secret: String,
    pub admin_username: String,
    /// Plaintext credential or a PHC-format `$argon2` hash.
    pub admin_password: String,
    /// `None` means permissive CORS (development default).
    pub cors_origins: Option<Vec<String>>,
    /// Absent token disables the sync scheduler entirely.
    pub source_token: Option<String>,
    pub source_api_base: String,
    /// Minutes between sync cycles, clamped to 1-60.
    pub sync_interval_min: u64,
    pub similarity_threshold: f64,
    pub alert_webhook_url: Option<String>,
    /// When false the ingest endpoint also requires a bearer token.
    pub ingest_public: bool,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL environment variable is required")?;
        let jwt_secret =
            env::var("JWT_SECRET").context("JWT_SECRET environment variable is required")?;

        let admin_username = env::var("ADMIN_USERNAME").unwrap_or_else(|_| "admin".to_string());
        let admin_password = match env::var("ADMIN_PASSWORD") {
            Ok(password) => password,
            Err(_) => {
                warn!("ADMIN_PASSWORD not set - using the default credential, change it for production");
                "changeme".to_string()
            }
        };

        let cors_origins = env::var("CORS_ORIGINS").ok().map(|raw| {
            raw.split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect()
        });

        let sync_interval_min = env::var("SYNC_INTERVAL_MIN")
            .ok()
            .and_then(|raw| raw.parse::<u64>().ok())
            .map(|minutes| {
                if !(1..=60).contains(&minutes) {
                    let clamped = minutes.clamp(1, 60);
                    warn!("SYNC_INTERVAL_MIN {minutes} out of range, clamping to {clamped}");
                    clamped
                } else {
                    minutes
                }
            })
            .unwrap_or(5);

        let similarity_threshold = env::var("SIMILARITY_THRESHOLD")
            .ok()
            .and_then(|raw| raw.parse::<f64>().ok())
            .map(|threshold| threshold.clamp(0.0, 1.0))
            .unwrap_or(0.8);

        let ingest_public = env::var("INGEST_PUBLIC")
            .map(|raw| raw != "false" && raw != "0")
            .unwrap_or(true);

        Ok(Self {
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            server_port: env::var("SERVER_PORT")
                .ok()
                .and_then(|raw| raw.parse().ok())
                .unwrap_or(3000),
            database_url,
            jwt_secret,
            admin_username,
            admin_password,
            cors_origins,
            source_token: env::var("SOURCE_TOKEN").ok().filter(|t| !t.is_empty()),
            source_api_base: env::var("SOURCE_API_BASE")
                .unwrap_or_else(|_| DEFAULT_SOURCE_API_BASE.to_string()),
            sync_interval_min,
            similarity_threshold,
            alert_webhook_url: env::var("ALERT_WEBHOOK_URL").ok().filter(|u| !u.is_empty()),
            ingest_public,
        })
    }

    /// Minimal configuration for tests: in-memory-friendly defaults, no
    /// remote services.
    pub fn for_tests() -> Self {
        Self {
            server_host: "127.0.0.1".to_string(),
            server_port: 0,
            database_url: String::new(),
            jwt_secret: "test-secret".to_string(),
            admin_username: "admin".to_string(),
            admin_password: "admin".to_string(),
            cors_origins: None,
            source_token: None,
            source_api_base: DEFAULT_SOURCE_API_BASE.to_string(),
            sync_interval_min: 5,
            similarity_threshold: 0.8,
            alert_webhook_url: None,
            ingest_public: true,
        }
    }
}
