use std::env;
use anyhow::{Context, Result};
use zeroize::Zeroizing;

/// The application's configuration, loaded once at startup and immutable
/// for the process lifetime.
#[derive(Clone)]
pub struct Config {
    /// Bind address for the API listener.
    pub host: String,
    /// Bind port for the API listener.
    pub port: u16,
    /// Path of the SQLite database file.
    pub database_path: String,
    /// Shared secret for HMAC-SHA256 request signatures.
    pub api_secret: Zeroizing<String>,
    /// Master administrative secret for token issuance/revocation.
    pub master_key: Zeroizing<String>,
    /// Seconds between automatic control-word rotation passes.
    pub rotation_interval_secs: u64,
    /// Base URL for HLS playlists, key downloads, and logos.
    pub base_stream_url: String,
    /// Per-source ceiling for authenticate calls, per minute.
    pub authenticate_rate_per_minute: u32,
    /// Per-source ceiling for stream-info calls, per minute.
    pub stream_info_rate_per_minute: u32,
    /// Per-source ceiling for administrative calls, per minute.
    pub admin_rate_per_minute: u32,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "6060".to_string())
                .parse()
                .context("Invalid PORT")?,
            database_path: env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "iptv_users.db".to_string()),
            api_secret: Zeroizing::new(
                env::var("API_SECRET_KEY").context("API_SECRET_KEY must be set")?,
            ),
            master_key: Zeroizing::new(
                env::var("MASTER_KEY").context("MASTER_KEY must be set")?,
            ),
            rotation_interval_secs: env::var("ROTATION_INTERVAL")
                .unwrap_or_else(|_| "3600".to_string())
                .parse()
                .context("Invalid ROTATION_INTERVAL")?,
            base_stream_url: env::var("BASE_STREAM_URL")
                .unwrap_or_else(|_| "https://stream.example.com/".to_string()),
            authenticate_rate_per_minute: env::var("RATE_LIMIT_AUTHENTICATE")
                .unwrap_or_else(|_| "10".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_AUTHENTICATE")?,
            stream_info_rate_per_minute: env::var("RATE_LIMIT_STREAM_INFO")
                .unwrap_or_else(|_| "30".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_STREAM_INFO")?,
            admin_rate_per_minute: env::var("RATE_LIMIT_ADMIN")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid RATE_LIMIT_ADMIN")?,
        })
    }
}
