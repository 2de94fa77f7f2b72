use serde::Deserialize;
use std::env;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Spotify application client id.
    pub client_id: String,
    /// Spotify application client secret.
    pub client_secret: String,

    /// Authorization server base URL. May be overridden by the
    /// SPOTIFY_AUTH_BASE env var (useful for tests).
    #[serde(default = "default_auth_base")]
    pub auth_base: String,

    /// Resource API base URL, including the /v1 path. May be overridden by
    /// the SPOTIFY_API_BASE env var.
    #[serde(default = "default_api_base")]
    pub api_base: String,

    /// Redirect URL used when bootstrapping user authorization.
    #[serde(default = "default_redirect_url")]
    pub redirect_url: String,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Total attempts per upstream operation (refresh and resource calls).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,

    /// Seconds subtracted from the provider-reported token lifetime before
    /// caching, so entries are evicted strictly before the token goes bad.
    #[serde(default = "default_token_safety_buffer")]
    pub token_safety_buffer_secs: i64,

    /// Path to the SQLite token cache. When absent, an in-process cache is
    /// used instead.
    #[serde(default)]
    pub token_cache_db_path: Option<PathBuf>,

    /// Set when the provider rotates refresh tokens (single-use). Serializes
    /// refreshes per user so concurrent callers cannot invalidate each other.
    #[serde(default)]
    pub serialize_refreshes: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
}

fn default_auth_base() -> String {
    env::var("SPOTIFY_AUTH_BASE").unwrap_or_else(|_| "https://accounts.spotify.com".into())
}
fn default_api_base() -> String {
    env::var("SPOTIFY_API_BASE").unwrap_or_else(|_| "https://api.spotify.com/v1".into())
}
fn default_redirect_url() -> String { "http://127.0.0.1:8888/".into() }
fn default_request_timeout() -> u64 { 30 }
fn default_max_retries() -> u32 { 3 }
fn default_retry_base_ms() -> u64 { 1000 }
fn default_token_safety_buffer() -> i64 { 300 }
fn default_log_dir() -> PathBuf { "/var/log/syncsweat".into() }

impl Config {
    pub fn from_path(path: &std::path::Path) -> anyhow::Result<Self> {
        let s = std::fs::read_to_string(path)?;
        let cfg: Config = toml::from_str(&s)?;
        Ok(cfg)
    }
}
