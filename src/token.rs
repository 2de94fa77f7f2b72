use crate::cache::{CachedCredential, CredentialCache};
use crate::config::Config;
use crate::error::SpotifyError;
use crate::retry::{self, Retry};
use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use futures::future::BoxFuture;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, StatusCode};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

/// Invoked with (new_access_token, user_id) after every successful refresh so
/// the caller's durable store stays consistent with the cache. Failures are
/// logged and never fail the resolution.
pub type TokenUpdateCallback =
    Arc<dyn Fn(String, i64) -> BoxFuture<'static, anyhow::Result<()>> + Send + Sync>;

#[derive(Debug, Error)]
enum RefreshAttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("token endpoint returned {status}: {body}")]
    Status {
        status: StatusCode,
        body: String,
        retry_after: Option<u64>,
    },
    #[error("malformed token response: {0}")]
    Malformed(String),
}

struct RefreshedToken {
    access_token: String,
    expires_in: i64,
    raw: serde_json::Value,
}

/// Produces a currently-usable access token for (user_id, refresh_token),
/// refreshing against the authorization server when the cache cannot help,
/// and keeping cache and caller's durable store in sync.
pub struct TokenManager {
    http: Client,
    cache: Arc<dyn CredentialCache>,
    cfg: Arc<Config>,
    refresh_locks: Mutex<HashMap<i64, Arc<Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(cfg: Arc<Config>, cache: Arc<dyn CredentialCache>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self {
            http,
            cache,
            cfg,
            refresh_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Resolve a valid access token: cache hit if the cached credential is
    /// still fresh by its own `expires_at`, otherwise one refresh cycle.
    pub async fn resolve_access_token(
        &self,
        user_id: i64,
        refresh_token: &str,
        on_update: Option<&TokenUpdateCallback>,
    ) -> Result<String, SpotifyError> {
        if let Some(token) = self.cached_usable_token(user_id).await {
            return Ok(token);
        }

        if self.cfg.serialize_refreshes {
            let lock = self.user_refresh_lock(user_id).await;
            let _guard = lock.lock().await;
            // Another caller may have refreshed while we waited for the lock.
            if let Some(token) = self.cached_usable_token(user_id).await {
                return Ok(token);
            }
            self.refresh_and_store(user_id, refresh_token, on_update).await
        } else {
            self.refresh_and_store(user_id, refresh_token, on_update).await
        }
    }

    /// Drop the cached credential and perform exactly one refresh cycle.
    /// Used when the resource API rejected a token that passed the expiry
    /// check (e.g. revoked early).
    pub async fn force_refresh(
        &self,
        user_id: i64,
        refresh_token: &str,
        on_update: Option<&TokenUpdateCallback>,
    ) -> Result<String, SpotifyError> {
        if let Err(e) = self.cache.invalidate(user_id).await {
            warn!("token cache invalidate failed for user {}: {}", user_id, e);
        }
        if self.cfg.serialize_refreshes {
            let lock = self.user_refresh_lock(user_id).await;
            let _guard = lock.lock().await;
            self.refresh_and_store(user_id, refresh_token, on_update).await
        } else {
            self.refresh_and_store(user_id, refresh_token, on_update).await
        }
    }

    /// Cache read with fail-open semantics: a cache error is treated as a
    /// miss so an unavailable cache degrades to the refresh path instead of
    /// failing the whole request.
    async fn cached_usable_token(&self, user_id: i64) -> Option<String> {
        let cached = match self.cache.get(user_id).await {
            Ok(c) => c,
            Err(e) => {
                warn!(
                    "token cache read failed for user {}: {}; treating as miss",
                    user_id, e
                );
                None
            }
        };
        let now = Utc::now().timestamp();
        match cached {
            Some(c) if !c.is_expired(now) => Some(c.access_token),
            Some(_) => {
                debug!("cached token for user {} is past expires_at; refreshing", user_id);
                None
            }
            None => None,
        }
    }

    async fn user_refresh_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        let mut locks = self.refresh_locks.lock().await;
        locks.entry(user_id).or_default().clone()
    }

    async fn refresh_and_store(
        &self,
        user_id: i64,
        refresh_token: &str,
        on_update: Option<&TokenUpdateCallback>,
    ) -> Result<String, SpotifyError> {
        let refreshed = self.refresh_grant(refresh_token).await?;
        let now = Utc::now().timestamp();
        let credential = CachedCredential {
            access_token: refreshed.access_token,
            expires_at: now + refreshed.expires_in,
            raw: refreshed.raw,
        };

        let ttl = refreshed.expires_in - self.cfg.token_safety_buffer_secs;
        if ttl > 0 {
            if let Err(e) = self.cache.put(user_id, &credential, ttl).await {
                warn!("token cache write failed for user {}: {}", user_id, e);
            }
        } else {
            warn!(
                "provider token lifetime {}s is within the safety buffer; not caching",
                refreshed.expires_in
            );
        }

        if let Some(cb) = on_update {
            if let Err(e) = cb(credential.access_token.clone(), user_id).await {
                // The refreshed token is already usable; the durable store
                // just lags until the next refresh.
                warn!("token update callback failed for user {}: {}", user_id, e);
            }
        }

        Ok(credential.access_token)
    }

    /// One refresh grant with bounded retries. Transport errors and 5xx are
    /// retried, 429 honors Retry-After, any other 4xx is terminal.
    async fn refresh_grant(&self, refresh_token: &str) -> Result<RefreshedToken, SpotifyError> {
        let url = format!("{}/api/token", self.cfg.auth_base);
        let auth_header = format!(
            "Basic {}",
            general_purpose::STANDARD
                .encode(format!("{}:{}", self.cfg.client_id, self.cfg.client_secret))
        );
        let base = Duration::from_millis(self.cfg.retry_base_ms);

        let classify = |e: &RefreshAttemptError| match e {
            RefreshAttemptError::Transport(_) => Retry::Yes,
            RefreshAttemptError::Status {
                status, retry_after, ..
            } => {
                if *status == StatusCode::TOO_MANY_REQUESTS {
                    Retry::After(Duration::from_secs(retry_after.unwrap_or(1)))
                } else if status.is_server_error() {
                    Retry::Yes
                } else {
                    Retry::No
                }
            }
            RefreshAttemptError::Malformed(_) => Retry::No,
        };

        let result = retry::with_backoff(
            "token refresh",
            self.cfg.max_retries,
            base,
            classify,
            |_attempt| {
                let http = self.http.clone();
                let url = url.clone();
                let auth_header = auth_header.clone();
                let refresh_token = refresh_token.to_string();
                async move {
                    let resp = http
                        .post(&url)
                        .header(AUTHORIZATION, auth_header)
                        .form(&[
                            ("grant_type", "refresh_token"),
                            ("refresh_token", refresh_token.as_str()),
                        ])
                        .send()
                        .await
                        .map_err(RefreshAttemptError::Transport)?;
                    let status = resp.status();
                    if !status.is_success() {
                        let retry_after = resp
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|s| s.parse::<u64>().ok());
                        let body = resp.text().await.unwrap_or_default();
                        return Err(RefreshAttemptError::Status {
                            status,
                            body,
                            retry_after,
                        });
                    }
                    let j: serde_json::Value = resp
                        .json()
                        .await
                        .map_err(|e| RefreshAttemptError::Malformed(e.to_string()))?;
                    let access_token = j["access_token"]
                        .as_str()
                        .ok_or_else(|| {
                            RefreshAttemptError::Malformed(
                                "no access_token in refresh response".into(),
                            )
                        })?
                        .to_string();
                    let expires_in = j["expires_in"].as_i64().unwrap_or(3600);
                    Ok(RefreshedToken {
                        access_token,
                        expires_in,
                        raw: j,
                    })
                }
            },
        )
        .await;

        result.map_err(|(attempts, e)| SpotifyError::CredentialRefresh {
            attempts,
            reason: e.to_string(),
        })
    }
}
