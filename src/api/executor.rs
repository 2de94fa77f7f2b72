use crate::config::Config;
use crate::error::SpotifyError;
use crate::retry::{self, Retry};
use crate::token::{TokenManager, TokenUpdateCallback};
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

/// The capability bundle callers supply per logical operation: who the user
/// is, their long-lived refresh credential, and an optional hook to persist
/// refreshed access tokens. The core owns no durable user state.
#[derive(Clone)]
pub struct UserContext {
    pub user_id: i64,
    pub refresh_token: String,
    pub on_token_update: Option<TokenUpdateCallback>,
}

impl UserContext {
    pub fn new(user_id: i64, refresh_token: impl Into<String>) -> Self {
        Self {
            user_id,
            refresh_token: refresh_token.into(),
            on_token_update: None,
        }
    }

    pub fn with_callback(mut self, cb: TokenUpdateCallback) -> Self {
        self.on_token_update = Some(cb);
        self
    }
}

/// Query parameters and optional JSON body for one request.
#[derive(Default, Clone)]
pub struct RequestOptions {
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl RequestOptions {
    pub fn query(pairs: &[(&str, &str)]) -> Self {
        Self {
            query: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: None,
        }
    }

    pub fn json(body: Value) -> Self {
        Self {
            query: Vec::new(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Error)]
enum AttemptError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("status {status}: {body}")]
    Status {
        status: StatusCode,
        body: String,
        retry_after: Option<u64>,
    },
    #[error("unauthorized")]
    Unauthorized,
    #[error("unparseable response body: {0}")]
    Parse(String),
}

/// Performs one upstream operation with a valid bearer credential: bounded
/// retry on transient failure, and exactly one refresh-and-retry cycle when
/// the resource API rejects the token with a 401.
pub struct RequestExecutor {
    http: Client,
    tokens: Arc<TokenManager>,
    cfg: Arc<Config>,
}

impl RequestExecutor {
    pub fn new(cfg: Arc<Config>, tokens: Arc<TokenManager>) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(cfg.request_timeout_secs))
            .build()?;
        Ok(Self { http, tokens, cfg })
    }

    pub async fn execute(
        &self,
        method: Method,
        endpoint: &str,
        ctx: &UserContext,
        opts: RequestOptions,
    ) -> Result<Value, SpotifyError> {
        let token = self
            .tokens
            .resolve_access_token(ctx.user_id, &ctx.refresh_token, ctx.on_token_update.as_ref())
            .await?;
        let url = format!("{}{}", self.cfg.api_base, endpoint);

        match self.send_with_retry(&method, &url, &token, &opts).await {
            Ok(v) => Ok(v),
            Err((_, AttemptError::Unauthorized)) => {
                // The cached token was wrong despite passing the expiry
                // check. Invalidate, refresh once, retry once; a second 401
                // is terminal so a permanently-bad refresh credential cannot
                // loop.
                warn!(
                    "Spotify returned 401 for user {} on {}; forcing one token refresh",
                    ctx.user_id, endpoint
                );
                let fresh = self
                    .tokens
                    .force_refresh(ctx.user_id, &ctx.refresh_token, ctx.on_token_update.as_ref())
                    .await?;
                match Self::send_once(&self.http, &method, &url, &fresh, &opts).await {
                    Ok(v) => Ok(v),
                    Err(AttemptError::Unauthorized) => Err(SpotifyError::RequestFailed {
                        endpoint: endpoint.to_string(),
                        attempts: 2,
                        reason: "unauthorized after token refresh".into(),
                    }),
                    Err(e) => Err(SpotifyError::RequestFailed {
                        endpoint: endpoint.to_string(),
                        attempts: 2,
                        reason: e.to_string(),
                    }),
                }
            }
            Err((attempts, e)) => Err(SpotifyError::RequestFailed {
                endpoint: endpoint.to_string(),
                attempts,
                reason: e.to_string(),
            }),
        }
    }

    async fn send_with_retry(
        &self,
        method: &Method,
        url: &str,
        token: &str,
        opts: &RequestOptions,
    ) -> Result<Value, (u32, AttemptError)> {
        let classify = |e: &AttemptError| match e {
            AttemptError::Transport(_) => Retry::Yes,
            AttemptError::Status {
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
            AttemptError::Unauthorized => Retry::No,
            AttemptError::Parse(_) => Retry::No,
        };

        retry::with_backoff(
            "api request",
            self.cfg.max_retries,
            Duration::from_millis(self.cfg.retry_base_ms),
            classify,
            |_attempt| {
                let http = self.http.clone();
                let method = method.clone();
                let url = url.to_string();
                let token = token.to_string();
                let opts = opts.clone();
                async move { Self::send_once(&http, &method, &url, &token, &opts).await }
            },
        )
        .await
    }

    async fn send_once(
        http: &Client,
        method: &Method,
        url: &str,
        token: &str,
        opts: &RequestOptions,
    ) -> Result<Value, AttemptError> {
        let mut req = http
            .request(method.clone(), url)
            .header(AUTHORIZATION, format!("Bearer {}", token));
        if !opts.query.is_empty() {
            req = req.query(&opts.query);
        }
        if let Some(body) = &opts.body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(AttemptError::Transport)?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(AttemptError::Unauthorized);
        }
        if !status.is_success() {
            let retry_after = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());
            let body = resp.text().await.unwrap_or_default();
            return Err(AttemptError::Status {
                status,
                body,
                retry_after,
            });
        }

        let bytes = resp.bytes().await.map_err(AttemptError::Transport)?;
        if bytes.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_slice(&bytes).map_err(|e| AttemptError::Parse(e.to_string()))
    }
}
