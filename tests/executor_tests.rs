use chrono::Utc;
use mockito::Server;
use reqwest::Method;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use syncsweat_spotify_core::api::executor::{RequestExecutor, RequestOptions, UserContext};
use syncsweat_spotify_core::cache::{CachedCredential, CredentialCache, MemoryCredentialCache};
use syncsweat_spotify_core::config::Config;
use syncsweat_spotify_core::error::SpotifyError;
use syncsweat_spotify_core::retry::backoff_delay;
use syncsweat_spotify_core::token::TokenManager;

fn test_config(base: &str) -> Config {
    Config {
        client_id: "cid".into(),
        client_secret: "secret".into(),
        auth_base: base.into(),
        api_base: base.into(),
        redirect_url: "http://127.0.0.1:8888/".into(),
        request_timeout_secs: 5,
        max_retries: 3,
        retry_base_ms: 5,
        token_safety_buffer_secs: 300,
        token_cache_db_path: None,
        serialize_refreshes: false,
        log_dir: std::env::temp_dir(),
    }
}

struct Setup {
    executor: RequestExecutor,
    cache: Arc<MemoryCredentialCache>,
}

fn setup(cfg: Config) -> Setup {
    let cfg = Arc::new(cfg);
    let cache = Arc::new(MemoryCredentialCache::new());
    let tokens = Arc::new(TokenManager::new(cfg.clone(), cache.clone()).expect("manager"));
    let executor = RequestExecutor::new(cfg, tokens).expect("executor");
    Setup { executor, cache }
}

async fn seed_token(cache: &MemoryCredentialCache, user_id: i64, token: &str) {
    let now = Utc::now().timestamp();
    cache
        .put(
            user_id,
            &CachedCredential {
                access_token: token.into(),
                expires_at: now + 3600,
                raw: json!({}),
            },
            3300,
        )
        .await
        .expect("seed token");
}

#[test]
fn success_returns_parsed_body() {
    let mut server = Server::new();
    let m = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer valid-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"athlete","display_name":"Athlete"}"#)
        .expect(1)
        .create();

    let s = setup(test_config(&server.url()));
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let body = rt.block_on(async {
        seed_token(&s.cache, 1, "valid-token").await;
        s.executor
            .execute(
                Method::GET,
                "/me",
                &UserContext::new(1, "refresh-1"),
                RequestOptions::default(),
            )
            .await
            .expect("execute")
    });

    assert_eq!(body["id"], "athlete");
    m.assert();
}

#[test]
fn unauthorized_triggers_one_refresh_and_retry() {
    let mut server = Server::new();
    // The stale bearer is rejected once, the refreshed bearer succeeds.
    let m_stale = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer stale")
        .with_status(401)
        .with_body(r#"{"error":"unauthorized"}"#)
        .expect(1)
        .create();
    let m_fresh = server
        .mock("GET", "/me")
        .match_header("authorization", "Bearer fresh-token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"id":"athlete"}"#)
        .expect(1)
        .create();
    let m_token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"access_token": "fresh-token", "expires_in": 3600}).to_string())
        .expect(1)
        .create();

    let s = setup(test_config(&server.url()));
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let body = rt.block_on(async {
        // Cached token passes the expiry check but was revoked upstream.
        seed_token(&s.cache, 1, "stale").await;
        s.executor
            .execute(
                Method::GET,
                "/me",
                &UserContext::new(1, "refresh-1"),
                RequestOptions::default(),
            )
            .await
            .expect("execute")
    });

    assert_eq!(body["id"], "athlete");
    m_stale.assert();
    m_fresh.assert();
    m_token.assert();

    // The stale entry was invalidated and replaced.
    let cached = rt
        .block_on(s.cache.get(1))
        .expect("get")
        .expect("cached");
    assert_eq!(cached.access_token, "fresh-token");
}

#[test]
fn second_unauthorized_is_terminal() {
    let mut server = Server::new();
    let m_me = server
        .mock("GET", "/me")
        .with_status(401)
        .with_body(r#"{"error":"unauthorized"}"#)
        .expect(2)
        .create();
    let m_token = server
        .mock("POST", "/api/token")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"access_token": "fresh-token", "expires_in": 3600}).to_string())
        .expect(1)
        .create();

    let s = setup(test_config(&server.url()));
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let err = rt
        .block_on(async {
            seed_token(&s.cache, 1, "stale").await;
            s.executor
                .execute(
                    Method::GET,
                    "/me",
                    &UserContext::new(1, "refresh-1"),
                    RequestOptions::default(),
                )
                .await
        })
        .expect_err("should fail");

    match err {
        SpotifyError::RequestFailed { endpoint, .. } => assert_eq!(endpoint, "/me"),
        other => panic!("unexpected error: {:?}", other),
    }
    // Exactly one refresh and one retried request; no refresh loop.
    m_me.assert();
    m_token.assert();
}

#[test]
fn transient_errors_exhaust_retries() {
    let mut server = Server::new();
    let m = server
        .mock("GET", "/me")
        .with_status(500)
        .with_body(r#"{"error":"server"}"#)
        .expect(3)
        .create();

    let s = setup(test_config(&server.url()));
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let err = rt
        .block_on(async {
            seed_token(&s.cache, 1, "valid-token").await;
            s.executor
                .execute(
                    Method::GET,
                    "/me",
                    &UserContext::new(1, "refresh-1"),
                    RequestOptions::default(),
                )
                .await
        })
        .expect_err("should fail");

    match &err {
        SpotifyError::RequestFailed { endpoint, attempts, .. } => {
            assert_eq!(endpoint, "/me");
            assert_eq!(*attempts, 3);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(err.to_string().contains("/me"));
    m.assert();
}

#[test]
fn rate_limit_is_retried_until_exhaustion() {
    let mut server = Server::new();
    let m = server
        .mock("GET", "/me")
        .with_status(429)
        .with_header("retry-after", "0")
        .with_body(r#"{"error":"rate_limited"}"#)
        .expect(3)
        .create();

    let s = setup(test_config(&server.url()));
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let err = rt
        .block_on(async {
            seed_token(&s.cache, 1, "valid-token").await;
            s.executor
                .execute(
                    Method::GET,
                    "/me",
                    &UserContext::new(1, "refresh-1"),
                    RequestOptions::default(),
                )
                .await
        })
        .expect_err("should fail");

    assert!(matches!(err, SpotifyError::RequestFailed { attempts: 3, .. }));
    m.assert();
}

#[test]
fn client_errors_are_not_retried() {
    let mut server = Server::new();
    let m = server
        .mock("GET", "/playlists/missing")
        .with_status(404)
        .with_body(r#"{"error":"not found"}"#)
        .expect(1)
        .create();

    let s = setup(test_config(&server.url()));
    let rt = tokio::runtime::Runtime::new().expect("rt");
    let err = rt
        .block_on(async {
            seed_token(&s.cache, 1, "valid-token").await;
            s.executor
                .execute(
                    Method::GET,
                    "/playlists/missing",
                    &UserContext::new(1, "refresh-1"),
                    RequestOptions::default(),
                )
                .await
        })
        .expect_err("should fail");

    assert!(matches!(err, SpotifyError::RequestFailed { attempts: 1, .. }));
    m.assert();
}

#[test]
fn backoff_delays_double_and_never_decrease() {
    let base = Duration::from_secs(1);
    let delays: Vec<Duration> = (0..3).map(|a| backoff_delay(base, a)).collect();
    assert_eq!(delays[0], Duration::from_secs(1));
    assert_eq!(delays[1], Duration::from_secs(2));
    assert_eq!(delays[2], Duration::from_secs(4));
    assert!(delays.windows(2).all(|w| w[0] <= w[1]));
}
