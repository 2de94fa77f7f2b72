use crate::config::Config;
use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use rand::{distributions::Alphanumeric, Rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;
use url::Url;

/// This module implements the user authorization bootstrap:
/// 1. Build the Spotify authorization URL (with a random `state`).
/// 2. The user approves in a browser and is redirected back.
/// 3. The `code` param is exchanged for an access_token + refresh_token.
/// 4. The refresh token is handed to the endpoint layer, which persists it
///    against the user record; the core keeps no durable state.
///
/// `run_spotify_auth` wraps the flow interactively for manual setup, which
/// avoids running an embedded HTTP server.

const SCOPES: &[&str] = &[
    "user-read-private",
    "user-read-email",
    "user-library-read",
    "user-top-read",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
];

#[derive(Debug, Serialize, Deserialize)]
pub struct AuthorizedTokens {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// Random alphanumeric `state` parameter for the authorization request.
pub fn generate_state() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(16)
        .map(char::from)
        .collect()
}

pub fn build_auth_url(cfg: &Config, redirect_uri: &str, state: Option<&str>) -> Result<String> {
    let mut url = Url::parse(&format!("{}/authorize", cfg.auth_base))?;
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", &cfg.client_id)
        .append_pair("scope", &SCOPES.join(" "))
        .append_pair("redirect_uri", redirect_uri);
    if let Some(state) = state {
        url.query_pairs_mut().append_pair("state", state);
    }
    Ok(url.to_string())
}

/// Exchange an authorization code for tokens.
pub async fn exchange_code(cfg: &Config, code: &str, redirect_uri: &str) -> Result<AuthorizedTokens> {
    let client = Client::new();
    let params = [
        ("grant_type", "authorization_code"),
        ("code", code),
        ("redirect_uri", redirect_uri),
    ];
    let auth_header = format!(
        "Basic {}",
        general_purpose::STANDARD.encode(format!("{}:{}", cfg.client_id, cfg.client_secret))
    );
    let resp = client
        .post(format!("{}/api/token", cfg.auth_base))
        .header("Authorization", auth_header)
        .form(&params)
        .send()
        .await?;
    let status = resp.status();
    if !status.is_success() {
        let txt = resp.text().await.unwrap_or_default();
        return Err(anyhow!("token exchange failed: {} => {}", status, txt));
    }
    Ok(resp.json().await?)
}

/// Interactive authorization for manual setup: prints the auth URL, reads
/// the pasted redirect URL back, and prints the resulting tokens so the
/// operator can store the refresh token on the user's backend record.
pub async fn run_spotify_auth(cfg: &Config) -> Result<()> {
    use std::io;

    println!(
        "Enter the redirect URI registered with your Spotify app (leave blank for {}):",
        cfg.redirect_url
    );
    let mut redirect_uri = String::new();
    io::stdin().read_line(&mut redirect_uri)?;
    let redirect_uri = {
        let trimmed = redirect_uri.trim();
        if trimmed.is_empty() {
            cfg.redirect_url.clone()
        } else {
            trimmed.to_string()
        }
    };

    let state = generate_state();
    let url = build_auth_url(cfg, &redirect_uri, Some(&state))?;
    println!(
        "Open this URL in your browser and authorize the application:\n\n{}\n",
        url
    );
    println!("After authorizing, you'll be redirected to your redirect URI. Copy the full redirect URL and paste it here.");
    println!("Paste redirect URL:");
    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    let input = input.trim();
    let parsed = Url::parse(input).map_err(|e| anyhow!("invalid url pasted: {}", e))?;
    let code = parsed
        .query_pairs()
        .find(|(k, _)| k == "code")
        .ok_or_else(|| anyhow!("no code in redirect URL"))?
        .1
        .into_owned();
    if let Some((_, returned_state)) = parsed.query_pairs().find(|(k, _)| k == "state") {
        if returned_state != state {
            return Err(anyhow!("state mismatch in redirect URL"));
        }
    }

    let tokens = exchange_code(cfg, &code, &redirect_uri).await?;
    info!("Spotify authorization code exchanged successfully");

    println!("{}", crate::messages::SPOTIFY_AUTH_SUCCESS);
    println!("access_token:  {}", tokens.access_token);
    match &tokens.refresh_token {
        Some(rt) => {
            println!("refresh_token: {}", rt);
            println!("Store the refresh token on the user's record; the backend exchanges it for fresh access tokens automatically.");
        }
        None => println!("No refresh token returned; re-run authorization with consent."),
    }
    Ok(())
}
