use super::executor::{RequestExecutor, RequestOptions, UserContext};
use super::{MusicService, WorkoutPlaylist};
use crate::cache::{CredentialCache, MemoryCredentialCache, SqliteCredentialCache};
use crate::config::Config;
use crate::error::SpotifyError;
use crate::recommend;
use crate::token::TokenManager;
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::Arc;

/// Spotify client backed by the Spotify Web API. All auth and retry
/// mechanics are delegated to the request executor; this layer only maps
/// domain operations onto endpoints and reshapes the JSON results.
pub struct SpotifyClient {
    exec: RequestExecutor,
}

impl SpotifyClient {
    pub fn new(cfg: Arc<Config>, tokens: Arc<TokenManager>) -> anyhow::Result<Self> {
        Ok(Self {
            exec: RequestExecutor::new(cfg, tokens)?,
        })
    }

    /// Build a client with the cache backend chosen from config: SQLite when
    /// a cache DB path is configured, in-process otherwise.
    pub fn from_config(cfg: Arc<Config>) -> anyhow::Result<Self> {
        let cache: Arc<dyn CredentialCache> = match &cfg.token_cache_db_path {
            Some(path) => Arc::new(SqliteCredentialCache::new(path.clone())),
            None => Arc::new(MemoryCredentialCache::new()),
        };
        let tokens = Arc::new(TokenManager::new(cfg.clone(), cache)?);
        Self::new(cfg, tokens)
    }

    fn encode_path_segment(s: &str) -> String {
        url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
    }
}

#[async_trait]
impl MusicService for SpotifyClient {
    async fn get_user_profile(&self, ctx: &UserContext) -> Result<Value, SpotifyError> {
        self.exec
            .execute(Method::GET, "/me", ctx, RequestOptions::default())
            .await
    }

    async fn get_user_playlists(
        &self,
        ctx: &UserContext,
        limit: u32,
    ) -> Result<Value, SpotifyError> {
        let limit = limit.to_string();
        self.exec
            .execute(
                Method::GET,
                "/me/playlists",
                ctx,
                RequestOptions::query(&[("limit", limit.as_str())]),
            )
            .await
    }

    async fn search_tracks(&self, ctx: &UserContext, query: &str) -> Result<Value, SpotifyError> {
        self.exec
            .execute(
                Method::GET,
                "/search",
                ctx,
                RequestOptions::query(&[("q", query), ("type", "track")]),
            )
            .await
    }

    async fn get_top_tracks(&self, ctx: &UserContext) -> Result<Value, SpotifyError> {
        match self
            .exec
            .execute(Method::GET, "/me/top/tracks", ctx, RequestOptions::default())
            .await
        {
            Ok(v) => Ok(json!({ "items": v["items"].as_array().cloned().unwrap_or_default() })),
            Err(e) => {
                warn!("fetching top tracks failed: {}; returning empty list", e);
                Ok(json!({ "items": [] }))
            }
        }
    }

    async fn get_top_artists(&self, ctx: &UserContext) -> Result<Value, SpotifyError> {
        match self
            .exec
            .execute(Method::GET, "/me/top/artists", ctx, RequestOptions::default())
            .await
        {
            Ok(v) => Ok(json!({ "items": v["items"].as_array().cloned().unwrap_or_default() })),
            Err(e) => {
                warn!("fetching top artists failed: {}; returning empty list", e);
                Ok(json!({ "items": [] }))
            }
        }
    }

    async fn get_seed_tracks(
        &self,
        ctx: &UserContext,
        genres: &[String],
        workout_type: &str,
    ) -> Result<Vec<String>, SpotifyError> {
        let seed_genres = recommend::seed_genres(genres, workout_type).join(",");
        debug!("requesting seed tracks for genres [{}]", seed_genres);
        let resp = self
            .exec
            .execute(
                Method::GET,
                "/recommendations",
                ctx,
                RequestOptions::query(&[("seed_genres", seed_genres.as_str()), ("limit", "2")]),
            )
            .await?;
        let ids = resp["tracks"]
            .as_array()
            .map(|tracks| {
                tracks
                    .iter()
                    .filter_map(|t| t["id"].as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Ok(ids)
    }

    async fn create_playlist(
        &self,
        ctx: &UserContext,
        spotify_user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<Value, SpotifyError> {
        let endpoint = format!(
            "/users/{}/playlists",
            Self::encode_path_segment(spotify_user_id)
        );
        let body = json!({
            "name": name,
            "description": description,
            "public": public
        });
        self.exec
            .execute(Method::POST, &endpoint, ctx, RequestOptions::json(body))
            .await
    }

    async fn add_tracks_to_playlist(
        &self,
        ctx: &UserContext,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<Value, SpotifyError> {
        let endpoint = format!("/playlists/{}/tracks", playlist_id);
        let body = json!({ "uris": track_uris });
        self.exec
            .execute(Method::POST, &endpoint, ctx, RequestOptions::json(body))
            .await
    }

    async fn create_workout_playlist(
        &self,
        ctx: &UserContext,
        spotify_user_id: &str,
        workout_type: &str,
        track_uris: &[String],
    ) -> Result<WorkoutPlaylist, SpotifyError> {
        let name = recommend::playlist_name(workout_type);
        let description = recommend::playlist_description(workout_type);

        let playlist = self
            .create_playlist(ctx, spotify_user_id, &name, &description, false)
            .await?;
        let playlist_id = playlist["id"]
            .as_str()
            .ok_or_else(|| SpotifyError::MalformedResponse {
                endpoint: "/users/{user_id}/playlists".into(),
                reason: "no playlist id in create response".into(),
            })?
            .to_string();

        // Create-then-add is not transactional: if the add step fails the
        // playlist stays behind and the error names it.
        let added = match self
            .add_tracks_to_playlist(ctx, &playlist_id, track_uris)
            .await
        {
            Ok(v) => v,
            Err(e) => {
                return Err(SpotifyError::PartialPlaylist {
                    playlist_id,
                    reason: e.to_string(),
                })
            }
        };
        if added["snapshot_id"].as_str().is_none() {
            return Err(SpotifyError::PartialPlaylist {
                playlist_id,
                reason: format!("no snapshot_id in add-tracks response: {}", added),
            });
        }

        Ok(WorkoutPlaylist {
            id: playlist_id,
            name,
            external_url: playlist["external_urls"]["spotify"]
                .as_str()
                .map(String::from),
            image_url: playlist["images"][0]["url"].as_str().map(String::from),
        })
    }
}
