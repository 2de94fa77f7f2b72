use super::executor::UserContext;
use super::{MusicService, WorkoutPlaylist};
use crate::error::SpotifyError;
use crate::recommend;
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::info;

/// A simple mock service used in tests and when no real credentials are
/// present. It logs operations and returns deterministic fake JSON.
pub struct MockMusicService {}

impl MockMusicService {
    pub fn new() -> Self {
        Self {}
    }
}

impl Default for MockMusicService {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MusicService for MockMusicService {
    async fn get_user_profile(&self, ctx: &UserContext) -> Result<Value, SpotifyError> {
        info!("MockMusicService: get_user_profile for user {}", ctx.user_id);
        Ok(json!({ "id": "mock-user", "display_name": "Mock User" }))
    }

    async fn get_user_playlists(
        &self,
        ctx: &UserContext,
        limit: u32,
    ) -> Result<Value, SpotifyError> {
        info!(
            "MockMusicService: get_user_playlists for user {} (limit {})",
            ctx.user_id, limit
        );
        Ok(json!({
            "items": [
                { "id": "playlist1", "name": "Workout Mix 1", "tracks": { "total": 15 } },
                { "id": "playlist2", "name": "Cardio Playlist", "tracks": { "total": 20 } },
                { "id": "playlist3", "name": "Strength Training", "tracks": { "total": 18 } }
            ]
        }))
    }

    async fn search_tracks(&self, ctx: &UserContext, query: &str) -> Result<Value, SpotifyError> {
        info!(
            "MockMusicService: search_tracks '{}' for user {}",
            query, ctx.user_id
        );
        Ok(json!({ "tracks": { "items": [] } }))
    }

    async fn get_top_tracks(&self, ctx: &UserContext) -> Result<Value, SpotifyError> {
        info!("MockMusicService: get_top_tracks for user {}", ctx.user_id);
        Ok(json!({ "items": [] }))
    }

    async fn get_top_artists(&self, ctx: &UserContext) -> Result<Value, SpotifyError> {
        info!("MockMusicService: get_top_artists for user {}", ctx.user_id);
        Ok(json!({ "items": [] }))
    }

    async fn get_seed_tracks(
        &self,
        ctx: &UserContext,
        _genres: &[String],
        workout_type: &str,
    ) -> Result<Vec<String>, SpotifyError> {
        info!(
            "MockMusicService: get_seed_tracks ({}) for user {}",
            workout_type, ctx.user_id
        );
        Ok(vec!["mock-seed-1".into(), "mock-seed-2".into()])
    }

    async fn create_playlist(
        &self,
        ctx: &UserContext,
        _spotify_user_id: &str,
        name: &str,
        _description: &str,
        _public: bool,
    ) -> Result<Value, SpotifyError> {
        info!(
            "MockMusicService: create_playlist '{}' for user {}",
            name, ctx.user_id
        );
        Ok(json!({ "id": format!("mock-playlist-{}", name), "name": name }))
    }

    async fn add_tracks_to_playlist(
        &self,
        ctx: &UserContext,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<Value, SpotifyError> {
        info!(
            "MockMusicService: add_tracks_to_playlist {} -> {} tracks for user {}",
            playlist_id,
            track_uris.len(),
            ctx.user_id
        );
        Ok(json!({ "snapshot_id": "mock-snapshot" }))
    }

    async fn create_workout_playlist(
        &self,
        ctx: &UserContext,
        _spotify_user_id: &str,
        workout_type: &str,
        track_uris: &[String],
    ) -> Result<WorkoutPlaylist, SpotifyError> {
        info!(
            "MockMusicService: create_workout_playlist ({}) with {} tracks for user {}",
            workout_type,
            track_uris.len(),
            ctx.user_id
        );
        Ok(WorkoutPlaylist {
            id: "mock-playlist".into(),
            name: recommend::playlist_name(workout_type),
            external_url: None,
            image_url: None,
        })
    }
}
