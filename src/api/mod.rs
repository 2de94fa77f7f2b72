pub mod executor;
pub mod mock;
pub mod spotify;
pub mod spotify_auth;

use crate::error::SpotifyError;
use executor::UserContext;
use serde::Serialize;
use serde_json::Value;

/// Result of the create-then-add workout playlist flow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkoutPlaylist {
    pub id: String,
    pub name: String,
    pub external_url: Option<String>,
    pub image_url: Option<String>,
}

/// Domain operations the workout/playlist endpoints need, defined purely in
/// terms of a user context (user id + refresh credential + optional
/// persistence callback). Implementations: spotify::SpotifyClient and
/// mock::MockMusicService.
#[async_trait::async_trait]
pub trait MusicService: Send + Sync {
    /// Fetch the user's Spotify profile.
    async fn get_user_profile(&self, ctx: &UserContext) -> Result<Value, SpotifyError>;

    /// Fetch the user's playlists, up to `limit`.
    async fn get_user_playlists(&self, ctx: &UserContext, limit: u32)
        -> Result<Value, SpotifyError>;

    /// Search for tracks by free-text query.
    async fn search_tracks(&self, ctx: &UserContext, query: &str) -> Result<Value, SpotifyError>;

    /// The user's top tracks. Best-effort: degrades to an empty item list.
    async fn get_top_tracks(&self, ctx: &UserContext) -> Result<Value, SpotifyError>;

    /// The user's top artists. Best-effort: degrades to an empty item list.
    async fn get_top_artists(&self, ctx: &UserContext) -> Result<Value, SpotifyError>;

    /// Seed track ids derived from genre + workout-type heuristics.
    async fn get_seed_tracks(
        &self,
        ctx: &UserContext,
        genres: &[String],
        workout_type: &str,
    ) -> Result<Vec<String>, SpotifyError>;

    /// Create a playlist under the given Spotify user.
    async fn create_playlist(
        &self,
        ctx: &UserContext,
        spotify_user_id: &str,
        name: &str,
        description: &str,
        public: bool,
    ) -> Result<Value, SpotifyError>;

    /// Add track URIs to an existing playlist.
    async fn add_tracks_to_playlist(
        &self,
        ctx: &UserContext,
        playlist_id: &str,
        track_uris: &[String],
    ) -> Result<Value, SpotifyError>;

    /// Create a workout playlist and fill it with the given tracks. Not
    /// transactional: if the add step fails the created playlist is left in
    /// place and a PartialPlaylist error names it.
    async fn create_workout_playlist(
        &self,
        ctx: &UserContext,
        spotify_user_id: &str,
        workout_type: &str,
        track_uris: &[String],
    ) -> Result<WorkoutPlaylist, SpotifyError>;
}
