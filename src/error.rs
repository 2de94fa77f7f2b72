use crate::messages;
use thiserror::Error;

/// Error taxonomy for the Spotify core. Each variant maps onto a fixed
/// user-facing message via [`SpotifyError::user_message`].
#[derive(Debug, Error)]
pub enum SpotifyError {
    /// The refresh grant was rejected or retries were exhausted. Terminal:
    /// a bad refresh credential will not become good by retrying higher up.
    #[error("token refresh failed after {attempts} attempt(s): {reason}")]
    CredentialRefresh { attempts: u32, reason: String },

    /// A resource call exhausted its retries, or a second consecutive 401.
    #[error("request to {endpoint} failed after {attempts} attempt(s): {reason}")]
    RequestFailed {
        endpoint: String,
        attempts: u32,
        reason: String,
    },

    /// The playlist was created but track insertion failed. The created
    /// playlist is left in place; callers decide whether to retry or discard.
    #[error("playlist {playlist_id} created but adding tracks failed: {reason}")]
    PartialPlaylist { playlist_id: String, reason: String },

    /// A 2xx response was missing a field the operation requires.
    #[error("unexpected response from {endpoint}: {reason}")]
    MalformedResponse { endpoint: String, reason: String },
}

impl SpotifyError {
    /// Stable message constant for the endpoint layer to surface.
    pub fn user_message(&self) -> &'static str {
        match self {
            SpotifyError::CredentialRefresh { .. } => messages::SPOTIFY_RECONNECT_REQUIRED,
            SpotifyError::RequestFailed { .. } => messages::SPOTIFY_UNAVAILABLE,
            SpotifyError::PartialPlaylist { .. } => messages::PLAYLIST_TRACKS_NOT_ADDED,
            SpotifyError::MalformedResponse { .. } => messages::SPOTIFY_UNAVAILABLE,
        }
    }
}
