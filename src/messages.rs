//! Fixed user-facing message constants. The endpoint layer maps core errors
//! onto these, so the outward contract stays stable regardless of internal
//! error detail.

pub const SPOTIFY_NOT_CONNECTED: &str = "Spotify not connected";
pub const SPOTIFY_RECONNECT_REQUIRED: &str = "Spotify authorization expired, please reconnect";
pub const SPOTIFY_UNAVAILABLE: &str = "Spotify is currently unavailable, please try again later";
pub const PLAYLIST_TRACKS_NOT_ADDED: &str = "Playlist created but tracks could not be added";

pub const SPOTIFY_AUTH_SUCCESS: &str = "Spotify authentication successful";
pub const PLAYLIST_CREATED_SUCCESS: &str = "Playlist created and tracks added!";
