//! Core library for the SyncSweat fitness backend's Spotify integration:
//! token lifecycle management and the authenticated request pipeline.
pub mod config;
pub mod error;
pub mod messages;
pub mod cache;
pub mod retry;
pub mod token;
pub mod recommend;
pub mod api;
