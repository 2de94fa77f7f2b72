//! Genre/workout-type heuristics for seed selection and playlist naming,
//! plus fallback parsing for model-generated tuning parameters.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::warn;

/// Spotify accepts at most five seed genres per recommendation call.
pub const MAX_SEED_GENRES: usize = 5;

static WORKOUT_GENRES: Lazy<HashMap<&'static str, &'static [&'static str]>> = Lazy::new(|| {
    let mut m: HashMap<&'static str, &'static [&'static str]> = HashMap::new();
    m.insert("cardio", &["electronic", "dance", "pop"]);
    m.insert("strength", &["hip-hop", "rock", "metal"]);
    m.insert("yoga", &["ambient", "chill", "classical"]);
    m
});

static WORKOUT_NAMES: Lazy<HashMap<&'static str, &'static str>> = Lazy::new(|| {
    let mut m = HashMap::new();
    m.insert("cardio", "Cardio Boost");
    m.insert("strength", "Power Mix");
    m.insert("yoga", "Zen Flow");
    m
});

/// Workout-specific genres first, then the user's preferred genres that are
/// not already present, capped at [`MAX_SEED_GENRES`].
pub fn seed_genres(user_genres: &[String], workout_type: &str) -> Vec<String> {
    let mut selected: Vec<String> = WORKOUT_GENRES
        .get(workout_type)
        .map(|g| g.iter().map(|s| s.to_string()).collect())
        .unwrap_or_default();
    for g in user_genres {
        if !selected.iter().any(|s| s == g) {
            selected.push(g.clone());
        }
    }
    selected.truncate(MAX_SEED_GENRES);
    selected
}

pub fn playlist_name(workout_type: &str) -> String {
    let base = WORKOUT_NAMES.get(workout_type).copied().unwrap_or("Workout");
    format!("{} Playlist", base)
}

pub fn playlist_description(workout_type: &str) -> String {
    let mut label = workout_type.to_string();
    if let Some(first) = label.get_mut(0..1) {
        first.make_ascii_uppercase();
    }
    format!("Custom {} workout playlist created by SyncSweat", label)
}

/// Spotify tuning parameters recommended by the generative model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetParams {
    pub target_tempo: f64,
    pub target_energy: f64,
    pub target_valence: f64,
    pub target_danceability: f64,
}

impl Default for TargetParams {
    fn default() -> Self {
        Self {
            target_tempo: 128.0,
            target_energy: 0.8,
            target_valence: 0.7,
            target_danceability: 0.7,
        }
    }
}

/// Parse model-generated JSON, tolerating Markdown code fences. The
/// recommendation features are best-effort, so an unparseable payload falls
/// back to deterministic defaults instead of failing the request.
pub fn parse_target_params(raw: &str) -> TargetParams {
    let cleaned = strip_code_fences(raw);
    match serde_json::from_str(cleaned) {
        Ok(params) => params,
        Err(e) => {
            warn!("could not parse model playlist parameters ({}); using defaults", e);
            TargetParams::default()
        }
    }
}

fn strip_code_fences(raw: &str) -> &str {
    let s = raw.trim();
    let s = s.strip_prefix("```json").or_else(|| s.strip_prefix("```")).unwrap_or(s);
    let s = s.strip_suffix("```").unwrap_or(s);
    s.trim()
}
