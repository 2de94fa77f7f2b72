use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use syncsweat_spotify_core as lib;

use lib::api::executor::UserContext;
use lib::api::spotify::SpotifyClient;
use lib::api::MusicService;
use lib::config::Config;

use tracing::subscriber as tracing_subscriber_global;
use tracing_appender::rolling::RollingFileAppender;
use tracing_log::LogTracer;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser)]
#[command(name = "syncsweat-spotify", version)]
struct Cli {
    /// Path to config TOML
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize Spotify interactively and print the resulting tokens
    Auth,
    /// Validate config file and exit
    ConfigValidate,
    /// Fetch the user's Spotify profile
    Profile {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        refresh_token: String,
    },
    /// List the user's playlists
    Playlists {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        refresh_token: String,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Fetch the user's top tracks
    TopTracks {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        refresh_token: String,
    },
    /// Derive seed tracks for a workout type and optional preferred genres
    SeedTracks {
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        refresh_token: String,
        /// Workout type: cardio, strength or yoga
        #[arg(long)]
        workout_type: String,
        /// Preferred genres (repeatable)
        #[arg(long)]
        genre: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    // Resolve config path: explicit --config overrides; otherwise prefer
    // the system-wide config and fall back to the repository example config
    // for local/dev usage.
    let resolved_config_path: PathBuf = match &cli.config {
        Some(p) => p.clone(),
        None => {
            let etc_path = Path::new("/etc/syncsweat/config.toml");
            if etc_path.exists() {
                etc_path.to_path_buf()
            } else {
                PathBuf::from("config/example-config.toml")
            }
        }
    };

    let cfg = Config::from_path(&resolved_config_path)
        .with_context(|| format!("loading config from {}", resolved_config_path.display()))?;

    // Initialize log->tracing bridge and structured logging.
    // Logs go to both stdout and a daily-rotated file in cfg.log_dir.
    let _ = LogTracer::init();
    let file_appender: RollingFileAppender =
        tracing_appender::rolling::daily(&cfg.log_dir, "syncsweat-spotify.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    // Honor RUST_LOG if set, otherwise default to info.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = fmt::layer().with_writer(non_blocking);
    let stdout_layer = fmt::layer().with_writer(std::io::stdout);

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer);

    tracing_subscriber_global::set_global_default(subscriber)
        .context("failed to set global tracing subscriber")?;

    let cfg = Arc::new(cfg);

    match cli.command {
        Commands::Auth => {
            lib::api::spotify_auth::run_spotify_auth(&cfg).await?;
        }
        Commands::ConfigValidate => {
            println!("OK");
        }
        Commands::Profile {
            user_id,
            refresh_token,
        } => {
            let client = SpotifyClient::from_config(cfg)?;
            let ctx = UserContext::new(user_id, refresh_token);
            let profile = client.get_user_profile(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&profile)?);
        }
        Commands::Playlists {
            user_id,
            refresh_token,
            limit,
        } => {
            let client = SpotifyClient::from_config(cfg)?;
            let ctx = UserContext::new(user_id, refresh_token);
            let playlists = client.get_user_playlists(&ctx, limit).await?;
            println!("{}", serde_json::to_string_pretty(&playlists)?);
        }
        Commands::TopTracks {
            user_id,
            refresh_token,
        } => {
            let client = SpotifyClient::from_config(cfg)?;
            let ctx = UserContext::new(user_id, refresh_token);
            let tracks = client.get_top_tracks(&ctx).await?;
            println!("{}", serde_json::to_string_pretty(&tracks)?);
        }
        Commands::SeedTracks {
            user_id,
            refresh_token,
            workout_type,
            genre,
        } => {
            let client = SpotifyClient::from_config(cfg)?;
            let ctx = UserContext::new(user_id, refresh_token);
            let seeds = client.get_seed_tracks(&ctx, &genre, &workout_type).await?;
            for id in seeds {
                println!("{}", id);
            }
        }
    }

    Ok(())
}
