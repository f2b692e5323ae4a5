//! CLI command definitions and dispatch.
//!
//! Each subcommand is implemented in its own submodule:
//! - `resolve`: availability lookups for tracks and albums
//! - `download`: the full download pipeline with a progress line
//! - `prewarm`: batch cache population from a JSON file
//! - `duplicate`: find an already downloaded ISRC

mod download;
mod duplicate;
mod prewarm;
mod resolve;

use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use tokio::runtime::Runtime;

use crate::Engine;
use crate::config::{self, Config};

pub use download::cmd_download;
pub use duplicate::cmd_find_duplicate;
pub use prewarm::cmd_prewarm;
pub use resolve::{cmd_resolve, cmd_resolve_album};

/// Songbridge CLI
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true, env = "SONGBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Show where a track is available
    Resolve {
        /// Spotify track id
        #[arg(long)]
        spotify: Option<String>,
        /// Deezer track id
        #[arg(long)]
        deezer: Option<String>,
        /// ISRC; also enables the Qobuz check
        #[arg(long)]
        isrc: Option<String>,
    },
    /// Show whether an album is on Deezer
    ResolveAlbum {
        /// Spotify album id
        #[arg(long)]
        spotify: String,
    },
    /// Download a track
    Download(DownloadArgs),
    /// Warm the identifier cache from a JSON list of tracks
    Prewarm {
        /// JSON file: [{"isrc", "track_name", "artist_name", "spotify_id", "service"}]
        #[arg(short, long)]
        file: PathBuf,
    },
    /// Find an audio file tagged with an ISRC
    FindDuplicate {
        /// Directory to search
        #[arg(short, long)]
        dir: PathBuf,
        /// ISRC to look for
        #[arg(long)]
        isrc: String,
    },
    /// Print the config file location
    ConfigPath,
    /// Write a config file with the default settings
    ConfigInit {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

/// Options for `download`
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Spotify track id (or a bare video id)
    #[arg(long)]
    pub spotify: Option<String>,
    /// Deezer track id
    #[arg(long)]
    pub deezer: Option<String>,
    #[arg(long)]
    pub isrc: Option<String>,
    #[arg(long)]
    pub title: String,
    #[arg(long)]
    pub artist: String,
    #[arg(long, default_value = "")]
    pub album: String,
    /// Release date (YYYY-MM-DD) used by the {year} placeholder
    #[arg(long, default_value = "")]
    pub release_date: String,
    #[arg(long, default_value_t = 0)]
    pub track: u32,
    #[arg(long, default_value_t = 0)]
    pub disc: u32,
    /// Track length in seconds, improves lyrics matching
    #[arg(long)]
    pub duration: Option<u64>,
    /// opus_256 or mp3_320
    #[arg(short, long, default_value = "mp3_320")]
    pub quality: String,
    /// Output directory
    #[arg(short, long, env = "SONGBRIDGE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,
    /// Filename template, e.g. "{track} - {title}"
    #[arg(long)]
    pub template: Option<String>,
    /// Fetch synced lyrics and write an .lrc next to the file
    #[arg(long)]
    pub lyrics: bool,
    #[arg(long)]
    pub cover_url: Option<String>,
    /// Request the largest cover variant
    #[arg(long)]
    pub max_cover: bool,
    /// Skip when the output directory already has this ISRC
    #[arg(long)]
    pub skip_existing: bool,
}

/// Run the specified CLI command.
pub fn run_command(cli: &Cli) -> anyhow::Result<()> {
    if let Commands::ConfigPath = cli.command {
        match config::config_path() {
            Some(path) => println!("{}", path.display()),
            None => anyhow::bail!("could not determine the config directory"),
        }
        return Ok(());
    }
    if let Commands::ConfigInit { force } = cli.command {
        return cmd_config_init(cli.config.as_deref(), force);
    }

    let rt = Runtime::new()?;

    match &cli.command {
        Commands::Resolve {
            spotify,
            deezer,
            isrc,
        } => cmd_resolve(
            &rt,
            &engine(cli)?,
            spotify.as_deref(),
            deezer.as_deref(),
            isrc.as_deref(),
        ),
        Commands::ResolveAlbum { spotify } => cmd_resolve_album(&rt, &engine(cli)?, spotify),
        Commands::Download(args) => cmd_download(&rt, &engine(cli)?, args),
        Commands::Prewarm { file } => cmd_prewarm(&rt, &engine(cli)?, file),
        Commands::FindDuplicate { dir, isrc } => cmd_find_duplicate(&rt, dir, isrc),
        Commands::ConfigPath | Commands::ConfigInit { .. } => Ok(()),
    }
}

/// Write the default config to `path`, or to the OS config directory
pub fn cmd_config_init(path: Option<&Path>, force: bool) -> anyhow::Result<()> {
    let target = match path {
        Some(path) => path.to_path_buf(),
        None => config::config_path()
            .ok_or_else(|| anyhow::anyhow!("could not determine the config directory"))?,
    };
    if target.exists() && !force {
        anyhow::bail!("{} already exists (use --force to overwrite)", target.display());
    }

    let defaults = Config::default();
    match path {
        Some(path) => config::save_to(&defaults, path)?,
        None => config::save(&defaults)?,
    }
    println!("Wrote {}", target.display());
    Ok(())
}

// ============================================================================
// Shared helper functions
// ============================================================================

fn load_config(path: Option<&Path>) -> Config {
    match path {
        Some(path) => config::load_from(path),
        None => config::load(),
    }
}

fn engine(cli: &Cli) -> anyhow::Result<Engine> {
    Ok(Engine::new(load_config(cli.config.as_deref()))?)
}
