//! Track download command.

use std::io::Write;
use std::time::Duration;

use tokio::runtime::Runtime;

use super::DownloadArgs;
use crate::Engine;
use crate::model::{DownloadRequest, OutputDestination, Quality, TrackMetadata};

/// Run one download, printing progress until it finishes. Ctrl-C cancels.
pub fn cmd_download(rt: &Runtime, engine: &Engine, args: &DownloadArgs) -> anyhow::Result<()> {
    let output_dir = args
        .output_dir
        .clone()
        .unwrap_or_else(|| engine.config().download.resolved_output_dir());
    let request = to_request(args, output_dir);
    let item_id = request.item_id.clone();

    println!("Downloading {} - {} ({})", args.artist, args.title, request.quality);

    let result = rt.block_on(async {
        let download = engine.download(request);
        tokio::pin!(download);
        let mut ticker = tokio::time::interval(Duration::from_millis(500));

        loop {
            tokio::select! {
                result = &mut download => break result,
                _ = tokio::signal::ctrl_c() => {
                    eprintln!("\nCancelling...");
                    engine.cancel(&item_id);
                }
                _ = ticker.tick() => print_progress(engine, &item_id),
            }
        }
    });
    engine.registry().remove(&item_id);
    println!();

    let result = match result {
        Ok(result) => result,
        Err(e) if e.is_cancelled() => {
            println!("Download cancelled");
            return Ok(());
        }
        Err(e) => return Err(anyhow::anyhow!("{} failed: {e}", e.stage())),
    };

    let path = result
        .file_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    if result.already_exists {
        println!("Already downloaded: {path}");
        return Ok(());
    }
    println!("Saved {path} ({} bytes)", result.bytes_written);

    if let Some(lrc_path) = result.write_lyrics_sidecar()? {
        println!("Lyrics: {}", lrc_path.display());
    }
    if let Some(cover) = &result.cover_data {
        println!("Cover art: {} bytes", cover.len());
    }
    for error in &result.asset_errors {
        eprintln!("Warning: {error}");
    }
    Ok(())
}

fn to_request(args: &DownloadArgs, output_dir: std::path::PathBuf) -> DownloadRequest {
    let item_id = [&args.spotify, &args.deezer, &args.isrc]
        .into_iter()
        .flatten()
        .next()
        .cloned()
        .unwrap_or_else(|| "cli".to_string());

    DownloadRequest {
        item_id,
        spotify_id: args.spotify.clone(),
        deezer_id: args.deezer.clone(),
        isrc: args.isrc.clone(),
        metadata: TrackMetadata {
            title: args.title.clone(),
            artist: args.artist.clone(),
            album: args.album.clone(),
            album_artist: args.artist.clone(),
            release_date: args.release_date.clone(),
            track_number: args.track,
            disc_number: args.disc,
            duration: args.duration.map(Duration::from_secs),
        },
        quality: Quality::parse(&args.quality),
        output: OutputDestination::Directory {
            dir: output_dir,
            filename_template: args.template.clone(),
        },
        embed_lyrics: args.lyrics,
        cover_url: args.cover_url.clone(),
        max_quality_cover: args.max_cover,
        skip_existing: args.skip_existing,
    }
}

fn print_progress(engine: &Engine, item_id: &str) {
    let Some(progress) = engine.progress(item_id) else {
        return;
    };
    if progress.bytes_total > 0 {
        print!(
            "\r{:>5.1}%  {:.1}/{:.1} MB  {:.2} MB/s",
            progress.percent,
            progress.bytes_received as f64 / 1_048_576.0,
            progress.bytes_total as f64 / 1_048_576.0,
            progress.speed_mbps,
        );
    } else {
        print!(
            "\r{:.1} MB  {:.2} MB/s",
            progress.bytes_received as f64 / 1_048_576.0,
            progress.speed_mbps,
        );
    }
    let _ = std::io::stdout().flush();
}
