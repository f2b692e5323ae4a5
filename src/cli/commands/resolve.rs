//! Availability lookup commands.

use tokio::runtime::Runtime;

use crate::Engine;
use crate::resolver::{TrackAvailability, TrackSource};

/// Resolve a track from the first identifier given
pub fn cmd_resolve(
    rt: &Runtime,
    engine: &Engine,
    spotify: Option<&str>,
    deezer: Option<&str>,
    isrc: Option<&str>,
) -> anyhow::Result<()> {
    let source = match (spotify, deezer, isrc) {
        (Some(id), _, _) => TrackSource::Spotify(id.to_string()),
        (None, Some(id), _) => TrackSource::Deezer(id.to_string()),
        (None, None, Some(code)) => TrackSource::Isrc(code.to_string()),
        (None, None, None) => anyhow::bail!("pass --spotify, --deezer or --isrc"),
    };

    let availability = rt.block_on(engine.resolver().resolve_source(&source, isrc))?;
    print_availability(&source, &availability);
    Ok(())
}

/// Resolve an album's Deezer link
pub fn cmd_resolve_album(rt: &Runtime, engine: &Engine, spotify: &str) -> anyhow::Result<()> {
    let album = rt.block_on(engine.resolver().resolve_album(spotify))?;

    match album.deezer_url() {
        Some(url) => {
            println!("Album spotify:{spotify} is on Deezer");
            println!("  url: {url}");
            if let Some(id) = album.deezer_id() {
                println!("  id:  {id}");
            }
        }
        None => println!("Album spotify:{spotify} was not found on Deezer"),
    }
    Ok(())
}

fn print_availability(source: &TrackSource, availability: &TrackAvailability) {
    println!("Availability for {source}:");
    if availability.links().is_empty() {
        println!("  (no platforms found)");
        return;
    }
    for (platform, link) in availability.links() {
        let url = link.url.as_deref().unwrap_or("-");
        match link.id.as_deref() {
            Some(id) => println!("  {:<14} {url} (id {id})", platform.to_string()),
            None => println!("  {:<14} {url}", platform.to_string()),
        }
    }
}
