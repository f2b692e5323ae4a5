//! Cache pre-warm command.

use std::path::Path;

use anyhow::Context;
use tokio::runtime::Runtime;

use crate::Engine;
use crate::prewarm;

/// Warm the cache from a JSON file and wait for the batch to finish
pub fn cmd_prewarm(rt: &Runtime, engine: &Engine, file: &Path) -> anyhow::Result<()> {
    let json = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let items = prewarm::parse_requests(&json)
        .with_context(|| format!("Invalid pre-warm list in {}", file.display()))?;

    println!("Pre-warming {} tracks...", items.len());
    let summary = rt.block_on(engine.pre_warm(items))?;

    println!(
        "Warmed {}, skipped {}, failed {}. Cache holds {} entries.",
        summary.warmed,
        summary.skipped,
        summary.failed,
        engine.cache().size()
    );
    Ok(())
}
