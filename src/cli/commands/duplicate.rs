//! Duplicate lookup command.

use std::path::Path;

use tokio::runtime::Runtime;

use crate::duplicate::find_existing_by_isrc;

pub fn cmd_find_duplicate(rt: &Runtime, dir: &Path, isrc: &str) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    match rt.block_on(find_existing_by_isrc(dir, isrc)) {
        Some(path) => println!("{}", path.display()),
        None => println!("No file tagged {isrc} under {}", dir.display()),
    }
    Ok(())
}
