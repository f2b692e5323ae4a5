//! Find tracks that are already on disk by their recording code.

use std::path::{Path, PathBuf};

use lofty::file::TaggedFileExt;
use lofty::probe::Probe;
use lofty::tag::{ItemKey, Tag};
use walkdir::WalkDir;

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "flac", "opus", "ogg", "m4a", "wav"];

/// First audio file under `dir` whose ISRC tag matches `isrc`.
///
/// Comparison ignores case and surrounding whitespace. Unreadable files are
/// skipped.
pub async fn find_existing_by_isrc(dir: &Path, isrc: &str) -> Option<PathBuf> {
    let wanted = normalize(isrc);
    if wanted.is_empty() || !dir.is_dir() {
        return None;
    }

    let root = dir.to_path_buf();
    // Directory walk and tag parsing are blocking
    let found = tokio::task::spawn_blocking(move || scan_for_isrc(&root, &wanted))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Duplicate scan task failed");
            None
        });

    if let Some(path) = &found {
        tracing::debug!(path = %path.display(), isrc, "Found existing file");
    }
    found
}

fn scan_for_isrc(root: &Path, wanted: &str) -> Option<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|entry| entry.file_type().is_file() && is_audio_file(entry.path()))
        .find(|entry| file_isrc_matches(entry.path(), wanted))
        .map(|entry| entry.into_path())
}

fn is_audio_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| AUDIO_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn file_isrc_matches(path: &Path, wanted: &str) -> bool {
    let tagged = match Probe::open(path).and_then(|probe| probe.read()) {
        Ok(tagged) => tagged,
        Err(e) => {
            tracing::trace!(path = %path.display(), error = %e, "Skipping unreadable file");
            return false;
        }
    };
    tagged.tags().iter().any(|tag| tag_isrc_matches(tag, wanted))
}

fn tag_isrc_matches(tag: &Tag, wanted: &str) -> bool {
    tag.get_string(&ItemKey::Isrc)
        .is_some_and(|value| normalize(value) == wanted)
}

fn normalize(isrc: &str) -> String {
    isrc.trim().to_uppercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use lofty::tag::TagType;
    use std::fs::File;
    use tempfile::tempdir;

    #[test]
    fn test_is_audio_file() {
        assert!(is_audio_file(Path::new("a/b/song.mp3")));
        assert!(is_audio_file(Path::new("SONG.FLAC")));
        assert!(is_audio_file(Path::new("x.opus")));
        assert!(!is_audio_file(Path::new("cover.jpg")));
        assert!(!is_audio_file(Path::new("no_extension")));
    }

    #[test]
    fn test_tag_isrc_matching() {
        let mut tag = Tag::new(TagType::Id3v2);
        assert!(!tag_isrc_matches(&tag, "USRC17607839"));

        tag.insert_text(ItemKey::Isrc, " usrc17607839 ".to_string());
        assert!(tag_isrc_matches(&tag, "USRC17607839"));
        assert!(!tag_isrc_matches(&tag, "GBAYE0000351"));
    }

    #[tokio::test]
    async fn test_missing_dir_returns_none() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        assert!(find_existing_by_isrc(&missing, "USRC17607839").await.is_none());
    }

    #[tokio::test]
    async fn test_empty_isrc_returns_none() {
        let dir = tempdir().unwrap();
        assert!(find_existing_by_isrc(dir.path(), "  ").await.is_none());
    }

    #[tokio::test]
    async fn test_unreadable_files_are_skipped() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("broken.mp3"), b"not really audio").unwrap();
        File::create(dir.path().join("empty.flac")).unwrap();
        File::create(dir.path().join("notes.txt")).unwrap();

        assert!(find_existing_by_isrc(dir.path(), "USRC17607839").await.is_none());
    }
}
