//! Download output targets.

use std::path::{Path, PathBuf};

/// Where transferred bytes are written
#[derive(Debug)]
pub enum OutputTarget {
    /// Create (or truncate) a file at this path
    Path(PathBuf),
    /// Write to a handle the caller already opened
    Handle(std::fs::File),
}

impl OutputTarget {
    /// Label used in progress records
    pub fn display_name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Handle(_) => "<handle>".to_string(),
        }
    }

    /// Path to delete if the transfer fails. Caller-supplied handles are
    /// never cleaned up.
    pub fn cleanup_path(&self) -> Option<&Path> {
        match self {
            Self::Path(path) => Some(path),
            Self::Handle(_) => None,
        }
    }

    /// Open for writing, creating parent directories as needed
    pub async fn open(self) -> std::io::Result<tokio::fs::File> {
        match self {
            Self::Path(path) => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    tokio::fs::create_dir_all(parent).await?;
                }
                tokio::fs::File::create(&path).await
            }
            Self::Handle(file) => Ok(tokio::fs::File::from_std(file)),
        }
    }
}

impl From<PathBuf> for OutputTarget {
    fn from(path: PathBuf) -> Self {
        Self::Path(path)
    }
}

impl From<std::fs::File> for OutputTarget {
    fn from(file: std::fs::File) -> Self {
        Self::Handle(file)
    }
}

#[cfg(unix)]
impl From<std::os::fd::OwnedFd> for OutputTarget {
    fn from(fd: std::os::fd::OwnedFd) -> Self {
        Self::Handle(std::fs::File::from(fd))
    }
}

/// Remove a partially written file, ignoring files that never got created
pub async fn remove_partial(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "Removed partial download"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove partial download")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("song.mp3");
        let target = OutputTarget::from(path.clone());

        assert_eq!(target.display_name(), "song.mp3");
        assert_eq!(target.cleanup_path(), Some(path.as_path()));
        target.open().await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_handle_has_no_cleanup_path() {
        let file = tempfile::tempfile().unwrap();
        let target = OutputTarget::from(file);
        assert!(target.cleanup_path().is_none());
    }

    #[tokio::test]
    async fn test_remove_partial_ignores_missing() {
        let dir = tempfile::tempdir().unwrap();
        remove_partial(&dir.path().join("never-created.mp3")).await;
    }
}
