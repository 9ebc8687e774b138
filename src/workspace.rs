//! Request-scoped scratch directories.
//!
//! Every conversion runs inside its own [`Workspace`]: a uniquely named
//! directory (`mdword-XXXXXX`) created by [`tempfile`]. The request's input,
//! the tool output, the extracted `media/` tree and the LibreOffice profile
//! all live inside it, so deleting the directory deletes everything the
//! request wrote.
//!
//! Release is guaranteed on every exit path. The happy path calls
//! [`Workspace::release`], which reports cleanup failures through `tracing`;
//! any other path (an early `?`, a panic) drops the inner `TempDir`, which
//! removes the tree as well.

use crate::error::ConvertError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, warn};

const PREFIX: &str = "mdword-";
const MEDIA_DIR: &str = "media";

/// Placeholder substituted for the workspace path in user-visible text.
pub const REDACTED: &str = "<workspace>";

/// An ephemeral directory owned by one conversion request.
#[derive(Debug)]
pub struct Workspace {
    dir: TempDir,
}

impl Workspace {
    /// Create a fresh workspace under `root`, or the system temp dir if `None`.
    ///
    /// The root is created if it does not exist yet.
    pub fn acquire(root: Option<&Path>) -> Result<Self, ConvertError> {
        let mut builder = tempfile::Builder::new();
        builder.prefix(PREFIX);

        let dir = match root {
            Some(root) => {
                std::fs::create_dir_all(root).map_err(|source| ConvertError::Workspace { source })?;
                builder.tempdir_in(root)
            }
            None => builder.tempdir(),
        }
        .map_err(|source| ConvertError::Workspace { source })?;

        debug!("Acquired workspace {}", dir.path().display());
        Ok(Self { dir })
    }

    /// Root directory of the workspace.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of a file directly inside the workspace.
    pub fn file(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    /// Directory the converter extracts embedded media into.
    ///
    /// Not created here: the converter creates it only when the document
    /// actually contains media.
    pub fn media_dir(&self) -> PathBuf {
        self.dir.path().join(MEDIA_DIR)
    }

    /// Write `bytes` to `name` inside the workspace and return the full path.
    pub async fn write(&self, name: &str, bytes: &[u8]) -> Result<PathBuf, ConvertError> {
        let path = self.file(name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| ConvertError::io(format!("write {name} to workspace"), e))?;
        Ok(path)
    }

    /// Replace every occurrence of the workspace path in `text` with
    /// [`REDACTED`].
    pub fn redact(&self, text: &str) -> String {
        let root = self.dir.path().to_string_lossy();
        if root.is_empty() {
            return text.to_string();
        }
        text.replace(root.as_ref(), REDACTED)
    }

    /// Delete the workspace tree.
    ///
    /// Removal runs on the blocking pool. Failures are logged, never returned:
    /// the request outcome is already decided by the time we clean up.
    pub async fn release(self) {
        let path = self.dir.path().to_path_buf();
        match tokio::task::spawn_blocking(move || self.dir.close()).await {
            Ok(Ok(())) => debug!("Released workspace {}", path.display()),
            Ok(Err(e)) => warn!("Failed to remove workspace {}: {}", path.display(), e),
            Err(e) => warn!("Workspace cleanup task for {} panicked: {}", path.display(), e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn release_removes_everything() {
        let root = TempDir::new().unwrap();
        let ws = Workspace::acquire(Some(root.path())).unwrap();
        ws.write("input.md", b"# Hello").await.unwrap();
        std::fs::create_dir_all(ws.media_dir().join("media")).unwrap();
        std::fs::write(ws.media_dir().join("media/image1.png"), b"png").unwrap();

        let path = ws.path().to_path_buf();
        assert!(path.starts_with(root.path()));
        ws.release().await;

        assert!(!path.exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[tokio::test]
    async fn drop_removes_everything() {
        let root = TempDir::new().unwrap();
        let path = {
            let ws = Workspace::acquire(Some(root.path())).unwrap();
            ws.write("output.md", b"text").await.unwrap();
            ws.path().to_path_buf()
        };
        assert!(!path.exists());
        assert_eq!(entries(root.path()), 0);
    }

    #[test]
    fn workspaces_never_collide() {
        let root = TempDir::new().unwrap();
        let a = Workspace::acquire(Some(root.path())).unwrap();
        let b = Workspace::acquire(Some(root.path())).unwrap();
        assert_ne!(a.path(), b.path());
        assert!(a
            .path()
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with(PREFIX));
    }

    #[test]
    fn acquire_creates_missing_root() {
        let root = TempDir::new().unwrap();
        let nested = root.path().join("a/b");
        let ws = Workspace::acquire(Some(&nested)).unwrap();
        assert!(ws.path().starts_with(&nested));
    }

    #[test]
    fn redact_hides_workspace_path() {
        let ws = Workspace::acquire(None).unwrap();
        let msg = format!("pandoc: {}: openBinaryFile: does not exist", ws.file("input.md").display());
        let redacted = ws.redact(&msg);
        assert!(!redacted.contains(&ws.path().to_string_lossy().to_string()));
        assert!(redacted.contains("<workspace>/input.md"));
    }
}
