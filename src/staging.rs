use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

/// An uploaded file as received from the multipart form.
#[derive(Debug, Clone)]
pub struct Upload {
    pub filename: Option<String>,
    pub bytes: Bytes,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self { filename: Some(filename.into()), bytes: bytes.into() }
    }

    fn extension(&self) -> Option<&str> {
        self.filename
            .as_deref()
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty())
    }
}

/// Writes the upload under `scratch_dir` with a fresh random name that keeps
/// the original extension.
pub async fn stage(scratch_dir: &Path, upload: &Upload) -> std::io::Result<PathBuf> {
    let name = match upload.extension() {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
        None => Uuid::new_v4().to_string(),
    };
    let path = scratch_dir.join(name);
    tokio::fs::write(&path, &upload.bytes).await?;
    debug!(path = %path.display(), bytes = upload.bytes.len(), "Staged upload");
    Ok(path)
}

/// Best-effort removal. A failure on one path is logged and the rest are
/// still attempted.
pub fn cleanup<P: AsRef<Path>>(paths: &[P]) {
    for path in paths {
        let path = path.as_ref();
        match std::fs::remove_file(path) {
            Ok(()) => debug!(path = %path.display(), "Removed staged file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to delete staged file"),
        }
    }
}

/// Staged uploads owned by one request; removed when the guard is dropped,
/// whichever way the request ends.
#[derive(Debug, Default)]
pub struct StagedFiles {
    paths: Vec<PathBuf>,
}

impl StagedFiles {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn track(&mut self, path: PathBuf) {
        self.paths.push(path);
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }
}

impl Drop for StagedFiles {
    // Blocking removal on the runtime thread: at most two small unlinks, and
    // the scratch dir must be clean before the response goes out.
    fn drop(&mut self) {
        cleanup(&self.paths);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stage_keeps_extension_and_content() {
        let dir = tempfile::tempdir().unwrap();
        let upload = Upload::new("logo.PNG", &b"\x89PNG fake"[..]);

        let path = stage(dir.path(), &upload).await.unwrap();

        assert_eq!(path.parent(), Some(dir.path()));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("PNG"));
        assert_eq!(std::fs::read(&path).unwrap(), b"\x89PNG fake");
    }

    #[tokio::test]
    async fn stage_names_are_unique_and_work_without_extension() {
        let dir = tempfile::tempdir().unwrap();
        let upload = Upload { filename: None, bytes: Bytes::from_static(b"x") };

        let first = stage(dir.path(), &upload).await.unwrap();
        let second = stage(dir.path(), &upload).await.unwrap();

        assert_ne!(first, second);
        assert!(first.extension().is_none());
    }

    #[tokio::test]
    async fn stage_fails_when_scratch_dir_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let upload = Upload::new("a.jpg", &b"x"[..]);
        assert!(stage(&missing, &upload).await.is_err());
    }

    #[test]
    fn cleanup_skips_missing_paths_and_removes_the_rest() {
        let dir = tempfile::tempdir().unwrap();
        let present = dir.path().join("present.png");
        std::fs::write(&present, b"x").unwrap();

        cleanup(&[dir.path().join("missing.png"), present.clone()]);

        assert!(!present.exists());
    }

    #[test]
    fn guard_removes_tracked_files_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.png");
        let b = dir.path().join("b.jpg");
        std::fs::write(&a, b"a").unwrap();
        std::fs::write(&b, b"b").unwrap();

        {
            let mut staged = StagedFiles::new();
            staged.track(a.clone());
            staged.track(b.clone());
            assert_eq!(staged.paths().len(), 2);
        }

        assert!(!a.exists());
        assert!(!b.exists());
    }
}
