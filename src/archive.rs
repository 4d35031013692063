use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::info;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("archive io error: {0}")] Io(#[from] std::io::Error),
    #[error("zip error: {0}")] Zip(#[from] zip::result::ZipError),
    #[error("archive task failed: {0}")] Task(#[from] tokio::task::JoinError),
}

pub fn archive_name(batch_id: &str) -> String {
    format!("creatives_{batch_id}.zip")
}

/// Zips `<output_dir>/<batch_id>/` into `<output_dir>/creatives_<batch_id>.zip`
/// on the blocking pool and returns the archive path.
pub async fn archive_batch(output_dir: &Path, batch_id: &str) -> Result<PathBuf, ArchiveError> {
    let source_dir = output_dir.join(batch_id);
    let zip_path = output_dir.join(archive_name(batch_id));
    tokio::task::spawn_blocking(move || -> Result<PathBuf, ArchiveError> {
        let entries = zip_directory(&source_dir, &zip_path)?;
        info!("🗜️ Archived {} files into {}", entries.len(), zip_path.display());
        Ok(zip_path)
    })
    .await?
}

/// Writes a fresh archive holding every regular file directly under
/// `source_dir`, sorted by name. Subdirectories are skipped. Returns the
/// entry names.
pub fn zip_directory(source_dir: &Path, zip_path: &Path) -> Result<Vec<String>, ArchiveError> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(source_dir)? {
        let entry = entry?;
        if entry.file_type()?.is_file() {
            if let Some(name) = entry.file_name().to_str() {
                files.push((name.to_string(), entry.path()));
            }
        }
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut writer = ZipWriter::new(BufWriter::new(File::create(zip_path)?));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);
    for (name, path) in &files {
        writer.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        std::io::copy(&mut source, &mut writer)?;
    }
    writer.finish()?.flush()?;

    Ok(files.into_iter().map(|(name, _)| name).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Read;

    fn entry_names(zip_path: &Path) -> Vec<String> {
        let archive = zip::ZipArchive::new(File::open(zip_path).unwrap()).unwrap();
        let mut names: Vec<String> = archive.file_names().map(str::to_string).collect();
        names.sort();
        names
    }

    fn seed_batch(output_dir: &Path, batch_id: &str) -> PathBuf {
        let batch_dir = output_dir.join(batch_id);
        std::fs::create_dir_all(&batch_dir).unwrap();
        for i in 1..=3 {
            std::fs::write(batch_dir.join(format!("creative_{i:02}.png")), format!("png {i}")).unwrap();
        }
        std::fs::write(batch_dir.join("metadata.json"), "{}").unwrap();
        batch_dir
    }

    #[tokio::test]
    async fn archive_contains_exactly_the_batch_files() {
        let out = tempfile::tempdir().unwrap();
        let batch_dir = seed_batch(out.path(), "b1");
        std::fs::create_dir(batch_dir.join("nested")).unwrap();
        std::fs::write(batch_dir.join("nested").join("ignored.txt"), "x").unwrap();

        let zip_path = archive_batch(out.path(), "b1").await.unwrap();

        assert_eq!(zip_path, out.path().join("creatives_b1.zip"));
        assert_eq!(
            entry_names(&zip_path),
            vec!["creative_01.png", "creative_02.png", "creative_03.png", "metadata.json"]
        );
    }

    #[test]
    fn entries_keep_file_contents() {
        let out = tempfile::tempdir().unwrap();
        let batch_dir = seed_batch(out.path(), "b2");
        let zip_path = out.path().join("b2.zip");

        let names = zip_directory(&batch_dir, &zip_path).unwrap();
        assert_eq!(names.len(), 4);

        let mut archive = zip::ZipArchive::new(File::open(&zip_path).unwrap()).unwrap();
        let mut contents = String::new();
        archive.by_name("creative_02.png").unwrap().read_to_string(&mut contents).unwrap();
        assert_eq!(contents, "png 2");
    }

    #[test]
    fn rewriting_replaces_previous_archive() {
        let out = tempfile::tempdir().unwrap();
        let batch_dir = seed_batch(out.path(), "b3");
        let zip_path = out.path().join("b3.zip");
        zip_directory(&batch_dir, &zip_path).unwrap();

        std::fs::remove_file(batch_dir.join("creative_03.png")).unwrap();
        zip_directory(&batch_dir, &zip_path).unwrap();

        assert_eq!(entry_names(&zip_path), vec!["creative_01.png", "creative_02.png", "metadata.json"]);
    }

    #[tokio::test]
    async fn missing_batch_dir_is_an_error() {
        let out = tempfile::tempdir().unwrap();
        assert!(matches!(archive_batch(out.path(), "nope").await, Err(ArchiveError::Io(_))));
    }
}
