//! Saving service artifacts to local disk.

use crate::error::WorkbenchError;
use crate::outcome::DownloadTarget;
use crate::transport::ApiClient;
use std::path::{Path, PathBuf};
use tracing::info;

/// Fetch `target` and write it to `dest`.
///
/// When `dest` is an existing directory the file is placed inside it under
/// the target's suggested name. Returns the path written. The service
/// deletes the artifact once fetched, so a second call for the same target
/// fails with a transport error.
pub async fn save_download(
    client: &ApiClient,
    target: &DownloadTarget,
    dest: &Path,
) -> Result<PathBuf, WorkbenchError> {
    let path = resolve_destination(dest, &target.suggested_name).await;
    let bytes = client.download(&target.file_id, &target.folder).await?;
    write_atomic(&path, &bytes).await?;
    info!("Saved {} ({} bytes)", path.display(), bytes.len());
    Ok(path)
}

/// `dest/<suggested>` if `dest` is a directory, otherwise `dest` itself.
pub async fn resolve_destination(dest: &Path, suggested_name: &str) -> PathBuf {
    match tokio::fs::metadata(dest).await {
        Ok(meta) if meta.is_dir() => dest.join(suggested_name),
        _ => dest.to_path_buf(),
    }
}

/// Write via a sibling temp file and rename, so readers never observe a
/// partially written file.
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), WorkbenchError> {
    let io_err = |e| WorkbenchError::Io {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }

    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".part");
    let tmp_path = path.with_file_name(tmp_name);

    tokio::fs::write(&tmp_path, bytes).await.map_err(io_err)?;
    if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(io_err(e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_atomic_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/nested/doc_rotated.pdf");
        write_atomic(&path, b"%PDF-1.4").await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"%PDF-1.4");
        let leftovers: Vec<_> = std::fs::read_dir(path.parent().unwrap())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn write_atomic_replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.docx");
        write_atomic(&path, b"old").await.unwrap();
        write_atomic(&path, b"new").await.unwrap();
        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"new");
    }

    #[tokio::test]
    async fn directory_destination_uses_suggested_name() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = resolve_destination(dir.path(), "report.docx").await;
        assert_eq!(resolved, dir.path().join("report.docx"));

        let file = dir.path().join("custom.docx");
        assert_eq!(resolve_destination(&file, "report.docx").await, file);
    }
}
