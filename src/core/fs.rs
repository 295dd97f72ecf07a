// ─── Filesystem helpers ───
// Path sanitising and atomic writes shared by extraction and resource sync.

use std::io::Write;
use std::path::{Component, Path, PathBuf};

use crate::core::error::{SyncError, SyncResult};

/// Turn a slash-delimited virtual path into a relative `PathBuf`.
///
/// Only normal components are accepted and absolute names are refused, so
/// the result can never leave the directory it is joined onto. Empty inner
/// segments (`a//b`) collapse.
pub fn relative_path(name: &str) -> SyncResult<PathBuf> {
    if name.starts_with('/') {
        return Err(SyncError::UnsafePath(name.to_string()));
    }
    let mut rel = PathBuf::new();
    for part in name.split('/') {
        if part.is_empty() {
            continue;
        }
        let mut components = Path::new(part).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(c)), None) => rel.push(c),
            _ => return Err(SyncError::UnsafePath(name.to_string())),
        }
    }

    if rel.as_os_str().is_empty() {
        return Err(SyncError::UnsafePath(name.to_string()));
    }
    Ok(rel)
}

/// Sibling temporary name for `dest`; unique per call so concurrent writers
/// never share one.
fn temp_sibling(dest: &Path) -> PathBuf {
    let name = dest
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    dest.with_file_name(format!(".{name}.{}.part", uuid::Uuid::new_v4().simple()))
}

/// Write `bytes` to a temporary sibling and rename it over `dest`.
pub fn write_atomic(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_sibling(dest);
    let result = (|| {
        let mut file = std::fs::File::create(&tmp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        drop(file);
        std::fs::rename(&tmp, dest)
    })();

    if result.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    result
}

/// Async counterpart of [`write_atomic`].
pub async fn write_atomic_async(dest: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let tmp = temp_sibling(dest);
    let result = async {
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, dest).await
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&tmp).await;
    }
    result
}

/// Remove a directory tree if it exists. Missing is not an error.
pub async fn remove_tree(path: &Path) -> SyncResult<()> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(SyncError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

pub async fn create_dir_all(path: &Path) -> SyncResult<()> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relative_path_accepts_nested_names() {
        let rel = relative_path("minecraft/sounds/ambient/cave1.ogg").unwrap();
        assert_eq!(rel, PathBuf::from("minecraft/sounds/ambient/cave1.ogg"));
        assert_eq!(relative_path("a//b/").unwrap(), PathBuf::from("a/b"));
    }

    #[test]
    fn relative_path_rejects_escapes() {
        for name in [
            "../evil",
            "a/../../evil",
            "/etc/passwd",
            "//etc/passwd",
            "",
            "/",
            ".",
            "a/./b",
        ] {
            assert!(
                matches!(relative_path(name), Err(SyncError::UnsafePath(_))),
                "{name:?} should be rejected"
            );
        }
    }

    #[test]
    fn write_atomic_replaces_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let dest = dir.path().join("file.txt");

        write_atomic(&dest, b"first").unwrap();
        write_atomic(&dest, b"second").unwrap();

        assert_eq!(std::fs::read(&dest).unwrap(), b"second");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn remove_tree_ignores_missing_directories() {
        let dir = tempfile::tempdir().unwrap();
        remove_tree(&dir.path().join("absent")).await.unwrap();

        let present = dir.path().join("present/nested");
        std::fs::create_dir_all(&present).unwrap();
        remove_tree(&dir.path().join("present")).await.unwrap();
        assert!(!dir.path().join("present").exists());
    }
}
