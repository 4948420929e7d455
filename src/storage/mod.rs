//! Mission material storage on the local filesystem.
//!
//! Client-supplied filenames are untrusted: they are reduced to a safe ASCII
//! form and prefixed with the owning team id before touching the disk.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::errors::AppError;

/// Longest stored filename, team prefix included.
const MAX_STORED_LEN: usize = 120;

/// Extensions longer than this are treated as part of the stem when truncating.
const MAX_EXTENSION_LEN: usize = 16;

/// An uploaded material file, as received from the client.
#[derive(Debug, Clone)]
pub struct MaterialUpload {
    pub original_name: String,
    pub bytes: Vec<u8>,
}

/// Outcome of deleting a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotFound,
}

/// Directory-backed store for team materials.
#[derive(Debug, Clone)]
pub struct MaterialStore {
    root: PathBuf,
}

impl MaterialStore {
    /// Open the store, creating the directory if needed.
    pub async fn open(root: &Path) -> Result<Self, AppError> {
        tokio::fs::create_dir_all(root).await.map_err(|e| {
            AppError::StorageFailure(format!(
                "Failed to create upload directory {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self {
            root: root.to_path_buf(),
        })
    }

    /// Store a file for a team and return the stored filename.
    ///
    /// An existing file with the same stored name is overwritten.
    pub async fn store(&self, team_id: i64, upload: &MaterialUpload) -> Result<String, AppError> {
        let prefix = format!("{}_", team_id);
        let budget = MAX_STORED_LEN.saturating_sub(prefix.len());
        let safe = sanitize_filename(&upload.original_name, budget).ok_or_else(|| {
            AppError::Validation(format!(
                "File name {:?} has no usable characters",
                upload.original_name
            ))
        })?;
        let filename = format!("{}{}", prefix, safe);

        tokio::fs::write(self.root.join(&filename), &upload.bytes)
            .await
            .map_err(|e| {
                tracing::error!("Failed to write material {}: {:?}", filename, e);
                AppError::StorageFailure(format!("Failed to store {}: {}", filename, e))
            })?;

        tracing::debug!("Stored material {} ({} bytes)", filename, upload.bytes.len());
        Ok(filename)
    }

    /// Delete a stored file. A missing file is reported, not treated as an error.
    pub async fn delete(&self, filename: &str) -> Result<Removal, AppError> {
        let path = self.resolve(filename)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(Removal::Removed),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Removal::NotFound),
            Err(e) => Err(AppError::StorageFailure(format!(
                "Failed to delete {}: {}",
                filename, e
            ))),
        }
    }

    /// Read a stored file back.
    pub async fn read(&self, filename: &str) -> Result<Vec<u8>, AppError> {
        let path = self.resolve(filename)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(AppError::NotFound(format!(
                "Material file {} not found",
                filename
            ))),
            Err(e) => Err(AppError::StorageFailure(format!(
                "Failed to read {}: {}",
                filename, e
            ))),
        }
    }

    /// Map a stored name back to a path, refusing anything that is not a
    /// name this store could have produced.
    fn resolve(&self, filename: &str) -> Result<PathBuf, AppError> {
        if !is_stored_name(filename) {
            return Err(AppError::StorageFailure(format!(
                "Refusing unsafe stored filename {:?}",
                filename
            )));
        }
        Ok(self.root.join(filename))
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_'
}

/// Whether `filename` has the shape of a name produced by [`MaterialStore::store`].
fn is_stored_name(filename: &str) -> bool {
    !filename.is_empty()
        && filename.len() <= MAX_STORED_LEN
        && !filename.starts_with(['.', '_'])
        && filename.chars().all(is_safe_char)
}

/// Reduce an untrusted filename to `[A-Za-z0-9._-]`, at most `max_len` characters.
///
/// Only the final path component is kept, whitespace becomes `_`, other
/// characters are dropped, and leading dots or underscores are stripped so the
/// result can never name a parent directory or a hidden file. Long names lose
/// characters from the stem, keeping the extension. Returns `None` when
/// nothing usable remains.
pub fn sanitize_filename(name: &str, max_len: usize) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);

    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        if is_safe_char(c) {
            cleaned.push(c);
        } else if c.is_whitespace() {
            cleaned.push('_');
        }
    }

    let trimmed = cleaned.trim_start_matches(['.', '_']);
    if trimmed.is_empty() || max_len == 0 {
        return None;
    }
    if trimmed.len() <= max_len {
        return Some(trimmed.to_string());
    }

    // Only ASCII remains, so byte offsets are character offsets.
    match trimmed.rfind('.') {
        Some(dot) if dot > 0 && trimmed.len() - dot <= MAX_EXTENSION_LEN.min(max_len - 1) => {
            let ext = &trimmed[dot..];
            Some(format!("{}{}", &trimmed[..max_len - ext.len()], ext))
        }
        _ => Some(trimmed[..max_len].to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_strips_traversal() {
        assert_eq!(
            sanitize_filename("../../etc/passwd", 120).as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("..\\..\\boot.ini", 120).as_deref(),
            Some("boot.ini")
        );
        assert_eq!(sanitize_filename("..", 120).as_deref(), None);
    }

    #[test]
    fn test_sanitize_normalizes_whitespace_and_symbols() {
        assert_eq!(
            sanitize_filename("My Slides (final).pdf", 120).as_deref(),
            Some("My_Slides_final.pdf")
        );
        assert_eq!(sanitize_filename(".hidden", 120).as_deref(), Some("hidden"));
        assert_eq!(sanitize_filename("日本語", 120).as_deref(), None);
    }

    #[tokio::test]
    async fn test_store_and_delete_roundtrip() {
        let dir = TempDir::new().unwrap();
        let store = MaterialStore::open(dir.path()).await.unwrap();

        let upload = MaterialUpload {
            original_name: "../lesson plan.pdf".to_string(),
            bytes: b"slides".to_vec(),
        };
        let filename = store.store(7, &upload).await.unwrap();
        assert_eq!(filename, "7_lesson_plan.pdf");
        assert!(dir.path().join(&filename).exists());
        assert_eq!(store.read(&filename).await.unwrap(), b"slides");

        assert_eq!(store.delete(&filename).await.unwrap(), Removal::Removed);
        assert_eq!(store.delete(&filename).await.unwrap(), Removal::NotFound);
    }

    #[test]
    fn test_sanitize_truncates_stem_and_keeps_extension() {
        let long = format!("{}.pdf", "a".repeat(130));
        let safe = sanitize_filename(&long, 20).unwrap();
        assert_eq!(safe, format!("{}.pdf", "a".repeat(16)));

        let no_ext = "b".repeat(50);
        assert_eq!(sanitize_filename(&no_ext, 10).unwrap(), "b".repeat(10));
    }

    #[tokio::test]
    async fn test_long_names_can_be_read_and_deleted() {
        let dir = TempDir::new().unwrap();
        let store = MaterialStore::open(dir.path()).await.unwrap();

        let upload = MaterialUpload {
            original_name: format!("{}.pdf", "a".repeat(130)),
            bytes: b"long".to_vec(),
        };
        let filename = store.store(7, &upload).await.unwrap();
        assert_eq!(filename.len(), MAX_STORED_LEN);
        assert!(filename.starts_with("7_a"));
        assert!(filename.ends_with(".pdf"));

        assert_eq!(store.read(&filename).await.unwrap(), b"long");
        assert_eq!(store.delete(&filename).await.unwrap(), Removal::Removed);
        assert!(!dir.path().join(&filename).exists());
    }

    #[tokio::test]
    async fn test_resolve_refuses_unsafe_names() {
        let dir = TempDir::new().unwrap();
        let store = MaterialStore::open(dir.path()).await.unwrap();

        assert!(matches!(
            store.delete("../outside.txt").await,
            Err(AppError::StorageFailure(_))
        ));
        assert!(matches!(
            store.read("").await,
            Err(AppError::StorageFailure(_))
        ));
        assert!(matches!(
            store.read(".env").await,
            Err(AppError::StorageFailure(_))
        ));
        assert!(matches!(
            store.read(&"c".repeat(MAX_STORED_LEN + 1)).await,
            Err(AppError::StorageFailure(_))
        ));
    }
}
