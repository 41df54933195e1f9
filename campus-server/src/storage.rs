use std::collections::HashSet;
use std::time::{Duration, SystemTime};

use camino::{Utf8Path, Utf8PathBuf};
use chrono::Utc;
use miette::Diagnostic;
use thiserror::Error;
use uuid::Uuid;

/// Stores uploaded files on the local filesystem under a single directory
/// served at `/uploads`. Stored names are `<timestamp>-<random>[.ext]`, so
/// they never collide and reveal nothing about the uploader.
#[derive(Clone)]
pub struct UploadStore {
    root: Utf8PathBuf,
}

#[derive(Debug, Error, Diagnostic)]
pub enum StorageError {
    #[error("failed to create uploads directory {path}: {source}")]
    #[diagnostic(code(campus::error::storage))]
    CreateDirectory {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to store upload {name}: {source}")]
    #[diagnostic(code(campus::error::storage))]
    Write {
        name: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to scan uploads directory {path}: {source}")]
    #[diagnostic(code(campus::error::storage))]
    Scan {
        path: Utf8PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// A file written by [`UploadStore::save`]. `name` is relative to the
/// uploads root and is what gets persisted on the owning row.
pub struct StoredFile {
    pub name: String,
}

/// Outcome of one removal attempt. Removals are best-effort: a missing or
/// locked file is reported here, never escalated.
#[derive(Debug, Clone)]
pub struct FileRemoval {
    pub file: String,
    pub removed: bool,
    pub error: Option<String>,
}

impl UploadStore {
    pub async fn new(root: impl Into<Utf8PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| StorageError::CreateDirectory {
                path: root.clone(),
                source,
            })?;
        tracing::debug!(path = root.as_str(), "uploads directory ready");
        Ok(Self { root })
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    pub async fn save(
        &self,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<StoredFile, StorageError> {
        let name = match sanitized_extension(original_name) {
            Some(ext) => format!(
                "{}-{}.{}",
                Utc::now().format("%Y%m%d%H%M%S"),
                Uuid::new_v4().simple(),
                ext
            ),
            None => format!(
                "{}-{}",
                Utc::now().format("%Y%m%d%H%M%S"),
                Uuid::new_v4().simple()
            ),
        };

        tokio::fs::write(self.root.join(&name), bytes)
            .await
            .map_err(|source| StorageError::Write {
                name: name.clone(),
                source,
            })?;

        tracing::trace!(file = name.as_str(), size = bytes.len(), "upload stored");

        Ok(StoredFile { name })
    }

    pub async fn remove(&self, name: &str) -> FileRemoval {
        if name.contains('/') || name.contains('\\') || name.starts_with('.') {
            return FileRemoval {
                file: name.to_string(),
                removed: false,
                error: Some("invalid file name".to_string()),
            };
        }

        match tokio::fs::remove_file(self.root.join(name)).await {
            Ok(()) => {
                tracing::trace!(file = name, "upload removed");
                FileRemoval {
                    file: name.to_string(),
                    removed: true,
                    error: None,
                }
            }
            Err(e) => {
                tracing::warn!(file = name, "failed to remove upload: {}", e);
                FileRemoval {
                    file: name.to_string(),
                    removed: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    /// Removes files that are not in `referenced` and have not been
    /// modified within `grace`. The grace period keeps uploads that belong
    /// to a registration still in flight.
    pub async fn sweep(
        &self,
        referenced: &HashSet<String>,
        grace: Duration,
    ) -> Result<usize, StorageError> {
        let scan_error = |source| StorageError::Scan {
            path: self.root.clone(),
            source,
        };

        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await.map_err(scan_error)?;
        while let Some(entry) = entries.next_entry().await.map_err(scan_error)? {
            let file_name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(_) => continue,
            };
            if referenced.contains(&file_name) {
                continue;
            }

            let metadata = match entry.metadata().await {
                Ok(metadata) => metadata,
                Err(_) => continue,
            };
            if !metadata.is_file() {
                continue;
            }

            let age = metadata
                .modified()
                .ok()
                .and_then(|modified| SystemTime::now().duration_since(modified).ok());
            if let Some(age) = age {
                if age >= grace && tokio::fs::remove_file(entry.path()).await.is_ok() {
                    tracing::debug!(file = file_name.as_str(), "removed orphaned upload");
                    removed += 1;
                }
            }
        }

        Ok(removed)
    }
}

fn sanitized_extension(original_name: Option<&str>) -> Option<String> {
    original_name
        .and_then(|name| Utf8Path::new(name).extension())
        .map(|ext| ext.to_ascii_lowercase())
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 8 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
}
