//! File-backed document store with atomic replace.
//!
//! # Responsibility
//! - Map collections to files under one data directory.
//! - Serialize/deserialize collections as pretty-printed JSON arrays.
//!
//! # Invariants
//! - `save` = `stage` (temp file, fsync) + `commit` (rename onto final path).
//! - A failed or interrupted write leaves the previous file content readable.
//! - Temp files live next to the final path so the rename never crosses devices.

use super::{Collection, StoreError, StoreResult};
use log::{debug, error, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Document store rooted at one data directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    data_dir: PathBuf,
}

impl DocumentStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Final on-disk path of one collection.
    pub fn path_for(&self, collection: Collection) -> PathBuf {
        self.data_dir.join(collection.file_name())
    }

    /// Returns whether the collection file is present.
    pub async fn exists(&self, collection: Collection) -> StoreResult<bool> {
        let path = self.path_for(collection);
        tokio::fs::try_exists(&path)
            .await
            .map_err(|source| StoreError::Io {
                collection,
                path,
                source,
            })
    }

    /// Reads and decodes one collection from storage.
    ///
    /// # Errors
    /// - `NotFound` when the file is absent.
    /// - `Corrupt` when the content does not decode into `T`.
    /// - `Io` for any other read failure.
    pub async fn load<T: DeserializeOwned>(&self, collection: Collection) -> StoreResult<T> {
        let path = self.path_for(collection);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StoreError::NotFound { collection, path });
            }
            Err(source) => {
                return Err(StoreError::Io {
                    collection,
                    path,
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| {
            error!(
                "event=collection_load module=store status=error collection={} error_code=corrupt",
                collection
            );
            StoreError::Corrupt { collection, source }
        })
    }

    /// Serializes `value` and atomically replaces the collection file.
    pub async fn save<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        value: &T,
    ) -> StoreResult<()> {
        let started_at = Instant::now();
        let staged = self.stage(collection, value).await?;
        staged.commit().await?;
        debug!(
            "event=collection_save module=store status=ok collection={} duration_ms={}",
            collection,
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Writes the serialized collection to a fresh temp file and flushes it.
    ///
    /// The final path is untouched until [`StagedWrite::commit`] runs. Dropping
    /// the returned value without committing leaves the temp file behind, which
    /// is exactly the state a crash between the two steps produces.
    pub async fn stage<T: Serialize + ?Sized>(
        &self,
        collection: Collection,
        value: &T,
    ) -> StoreResult<StagedWrite> {
        let content = serde_json::to_vec_pretty(value)
            .map_err(|source| StoreError::Serialization { collection, source })?;

        let final_path = self.path_for(collection);
        let temp_path = self.data_dir.join(format!(
            "{}.{}.tmp",
            collection.file_name(),
            Uuid::new_v4().simple()
        ));

        if let Err(source) = write_and_sync(&temp_path, &content).await {
            discard_temp(&temp_path, collection).await;
            return Err(StoreError::Io {
                collection,
                path: temp_path,
                source,
            });
        }

        Ok(StagedWrite {
            collection,
            temp_path,
            final_path,
        })
    }
}

/// Fully written temp file waiting to replace a collection file.
#[must_use = "a staged write does nothing until committed"]
#[derive(Debug)]
pub struct StagedWrite {
    collection: Collection,
    temp_path: PathBuf,
    final_path: PathBuf,
}

impl StagedWrite {
    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    pub fn final_path(&self) -> &Path {
        &self.final_path
    }

    /// Renames the temp file onto the final path.
    pub async fn commit(self) -> StoreResult<()> {
        if let Err(source) = tokio::fs::rename(&self.temp_path, &self.final_path).await {
            error!(
                "event=collection_commit module=store status=error collection={} error={}",
                self.collection, source
            );
            discard_temp(&self.temp_path, self.collection).await;
            return Err(StoreError::Io {
                collection: self.collection,
                path: self.final_path,
                source,
            });
        }

        // Rename durability needs the directory entry flushed as well.
        if let Some(dir) = self.final_path.parent() {
            let synced = match tokio::fs::File::open(dir).await {
                Ok(handle) => handle.sync_all().await,
                Err(err) => Err(err),
            };
            if let Err(err) = synced {
                warn!(
                    "event=dir_sync module=store status=error collection={} error={}",
                    self.collection, err
                );
            }
        }
        Ok(())
    }
}

async fn write_and_sync(path: &Path, content: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(content).await?;
    file.flush().await?;
    file.sync_all().await?;
    Ok(())
}

async fn discard_temp(path: &Path, collection: Collection) {
    if let Err(err) = tokio::fs::remove_file(path).await {
        if err.kind() != ErrorKind::NotFound {
            warn!(
                "event=temp_cleanup module=store status=error collection={} error={}",
                collection, err
            );
        }
    }
}
