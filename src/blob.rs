//! Blob-store adapter: a flat directory of uuid-named files under
//! `<root>/<bucket>/main/`.
//!
//! Grounded on the teacher's `SingleFileDB` durability discipline (write to
//! a scratch file, fsync, atomically rename onto the final name) and on
//! `other_examples/da7eb26d_bavela-object-store`'s upload-to-tmp-then-rename
//! pattern for the exact `tokio::fs` call sequence (`SPEC_FULL.md` §4.3).

use std::path::{Path, PathBuf};

use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::Result;

/// Thin contract over the blob directory: create, open-for-read,
/// open-for-write, remove. Not-found surfaces as `std::io::ErrorKind::NotFound`
/// via the ordinary `Error::Io` conversion; the core normalizes that into
/// `Error::FileNotFound` / self-heal paths.
pub struct BlobStore {
    main_dir: PathBuf,
}

impl BlobStore {
    pub fn new(bucket_dir: impl Into<PathBuf>) -> Self {
        Self {
            main_dir: bucket_dir.into().join("main"),
        }
    }

    pub async fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.main_dir).await?;
        Ok(())
    }

    fn blob_path(&self, entity_id: &str) -> PathBuf {
        self.main_dir.join(entity_id)
    }

    fn scratch_path(&self, entity_id: &str) -> PathBuf {
        self.main_dir.join(format!("{entity_id}.crswap"))
    }

    /// Read a whole blob into memory. Used by `copy_file`, which streams
    /// src bytes into a fresh blob without going through a stream type.
    pub async fn read_all(&self, entity_id: &str) -> Result<Vec<u8>> {
        let mut file = File::open(self.blob_path(entity_id)).await?;
        let mut buf = Vec::new();
        file.read_to_end(&mut buf).await?;
        Ok(buf)
    }

    pub async fn open_read(&self, entity_id: &str) -> Result<File> {
        Ok(File::open(self.blob_path(entity_id)).await?)
    }

    /// Open a scratch file for a new blob. Nothing under `entity_id`'s
    /// final name exists until `BlobWriter::close` renames onto it.
    pub async fn open_write(&self, entity_id: &str) -> Result<BlobWriter> {
        self.ensure_dir().await?;
        let scratch = self.scratch_path(entity_id);
        let file = File::create(&scratch).await?;
        Ok(BlobWriter {
            file: Some(file),
            scratch,
            dest: self.blob_path(entity_id),
        })
    }

    /// One-shot write of a complete in-memory buffer, used by
    /// `Manager::write_file`, which already has the full payload and its
    /// checksum before calling into the blob store.
    pub async fn create(&self, entity_id: &str, data: &[u8]) -> Result<()> {
        let mut writer = self.open_write(entity_id).await?;
        writer.write(data).await?;
        writer.close().await
    }

    pub async fn remove(&self, entity_id: &str) -> Result<()> {
        fs::remove_file(self.blob_path(entity_id)).await?;
        Ok(())
    }

    pub fn exists_sync(&self, entity_id: &str) -> bool {
        self.blob_path(entity_id).is_file()
    }
}

/// An in-progress write to a scratch file. `close()` commits it onto the
/// final blob name; `abort()` discards it.
pub struct BlobWriter {
    file: Option<File>,
    scratch: PathBuf,
    dest: PathBuf,
}

impl BlobWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let file = self.file.as_mut().expect("write after close/abort");
        file.write_all(chunk).await?;
        Ok(())
    }

    /// Flush, fsync, and atomically rename the scratch file onto the
    /// final blob name.
    pub async fn close(mut self) -> Result<()> {
        let mut file = self.file.take().expect("double close");
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&self.scratch, &self.dest).await?;
        Ok(())
    }

    /// Remove the scratch file without renaming. Safe to call even if the
    /// scratch file was never flushed.
    pub async fn abort(mut self) -> Result<()> {
        self.file.take();
        fs::remove_file(&self.scratch).await?;
        Ok(())
    }

    pub fn scratch_path(&self) -> &Path {
        &self.scratch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.create("entity-1", b"hello world").await.unwrap();
        let data = store.read_all("entity-1").await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn abort_leaves_no_trace() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let mut writer = store.open_write("entity-2").await.unwrap();
        writer.write(b"partial").await.unwrap();
        let scratch = writer.scratch_path().to_path_buf();
        writer.abort().await.unwrap();
        assert!(!scratch.exists());
        assert!(!store.exists_sync("entity-2"));
    }

    #[tokio::test]
    async fn remove_deletes_the_blob() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        store.create("entity-3", b"data").await.unwrap();
        store.remove("entity-3").await.unwrap();
        assert!(store.read_all("entity-3").await.is_err());
    }

    #[tokio::test]
    async fn missing_blob_read_is_not_found_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = BlobStore::new(dir.path());
        let err = store.read_all("does-not-exist").await.unwrap_err();
        match err {
            crate::error::Error::Io(io_err) => {
                assert_eq!(io_err.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("expected Io(NotFound), got {other:?}"),
        }
    }
}
