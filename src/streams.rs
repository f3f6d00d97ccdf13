//! Write/overwrite streams.
//!
//! Grounded on `SPEC_FULL.md` §4.4 and on the teacher's `SingleFileTxGuard`
//! for the shape of a small state machine guarding a `closed` flag and a
//! commit/abort pair of terminal methods. Each stream carries its own
//! `RwScheduler` instance rather than sharing the `Manager`'s — per §5,
//! "stream state (size, hash, closed)" is protected by the stream's own
//! internal mutex, a separate instance of §4.1, not a reacquisition of the
//! manager's.

use std::sync::Arc;

use crate::blob::{BlobStore, BlobWriter};
use crate::catalog::{CatalogEngine, UpdateFields};
use crate::error::{Error, Result};
use crate::hash::IncrementalMd5;
use crate::logger::Logger;
use crate::mutex::RwScheduler;

/// The narrow `opened` capability a stream needs from its owning
/// `Manager` (`SPEC_FULL.md` §9's "cyclic references... expressed as
/// narrow capability interfaces" — one method, `opened`, rather than a
/// back-reference to the whole `Manager`).
pub type OpenedCheck = Arc<dyn Fn() -> bool + Send + Sync>;

/// Side-metadata a stream can carry into its eventual `catalog.create`/
/// `catalog.update` call. `None` means "use the default / leave untouched";
/// `Some(None)` (for `description`/`metadata`) means "explicitly clear".
#[derive(Default, Clone)]
pub struct StreamMetadata {
    pub mime_type: Option<String>,
    pub description: Option<Option<String>>,
    pub metadata: Option<Option<serde_json::Value>>,
}

/// A file stream under construction. Allocates its `entity_id` and opens
/// the blob writer up front (`Manager::create_writable`); every `write`
/// accumulates size and hash, and `close` commits a fresh catalog row.
pub struct WritableFileStream {
    bucket_name: String,
    file_path: String,
    entity_id: String,
    writer: Option<BlobWriter>,
    blob_store: Arc<BlobStore>,
    catalog: Arc<CatalogEngine>,
    logger: Arc<dyn Logger>,
    opened: OpenedCheck,
    scheduler: RwScheduler,
    size: u64,
    hasher: IncrementalMd5,
    closed: bool,
    pub meta: StreamMetadata,
}

impl WritableFileStream {
    pub(crate) fn new(
        bucket_name: String,
        file_path: String,
        entity_id: String,
        writer: BlobWriter,
        blob_store: Arc<BlobStore>,
        catalog: Arc<CatalogEngine>,
        logger: Arc<dyn Logger>,
        opened: OpenedCheck,
        meta: StreamMetadata,
    ) -> Self {
        Self {
            bucket_name,
            file_path,
            entity_id,
            writer: Some(writer),
            blob_store,
            catalog,
            logger,
            opened,
            scheduler: RwScheduler::new(),
            size: 0,
            hasher: IncrementalMd5::new(),
            closed: false,
            meta,
        }
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    /// Empty chunks are no-ops; the distilled spec calls this out
    /// explicitly because the underlying writer would otherwise still do
    /// a (harmless but wasteful) zero-byte `write_all`. If the owning
    /// `Manager` has been closed in the meantime, abort the underlying
    /// writer, remove the staged blob, and fail `Closed` (spec.md §4.4).
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let _g = self.scheduler.acquire_write().await;
        if self.closed || !(self.opened)() {
            self.closed = true;
            self.fail_closed().await;
            return Err(Error::Closed);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        let writer = self.writer.as_mut().expect("writer present while open");
        if let Err(e) = writer.write(chunk).await {
            self.abort_on_fault().await;
            return Err(e);
        }
        self.size += chunk.len() as u64;
        self.hasher.update(chunk);
        Ok(())
    }

    /// Close the underlying writer, then `catalog.create` with the
    /// accumulated checksum/size. If either step fails, the staged blob is
    /// removed and the fault is rethrown.
    pub async fn close(mut self) -> Result<()> {
        let _g = self.scheduler.acquire_write().await;
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        let writer = self.writer.take().expect("writer present while open");
        if let Err(e) = writer.close().await {
            self.cleanup_blob().await;
            return Err(e);
        }

        let checksum = std::mem::take(&mut self.hasher).finalize_hex();
        let result = self
            .catalog
            .create(crate::catalog::CreateParams {
                fullpath: self.file_path.clone(),
                entity_id: self.entity_id.clone(),
                checksum,
                mime_type: self.meta.mime_type.clone(),
                file_size: self.size as i64,
                description: self.meta.description.clone().flatten(),
                metadata: self.meta.metadata.clone().flatten(),
            })
            .await;
        if let Err(e) = result {
            self.cleanup_blob().await;
            return Err(e);
        }
        Ok(())
    }

    /// Close the underlying writer with `reason`, remove the staged blob,
    /// and mark closed. Double-abort fails `Closed`.
    pub async fn abort(mut self, reason: Option<String>) -> Result<()> {
        let _g = self.scheduler.acquire_write().await;
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        let writer = self.writer.take().expect("writer present while open");
        let _ = reason;
        writer.abort().await?;
        Ok(())
    }

    async fn fail_closed(&mut self) {
        if let Some(writer) = self.writer.take() {
            let _ = writer.abort().await;
        }
    }

    async fn abort_on_fault(&mut self) {
        self.closed = true;
        self.cleanup_blob().await;
    }

    async fn cleanup_blob(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.abort().await {
                self.logger
                    .error(&format!("cleanup of staged blob {} failed: {e}", self.entity_id));
            }
        } else if let Err(e) = self.blob_store.remove(&self.entity_id).await {
            self.logger
                .error(&format!("cleanup of committed blob {} failed: {e}", self.entity_id));
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}

/// A stream over an existing file's replacement content. Carries
/// `old_entity_id` (the row's current entity, read before the stream was
/// constructed) and a fresh `new_entity_id`; `update_entity_id` flips to
/// `true` on the first successful `write`, distinguishing a metadata-only
/// close (never wrote bytes) from a content-rotating one.
pub struct OverwritableFileStream {
    bucket_name: String,
    file_path: String,
    old_entity_id: String,
    new_entity_id: String,
    writer: Option<BlobWriter>,
    blob_store: Arc<BlobStore>,
    catalog: Arc<CatalogEngine>,
    logger: Arc<dyn Logger>,
    opened: OpenedCheck,
    scheduler: RwScheduler,
    size: u64,
    hasher: IncrementalMd5,
    closed: bool,
    update_entity_id: bool,
    pub meta: StreamMetadata,
}

impl OverwritableFileStream {
    pub(crate) fn new(
        bucket_name: String,
        file_path: String,
        old_entity_id: String,
        new_entity_id: String,
        writer: BlobWriter,
        blob_store: Arc<BlobStore>,
        catalog: Arc<CatalogEngine>,
        logger: Arc<dyn Logger>,
        opened: OpenedCheck,
        meta: StreamMetadata,
    ) -> Self {
        Self {
            bucket_name,
            file_path,
            old_entity_id,
            new_entity_id,
            writer: Some(writer),
            blob_store,
            catalog,
            logger,
            opened,
            scheduler: RwScheduler::new(),
            size: 0,
            hasher: IncrementalMd5::new(),
            closed: false,
            update_entity_id: false,
            meta,
        }
    }

    /// If the owning `Manager` has been closed, abort the staged writer and
    /// fail `Closed` (spec.md §4.4), same as `WritableFileStream::write`.
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        let _g = self.scheduler.acquire_write().await;
        if self.closed || !(self.opened)() {
            self.closed = true;
            if let Some(writer) = self.writer.take() {
                let _ = writer.abort().await;
            }
            return Err(Error::Closed);
        }
        if chunk.is_empty() {
            return Ok(());
        }
        let writer = self.writer.as_mut().expect("writer present while open");
        if let Err(e) = writer.write(chunk).await {
            self.closed = true;
            if let Some(writer) = self.writer.take() {
                let _ = writer.abort().await;
            }
            return Err(e);
        }
        self.size += chunk.len() as u64;
        self.hasher.update(chunk);
        self.update_entity_id = true;
        Ok(())
    }

    /// Metadata-only close (never wrote bytes): discard the unused staged
    /// blob and apply only the side-metadata fields. Content-rotating
    /// close: commit the new blob, swap `entityid` under an
    /// `old_entity_id` optimistic-concurrency guard, and remove the old
    /// blob on success (cleanup errors are logged, not raised).
    pub async fn close(mut self) -> Result<()> {
        let _g = self.scheduler.acquire_write().await;
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;

        if !self.update_entity_id {
            if let Some(writer) = self.writer.take() {
                let _ = writer.abort().await;
            }
            return self
                .catalog
                .update(
                    &self.file_path,
                    UpdateFields {
                        mime_type: self.meta.mime_type.clone(),
                        description: self.meta.description.clone(),
                        metadata: self.meta.metadata.clone(),
                        ..Default::default()
                    },
                )
                .await;
        }

        let writer = self.writer.take().expect("writer present while open");
        if let Err(e) = writer.close().await {
            self.cleanup_new_blob().await;
            return Err(e);
        }

        let checksum = std::mem::take(&mut self.hasher).finalize_hex();
        let result = self
            .catalog
            .update(
                &self.file_path,
                UpdateFields {
                    new_entity_id: Some(self.new_entity_id.clone()),
                    old_entity_id: Some(self.old_entity_id.clone()),
                    checksum: Some(checksum),
                    file_size: Some(self.size as i64),
                    mime_type: self.meta.mime_type.clone(),
                    description: self.meta.description.clone(),
                    metadata: self.meta.metadata.clone(),
                },
            )
            .await;

        match result {
            Ok(()) => {
                if let Err(e) = self.blob_store.remove(&self.old_entity_id).await {
                    self.logger
                        .error(&format!("removing superseded blob {} failed: {e}", self.old_entity_id));
                }
                Ok(())
            }
            Err(e) => {
                self.cleanup_new_blob().await;
                Err(e)
            }
        }
    }

    pub async fn abort(mut self, reason: Option<String>) -> Result<()> {
        let _g = self.scheduler.acquire_write().await;
        if self.closed {
            return Err(Error::Closed);
        }
        self.closed = true;
        let _ = reason;
        if let Some(writer) = self.writer.take() {
            writer.abort().await?;
        }
        Ok(())
    }

    async fn cleanup_new_blob(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = writer.abort().await {
                self.logger
                    .error(&format!("cleanup of staged blob {} failed: {e}", self.new_entity_id));
            }
        } else if let Err(e) = self.blob_store.remove(&self.new_entity_id).await {
            self.logger
                .error(&format!("cleanup of committed blob {} failed: {e}", self.new_entity_id));
        }
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn file_path(&self) -> &str {
        &self.file_path
    }
}
