//! MD5 checksums.
//!
//! Out of scope per the distilled spec ("MD5 hashing" is an external
//! collaborator), backed by the `md-5` crate (the same dependency
//! `vectordotdev-vector` uses for its S3 sink's `Content-MD5` header).

use md5::{Digest, Md5};

/// Incremental MD5 hasher used by the write/overwrite streams to
/// accumulate a checksum across chunk boundaries without buffering the
/// whole payload.
#[derive(Default)]
pub struct IncrementalMd5 {
    inner: Md5,
}

impl IncrementalMd5 {
    pub fn new() -> Self {
        Self { inner: Md5::new() }
    }

    pub fn update(&mut self, chunk: &[u8]) {
        self.inner.update(chunk);
    }

    /// Consume the hasher and return the lowercase hex digest (32 chars).
    pub fn finalize_hex(self) -> String {
        hex::encode(self.inner.finalize())
    }
}

/// One-shot MD5 of a full in-memory buffer, used by `Manager::write_file`
/// which is handed the complete payload up front rather than a stream.
pub fn md5_hex(data: &[u8]) -> String {
    let mut hasher = IncrementalMd5::new();
    hasher.update(data);
    hasher.finalize_hex()
}
