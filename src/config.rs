//! `Manager` construction options.
//!
//! Follows the teacher's `OpenOptions`/`SingleFileOpenOptions` fluent-builder
//! shape: a `new()`/`Default` pair plus `fn field(mut self, v: T) -> Self`
//! setters, one per distilled-spec configuration row (`SPEC_FULL.md` §6).

use std::path::PathBuf;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::logger::{default_logger, Logger};

/// 100 KiB, the distilled spec's default `maxDescriptionSize` /
/// `maxMetadataJsonSize`.
pub const DEFAULT_MAX_DESCRIPTION_SIZE: usize = 100 * 1024;
pub const DEFAULT_MAX_METADATA_JSON_SIZE: usize = 100 * 1024;

/// Application-metadata JSON codec, matching the distilled spec's
/// `json: {parse, stringify}` config option. The default bridges to
/// `serde_json`; callers only need self-consistency (`stringify ∘ parse`
/// round-trips), not compatibility with the default codec.
pub trait JsonCodec: Send + Sync {
    fn stringify(&self, value: &serde_json::Value) -> Result<String>;
    fn parse(&self, text: &str) -> Result<serde_json::Value>;
}

pub struct SerdeJsonCodec;

impl JsonCodec for SerdeJsonCodec {
    fn stringify(&self, value: &serde_json::Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn parse(&self, text: &str) -> Result<serde_json::Value> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Pre-tokenization hook applied to both the stored `desc_fts` text and
/// every search query, matching the distilled spec's
/// `toFullTextSearchString` option. Defaults to identity.
pub type FtsTransform = Arc<dyn Fn(&str) -> String + Send + Sync>;

fn identity_transform() -> FtsTransform {
    Arc::new(|s: &str| s.to_string())
}

/// Construction options for a `Manager`.
#[derive(Clone)]
pub struct ManagerOptions {
    pub(crate) bucket_name: String,
    pub(crate) storage_root: PathBuf,
    pub(crate) logger: Arc<dyn Logger>,
    pub(crate) json_codec: Arc<dyn JsonCodec>,
    pub(crate) max_description_size: usize,
    pub(crate) max_metadata_json_size: usize,
    pub(crate) to_fts_string: FtsTransform,
}

impl ManagerOptions {
    /// Start building options for `bucket_name` rooted at `storage_root`.
    /// Both are required by the distilled spec's configuration table.
    pub fn new(bucket_name: impl Into<String>, storage_root: impl Into<PathBuf>) -> Self {
        Self {
            bucket_name: bucket_name.into(),
            storage_root: storage_root.into(),
            logger: default_logger(),
            json_codec: Arc::new(SerdeJsonCodec),
            max_description_size: DEFAULT_MAX_DESCRIPTION_SIZE,
            max_metadata_json_size: DEFAULT_MAX_METADATA_JSON_SIZE,
            to_fts_string: identity_transform(),
        }
    }

    pub fn logger(mut self, logger: Arc<dyn Logger>) -> Self {
        self.logger = logger;
        self
    }

    pub fn json_codec(mut self, codec: Arc<dyn JsonCodec>) -> Self {
        self.json_codec = codec;
        self
    }

    pub fn max_description_size(mut self, value: usize) -> Self {
        self.max_description_size = value;
        self
    }

    pub fn max_metadata_json_size(mut self, value: usize) -> Self {
        self.max_metadata_json_size = value;
        self
    }

    pub fn to_fts_string(mut self, transform: FtsTransform) -> Self {
        self.to_fts_string = transform;
        self
    }

    /// Checked at `Manager::new` time rather than on each setter: a
    /// zero-size description limit can never be satisfied by a non-empty
    /// description, and a `storage_root` that already exists as a
    /// non-directory can never host the bucket tree `open()` creates
    /// under it.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.max_description_size == 0 {
            return Err(Error::InvalidConfig(
                "max_description_size must be greater than zero".to_string(),
            ));
        }
        if self.storage_root.exists() && !self.storage_root.is_dir() {
            return Err(Error::InvalidConfig(format!(
                "storage_root {} exists and is not a directory",
                self.storage_root.display()
            )));
        }
        Ok(())
    }

    pub fn bucket_name(&self) -> &str {
        &self.bucket_name
    }

    pub fn storage_root(&self) -> &std::path::Path {
        &self.storage_root
    }
}
