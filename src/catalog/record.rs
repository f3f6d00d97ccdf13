//! The `file_v0` row shape.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// One row of the catalog's sole table, matching `SPEC_FULL.md` §3's
/// `FileRecord`.
#[derive(Debug, Clone, FromRow)]
pub struct FileRecord {
    pub fullpath: String,
    pub entityid: String,
    pub hash_md5: String,
    pub mime_typ: String,
    pub cont_len: i64,
    pub last_mod: i64,
    pub desc_raw: Option<String>,
    pub desc_fts: Option<String>,
    pub meta_js: Option<String>,
}

impl FileRecord {
    pub fn last_modified(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.last_mod).unwrap_or_else(Utc::now)
    }

    pub fn path_segments(&self) -> Vec<String> {
        self.fullpath.split('/').map(str::to_string).collect()
    }
}

/// Result of `CatalogEngine::read`: the narrow identity/size/type
/// projection every caller of `Manager::read_file` needs.
#[derive(Debug, Clone)]
pub struct FileStat {
    pub entity_id: String,
    pub checksum: String,
    pub mime_type: String,
    pub file_size: i64,
    pub last_modified: DateTime<Utc>,
}

impl From<&FileRecord> for FileStat {
    fn from(r: &FileRecord) -> Self {
        Self {
            entity_id: r.entityid.clone(),
            checksum: r.hash_md5.clone(),
            mime_type: r.mime_typ.clone(),
            file_size: r.cont_len,
            last_modified: r.last_modified(),
        }
    }
}

/// One hit from `CatalogEngine::search`.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub file_path: String,
    pub description: String,
    pub search_score: f64,
}

/// One entry from `CatalogEngine::list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub name: String,
    pub is_file: bool,
}

/// `{isFile, isDirectory}` from `CatalogEngine::stat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PathStat {
    pub is_file: bool,
    pub is_directory: bool,
}
