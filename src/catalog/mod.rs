//! Catalog engine: the sole owner of `file_v0`.
//!
//! Grounded on `other_examples/da7eb26d_bavela-object-store`'s
//! `StorageService` for the shape of the thing (a struct wrapping a pool,
//! exposing CRUD plus a small validation layer, mapping SQLite unique
//! violations to domain errors) and on the teacher's `SingleFileDB` for
//! the checkpoint-after-every-mutation discipline (`SPEC_FULL.md` §4.2).

pub mod bm25;
pub mod record;
pub mod schema;

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};

use crate::config::{FtsTransform, JsonCodec};
use crate::error::{Error, Result};
use crate::logger::Logger;
use crate::mime;

pub use record::{DirEntry, FileRecord, FileStat, PathStat, SearchHit};

/// Parameters for `CatalogEngine::create`.
pub struct CreateParams {
    pub fullpath: String,
    pub entity_id: String,
    pub checksum: String,
    pub mime_type: Option<String>,
    pub file_size: i64,
    pub description: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Partial update for `CatalogEngine::update`. A field left `None` leaves
/// its column untouched; `description`/`metadata` use `Option<Option<T>>`
/// so `Some(None)` means "clear this column" and `None` means "don't
/// touch it" — the distilled spec's `null` vs. `undefined` distinction.
#[derive(Default)]
pub struct UpdateFields {
    pub new_entity_id: Option<String>,
    pub old_entity_id: Option<String>,
    pub checksum: Option<String>,
    pub mime_type: Option<String>,
    pub file_size: Option<i64>,
    pub description: Option<Option<String>>,
    pub metadata: Option<Option<serde_json::Value>>,
}

impl UpdateFields {
    fn is_empty(&self) -> bool {
        self.new_entity_id.is_none()
            && self.old_entity_id.is_none()
            && self.checksum.is_none()
            && self.mime_type.is_none()
            && self.file_size.is_none()
            && self.description.is_none()
            && self.metadata.is_none()
    }
}

/// Owns the `file_v0` table for one bucket. Constructed unconnected;
/// `connect()` opens the pool and `disconnect()` closes it. Every
/// mutating method ends with a `PRAGMA wal_checkpoint(TRUNCATE)`.
pub struct CatalogEngine {
    db_path: PathBuf,
    bucket_name: String,
    logger: Arc<dyn Logger>,
    json_codec: Arc<dyn JsonCodec>,
    max_description_size: usize,
    max_metadata_json_size: usize,
    to_fts_string: FtsTransform,
    // `RwLock` rather than a plain field so `connect`/`disconnect` take
    // `&self`: `CatalogEngine` is shared via `Arc` between `Manager` and
    // every open stream, neither of which can hold `&mut`. The lock is
    // never held across an `.await` — `pool()` clones the handle out and
    // drops the guard before any async call.
    pool: parking_lot::RwLock<Option<SqlitePool>>,
}

impl CatalogEngine {
    pub fn new(
        db_path: PathBuf,
        bucket_name: String,
        logger: Arc<dyn Logger>,
        json_codec: Arc<dyn JsonCodec>,
        max_description_size: usize,
        max_metadata_json_size: usize,
        to_fts_string: FtsTransform,
    ) -> Self {
        Self {
            db_path,
            bucket_name,
            logger,
            json_codec,
            max_description_size,
            max_metadata_json_size,
            to_fts_string,
            pool: parking_lot::RwLock::new(None),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.pool.read().is_some()
    }

    /// Idempotent: a second call while already connected is a no-op.
    pub async fn connect(&self) -> Result<()> {
        if self.pool.read().is_some() {
            return Ok(());
        }
        let options = SqliteConnectOptions::new()
            .filename(&self.db_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        schema::ensure_schema(&pool).await?;
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&pool)
            .await?;
        self.logger
            .debug(&format!("catalog connected at {}", self.db_path.display()));
        *self.pool.write() = Some(pool);
        Ok(())
    }

    pub async fn disconnect(&self) -> Result<()> {
        let taken = self.pool.write().take();
        if let Some(pool) = taken {
            let _ = sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
                .execute(&pool)
                .await;
            pool.close().await;
            self.logger.debug("catalog disconnected");
        }
        Ok(())
    }

    /// An owned clone of the pool handle (cheap: `SqlitePool` is an `Arc`
    /// around its connection set). Never hold the `RwLock` guard itself
    /// across an `.await`.
    fn pool(&self) -> Result<SqlitePool> {
        self.pool.read().clone().ok_or(Error::NotConnected)
    }

    async fn checkpoint(&self) -> Result<()> {
        let pool = self.pool()?;
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&pool)
            .await?;
        Ok(())
    }

    fn not_found(&self, fullpath: &str) -> Error {
        Error::file_not_found(self.bucket_name.clone(), fullpath)
    }

    fn exists_err(&self, fullpath: &str) -> Error {
        Error::file_exists(self.bucket_name.clone(), fullpath)
    }

    /// `desc_raw` is bounded at half of `max_description_size`; the other
    /// half of the budget is reserved for `desc_fts` (see
    /// `validate_desc_fts`), which can expand under a non-identity
    /// `to_fts_string` transform.
    fn validate_description(&self, desc: &str) -> Result<()> {
        let actual = desc.chars().count();
        let limit = self.max_description_size / 2;
        if actual > limit {
            return Err(Error::SizeLimitExceeded {
                what: "description",
                actual,
                limit,
            });
        }
        Ok(())
    }

    /// The FTS-transformed description is bounded at `2 * max_description_size`,
    /// independent of `desc_raw`'s own bound.
    fn validate_desc_fts(&self, desc_fts: &str) -> Result<()> {
        let actual = desc_fts.chars().count();
        let limit = self.max_description_size * 2;
        if actual > limit {
            return Err(Error::SizeLimitExceeded {
                what: "description_fts",
                actual,
                limit,
            });
        }
        Ok(())
    }

    fn validate_metadata_json(&self, json_text: &str) -> Result<()> {
        let actual = json_text.len();
        if actual > self.max_metadata_json_size {
            return Err(Error::SizeLimitExceeded {
                what: "metadata",
                actual,
                limit: self.max_metadata_json_size,
            });
        }
        Ok(())
    }

    async fn fetch_row(&self, fullpath: &str) -> Result<FileRecord> {
        let row = sqlx::query_as::<_, FileRecord>("SELECT * FROM file_v0 WHERE fullpath = ?")
            .bind(fullpath)
            .fetch_optional(self.pool()?)
            .await?;
        row.ok_or_else(|| self.not_found(fullpath))
    }

    /// Rows whose `fullpath` starts with `dir`'s joined segments. An empty
    /// `dir` fetches every row (the root directory's descendants are the
    /// whole table). The caller still re-checks depth/component equality
    /// in Rust — the `LIKE` clause here is a coarse, escaped pushdown
    /// filter, not the final word.
    async fn fetch_prefix(&self, dir: &[String]) -> Result<Vec<FileRecord>> {
        if dir.is_empty() {
            return Ok(sqlx::query_as::<_, FileRecord>("SELECT * FROM file_v0")
                .fetch_all(self.pool()?)
                .await?);
        }
        let pattern = format!("{}/%", escape_like(&dir.join("/")));
        Ok(sqlx::query_as::<_, FileRecord>(
            "SELECT * FROM file_v0 WHERE fullpath LIKE ? ESCAPE '\\'",
        )
        .bind(pattern)
        .fetch_all(self.pool()?)
        .await?)
    }

    pub async fn create(&self, params: CreateParams) -> Result<()> {
        let basename = params.fullpath.rsplit('/').next().unwrap_or("");
        let mime_type = params
            .mime_type
            .unwrap_or_else(|| mime::from_basename(basename));

        let (desc_raw, desc_fts) = match &params.description {
            Some(d) => {
                self.validate_description(d)?;
                let fts = (self.to_fts_string)(d);
                self.validate_desc_fts(&fts)?;
                (Some(d.clone()), Some(fts))
            }
            None => (None, None),
        };
        let meta_js = match &params.metadata {
            Some(v) => {
                let text = self.json_codec.stringify(v)?;
                self.validate_metadata_json(&text)?;
                Some(text)
            }
            None => None,
        };

        let result = sqlx::query(
            "INSERT INTO file_v0 \
             (fullpath, entityid, hash_md5, mime_typ, cont_len, last_mod, desc_raw, desc_fts, meta_js) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&params.fullpath)
        .bind(&params.entity_id)
        .bind(&params.checksum)
        .bind(&mime_type)
        .bind(params.file_size)
        .bind(Utc::now().timestamp_millis())
        .bind(&desc_raw)
        .bind(&desc_fts)
        .bind(&meta_js)
        .execute(self.pool()?)
        .await;

        match result {
            Ok(_) => {
                self.checkpoint().await?;
                Ok(())
            }
            Err(e) if is_unique_violation_on(&e, "fullpath") => Err(self.exists_err(&params.fullpath)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn read(&self, fullpath: &str) -> Result<FileStat> {
        Ok(FileStat::from(&self.fetch_row(fullpath).await?))
    }

    pub async fn read_entity_id(&self, fullpath: &str) -> Result<String> {
        Ok(self.fetch_row(fullpath).await?.entityid)
    }

    pub async fn read_description(&self, fullpath: &str) -> Result<Option<String>> {
        Ok(self.fetch_row(fullpath).await?.desc_raw)
    }

    pub async fn read_metadata(&self, fullpath: &str) -> Result<serde_json::Value> {
        let row = self.fetch_row(fullpath).await?;
        match row.meta_js {
            Some(text) => self.json_codec.parse(&text),
            None => Ok(serde_json::Value::Null),
        }
    }

    pub async fn move_file(&self, src: &str, dst: &str) -> Result<()> {
        let result = sqlx::query("UPDATE file_v0 SET fullpath = ? WHERE fullpath = ?")
            .bind(dst)
            .bind(src)
            .execute(self.pool()?)
            .await;
        match result {
            Ok(r) if r.rows_affected() == 0 => Err(self.not_found(src)),
            Ok(_) => {
                self.checkpoint().await?;
                Ok(())
            }
            Err(e) if is_unique_violation_on(&e, "fullpath") => Err(self.exists_err(dst)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn copy_file(&self, src: &str, dst: &str, dst_entity_id: &str) -> Result<()> {
        let result = sqlx::query(
            "INSERT INTO file_v0 \
             (fullpath, entityid, hash_md5, mime_typ, cont_len, last_mod, desc_raw, desc_fts, meta_js) \
             SELECT ?, ?, hash_md5, mime_typ, cont_len, ?, desc_raw, desc_fts, meta_js \
             FROM file_v0 WHERE fullpath = ?",
        )
        .bind(dst)
        .bind(dst_entity_id)
        .bind(Utc::now().timestamp_millis())
        .bind(src)
        .execute(self.pool()?)
        .await;
        match result {
            Ok(r) if r.rows_affected() == 0 => Err(self.not_found(src)),
            Ok(_) => {
                self.checkpoint().await?;
                Ok(())
            }
            Err(e) if is_unique_violation_on(&e, "fullpath") => Err(self.exists_err(dst)),
            Err(e) => Err(e.into()),
        }
    }

    pub async fn update(&self, fullpath: &str, fields: UpdateFields) -> Result<()> {
        if fields.is_empty() {
            self.fetch_row(fullpath).await?;
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE file_v0 SET ");
        let mut first = true;
        macro_rules! sep {
            () => {
                if first {
                    first = false;
                } else {
                    builder.push(", ");
                }
            };
        }

        sep!();
        builder.push("last_mod = ");
        builder.push_bind(Utc::now().timestamp_millis());

        if let Some(eid) = &fields.new_entity_id {
            sep!();
            builder.push("entityid = ");
            builder.push_bind(eid.clone());
        }
        if let Some(checksum) = &fields.checksum {
            sep!();
            builder.push("hash_md5 = ");
            builder.push_bind(checksum.clone());
        }
        if let Some(mime_type) = &fields.mime_type {
            sep!();
            builder.push("mime_typ = ");
            builder.push_bind(mime_type.clone());
        }
        if let Some(size) = fields.file_size {
            sep!();
            builder.push("cont_len = ");
            builder.push_bind(size);
        }
        if let Some(description) = &fields.description {
            match description {
                Some(d) => {
                    self.validate_description(d)?;
                    let fts = (self.to_fts_string)(d);
                    self.validate_desc_fts(&fts)?;
                    sep!();
                    builder.push("desc_raw = ");
                    builder.push_bind(d.clone());
                    sep!();
                    builder.push("desc_fts = ");
                    builder.push_bind(fts);
                }
                None => {
                    sep!();
                    builder.push("desc_raw = NULL");
                    sep!();
                    builder.push("desc_fts = NULL");
                }
            }
        }
        if let Some(metadata) = &fields.metadata {
            match metadata {
                Some(v) => {
                    let text = self.json_codec.stringify(v)?;
                    self.validate_metadata_json(&text)?;
                    sep!();
                    builder.push("meta_js = ");
                    builder.push_bind(text);
                }
                None => {
                    sep!();
                    builder.push("meta_js = NULL");
                }
            }
        }

        builder.push(" WHERE fullpath = ");
        builder.push_bind(fullpath.to_string());
        if let Some(old) = &fields.old_entity_id {
            builder.push(" AND entityid = ");
            builder.push_bind(old.clone());
        }

        let result = builder.build().execute(self.pool()?).await?;
        if result.rows_affected() == 0 {
            return Err(self.not_found(fullpath));
        }
        self.checkpoint().await?;
        Ok(())
    }

    pub async fn delete(&self, fullpath: &str) -> Result<()> {
        let result = sqlx::query("DELETE FROM file_v0 WHERE fullpath = ?")
            .bind(fullpath)
            .execute(self.pool()?)
            .await?;
        if result.rows_affected() == 0 {
            return Err(self.not_found(fullpath));
        }
        self.checkpoint().await?;
        Ok(())
    }

    pub async fn exists_file(&self, fullpath: &str) -> Result<bool> {
        match self.fetch_row(fullpath).await {
            Ok(_) => Ok(true),
            Err(Error::FileNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// The empty directory (root) always exists.
    pub async fn exists_dir(&self, dir: &[String]) -> Result<bool> {
        if dir.is_empty() {
            return Ok(true);
        }
        let rows = self.fetch_prefix(dir).await?;
        Ok(rows.iter().any(|r| matches_dir(&r.path_segments(), dir)))
    }

    pub async fn stat(&self, fullpath: &str) -> Result<PathStat> {
        let segments: Vec<String> = fullpath.split('/').map(str::to_string).collect();
        let is_file = self.exists_file(fullpath).await?;
        let is_directory = self.exists_dir(&segments).await?;
        Ok(PathStat {
            is_file,
            is_directory,
        })
    }

    /// Distinct immediate children of `dir`, directories before files,
    /// then by name.
    pub async fn list(
        &self,
        dir: &[String],
        limit: Option<usize>,
        offset: usize,
        order_by_name_desc: bool,
    ) -> Result<Vec<DirEntry>> {
        let rows = self.fetch_prefix(dir).await?;
        let mut children: HashMap<String, bool> = HashMap::new();
        for r in &rows {
            let segs = r.path_segments();
            if segs.len() <= dir.len() || segs[..dir.len()] != *dir {
                continue;
            }
            let name = segs[dir.len()].clone();
            if segs.len() == dir.len() + 1 {
                children.insert(name, true);
            } else {
                children.entry(name).or_insert(false);
            }
        }

        let mut entries: Vec<DirEntry> = children
            .into_iter()
            .map(|(name, is_file)| DirEntry { name, is_file })
            .collect();
        entries.sort_by(|a, b| {
            a.is_file.cmp(&b.is_file).then_with(|| {
                if order_by_name_desc {
                    b.name.cmp(&a.name)
                } else {
                    a.name.cmp(&b.name)
                }
            })
        });

        let start = offset.min(entries.len());
        let mut entries = entries.split_off(start);
        if let Some(l) = limit {
            entries.truncate(l);
        }
        Ok(entries)
    }

    /// BM25 search over `desc_fts`, rebuilt fresh from the candidate row
    /// set on every call (§4.2's documented "rebuild on every search"
    /// policy — there is no standing index to go stale).
    pub async fn search(
        &self,
        dir: &[String],
        query: &str,
        limit: Option<usize>,
        recursive: bool,
        score_threshold: f64,
    ) -> Result<Vec<SearchHit>> {
        let rows = self.fetch_prefix(dir).await?;
        let candidates: Vec<&FileRecord> = rows
            .iter()
            .filter(|r| {
                let segs = r.path_segments();
                if segs.len() <= dir.len() || segs[..dir.len()] != *dir {
                    return false;
                }
                if recursive {
                    segs.len() >= dir.len() + 1
                } else {
                    segs.len() == dir.len() + 1
                }
            })
            .collect();

        let transformed_query = (self.to_fts_string)(query);
        let docs: Vec<bm25::Document> = candidates
            .iter()
            .filter_map(|r| {
                r.desc_fts.as_ref().map(|fts| bm25::Document {
                    key: r.fullpath.as_str(),
                    tokens: bm25::tokenize(fts),
                })
            })
            .collect();
        let scores = bm25::score_corpus(&docs, &transformed_query);

        let mut hits: Vec<SearchHit> = candidates
            .iter()
            .filter_map(|r| {
                scores.get(r.fullpath.as_str()).and_then(|&score| {
                    if score < score_threshold {
                        None
                    } else {
                        Some(SearchHit {
                            file_path: r.fullpath.clone(),
                            description: r.desc_raw.clone().unwrap_or_default(),
                            search_score: score,
                        })
                    }
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            b.search_score
                .partial_cmp(&a.search_score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if let Some(l) = limit {
            hits.truncate(l);
        }
        Ok(hits)
    }
}

fn matches_dir(segments: &[String], dir: &[String]) -> bool {
    segments.len() > dir.len() && segments[..dir.len()] == *dir
}

fn escape_like(raw: &str) -> String {
    raw.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

fn is_unique_violation_on(err: &sqlx::Error, column: &str) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.is_unique_violation() && db_err.message().contains(column),
        _ => false,
    }
}
