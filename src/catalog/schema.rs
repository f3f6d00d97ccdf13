//! `file_v0` DDL.
//!
//! Grounded on `other_examples/da7eb26d_bavela-object-store`'s
//! `services/storage_service.rs`, which opens its catalog pool and then
//! runs an idempotent `CREATE TABLE IF NOT EXISTS` migration inline rather
//! than via a separate migrations directory — appropriate here since the
//! catalog has exactly one table and the distilled spec names it and its
//! columns precisely (`SPEC_FULL.md` §3).

use sqlx::SqlitePool;

use crate::error::Result;

/// Versioned to allow a future `file_v1` migration without touching rows
/// already on disk; the distilled spec does not require this but naming the
/// table this way costs nothing and matches the pack's habit of version-
/// suffixed schema identifiers.
pub const TABLE_NAME: &str = "file_v0";

const CREATE_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS file_v0 (
    fullpath  TEXT PRIMARY KEY,
    entityid  TEXT NOT NULL,
    hash_md5  TEXT NOT NULL,
    mime_typ  TEXT NOT NULL,
    cont_len  INTEGER NOT NULL,
    last_mod  INTEGER NOT NULL,
    desc_raw  TEXT,
    desc_fts  TEXT,
    meta_js   TEXT
)
"#;

const CREATE_ENTITYID_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS file_v0_entityid_idx ON file_v0 (entityid)
"#;

/// Create the table and its unique index on `entityid` (distilled spec:
/// "entity IDs are never reused", enforced here at the schema level rather
/// than only by construction) if they do not already exist. Safe to call on
/// every `connect()`.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(CREATE_TABLE).execute(pool).await?;
    sqlx::query(CREATE_ENTITYID_INDEX).execute(pool).await?;
    Ok(())
}
