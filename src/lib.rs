//! managed-store — a managed object-store abstraction over a relational
//! catalog and a content-addressed blob directory.
//!
//! An S3-like bucket of path-addressed objects, each with opaque byte
//! content plus rich side-metadata (MIME type, MD5 checksum, size,
//! last-modified timestamp, an optional description, and an opaque JSON
//! metadata blob). The crate's core is the catalog-and-entity
//! coordination layer: the algorithms and invariants that keep a
//! relational catalog of file metadata consistent with a content-addressed
//! blob store, under a reader/writer mutex discipline that serializes
//! writers and groups concurrent readers.
//!
//! # Architecture
//!
//! Three tightly-coupled subsystems:
//!
//! - [`mutex`] — a per-instance FIFO queue of reader-groups and
//!   single-writer slots, explicitly acquired at the top of every public
//!   [`manager::Manager`] method.
//! - [`catalog`] — a single SQLite table (`file_v0`) providing
//!   transactional metadata CRUD, directory prefix queries, and BM25
//!   full-text search over descriptions.
//! - [`blob`] plus [`streams`] — a flat directory of uuid-named blobs and
//!   the chunked writers that incrementally hash and size-count content
//!   on its way into that directory.
//!
//! [`manager::Manager`] is the top-level façade: write/read/move/copy/
//! overwrite/remove/exists/stat/search/list, each orchestrating blob and
//! catalog operations with compensating cleanup on every failure edge.

#![deny(clippy::all)]
#![allow(dead_code)]

pub mod blob;
pub mod bucket;
pub mod catalog;
pub mod config;
pub mod error;
pub mod hash;
pub mod logger;
pub mod manager;
pub mod mime;
pub mod mutex;
pub mod path;
pub mod streams;

pub use bucket::BucketName;
pub use config::ManagerOptions;
pub use error::{Error, Result};
pub use manager::{File, FileIdent, ListOpts, Manager, OverwriteOpts, SearchOpts, WriteOpts};
pub use path::FilePath;
pub use streams::{OverwritableFileStream, StreamMetadata, WritableFileStream};
