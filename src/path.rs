//! File path parsing.
//!
//! Ported from the distilled spec's `FilePath` data model (`SPEC_FULL.md`
//! §3). Parsing is pure: no filesystem access, no normalization beyond
//! splitting on `/`.

use crate::error::{Error, Result};

/// Maximum accepted length of a `fullpath`, in bytes.
pub const MAX_PATH_BYTES: usize = 1024;

/// A validated, pre-split file path.
///
/// `segments` is never empty: the root path `""` parses to a single empty
/// segment, matching the distilled spec's "fullpath length 0 accepted"
/// boundary behavior and invariant 3 (`|path_seg| >= 1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilePath {
    fullpath: String,
    segments: Vec<String>,
}

impl FilePath {
    /// Parse a caller-supplied path string.
    ///
    /// Fails with `Error::InvalidPath` if the string exceeds
    /// `MAX_PATH_BYTES` bytes. UTF-8 validity is guaranteed by the `&str`
    /// input type; malformed UTF-8 is rejected upstream by the caller's
    /// own string conversion, per the distilled spec's "out of scope"
    /// list.
    pub fn parse(fullpath: &str) -> Result<Self> {
        if fullpath.len() > MAX_PATH_BYTES {
            return Err(Error::InvalidPath(format!(
                "path exceeds {MAX_PATH_BYTES} bytes: {} bytes",
                fullpath.len()
            )));
        }
        let segments: Vec<String> = fullpath.split('/').map(|s| s.to_string()).collect();
        Ok(Self {
            fullpath: fullpath.to_string(),
            segments,
        })
    }

    pub fn fullpath(&self) -> &str {
        &self.fullpath
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// All segments but the last, re-joined with `/`.
    pub fn dirname(&self) -> String {
        if self.segments.len() <= 1 {
            String::new()
        } else {
            self.segments[..self.segments.len() - 1].join("/")
        }
    }

    /// The final path segment.
    pub fn basename(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or("")
    }

    /// `basename` minus its final dot-extension.
    ///
    /// A dot-prefixed name with no further dot (e.g. `.bashrc`) has no
    /// extension: the whole name is the filename.
    pub fn filename(&self) -> &str {
        let basename = self.basename();
        match last_dot_index(basename) {
            Some(idx) => &basename[..idx],
            None => basename,
        }
    }

    /// The final dot-extension of `basename`, leading dot included, or
    /// empty if there is none.
    pub fn extname(&self) -> &str {
        let basename = self.basename();
        match last_dot_index(basename) {
            Some(idx) => &basename[idx..],
            None => "",
        }
    }

    /// Split segments from a directory path string (used by
    /// `exists`/`list`/`search` callers that already have a `Vec<String>`
    /// of segments rather than a joined path).
    pub fn segments_for_dir(dir: &[String]) -> Vec<String> {
        dir.to_vec()
    }
}

/// Index of the last `.` in `basename` that does not make the whole name
/// a dot-prefixed extensionless name (`.bashrc` has no dot to split on;
/// `archive.tar.gz` splits at the last dot).
fn last_dot_index(basename: &str) -> Option<usize> {
    let dot = basename.rfind('.')?;
    if dot == 0 {
        None
    } else {
        Some(dot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_segments_on_slash() {
        let p = FilePath::parse("a/b/c.txt").unwrap();
        assert_eq!(p.segments(), &["a", "b", "c.txt"]);
        assert_eq!(p.dirname(), "a/b");
        assert_eq!(p.basename(), "c.txt");
        assert_eq!(p.filename(), "c");
        assert_eq!(p.extname(), ".txt");
    }

    #[test]
    fn root_path_is_one_empty_segment() {
        let p = FilePath::parse("").unwrap();
        assert_eq!(p.segments(), &[""]);
        assert_eq!(p.dirname(), "");
        assert_eq!(p.basename(), "");
    }

    #[test]
    fn dot_prefixed_name_has_no_extension() {
        let p = FilePath::parse(".bashrc").unwrap();
        assert_eq!(p.filename(), ".bashrc");
        assert_eq!(p.extname(), "");
    }

    #[test]
    fn multi_dot_extension_splits_at_last_dot() {
        let p = FilePath::parse("archive.tar.gz").unwrap();
        assert_eq!(p.filename(), "archive.tar");
        assert_eq!(p.extname(), ".gz");
    }

    #[test]
    fn rejects_oversize_path() {
        let long = "a".repeat(MAX_PATH_BYTES + 1);
        assert!(matches!(
            FilePath::parse(&long),
            Err(Error::InvalidPath(_))
        ));
    }

    #[test]
    fn accepts_exact_limit() {
        let ok = "a".repeat(MAX_PATH_BYTES);
        assert!(FilePath::parse(&ok).is_ok());
    }

    #[test]
    fn fullpath_roundtrips() {
        for s in ["file.txt", "a/b/c", "", "no-ext", ".hidden"] {
            let p = FilePath::parse(s).unwrap();
            assert_eq!(p.fullpath(), s);
        }
    }
}
