//! Bucket name validation.
//!
//! Out of scope per the distilled spec ("bucket-name syntax validation" is
//! an external collaborator) — this is deliberately a thin, obviously-correct
//! rule, not a showcase. Grounded on the non-empty/ASCII-lowercase subset of
//! `bavela-object-store`'s bucket-name check (other_examples), trimmed to
//! the minimum the crate needs to behave: a key identifying one catalog +
//! blob-store pair on the filesystem.

use crate::error::{Error, Result};

const MAX_BUCKET_NAME_LEN: usize = 63;

/// A validated bucket name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketName(String);

impl BucketName {
    pub fn parse(name: &str) -> Result<Self> {
        if name.is_empty() || name.len() > MAX_BUCKET_NAME_LEN {
            return Err(Error::InvalidBucketName(name.to_string()));
        }
        let valid = name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
        if !valid || name.starts_with(['-', '.']) || name.ends_with(['-', '.']) {
            return Err(Error::InvalidBucketName(name.to_string()));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BucketName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_simple_name() {
        assert!(BucketName::parse("my-bucket.01").is_ok());
    }

    #[test]
    fn rejects_empty() {
        assert!(BucketName::parse("").is_err());
    }

    #[test]
    fn rejects_uppercase() {
        assert!(BucketName::parse("MyBucket").is_err());
    }

    #[test]
    fn rejects_leading_dash() {
        assert!(BucketName::parse("-bucket").is_err());
    }

    #[test]
    fn roundtrips_through_as_str() {
        let s = "bucket-name";
        assert_eq!(BucketName::parse(s).unwrap().as_str(), s);
    }
}
