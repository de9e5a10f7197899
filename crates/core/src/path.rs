//! Path parsing and resolution
//!
//! Handles parsing of remote locations in the format `s3://bucket[/prefix]`.
//! The scheme is optional, so `bucket/prefix` is accepted as well.
//! Local destinations are plain filesystem paths and are not parsed here.

use crate::error::{Error, Result};

/// URL scheme accepted for remote locations
pub const SCHEME: &str = "s3://";

/// A parsed remote path pointing to an S3 location
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePath {
    /// Bucket name
    pub bucket: String,
    /// Object key or key prefix (empty for bucket root)
    pub key: String,
}

impl RemotePath {
    /// Create a new RemotePath
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Parse a remote location used as a transfer root.
    ///
    /// A non-empty key is treated as a directory-style prefix, so a trailing
    /// `/` is appended when missing.
    pub fn parse_prefix(location: &str) -> Result<Self> {
        let mut path = Self::parse(location)?;
        if !path.key.is_empty() && !path.key.ends_with('/') {
            path.key.push('/');
        }
        Ok(path)
    }

    /// Parse a remote location, keeping the key exactly as written
    pub fn parse(location: &str) -> Result<Self> {
        if location.is_empty() {
            return Err(Error::InvalidPath("Path cannot be empty".into()));
        }

        let rest = match location.strip_prefix(SCHEME) {
            Some(rest) => rest,
            None if location.contains("://") => {
                return Err(Error::InvalidPath(format!(
                    "Unsupported scheme in '{location}'. Use format: s3://bucket[/prefix]"
                )));
            }
            None => location,
        };

        let (bucket, key) = match rest.split_once('/') {
            Some((bucket, key)) => (bucket, key),
            None => (rest, ""),
        };

        if !is_valid_bucket_name(bucket) {
            return Err(Error::InvalidPath(format!(
                "Invalid bucket name '{bucket}' in '{location}'"
            )));
        }

        Ok(Self::new(bucket, key))
    }

    /// Whether either prefix contains the other in the same bucket.
    ///
    /// Copying between overlapping prefixes would list objects the run itself
    /// writes.
    pub fn overlaps(&self, other: &RemotePath) -> bool {
        self.bucket == other.bucket
            && (self.key.starts_with(&other.key) || other.key.starts_with(&self.key))
    }

    /// Get the full location as a string (s3://bucket/key)
    pub fn to_url(&self) -> String {
        format!("{SCHEME}{}/{}", self.bucket, self.key)
    }
}

impl std::fmt::Display for RemotePath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_url())
    }
}

/// Check bucket names against the provider's naming rules.
///
/// Accepts lowercase letters, digits, dots, hyphens and underscores (the last
/// for legacy and S3-compatible backends), 3 to 63 characters, alphanumeric at
/// both ends.
fn is_valid_bucket_name(name: &str) -> bool {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '.' | '-' | '_'));
    let valid_ends = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());

    (3..=63).contains(&name.len()) && valid_chars && valid_ends
}
