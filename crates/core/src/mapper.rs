//! Destination mapping
//!
//! Converts a listed object key into its destination, preserving the key's
//! structure relative to the source prefix.

use std::path::{Component, Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::path::RemotePath;

/// Maximum object key length accepted by S3, in UTF-8 bytes
pub const MAX_KEY_BYTES: usize = 1024;

/// Root that relative keys are joined onto
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationRoot {
    /// Local directory (download mode)
    Local(PathBuf),
    /// Bucket and key prefix (copy mode)
    Remote(RemotePath),
}

/// Where one object ends up
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DestinationRef {
    /// Local file path
    LocalFile { path: PathBuf },
    /// Object in a destination bucket
    RemoteObject { bucket: String, key: String },
}

impl std::fmt::Display for DestinationRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DestinationRef::LocalFile { path } => write!(f, "{}", path.display()),
            DestinationRef::RemoteObject { bucket, key } => write!(f, "s3://{bucket}/{key}"),
        }
    }
}

/// Map `key` listed under `source_prefix` onto `root`.
///
/// Fails with [`Error::InvalidKey`] when the key is outside the prefix, when
/// its relative part would escape a local root, or when the resulting remote
/// key breaks provider limits.
pub fn map_destination(source_prefix: &str, key: &str, root: &DestinationRoot) -> Result<DestinationRef> {
    let relative = key.strip_prefix(source_prefix).ok_or_else(|| {
        Error::InvalidKey(format!("'{key}' is not under prefix '{source_prefix}'"))
    })?;

    match root {
        DestinationRoot::Local(dir) => {
            let path = dir.join(local_relative_path(key, relative)?);
            Ok(DestinationRef::LocalFile { path })
        }
        DestinationRoot::Remote(prefix) => {
            let dest_key = format!("{}{relative}", prefix.key);
            if dest_key.is_empty() {
                return Err(Error::InvalidKey(format!(
                    "'{key}' maps to an empty destination key"
                )));
            }
            if dest_key.len() > MAX_KEY_BYTES {
                return Err(Error::InvalidKey(format!(
                    "destination key for '{key}' is {} bytes, limit is {MAX_KEY_BYTES}",
                    dest_key.len()
                )));
            }
            Ok(DestinationRef::RemoteObject {
                bucket: prefix.bucket.clone(),
                key: dest_key,
            })
        }
    }
}

/// Turn the `/`-separated relative part of a key into a relative local path.
///
/// Backslashes count as separators too, so a key cannot smuggle `..\` past
/// the check on platforms that honor them.
fn local_relative_path(key: &str, relative: &str) -> Result<PathBuf> {
    let reject = |why: &str| Error::InvalidKey(format!("'{key}' {why}"));

    if relative.contains('\0') {
        return Err(reject("contains a NUL byte"));
    }
    if relative.starts_with('/') || relative.starts_with('\\') {
        return Err(reject("has an absolute relative path"));
    }

    let mut out = PathBuf::new();
    for segment in relative.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(reject("escapes the destination directory")),
            _ => {}
        }

        // Each segment must be a single plain component on this platform,
        // e.g. no `C:` drive prefix on Windows.
        let mut components = Path::new(segment).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(part)), None) => out.push(part),
            _ => return Err(reject("contains a path segment that is not a plain name")),
        }
    }

    // Only a directory marker may resolve to the root itself.
    if out.as_os_str().is_empty() && !key.ends_with('/') {
        return Err(reject("does not name a file under the destination directory"));
    }

    Ok(out)
}
