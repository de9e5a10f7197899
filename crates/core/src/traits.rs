//! ObjectStore trait definition
//!
//! This trait defines the capability set the transfer engine needs from a
//! storage provider. It allows the engine to be decoupled from the specific
//! S3 SDK implementation and tested against an in-memory backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncRead;

use crate::error::Result;
use crate::path::RemotePath;

/// One remote object discovered under a source prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectDescriptor {
    /// Full object key
    pub key: String,

    /// Size in bytes, when the listing reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
}

impl ObjectDescriptor {
    /// Create a descriptor with a known size
    pub fn new(key: impl Into<String>, size: u64) -> Self {
        Self {
            key: key.into(),
            size: Some(size),
        }
    }

    /// Whether the key is a directory marker (ends with `/`)
    pub fn is_dir_marker(&self) -> bool {
        self.key.ends_with('/')
    }
}

/// One page of a list operation
#[derive(Debug, Clone, Default)]
pub struct ListPage {
    /// Objects on this page
    pub objects: Vec<ObjectDescriptor>,

    /// Token for the next page, `None` on the last page
    pub continuation_token: Option<String>,
}

/// Options for list operations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Prefix to filter by
    pub prefix: String,

    /// Continuation token for pagination
    pub continuation_token: Option<String>,

    /// Maximum number of keys to return per request
    pub max_keys: Option<i32>,
}

/// Streaming body of a retrieved object
pub type ObjectReader = Box<dyn AsyncRead + Send + Unpin>;

/// Trait for S3-compatible storage operations
///
/// This trait is implemented by the S3 adapter and can be mocked for testing.
/// Credentials are the implementor's concern; callers never see them.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// List one page of objects under `options.prefix`, recursively
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListPage>;

    /// Open a streaming reader over an object's body
    async fn get_object(&self, path: &RemotePath) -> Result<ObjectReader>;

    /// Server-side copy of one object
    async fn copy_object(&self, src: &RemotePath, dst: &RemotePath) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_descriptor_new() {
        let obj = ObjectDescriptor::new("data/a.txt", 1024);
        assert_eq!(obj.key, "data/a.txt");
        assert_eq!(obj.size, Some(1024));
        assert!(!obj.is_dir_marker());
    }

    #[test]
    fn test_object_descriptor_dir_marker() {
        let obj = ObjectDescriptor::new("data/sub/", 0);
        assert!(obj.is_dir_marker());
    }

    #[test]
    fn test_object_descriptor_serialization_skips_missing_size() {
        let obj = ObjectDescriptor {
            key: "data/a.txt".into(),
            size: None,
        };
        let json = serde_json::to_string(&obj).unwrap();
        assert_eq!(json, r#"{"key":"data/a.txt"}"#);
    }
}
