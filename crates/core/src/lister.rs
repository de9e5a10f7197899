//! Prefix enumeration with pagination support.

use std::sync::Arc;

use async_stream::try_stream;
use futures::Stream;
use tracing::debug;

use crate::endpoint::RetryConfig;
use crate::error::{Error, Result};
use crate::path::RemotePath;
use crate::retry::with_retry;
use crate::traits::{ListOptions, ObjectDescriptor, ObjectStore};

/// List every object under `source`, following continuation tokens.
///
/// Each page request is retried on transient errors according to `retry`;
/// once retries are exhausted the error ends the stream. The stream fails with
/// [`Error::NotFound`] after the last page if nothing was yielded.
///
/// The marker object whose key equals the prefix itself is skipped: it stands
/// for the root being transferred, not an entry under it.
///
/// # Example
///
/// ```ignore
/// use futures::{pin_mut, StreamExt};
///
/// let stream = list_prefix(store, RemotePath::new("bucket", "data/"), RetryConfig::default());
/// pin_mut!(stream);
///
/// while let Some(obj) = stream.next().await {
///     let obj = obj?;
///     println!("Found: {}", obj.key);
/// }
/// ```
pub fn list_prefix(
    store: Arc<dyn ObjectStore>,
    source: RemotePath,
    retry: RetryConfig,
) -> impl Stream<Item = Result<ObjectDescriptor>> + Send + 'static {
    try_stream! {
        let mut continuation_token: Option<String> = None;
        let mut found = 0u64;
        let mut pages = 0u64;

        loop {
            let options = ListOptions {
                prefix: source.key.clone(),
                continuation_token: continuation_token.take(),
                max_keys: None,
            };

            let page = with_retry(&retry, "list_objects", || {
                store.list_objects(&source.bucket, options.clone())
            })
            .await?;
            pages += 1;

            debug!(
                bucket = %source.bucket,
                prefix = %source.key,
                page = pages,
                objects = page.objects.len(),
                "Listed page"
            );

            for object in page.objects {
                if object.key.is_empty() || object.key == source.key {
                    continue;
                }
                found += 1;
                yield object;
            }

            match page.continuation_token {
                Some(token) => continuation_token = Some(token),
                None => break,
            }
        }

        if found == 0 {
            Err::<(), _>(Error::NotFound(format!("No objects found in {source}")))?;
        }
    }
}
