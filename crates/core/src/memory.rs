//! In-memory object store for tests
//!
//! Keys are kept sorted per bucket so listings come back in the same
//! lexicographic order S3 uses. Faults can be injected to exercise the
//! engine's error paths without a network.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::Bound;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::path::RemotePath;
use crate::traits::{ListOptions, ListPage, ObjectDescriptor, ObjectReader, ObjectStore};

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Default)]
struct State {
    buckets: BTreeMap<String, BTreeMap<String, Vec<u8>>>,
    /// Listed but gone by the time a worker asks for them
    ghosts: HashSet<(String, String)>,
    listing_forbidden: bool,
    listing_failures: u32,
    get_failures: HashMap<String, u32>,
}

/// [`ObjectStore`] backed by a map, with fault injection
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<State>,
    page_size: usize,
    latency: Duration,
    list_calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State::default()),
            page_size: DEFAULT_PAGE_SIZE,
            latency: Duration::ZERO,
            list_calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// Objects returned per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Delay applied to every get and copy
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Store an object, replacing any existing body
    pub fn insert(&self, bucket: &str, key: &str, data: &[u8]) {
        let mut state = self.state();
        state.ghosts.remove(&(bucket.to_string(), key.to_string()));
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(key.to_string(), data.to_vec());
    }

    /// Current body of an object
    pub fn get(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        let state = self.state();
        if state.ghosts.contains(&(bucket.to_string(), key.to_string())) {
            return None;
        }
        state.buckets.get(bucket)?.get(key).cloned()
    }

    /// Keep listing `key` but answer reads and copies with not-found
    pub fn delete_after_listing(&self, bucket: &str, key: &str) {
        self.state()
            .ghosts
            .insert((bucket.to_string(), key.to_string()));
    }

    /// Refuse every listing with access denied
    pub fn forbid_listing(&self) {
        self.state().listing_forbidden = true;
    }

    /// Fail the next `count` listing calls with a network error
    pub fn fail_next_listings(&self, count: u32) {
        self.state().listing_failures = count;
    }

    /// Fail the next `count` reads of `key` with a network error
    pub fn fail_next_gets(&self, key: &str, count: u32) {
        self.state().get_failures.insert(key.to_string(), count);
    }

    /// Number of listing calls made, including failed ones
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    /// Highest number of gets and copies observed at the same time
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn read(&self, path: &RemotePath) -> Result<Vec<u8>> {
        let mut state = self.state();
        if let Some(remaining) = state.get_failures.get_mut(&path.key)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::Network(format!("connection reset reading {path}")));
        }
        if state.ghosts.contains(&(path.bucket.clone(), path.key.clone())) {
            return Err(Error::NotFound(format!("NoSuchKey: {path}")));
        }
        state
            .buckets
            .get(&path.bucket)
            .and_then(|objects| objects.get(&path.key))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("NoSuchKey: {path}")))
    }

    async fn simulate_request(&self) -> InFlight<'_> {
        let guard = InFlight::enter(self);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        guard
    }
}

/// Tracks one request in flight until dropped
struct InFlight<'a> {
    store: &'a MemoryStore,
}

impl<'a> InFlight<'a> {
    fn enter(store: &'a MemoryStore) -> Self {
        let now = store.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        store.max_in_flight.fetch_max(now, Ordering::SeqCst);
        Self { store }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn list_objects(&self, bucket: &str, options: ListOptions) -> Result<ListPage> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state();

        if state.listing_forbidden {
            return Err(Error::AccessDenied(format!("ListObjectsV2 on {bucket}")));
        }
        if state.listing_failures > 0 {
            state.listing_failures -= 1;
            return Err(Error::Network("connection reset listing objects".into()));
        }

        let objects = state
            .buckets
            .get(bucket)
            .ok_or_else(|| Error::NotFound(format!("NoSuchBucket: {bucket}")))?;

        let page_size = options
            .max_keys
            .and_then(|n| usize::try_from(n).ok())
            .filter(|n| *n > 0)
            .unwrap_or(self.page_size);
        let start = match &options.continuation_token {
            Some(token) => Bound::Excluded(token.clone()),
            None => Bound::Unbounded,
        };

        let mut matching = objects
            .range((start, Bound::Unbounded))
            .filter(|(key, _)| key.starts_with(&options.prefix))
            .map(|(key, data)| ObjectDescriptor::new(key.clone(), data.len() as u64));

        let page: Vec<ObjectDescriptor> = matching.by_ref().take(page_size).collect();
        let continuation_token = match (matching.next(), page.last()) {
            (Some(_), Some(last)) => Some(last.key.clone()),
            _ => None,
        };

        Ok(ListPage {
            objects: page,
            continuation_token,
        })
    }

    async fn get_object(&self, path: &RemotePath) -> Result<ObjectReader> {
        let _guard = self.simulate_request().await;
        let data = self.read(path)?;
        Ok(Box::new(std::io::Cursor::new(data)))
    }

    async fn copy_object(&self, src: &RemotePath, dst: &RemotePath) -> Result<()> {
        let _guard = self.simulate_request().await;
        let data = self.read(src)?;
        self.insert(&dst.bucket, &dst.key, &data);
        Ok(())
    }
}
