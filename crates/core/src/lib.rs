//! bt-core: Core library for the bt bulk transfer client
//!
//! This crate provides everything the `bt` CLI needs except the S3 SDK itself:
//! - Configuration and endpoint settings
//! - Source location parsing
//! - Prefix enumeration with pagination and retries
//! - Destination mapping with traversal checks
//! - The concurrent transfer engine and its result aggregation
//!
//! Storage access goes through the [`ObjectStore`] trait, so the engine can be
//! driven by the S3 adapter in `bt-s3` or by the in-memory store in tests.

pub mod aggregate;
pub mod config;
pub mod endpoint;
pub mod engine;
pub mod error;
pub mod lister;
pub mod mapper;
pub mod materialize;
#[cfg(any(test, feature = "test-util"))]
pub mod memory;
pub mod path;
pub mod retry;
pub mod task;
pub mod traits;

pub use aggregate::{
    FailureRecord, NoopObserver, StatsSnapshot, Summary, TransferObserver, TransferStats,
};
pub use config::{Config, ConfigManager};
pub use endpoint::{EndpointConfig, RetryConfig, TimeoutConfig};
pub use engine::{RunReport, TransferEngine, TransferOptions, TransferPlan};
pub use error::{Error, Result};
pub use lister::list_prefix;
pub use mapper::{DestinationRef, DestinationRoot, map_destination};
pub use path::RemotePath;
pub use task::{TransferOutcome, TransferStatus, TransferTask};
pub use traits::{ListOptions, ListPage, ObjectDescriptor, ObjectReader, ObjectStore};
