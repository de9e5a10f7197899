//! Units of work flowing through the transfer engine.

use serde::Serialize;

use crate::mapper::DestinationRef;
use crate::traits::ObjectDescriptor;

/// One object paired with its destination, consumed by exactly one worker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTask {
    pub source: ObjectDescriptor,
    pub destination: DestinationRef,
}

/// Result of one task
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TransferStatus {
    /// Transferred; `bytes` is what was written (0 for server-side copies)
    Success { bytes: u64 },
    /// Gave up on this object
    Failure { reason: String },
}

/// Outcome reported once per listed object
///
/// `destination` is `None` when the key could not be mapped at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferOutcome {
    pub source: ObjectDescriptor,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<DestinationRef>,
    #[serde(flatten)]
    pub status: TransferStatus,
}

impl TransferOutcome {
    pub fn success(task: TransferTask, bytes: u64) -> Self {
        Self {
            source: task.source,
            destination: Some(task.destination),
            status: TransferStatus::Success { bytes },
        }
    }

    pub fn failure(task: TransferTask, reason: impl Into<String>) -> Self {
        Self {
            source: task.source,
            destination: Some(task.destination),
            status: TransferStatus::Failure {
                reason: reason.into(),
            },
        }
    }

    /// Outcome for an object rejected before it reached a worker
    pub fn rejected(source: ObjectDescriptor, reason: impl Into<String>) -> Self {
        Self {
            source,
            destination: None,
            status: TransferStatus::Failure {
                reason: reason.into(),
            },
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.status, TransferStatus::Success { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn task() -> TransferTask {
        TransferTask {
            source: ObjectDescriptor::new("data/a.txt", 3),
            destination: DestinationRef::LocalFile {
                path: PathBuf::from("/out/a.txt"),
            },
        }
    }

    #[test]
    fn test_outcome_constructors() {
        assert!(TransferOutcome::success(task(), 3).is_success());
        assert!(!TransferOutcome::failure(task(), "boom").is_success());

        let rejected = TransferOutcome::rejected(ObjectDescriptor::new("data/../x", 1), "bad");
        assert!(!rejected.is_success());
        assert!(rejected.destination.is_none());
    }

    #[test]
    fn test_outcome_json_shape() {
        let json = serde_json::to_value(TransferOutcome::failure(task(), "NoSuchKey")).unwrap();
        assert_eq!(json["status"], "failure");
        assert_eq!(json["reason"], "NoSuchKey");
        assert_eq!(json["source"]["key"], "data/a.txt");
        assert_eq!(json["destination"]["type"], "local_file");
    }
}
