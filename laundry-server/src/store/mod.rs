//! Document store abstraction for machine records.
//!
//! This module defines the `MachineStore` trait that abstracts the remote
//! document store holding the `machines` collection. Implementations
//! provide different backends (in-memory, SQLite, Firestore).

mod firestore;
mod memory;
mod sqlite;

#[cfg(test)]
pub(crate) mod test_utils;

pub use firestore::{FirestoreConfig, FirestoreStore};
pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;

use std::fmt;

use async_trait::async_trait;
use laundry_core::{Machine, MachineKind, Status, StatusWrite};
use tracing::{error, warn};

/// Name of the collection holding machine documents.
pub const MACHINES_COLLECTION: &str = "machines";

/// Errors raised by a store backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend failed to perform an operation (network, permission, I/O).
    Storage { operation: String, message: String },
    /// A stored document could not be decoded.
    Corruption { what: String },
    /// The addressed document does not exist.
    NotFound { id: String },
}

impl StoreError {
    pub fn storage(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Storage {
            operation: operation.into(),
            message: message.into(),
        }
    }

    pub fn corruption(what: impl Into<String>) -> Self {
        Self::Corruption { what: what.into() }
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound { id: id.into() }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage { operation, message } => {
                write!(f, "store operation '{}' failed: {}", operation, message)
            }
            Self::Corruption { what } => write!(f, "corrupt stored data: {}", what),
            Self::NotFound { id } => write!(f, "document not found: {}", id),
        }
    }
}

impl std::error::Error for StoreError {}

/// Store trait for machine documents.
///
/// The store is an opaque external collaborator: documents are keyed by id
/// and carry `type`, `number`, `status` and `college`. No ordering is
/// guaranteed on query results.
#[async_trait]
pub trait MachineStore: Send + Sync {
    /// Short name of the backend, used in logs and `/health`.
    fn backend_name(&self) -> &'static str;

    /// All machines of one kind in a college, in no particular order.
    async fn query(&self, college: &str, kind: MachineKind) -> Result<Vec<Machine>, StoreError>;

    /// Point read. `Ok(None)` when the document does not exist.
    async fn get(&self, id: &str) -> Result<Option<Machine>, StoreError>;

    /// Write a whole document under its id (upsert).
    async fn put(&self, machine: &Machine) -> Result<(), StoreError>;

    /// Update only the status field. Fails with `NotFound` if the document is absent.
    async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError>;

    /// Apply several status writes as one logical operation.
    ///
    /// The default runs the writes in order and, if one fails, restores the
    /// machines already written to their previous status before returning
    /// the error. Backends with native transactions override this.
    async fn apply_status_writes(&self, writes: &[StatusWrite]) -> Result<(), StoreError> {
        let mut applied: Vec<&StatusWrite> = Vec::with_capacity(writes.len());
        for write in writes {
            match self.set_status(&write.id, write.to).await {
                Ok(()) => applied.push(write),
                Err(e) => {
                    if !applied.is_empty() {
                        warn!(
                            "Status write for {} failed after {} applied write(s), compensating: {}",
                            write.id,
                            applied.len(),
                            e
                        );
                    }
                    for done in applied.iter().rev() {
                        if let Err(undo) = self.set_status(&done.id, done.from).await {
                            error!(
                                "Failed to restore {} to status {}: {}. Store left inconsistent.",
                                done.id, done.from, undo
                            );
                        }
                    }
                    return Err(e);
                }
            }
        }
        Ok(())
    }
}
