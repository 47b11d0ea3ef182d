//! Store doubles for exercising fallback and compensation paths.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use laundry_core::{Machine, MachineKind, Status};

use super::{InMemoryStore, MachineStore, StoreError};

/// Wraps an `InMemoryStore` and fails selected operations on demand.
///
/// Uses the trait's default `apply_status_writes`, so transfers go through
/// the sequential write-and-compensate path.
#[derive(Default)]
pub struct FlakyStore {
    pub inner: InMemoryStore,
    fail_reads: AtomicBool,
    fail_puts: AtomicBool,
    failing_ids: Mutex<HashSet<String>>,
    status_writes: AtomicUsize,
}

impl FlakyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    /// Make every `set_status` for this id fail.
    pub fn fail_writes_for(&self, id: &str) {
        self.failing_ids.lock().unwrap().insert(id.to_string());
    }

    /// Number of successful `set_status` calls so far.
    pub fn status_writes(&self) -> usize {
        self.status_writes.load(Ordering::SeqCst)
    }

    fn unavailable(operation: &str) -> StoreError {
        StoreError::storage(operation, "store unavailable")
    }
}

#[async_trait]
impl MachineStore for FlakyStore {
    fn backend_name(&self) -> &'static str {
        "flaky"
    }

    async fn query(&self, college: &str, kind: MachineKind) -> Result<Vec<Machine>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("query"));
        }
        self.inner.query(college, kind).await
    }

    async fn get(&self, id: &str) -> Result<Option<Machine>, StoreError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Self::unavailable("get"));
        }
        self.inner.get(id).await
    }

    async fn put(&self, machine: &Machine) -> Result<(), StoreError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(Self::unavailable("put"));
        }
        self.inner.put(machine).await
    }

    async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        let failing = self.failing_ids.lock().unwrap().contains(id);
        if failing {
            return Err(Self::unavailable("set_status"));
        }
        self.inner.set_status(id, status).await?;
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// A store that rejects every operation.
pub struct UnreachableStore;

#[async_trait]
impl MachineStore for UnreachableStore {
    fn backend_name(&self) -> &'static str {
        "unreachable"
    }

    async fn query(&self, _college: &str, _kind: MachineKind) -> Result<Vec<Machine>, StoreError> {
        Err(StoreError::storage("query", "connection refused"))
    }

    async fn get(&self, _id: &str) -> Result<Option<Machine>, StoreError> {
        Err(StoreError::storage("get", "connection refused"))
    }

    async fn put(&self, _machine: &Machine) -> Result<(), StoreError> {
        Err(StoreError::storage("put", "connection refused"))
    }

    async fn set_status(&self, _id: &str, _status: Status) -> Result<(), StoreError> {
        Err(StoreError::storage("set_status", "connection refused"))
    }
}
