//! In-memory implementation of `MachineStore`.
//!
//! All documents are held in memory and lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use laundry_core::{Machine, MachineKind, Status, StatusWrite};
use tokio::sync::RwLock;

use super::{MachineStore, StoreError};

/// In-memory machine store.
///
/// Stores documents in a `HashMap` keyed by id, protected by a `RwLock`.
pub struct InMemoryStore {
    documents: RwLock<HashMap<String, Machine>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(HashMap::new()),
        }
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MachineStore for InMemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn query(&self, college: &str, kind: MachineKind) -> Result<Vec<Machine>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents
            .values()
            .filter(|m| m.college == college && m.kind == kind)
            .cloned()
            .collect())
    }

    async fn get(&self, id: &str) -> Result<Option<Machine>, StoreError> {
        let documents = self.documents.read().await;
        Ok(documents.get(id).cloned())
    }

    async fn put(&self, machine: &Machine) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        documents.insert(machine.id.clone(), machine.clone());
        Ok(())
    }

    async fn set_status(&self, id: &str, status: Status) -> Result<(), StoreError> {
        let mut documents = self.documents.write().await;
        match documents.get_mut(id) {
            Some(machine) => {
                machine.status = status;
                Ok(())
            }
            None => Err(StoreError::not_found(id)),
        }
    }

    async fn apply_status_writes(&self, writes: &[StatusWrite]) -> Result<(), StoreError> {
        // Check every target under the write lock before touching any of them.
        let mut documents = self.documents.write().await;
        if let Some(missing) = writes.iter().find(|w| !documents.contains_key(&w.id)) {
            return Err(StoreError::not_found(&missing.id));
        }
        for write in writes {
            if let Some(machine) = documents.get_mut(&write.id) {
                machine.status = write.to;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use laundry_core::MachineSet;

    async fn seeded(college: &str) -> InMemoryStore {
        let store = InMemoryStore::new();
        for machine in MachineSet::mock(college).iter() {
            store.put(machine).await.unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_get_returns_none_for_missing() {
        let store = InMemoryStore::new();
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_query_filters_by_college_and_kind() {
        let store = seeded("baker").await;
        for machine in MachineSet::mock("jones").iter() {
            store.put(machine).await.unwrap();
        }

        let dryers = store.query("baker", MachineKind::Dryer).await.unwrap();
        assert_eq!(dryers.len(), 10);
        assert!(dryers
            .iter()
            .all(|m| m.college == "baker" && m.kind == MachineKind::Dryer));
    }

    #[tokio::test]
    async fn test_put_is_upsert() {
        let store = seeded("baker").await;
        for machine in MachineSet::mock("baker").iter() {
            store.put(machine).await.unwrap();
        }
        assert_eq!(store.len().await, 30);
    }

    #[tokio::test]
    async fn test_set_status_missing_is_not_found() {
        let store = InMemoryStore::new();
        let err = store.set_status("nope", Status::IN_USE).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_apply_status_writes_is_all_or_nothing() {
        let store = seeded("baker").await;
        let writes = vec![
            StatusWrite {
                id: "mock-baker-washer-1".to_string(),
                kind: MachineKind::Washer,
                from: Status::AVAILABLE,
                to: Status::IN_USE,
            },
            StatusWrite {
                id: "missing".to_string(),
                kind: MachineKind::Dryer,
                from: Status::AVAILABLE,
                to: Status::IN_USE,
            },
        ];
        assert!(store.apply_status_writes(&writes).await.is_err());
        let washer = store.get("mock-baker-washer-1").await.unwrap().unwrap();
        assert_eq!(washer.status, Status::AVAILABLE);
    }
}
