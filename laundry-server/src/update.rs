//! Write side: status changes against the remote store.

use laundry_core::{Status, StatusWrite};
use tracing::{debug, error};

use crate::store::{MachineStore, StoreError};

/// Write a new status for one machine. Errors are returned for the caller to handle.
pub async fn set_status(
    store: &dyn MachineStore,
    id: &str,
    status: Status,
) -> Result<(), StoreError> {
    store.set_status(id, status).await.map_err(|e| {
        error!("Failed to set status {} on {}: {}", status, id, e);
        e
    })?;
    debug!("Set status {} on {}", status, id);
    Ok(())
}

/// Apply a planned set of writes as one logical operation.
///
/// Single writes go straight through `set_status`; transfers use the
/// backend's transactional or compensating path.
pub async fn apply_writes(
    store: &dyn MachineStore,
    writes: &[StatusWrite],
) -> Result<(), StoreError> {
    match writes {
        [] => Ok(()),
        [single] => set_status(store, &single.id, single.to).await,
        _ => store.apply_status_writes(writes).await.map_err(|e| {
            error!("Failed to apply {} status writes: {}", writes.len(), e);
            e
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_utils::FlakyStore;
    use crate::store::InMemoryStore;
    use laundry_core::{Machine, MachineKind, MachineSet};

    async fn seed(store: &dyn MachineStore) {
        for machine in MachineSet::mock("baker").iter() {
            store.put(machine).await.unwrap();
        }
    }

    fn write(id: &str, kind: MachineKind, from: Status, to: Status) -> StatusWrite {
        StatusWrite {
            id: id.to_string(),
            kind,
            from,
            to,
        }
    }

    #[tokio::test]
    async fn test_set_status_changes_only_status() {
        let store = InMemoryStore::new();
        seed(&store).await;
        set_status(&store, "mock-baker-washer-2", Status::BROKEN)
            .await
            .unwrap();
        let machine = store.get("mock-baker-washer-2").await.unwrap().unwrap();
        assert_eq!(
            machine,
            Machine {
                status: Status::BROKEN,
                ..Machine::mock("baker", MachineKind::Washer, 2)
            }
        );
    }

    #[tokio::test]
    async fn test_set_status_missing_propagates() {
        let store = InMemoryStore::new();
        assert!(set_status(&store, "nope", Status::IN_USE)
            .await
            .unwrap_err()
            .is_not_found());
    }

    #[tokio::test]
    async fn test_transfer_compensates_first_write() {
        let store = FlakyStore::new();
        seed(&store).await;
        store
            .inner
            .set_status("mock-baker-washer-3", Status::IN_USE)
            .await
            .unwrap();
        store.fail_writes_for("mock-baker-dryer-5");

        let writes = vec![
            write(
                "mock-baker-washer-3",
                MachineKind::Washer,
                Status::IN_USE,
                Status::AVAILABLE,
            ),
            write(
                "mock-baker-dryer-5",
                MachineKind::Dryer,
                Status::AVAILABLE,
                Status::IN_USE,
            ),
        ];
        assert!(apply_writes(&store, &writes).await.is_err());

        let washer = store.get("mock-baker-washer-3").await.unwrap().unwrap();
        let dryer = store.get("mock-baker-dryer-5").await.unwrap().unwrap();
        assert_eq!(washer.status, Status::IN_USE);
        assert_eq!(dryer.status, Status::AVAILABLE);
        // washer -> 0, then compensation washer -> 1
        assert_eq!(store.status_writes(), 2);
    }

    #[tokio::test]
    async fn test_empty_plan_is_noop() {
        let store = FlakyStore::new();
        apply_writes(&store, &[]).await.unwrap();
        assert_eq!(store.status_writes(), 0);
    }
}
