//! Locally held machine data used when the remote store is empty or unreachable.
//!
//! A `MockStore` is owned by whoever creates it (the application state, or a
//! test) and passed explicitly to callers. Its contents live only as long as
//! the object does.

use std::collections::HashMap;

use futures_util::future::try_join_all;
use laundry_core::{MachineKind, MachineSet, Status};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::store::{MachineStore, StoreError};

/// Per-college machine sets kept in process memory.
#[derive(Default)]
pub struct MockStore {
    sets: RwLock<HashMap<String, MachineSet>>,
}

impl MockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the college's local set, generating it on first use.
    ///
    /// The first call materializes ten washers, ten dryers and ten bins with
    /// deterministic ids and status 0. Later calls return the stored set,
    /// including any changes made through `update_local`.
    pub async fn generate(&self, college: &str) -> MachineSet {
        {
            let sets = self.sets.read().await;
            if let Some(set) = sets.get(college) {
                return set.clone();
            }
        }

        let mut sets = self.sets.write().await;
        sets.entry(college.to_string())
            .or_insert_with(|| {
                debug!("Generating local machine set for {}", college);
                MachineSet::mock(college)
            })
            .clone()
    }

    /// Set the status of one locally held machine.
    ///
    /// Does nothing if the college was never generated or the id is unknown.
    /// Returns whether a machine was changed.
    pub async fn update_local(
        &self,
        college: &str,
        kind: MachineKind,
        id: &str,
        status: Status,
    ) -> bool {
        let mut sets = self.sets.write().await;
        match sets.get_mut(college) {
            Some(set) => set.apply(kind, id, status),
            None => false,
        }
    }

    /// Replace a college's local set, e.g. with the last view read from the remote store.
    pub async fn adopt(&self, college: &str, set: MachineSet) {
        let mut sets = self.sets.write().await;
        sets.insert(college.to_string(), set);
    }

    pub async fn contains(&self, college: &str) -> bool {
        self.sets.read().await.contains_key(college)
    }

    /// Write the college's generated set to the remote store.
    ///
    /// Documents use their deterministic ids, so seeding twice overwrites
    /// instead of duplicating. Writes run concurrently; if one fails the
    /// others may already have landed and nothing is rolled back.
    pub async fn seed_remote(
        &self,
        store: &dyn MachineStore,
        college: &str,
    ) -> Result<(), StoreError> {
        let set = self.generate(college).await;

        info!("Seeding {} store for {}...", store.backend_name(), college);
        try_join_all(set.iter().map(|machine| store.put(machine))).await?;
        info!("Seeding complete for {}", college);

        Ok(())
    }
}
