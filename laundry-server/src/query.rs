//! Read side: machine lists per college and single records by id.

use laundry_core::{sort_by_number, Machine, MachineKind, MachineSet};
use tracing::error;

use crate::store::{MachineStore, StoreError};

async fn list_kind(
    store: &dyn MachineStore,
    college: &str,
    kind: MachineKind,
) -> Result<Vec<Machine>, StoreError> {
    let mut machines = store.query(college, kind).await?;
    sort_by_number(&mut machines);
    Ok(machines)
}

/// Fetch washers, dryers and bins for a college, each sorted by number.
///
/// The three reads run concurrently. Any failure is logged and returned;
/// there is no retry.
pub async fn list_by_college(
    store: &dyn MachineStore,
    college: &str,
) -> Result<MachineSet, StoreError> {
    let result = tokio::try_join!(
        list_kind(store, college, MachineKind::Washer),
        list_kind(store, college, MachineKind::Dryer),
        list_kind(store, college, MachineKind::Bin),
    );
    match result {
        Ok((washers, dryers, bins)) => Ok(MachineSet::new(washers, dryers, bins)),
        Err(e) => {
            error!("Error querying machines for {}: {}", college, e);
            Err(e)
        }
    }
}

/// Fetch one machine by id. Missing documents are a `NotFound` error.
pub async fn get_by_id(store: &dyn MachineStore, id: &str) -> Result<Machine, StoreError> {
    match store.get(id).await {
        Ok(Some(machine)) => Ok(machine),
        Ok(None) => Err(StoreError::not_found(id)),
        Err(e) => {
            error!("Error getting machine {}: {}", id, e);
            Err(e)
        }
    }
}
