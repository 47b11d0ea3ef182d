pub mod config;
pub mod http;
pub mod mock_data;
pub mod query;
pub mod session;
pub mod store;
pub mod update;
pub mod views;

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

pub use mock_data::MockStore;
pub use session::{CollegeSession, CommandOutcome, DataSource, Modal};
pub use store::{MachineStore, StoreError};

mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub fn get_service_version() -> String {
    // Git hash injected by a packaged build takes precedence
    if let Some(git_hash) = option_env!("LAUNDRY_GIT_HASH") {
        short_hash(git_hash)
    } else if let Some(git_hash) = built_info::GIT_COMMIT_HASH {
        // Fall back to built crate's git detection (for cargo builds)
        short_hash(git_hash)
    } else {
        built_info::PKG_VERSION.to_string()
    }
}

fn short_hash(hash: &str) -> String {
    hash.chars().take(8).collect()
}

pub struct AppState {
    pub store: Arc<dyn MachineStore>,
    pub mock: Arc<MockStore>,
    sessions: RwLock<HashMap<String, Arc<Mutex<CollegeSession>>>>,
}

impl AppState {
    pub fn new(store: Arc<dyn MachineStore>) -> Self {
        Self::with_mock(store, Arc::new(MockStore::new()))
    }

    pub fn with_mock(store: Arc<dyn MachineStore>, mock: Arc<MockStore>) -> Self {
        Self {
            store,
            mock,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Session for a college slug, created on first use.
    ///
    /// Each session sits behind its own mutex so requests for the same
    /// college are serialized while different colleges proceed in parallel.
    pub async fn session(&self, college: &str) -> Arc<Mutex<CollegeSession>> {
        if let Some(session) = self.sessions.read().await.get(college) {
            return session.clone();
        }

        let mut sessions = self.sessions.write().await;
        sessions
            .entry(college.to_string())
            .or_insert_with(|| {
                Arc::new(Mutex::new(CollegeSession::new(
                    college,
                    self.store.clone(),
                    self.mock.clone(),
                )))
            })
            .clone()
    }
}
