//! Per-college view state and the commands that mutate it.
//!
//! A `CollegeSession` holds what one college page shows: the three machine
//! lists and where they came from. Loading falls back to locally generated
//! data when the remote store is empty or unreachable; commands are planned
//! against the view, written, and only then applied to the view.
//!
//! The server renders after a load has finished, so a page never shows a
//! loading state.

use std::sync::Arc;

use laundry_core::{
    apply_writes, modal_action, move_targets, offered_commands, plan, Command, CommandError,
    CommandKind, Machine, MachineSet, ModalAction, StatusWrite,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::mock_data::MockStore;
use crate::query;
use crate::store::{MachineStore, StoreError};
use crate::update;

/// Where the session's view currently comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Live data from the remote store.
    Remote,
    /// Locally held data; the remote store is bypassed until the next load.
    Local,
}

/// Result of a command that was accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CommandOutcome {
    /// Written to the remote store.
    Committed { writes: Vec<StatusWrite> },
    /// Applied to local data because the session is already degraded.
    Local { writes: Vec<StatusWrite> },
    /// The remote write failed; partial writes were undone and the session
    /// switched to local data with the command applied there.
    Degraded {
        writes: Vec<StatusWrite>,
        error: String,
    },
}

impl CommandOutcome {
    pub fn writes(&self) -> &[StatusWrite] {
        match self {
            Self::Committed { writes } | Self::Local { writes } | Self::Degraded { writes, .. } => {
                writes
            }
        }
    }
}

/// Modal content derived for one machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Modal {
    pub machine: Machine,
    pub action: ModalAction,
    pub commands: Vec<CommandKind>,
    /// Machines a load can be moved into; empty when no move is possible.
    pub targets: Vec<Machine>,
}

/// View state for one college page.
pub struct CollegeSession {
    college: String,
    remote: Arc<dyn MachineStore>,
    mock: Arc<MockStore>,
    view: MachineSet,
    source: DataSource,
    /// A command was applied to local data and not yet rendered.
    local_pending: bool,
}

impl CollegeSession {
    pub fn new(college: impl Into<String>, remote: Arc<dyn MachineStore>, mock: Arc<MockStore>) -> Self {
        Self {
            college: college.into(),
            remote,
            mock,
            view: MachineSet::default(),
            source: DataSource::Remote,
            local_pending: false,
        }
    }

    pub fn college(&self) -> &str {
        &self.college
    }

    pub fn view(&self) -> &MachineSet {
        &self.view
    }

    pub fn source(&self) -> DataSource {
        self.source
    }

    async fn fetch_or_seed(&self) -> Result<MachineSet, StoreError> {
        let set = query::list_by_college(self.remote.as_ref(), &self.college).await?;
        if !set.is_empty() {
            return Ok(set);
        }

        info!("No machines found for {}, seeding...", self.college);
        self.mock
            .seed_remote(self.remote.as_ref(), &self.college)
            .await?;
        query::list_by_college(self.remote.as_ref(), &self.college).await
    }

    /// Load (or reload) the view.
    ///
    /// Reads from the remote store, seeding it first if the college has no
    /// machines at all. If any step fails the view comes from the mock store
    /// and the session stays local until the next load.
    pub async fn load(&mut self) -> DataSource {
        self.local_pending = false;

        match self.fetch_or_seed().await {
            Ok(set) => {
                self.view = set;
                self.source = DataSource::Remote;
            }
            Err(e) => {
                warn!(
                    "Falling back to local machine data for {}: {}",
                    self.college, e
                );
                self.view = self.mock.generate(&self.college).await;
                self.source = DataSource::Local;
            }
        }

        self.source
    }

    /// Prepare the view for rendering the page.
    ///
    /// Right after a command was applied to local data, the view is kept as
    /// is so the change shows up; the remote store is retried on the render
    /// after that. Otherwise this is a full `load`.
    pub async fn reload(&mut self) -> DataSource {
        if self.local_pending && !self.view.is_empty() {
            self.local_pending = false;
            return self.source;
        }
        self.load().await
    }

    /// Modal for a machine in the current view.
    pub fn modal(&self, machine_id: &str) -> Option<Modal> {
        let machine = self.view.get(machine_id)?;
        let action = modal_action(machine.kind, machine.status);
        Some(Modal {
            machine: machine.clone(),
            action,
            commands: offered_commands(action).to_vec(),
            targets: move_targets(&self.view, action)
                .into_iter()
                .cloned()
                .collect(),
        })
    }

    async fn apply_locally(&mut self, writes: &[StatusWrite]) {
        for write in writes {
            self.mock
                .update_local(&self.college, write.kind, &write.id, write.to)
                .await;
        }
        apply_writes(&mut self.view, writes);
    }

    /// Execute a command against a machine in the view.
    ///
    /// Planning errors leave everything untouched. In remote mode the view
    /// changes only after the store accepted the writes; a store failure
    /// degrades the session to local data instead of failing the command.
    pub async fn execute(
        &mut self,
        machine_id: &str,
        command: &Command,
    ) -> Result<CommandOutcome, CommandError> {
        let writes = plan(&self.view, machine_id, command)?;

        if self.source == DataSource::Local {
            self.apply_locally(&writes).await;
            self.local_pending = true;
            return Ok(CommandOutcome::Local { writes });
        }

        match update::apply_writes(self.remote.as_ref(), &writes).await {
            Ok(()) => {
                apply_writes(&mut self.view, &writes);
                Ok(CommandOutcome::Committed { writes })
            }
            Err(e) => {
                warn!(
                    "Failed to write {} for {}, switching {} to local data: {}",
                    command.kind(),
                    machine_id,
                    self.college,
                    e
                );
                self.mock.adopt(&self.college, self.view.clone()).await;
                self.source = DataSource::Local;
                self.apply_locally(&writes).await;
                self.local_pending = true;
                Ok(CommandOutcome::Degraded {
                    writes,
                    error: e.to_string(),
                })
            }
        }
    }
}
