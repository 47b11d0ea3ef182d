//! Modal actions and the commands they offer.
//!
//! Clicking a machine opens a modal whose content is a pure function of the
//! machine's kind and status. Each modal offers a fixed set of commands, and
//! each command is planned into the status writes it needs:
//! - **Action**: which modal to show (`ModalAction`)
//! - **Command**: what the user picked (`Command`)
//! - **Plan**: pure function `(view, machine, command) -> Vec<StatusWrite>`
//!
//! Executing the writes is left to the caller.

use serde::Serialize;
use std::fmt;

use crate::machine::{Machine, MachineKind, MachineSet, Status};

/// Which modal to show for a clicked machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModalAction {
    StartWasher,
    InUseWasher,
    StartDryer,
    InUseDryer,
    EmptyBin,
    InfoBin,
    BrokenMachine,
}

impl ModalAction {
    pub const ALL: [ModalAction; 7] = [
        ModalAction::StartWasher,
        ModalAction::InUseWasher,
        ModalAction::StartDryer,
        ModalAction::InUseDryer,
        ModalAction::EmptyBin,
        ModalAction::InfoBin,
        ModalAction::BrokenMachine,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartWasher => "start_washer",
            Self::InUseWasher => "in_use_washer",
            Self::StartDryer => "start_dryer",
            Self::InUseDryer => "in_use_dryer",
            Self::EmptyBin => "empty_bin",
            Self::InfoBin => "info_bin",
            Self::BrokenMachine => "broken_machine",
        }
    }

    /// Prompt shown at the top of the modal.
    pub fn prompt(&self) -> &'static str {
        match self {
            Self::StartWasher => "Start this washer?",
            Self::InUseWasher => "Washer is running. Move clothes to dryer?",
            Self::StartDryer => "Dryers are usually started by moving clothes from a washer.",
            Self::InUseDryer => "Dryer is running. Move clothes to bin?",
            Self::EmptyBin => "Empty this bin?",
            Self::InfoBin => "This bin is empty and ready for use.",
            Self::BrokenMachine => "This machine is currently broken.",
        }
    }

    /// Kind of machine a load can be moved into from this modal, if any.
    pub fn move_target_kind(&self) -> Option<MachineKind> {
        match self {
            Self::InUseWasher => Some(MachineKind::Dryer),
            Self::InUseDryer => Some(MachineKind::Bin),
            _ => None,
        }
    }
}

impl fmt::Display for ModalAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Derive the modal action for a machine.
///
/// Total over every status value: washers and dryers treat anything other
/// than 0 and 1 as broken, bins treat anything other than 1 as empty.
pub fn modal_action(kind: MachineKind, status: Status) -> ModalAction {
    match (kind, status.0) {
        (MachineKind::Washer, 0) => ModalAction::StartWasher,
        (MachineKind::Washer, 1) => ModalAction::InUseWasher,
        (MachineKind::Washer, _) => ModalAction::BrokenMachine,
        (MachineKind::Dryer, 0) => ModalAction::StartDryer,
        (MachineKind::Dryer, 1) => ModalAction::InUseDryer,
        (MachineKind::Dryer, _) => ModalAction::BrokenMachine,
        (MachineKind::Bin, 1) => ModalAction::EmptyBin,
        (MachineKind::Bin, _) => ModalAction::InfoBin,
    }
}

/// Command names, without their payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandKind {
    StartLoad,
    StopLoad,
    MoveToDryer,
    MoveToBin,
    EmptyBin,
    ReportBroken,
    ReportFixed,
}

impl CommandKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartLoad => "start_load",
            Self::StopLoad => "stop_load",
            Self::MoveToDryer => "move_to_dryer",
            Self::MoveToBin => "move_to_bin",
            Self::EmptyBin => "empty_bin",
            Self::ReportBroken => "report_broken",
            Self::ReportFixed => "report_fixed",
        }
    }

    /// Button label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::StartLoad => "Start Load",
            Self::StopLoad => "Stop Load",
            Self::MoveToDryer => "Move to Dryer",
            Self::MoveToBin => "Move to Bin",
            Self::EmptyBin => "Empty Bin",
            Self::ReportBroken => "Report Broken",
            Self::ReportFixed => "Report Fixed",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "start_load" => Some(Self::StartLoad),
            "stop_load" => Some(Self::StopLoad),
            "move_to_dryer" => Some(Self::MoveToDryer),
            "move_to_bin" => Some(Self::MoveToBin),
            "empty_bin" => Some(Self::EmptyBin),
            "report_broken" => Some(Self::ReportBroken),
            "report_fixed" => Some(Self::ReportFixed),
            _ => None,
        }
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Commands offered by each modal, in display order.
pub fn offered_commands(action: ModalAction) -> &'static [CommandKind] {
    match action {
        ModalAction::StartWasher => &[CommandKind::StartLoad, CommandKind::ReportBroken],
        ModalAction::InUseWasher => &[
            CommandKind::MoveToDryer,
            CommandKind::StopLoad,
            CommandKind::ReportBroken,
        ],
        ModalAction::StartDryer => &[CommandKind::ReportBroken],
        ModalAction::InUseDryer => &[
            CommandKind::MoveToBin,
            CommandKind::StopLoad,
            CommandKind::ReportBroken,
        ],
        ModalAction::EmptyBin => &[CommandKind::EmptyBin],
        ModalAction::InfoBin => &[],
        ModalAction::BrokenMachine => &[CommandKind::ReportFixed],
    }
}

/// A command picked from a modal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    StartLoad,
    StopLoad,
    MoveToDryer { target: String },
    MoveToBin { target: String },
    EmptyBin,
    ReportBroken,
    ReportFixed,
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Self::StartLoad => CommandKind::StartLoad,
            Self::StopLoad => CommandKind::StopLoad,
            Self::MoveToDryer { .. } => CommandKind::MoveToDryer,
            Self::MoveToBin { .. } => CommandKind::MoveToBin,
            Self::EmptyBin => CommandKind::EmptyBin,
            Self::ReportBroken => CommandKind::ReportBroken,
            Self::ReportFixed => CommandKind::ReportFixed,
        }
    }

    /// Build a command from a name and an optional move target, as submitted by a form.
    pub fn from_parts(name: &str, target: Option<&str>) -> Result<Self, CommandError> {
        let kind =
            CommandKind::parse(name).ok_or_else(|| CommandError::UnknownCommand(name.to_string()))?;
        let target = target.map(str::trim).filter(|t| !t.is_empty());
        Ok(match kind {
            CommandKind::StartLoad => Self::StartLoad,
            CommandKind::StopLoad => Self::StopLoad,
            CommandKind::MoveToDryer => Self::MoveToDryer {
                target: target.ok_or(CommandError::MissingTarget(kind))?.to_string(),
            },
            CommandKind::MoveToBin => Self::MoveToBin {
                target: target.ok_or(CommandError::MissingTarget(kind))?.to_string(),
            },
            CommandKind::EmptyBin => Self::EmptyBin,
            CommandKind::ReportBroken => Self::ReportBroken,
            CommandKind::ReportFixed => Self::ReportFixed,
        })
    }
}

/// One planned status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusWrite {
    pub id: String,
    pub kind: MachineKind,
    /// Status before the write, used to compensate a failed transfer.
    pub from: Status,
    pub to: Status,
}

impl StatusWrite {
    fn new(machine: &Machine, to: Status) -> Self {
        Self {
            id: machine.id.clone(),
            kind: machine.kind,
            from: machine.status,
            to,
        }
    }

    /// The write that undoes this one.
    pub fn inverse(&self) -> Self {
        Self {
            id: self.id.clone(),
            kind: self.kind,
            from: self.to,
            to: self.from,
        }
    }
}

/// Why a command could not be planned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    UnknownCommand(String),
    MissingTarget(CommandKind),
    UnknownMachine(String),
    NotOffered {
        action: ModalAction,
        command: CommandKind,
    },
    TargetUnavailable {
        target: String,
        reason: &'static str,
    },
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnknownCommand(name) => write!(f, "unknown command: {}", name),
            Self::MissingTarget(kind) => write!(f, "{} requires a target machine", kind),
            Self::UnknownMachine(id) => write!(f, "no machine with id {}", id),
            Self::NotOffered { action, command } => {
                write!(f, "{} is not offered for {}", command, action)
            }
            Self::TargetUnavailable { target, reason } => {
                write!(f, "target {} unavailable: {}", target, reason)
            }
        }
    }
}

impl std::error::Error for CommandError {}

/// Machines a load can be moved into from this modal, in display order.
///
/// Empty when the modal has no move option or nothing is available.
pub fn move_targets(view: &MachineSet, action: ModalAction) -> Vec<&Machine> {
    match action.move_target_kind() {
        Some(kind) => view.available(kind).collect(),
        None => Vec::new(),
    }
}

fn target_machine<'a>(
    view: &'a MachineSet,
    target: &str,
    kind: MachineKind,
) -> Result<&'a Machine, CommandError> {
    let machine = view
        .list(kind)
        .iter()
        .find(|m| m.id == target)
        .ok_or_else(|| CommandError::TargetUnavailable {
            target: target.to_string(),
            reason: "no such machine of the required type",
        })?;
    if machine.status != Status::AVAILABLE {
        return Err(CommandError::TargetUnavailable {
            target: target.to_string(),
            reason: "machine is not available",
        });
    }
    Ok(machine)
}

/// Plan the status writes for a command on a machine.
///
/// Moves produce two writes, source first. The view is not modified.
pub fn plan(
    view: &MachineSet,
    machine_id: &str,
    command: &Command,
) -> Result<Vec<StatusWrite>, CommandError> {
    let machine = view
        .get(machine_id)
        .ok_or_else(|| CommandError::UnknownMachine(machine_id.to_string()))?;
    let action = modal_action(machine.kind, machine.status);
    if !offered_commands(action).contains(&command.kind()) {
        return Err(CommandError::NotOffered {
            action,
            command: command.kind(),
        });
    }

    let writes = match command {
        Command::StartLoad => vec![StatusWrite::new(machine, Status::IN_USE)],
        Command::StopLoad | Command::ReportFixed => {
            vec![StatusWrite::new(machine, Status::AVAILABLE)]
        }
        Command::ReportBroken => vec![StatusWrite::new(machine, Status::BROKEN)],
        Command::EmptyBin => vec![StatusWrite::new(machine, Status::EMPTY)],
        Command::MoveToDryer { target } => {
            let dryer = target_machine(view, target, MachineKind::Dryer)?;
            vec![
                StatusWrite::new(machine, Status::AVAILABLE),
                StatusWrite::new(dryer, Status::IN_USE),
            ]
        }
        Command::MoveToBin { target } => {
            let bin = target_machine(view, target, MachineKind::Bin)?;
            vec![
                StatusWrite::new(machine, Status::AVAILABLE),
                StatusWrite::new(bin, Status::FULL),
            ]
        }
    };
    Ok(writes)
}

/// Apply planned writes to a view. Returns the number of machines changed.
pub fn apply_writes(view: &mut MachineSet, writes: &[StatusWrite]) -> usize {
    writes
        .iter()
        .filter(|w| view.apply(w.kind, &w.id, w.to))
        .count()
}
