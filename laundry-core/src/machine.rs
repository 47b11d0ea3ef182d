//! Machine records and the per-college machine set.
//!
//! A laundry room has three kinds of machine: washers, dryers and the bins
//! that loads are moved into once they are dry. Every record carries a
//! single integer status whose meaning depends on the kind.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

/// Number of machines of each kind in a generated laundry room.
pub const MACHINES_PER_KIND: usize = 10;

/// Kind of machine. Serialized as the lowercase `type` field of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MachineKind {
    Washer,
    Dryer,
    Bin,
}

impl MachineKind {
    pub const ALL: [MachineKind; 3] = [MachineKind::Washer, MachineKind::Dryer, MachineKind::Bin];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Washer => "washer",
            Self::Dryer => "dryer",
            Self::Bin => "bin",
        }
    }

    /// Name of the list holding this kind (`washers`, `dryers`, `bins`).
    pub fn plural(&self) -> &'static str {
        match self {
            Self::Washer => "washers",
            Self::Dryer => "dryers",
            Self::Bin => "bins",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::Washer => "Washer",
            Self::Dryer => "Dryer",
            Self::Bin => "Bin",
        }
    }
}

impl fmt::Display for MachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Returned when a string is not one of `washer`, `dryer` or `bin`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownMachineKind(pub String);

impl fmt::Display for UnknownMachineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown machine type: {}", self.0)
    }
}

impl std::error::Error for UnknownMachineKind {}

impl FromStr for MachineKind {
    type Err = UnknownMachineKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "washer" => Ok(Self::Washer),
            "dryer" => Ok(Self::Dryer),
            "bin" => Ok(Self::Bin),
            other => Err(UnknownMachineKind(other.to_string())),
        }
    }
}

/// Raw machine status as stored in the document.
///
/// Washers and dryers use 0 (available), 1 (in use) and 2 (broken).
/// Bins use 0 (empty) and 1 (full). Any other value is kept as-is so that
/// unexpected documents still round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Status(pub i64);

impl Status {
    pub const AVAILABLE: Status = Status(0);
    pub const IN_USE: Status = Status(1);
    pub const BROKEN: Status = Status(2);
    pub const EMPTY: Status = Status(0);
    pub const FULL: Status = Status(1);

    /// Human readable label for a machine of the given kind.
    pub fn label(&self, kind: MachineKind) -> &'static str {
        match (kind, self.0) {
            (MachineKind::Bin, 0) => "Empty",
            (MachineKind::Bin, 1) => "Full",
            (_, 0) => "Available",
            (_, 1) => "In use",
            (_, 2) => "Broken",
            _ => "Unknown",
        }
    }

    /// CSS class for the status dot on a machine card.
    pub fn css_class(&self) -> &'static str {
        match self.0 {
            0 => "status-available",
            1 => "status-busy",
            2 => "status-broken",
            _ => "status-other",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for Status {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

/// A single machine document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: MachineKind,
    /// Numeric label shown on the card, unique per (college, kind).
    pub number: String,
    pub status: Status,
    /// Lowercase college slug.
    pub college: String,
}

impl Machine {
    /// Build the deterministic record used when seeding a college.
    pub fn mock(college: &str, kind: MachineKind, n: usize) -> Self {
        Self {
            id: mock_id(college, kind, n),
            kind,
            number: n.to_string(),
            status: Status::AVAILABLE,
            college: college.to_string(),
        }
    }

    /// Numeric interpretation of `number`, if it has one.
    pub fn numeric_label(&self) -> Option<i64> {
        self.number.trim().parse().ok()
    }
}

/// Deterministic document id for a seeded machine: `mock-<college>-<type>-<n>`.
pub fn mock_id(college: &str, kind: MachineKind, n: usize) -> String {
    format!("mock-{}-{}-{}", college, kind.as_str(), n)
}

/// Compare two machines by the numeric value of their labels.
///
/// Labels that are not integers sort after all numeric labels and are
/// ordered lexicographically among themselves.
pub fn compare_by_number(a: &Machine, b: &Machine) -> Ordering {
    match (a.numeric_label(), b.numeric_label()) {
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.number.cmp(&b.number),
    }
}

/// Stable in-place sort by numeric label.
pub fn sort_by_number(machines: &mut [Machine]) {
    machines.sort_by(compare_by_number);
}

/// The three lists that make up a college's laundry room.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MachineSet {
    pub washers: Vec<Machine>,
    pub dryers: Vec<Machine>,
    pub bins: Vec<Machine>,
}

impl MachineSet {
    pub fn new(washers: Vec<Machine>, dryers: Vec<Machine>, bins: Vec<Machine>) -> Self {
        Self {
            washers,
            dryers,
            bins,
        }
    }

    /// Generate the seeded laundry room for a college: ten of each kind, all at status 0.
    pub fn mock(college: &str) -> Self {
        let build = |kind| {
            (1..=MACHINES_PER_KIND)
                .map(|n| Machine::mock(college, kind, n))
                .collect::<Vec<_>>()
        };
        Self {
            washers: build(MachineKind::Washer),
            dryers: build(MachineKind::Dryer),
            bins: build(MachineKind::Bin),
        }
    }

    /// True when all three lists are empty.
    pub fn is_empty(&self) -> bool {
        self.washers.is_empty() && self.dryers.is_empty() && self.bins.is_empty()
    }

    pub fn len(&self) -> usize {
        self.washers.len() + self.dryers.len() + self.bins.len()
    }

    pub fn list(&self, kind: MachineKind) -> &[Machine] {
        match kind {
            MachineKind::Washer => &self.washers,
            MachineKind::Dryer => &self.dryers,
            MachineKind::Bin => &self.bins,
        }
    }

    pub fn list_mut(&mut self, kind: MachineKind) -> &mut Vec<Machine> {
        match kind {
            MachineKind::Washer => &mut self.washers,
            MachineKind::Dryer => &mut self.dryers,
            MachineKind::Bin => &mut self.bins,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Machine> {
        self.washers
            .iter()
            .chain(self.dryers.iter())
            .chain(self.bins.iter())
    }

    pub fn get(&self, id: &str) -> Option<&Machine> {
        self.iter().find(|m| m.id == id)
    }

    /// Replace the status of the machine with the given id in the given list.
    ///
    /// Returns false if no such machine exists. No other field is touched.
    pub fn apply(&mut self, kind: MachineKind, id: &str, status: Status) -> bool {
        match self.list_mut(kind).iter_mut().find(|m| m.id == id) {
            Some(machine) => {
                machine.status = status;
                true
            }
            None => false,
        }
    }

    /// Machines of a kind currently at status 0, in display order.
    pub fn available(&self, kind: MachineKind) -> impl Iterator<Item = &Machine> {
        self.list(kind)
            .iter()
            .filter(|m| m.status == Status::AVAILABLE)
    }

    pub fn sort(&mut self) {
        sort_by_number(&mut self.washers);
        sort_by_number(&mut self.dryers);
        sort_by_number(&mut self.bins);
    }
}
