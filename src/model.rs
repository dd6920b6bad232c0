use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::Facility;

/// Hours in one grid row.
pub const HOURS_PER_DAY: usize = 24;

/// Bookable resource identifier as the feed and the catalogs spell it.
///
/// Ordering is numeric when both sides are unsigned integers, lexical otherwise.
/// Numeric ids sort before non-numeric ones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn numeric(&self) -> Option<u64> {
        self.0.parse().ok()
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self.numeric(), other.numeric()) {
            (Some(a), Some(b)) => a.cmp(&b).then_with(|| self.0.cmp(&other.0)),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => self.0.cmp(&other.0),
        }
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ResourceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// What the user picked: facility, day and identity. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub facility: Facility,
    pub date: NaiveDate,
    pub user_id: String,
}

/// Status as reported by the reservation feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Status {
    Booked,
    Closed,
    /// Any other code, kept verbatim.
    Other(String),
}

impl Status {
    pub fn from_code(code: &str) -> Self {
        if code.eq_ignore_ascii_case("b") || code.eq_ignore_ascii_case("booked") {
            Status::Booked
        } else if code.eq_ignore_ascii_case("c") || code.eq_ignore_ascii_case("closed") {
            Status::Closed
        } else {
            Status::Other(code.to_string())
        }
    }
}

/// One cell of the occupancy grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SlotStatus {
    #[default]
    Available,
    Booked,
    Closed,
    Unknown,
}

impl SlotStatus {
    pub fn symbol(self) -> char {
        match self {
            SlotStatus::Available => 'A',
            SlotStatus::Booked => 'B',
            SlotStatus::Closed => 'C',
            SlotStatus::Unknown => '?',
        }
    }
}

impl From<&Status> for SlotStatus {
    fn from(status: &Status) -> Self {
        match status {
            Status::Booked => SlotStatus::Booked,
            Status::Closed => SlotStatus::Closed,
            Status::Other(code)
                if code.eq_ignore_ascii_case("a") || code.eq_ignore_ascii_case("available") =>
            {
                SlotStatus::Available
            }
            Status::Other(_) => SlotStatus::Unknown,
        }
    }
}

/// One element of the feed's response array, untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(pub serde_json::Value);

/// A feed record that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reservation {
    pub resource_id: ResourceId,
    pub status: Status,
    /// Raw status label, the secondary sort key.
    pub label: String,
    /// Hour of day in the timestamp's own offset, `0..24`.
    pub hour: usize,
}

pub type HourRow = [SlotStatus; HOURS_PER_DAY];

/// Per-resource, per-hour occupancy for one day. Read-only once built.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OccupancyGrid {
    rows: BTreeMap<ResourceId, HourRow>,
}

impl OccupancyGrid {
    pub(crate) fn from_rows(rows: BTreeMap<ResourceId, HourRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, id: &ResourceId) -> Option<&HourRow> {
        self.rows.get(id)
    }

    /// All rows in resource order.
    pub fn iter(&self) -> impl Iterator<Item = (&ResourceId, &HourRow)> {
        self.rows.iter()
    }

    /// The first `n` rows in resource order.
    pub fn rows(&self, n: usize) -> impl Iterator<Item = (&ResourceId, &HourRow)> {
        self.rows.iter().take(n)
    }
}

/// Render a row as 24 single-letter cells.
pub fn row_symbols(row: &HourRow) -> String {
    row.iter().map(|s| s.symbol()).collect()
}
