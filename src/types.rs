//! Core enumerations and identifier types shared across the crate.
//!
//! The numeric codes on each enum mirror the persistence gateway's reference
//! tables, so a store implementation can round-trip them without a lookup.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// Identifier of a registered check definition.
pub type CheckId = i64;
/// Identifier of a job record.
pub type JobId = i64;
/// Identifier of an operator account.
pub type UserId = i64;
/// Identifier of a visibility link.
pub type LinkId = i64;

/// Kind of object a check script reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
#[repr(i64)]
pub enum ObjectKind {
    #[default]
    File = 1,
    DbRecord = 2,
    DbObject = 3,
}

/// Severity of a single finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
#[derive(Serialize, Deserialize, Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[repr(i64)]
pub enum Severity {
    #[default]
    Trivial = 1,
    Warning = 2,
    Error = 3,
}

/// Lifecycle status of a job.
///
/// A job starts in `Queued` and makes exactly one forward transition to one
/// of the terminal states. The in-flight window between dequeue and
/// completion is deliberately not persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
#[repr(i64)]
pub enum JobStatus {
    Queued = 1,
    Executed = 2,
    Failed = 3,
    Cancelled = 4,
}

impl JobStatus {
    /// Numeric code as stored by the persistence gateway.
    #[inline]
    pub const fn code(self) -> i64 {
        self as i64
    }

    /// Returns true once the job can no longer change status.
    #[inline]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Queued)
    }
}
