//! Persistent record types exchanged with the persistence gateway.

use crate::hash::ContentHash;
use crate::types::{CheckId, JobId, JobStatus, LinkId, ObjectKind, Severity, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered check, as stored by the gateway.
///
/// The `hash` field pins the exact source bytes that were reviewed at
/// registration time. A definition with `retired_at` set stays in history
/// but can never be the target of a new job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckDefinition {
    pub id: CheckId,
    /// Identifier of the unit; equals the script file's base name.
    pub name: String,
    pub description: String,
    pub author: String,
    /// Kind of result object this check reports.
    pub object_kind: ObjectKind,
    /// Digest of the unit's source at registration time.
    pub hash: ContentHash,
    pub registered_at: DateTime<Utc>,
    pub retired_at: Option<DateTime<Utc>>,
}

impl CheckDefinition {
    /// True while the definition may still be the target of new jobs.
    pub fn is_active(&self) -> bool {
        self.retired_at.is_none()
    }
}

/// Metadata for a definition about to be inserted or refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionMeta {
    pub name: String,
    pub description: String,
    pub author: String,
    pub object_kind: ObjectKind,
    pub hash: ContentHash,
}

/// Grant allowing one user to submit jobs for one check.
///
/// Validity is the half-open interval `[begin, end)`; `end == None` means
/// the link is still open. The store enforces at most one open link per
/// (user, check) pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisibilityLink {
    pub id: LinkId,
    pub user_id: UserId,
    pub check_id: CheckId,
    pub begin: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

impl VisibilityLink {
    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }
}

/// One execution request for a check, tracked through the status machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,
    pub check_id: CheckId,
    pub link_id: LinkId,
    pub queued_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub status: JobStatus,
    /// Number of objects the check examined; `None` when the check failed,
    /// was cancelled, or completed without findings.
    pub object_count: Option<i64>,
}

/// One observation reported by a check's execute phase.
///
/// Scripts produce findings without an owning job id; the store attaches
/// ownership when the batch is inserted inside the job's terminal
/// transaction. Findings are immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub name: String,
    /// External identifier of the examined object (a path, a record key).
    pub identifier: String,
    pub comment: Option<String>,
    pub author: Option<String>,
    pub occurred_at: Option<DateTime<Utc>>,
    pub severity: Severity,
}

impl Finding {
    /// Minimal finding with everything optional left empty.
    pub fn new(name: impl Into<String>, identifier: impl Into<String>, severity: Severity) -> Self {
        Self {
            name: name.into(),
            identifier: identifier.into(),
            comment: None,
            author: None,
            occurred_at: None,
            severity,
        }
    }
}
