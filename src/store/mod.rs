//! Persistence gateway contract.
//!
//! The core consumes this trait; it does not implement the relational store.
//! Every operation fails with [`StoreError`] on I/O or constraint violation.
//! The transaction trio (`begin_transaction` / `commit` / `rollback`) brackets
//! the one atomic unit the worker needs: a job-status update plus its
//! findings insert. [`memory::MemoryStore`] is the reference implementation
//! used by tests and the CLI.

pub mod memory;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::{CheckDefinition, DefinitionMeta, Finding, JobRecord, VisibilityLink};
use crate::types::{CheckId, JobId, JobStatus, LinkId, UserId};

pub use memory::MemoryStore;

/// Failure surfaced by any gateway operation.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store I/O failure: {0}")]
    Io(String),

    #[error("constraint violation: {0}")]
    Constraint(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("transaction error: {0}")]
    Transaction(String),
}

/// Gateway over the four record kinds the core persists.
///
/// Implementations must be safe to share between the producer side and the
/// single worker, though each side is expected to hold its own handle.
pub trait CheckStore: Send + Sync {
    // --- check definitions -------------------------------------------------

    fn insert_definition(
        &self,
        meta: DefinitionMeta,
        registered_at: DateTime<Utc>,
    ) -> Result<CheckId, StoreError>;

    fn read_definition(&self, id: CheckId) -> Result<CheckDefinition, StoreError>;

    /// Refresh name, description, author, kind and digest in place.
    fn update_definition(&self, id: CheckId, meta: DefinitionMeta) -> Result<(), StoreError>;

    /// Set the retirement timestamp. History is kept, never deleted.
    fn retire_definition(&self, id: CheckId, when: DateTime<Utc>) -> Result<(), StoreError>;

    fn all_definitions(&self) -> Result<Vec<CheckDefinition>, StoreError>;

    // --- visibility links --------------------------------------------------

    /// Open a new link. Fails with `Constraint` if an open link for the
    /// (user, check) pair already exists.
    fn insert_link(
        &self,
        user_id: UserId,
        check_id: CheckId,
        begin: DateTime<Utc>,
    ) -> Result<LinkId, StoreError>;

    fn read_link(&self, id: LinkId) -> Result<VisibilityLink, StoreError>;

    fn find_open_link(
        &self,
        user_id: UserId,
        check_id: CheckId,
    ) -> Result<Option<VisibilityLink>, StoreError>;

    fn close_link(&self, id: LinkId, end: DateTime<Utc>) -> Result<(), StoreError>;

    // --- jobs --------------------------------------------------------------

    /// Create a job in `Queued` status.
    fn insert_job(
        &self,
        check_id: CheckId,
        link_id: LinkId,
        queued_at: DateTime<Utc>,
    ) -> Result<JobId, StoreError>;

    fn read_job(&self, id: JobId) -> Result<JobRecord, StoreError>;

    fn job_status(&self, id: JobId) -> Result<JobStatus, StoreError>;

    /// Record a terminal transition with its completion time and count.
    fn finish_job(
        &self,
        id: JobId,
        completed_at: DateTime<Utc>,
        object_count: Option<i64>,
        status: JobStatus,
    ) -> Result<(), StoreError>;

    /// All jobs still in `Queued` status, oldest first.
    fn queued_jobs(&self) -> Result<Vec<JobRecord>, StoreError>;

    // --- findings ----------------------------------------------------------

    /// Bulk-insert the findings of one job.
    fn insert_findings(&self, job_id: JobId, findings: &[Finding]) -> Result<(), StoreError>;

    fn findings_for_job(&self, job_id: JobId) -> Result<Vec<Finding>, StoreError>;

    // --- transaction demarcation -------------------------------------------

    /// Begin the atomic unit spanning a status update and findings insert.
    fn begin_transaction(&self) -> Result<(), StoreError>;

    fn commit(&self) -> Result<(), StoreError>;

    fn rollback(&self) -> Result<(), StoreError>;
}
