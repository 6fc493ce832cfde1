//! In-memory persistence gateway.
//!
//! Backs tests and the CLI. Transactions undo only their own writes:
//! `begin` opens a per-transaction undo log covering job transitions and
//! findings inserts, `rollback` replays it, `commit` discards it. Writes
//! from producers landing while a transaction is open are untouched by a
//! rollback. Only one transaction may be open at a time.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

use crate::model::{CheckDefinition, DefinitionMeta, Finding, JobRecord, VisibilityLink};
use crate::types::{CheckId, JobId, JobStatus, LinkId, UserId};

use super::{CheckStore, StoreError};

/// Undo log of one open transaction: the pre-transaction record of every
/// job it touched, and the pre-transaction findings length per job.
#[derive(Default)]
struct TxnUndo {
    jobs: HashMap<JobId, JobRecord>,
    findings: HashMap<JobId, usize>,
}

#[derive(Default)]
struct Inner {
    definitions: HashMap<CheckId, CheckDefinition>,
    links: HashMap<LinkId, VisibilityLink>,
    jobs: HashMap<JobId, JobRecord>,
    findings: HashMap<JobId, Vec<Finding>>,
    next_id: i64,
    txn: Option<TxnUndo>,
}

impl Inner {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Thread-safe in-memory implementation of [`CheckStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Io("store mutex poisoned".into()))
    }
}

impl CheckStore for MemoryStore {
    fn insert_definition(
        &self,
        meta: DefinitionMeta,
        registered_at: DateTime<Utc>,
    ) -> Result<CheckId, StoreError> {
        let mut inner = self.lock()?;
        if inner
            .definitions
            .values()
            .any(|d| d.name == meta.name && d.retired_at.is_none())
        {
            return Err(StoreError::Constraint(format!(
                "an active definition named '{}' already exists",
                meta.name
            )));
        }
        let id = inner.allocate_id();
        inner.definitions.insert(
            id,
            CheckDefinition {
                id,
                name: meta.name,
                description: meta.description,
                author: meta.author,
                object_kind: meta.object_kind,
                hash: meta.hash,
                registered_at,
                retired_at: None,
            },
        );
        Ok(id)
    }

    fn read_definition(&self, id: CheckId) -> Result<CheckDefinition, StoreError> {
        self.lock()?
            .definitions
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound {
                entity: "definition",
                id,
            })
    }

    fn update_definition(&self, id: CheckId, meta: DefinitionMeta) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let def = inner.definitions.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "definition",
            id,
        })?;
        def.name = meta.name;
        def.description = meta.description;
        def.author = meta.author;
        def.object_kind = meta.object_kind;
        def.hash = meta.hash;
        Ok(())
    }

    fn retire_definition(&self, id: CheckId, when: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let def = inner.definitions.get_mut(&id).ok_or(StoreError::NotFound {
            entity: "definition",
            id,
        })?;
        def.retired_at = Some(when);
        Ok(())
    }

    fn all_definitions(&self) -> Result<Vec<CheckDefinition>, StoreError> {
        let mut defs: Vec<_> = self.lock()?.definitions.values().cloned().collect();
        defs.sort_by_key(|d| d.id);
        Ok(defs)
    }

    fn insert_link(
        &self,
        user_id: UserId,
        check_id: CheckId,
        begin: DateTime<Utc>,
    ) -> Result<LinkId, StoreError> {
        let mut inner = self.lock()?;
        if inner
            .links
            .values()
            .any(|l| l.user_id == user_id && l.check_id == check_id && l.end.is_none())
        {
            return Err(StoreError::Constraint(format!(
                "user {user_id} already holds an open link for check {check_id}"
            )));
        }
        let id = inner.allocate_id();
        inner.links.insert(
            id,
            VisibilityLink {
                id,
                user_id,
                check_id,
                begin,
                end: None,
            },
        );
        Ok(id)
    }

    fn read_link(&self, id: LinkId) -> Result<VisibilityLink, StoreError> {
        self.lock()?
            .links
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "link", id })
    }

    fn find_open_link(
        &self,
        user_id: UserId,
        check_id: CheckId,
    ) -> Result<Option<VisibilityLink>, StoreError> {
        Ok(self
            .lock()?
            .links
            .values()
            .find(|l| l.user_id == user_id && l.check_id == check_id && l.end.is_none())
            .cloned())
    }

    fn close_link(&self, id: LinkId, end: DateTime<Utc>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let link = inner
            .links
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "link", id })?;
        link.end = Some(end);
        Ok(())
    }

    fn insert_job(
        &self,
        check_id: CheckId,
        link_id: LinkId,
        queued_at: DateTime<Utc>,
    ) -> Result<JobId, StoreError> {
        let mut inner = self.lock()?;
        let id = inner.allocate_id();
        inner.jobs.insert(
            id,
            JobRecord {
                id,
                check_id,
                link_id,
                queued_at,
                completed_at: None,
                status: JobStatus::Queued,
                object_count: None,
            },
        );
        Ok(id)
    }

    fn read_job(&self, id: JobId) -> Result<JobRecord, StoreError> {
        self.lock()?
            .jobs
            .get(&id)
            .cloned()
            .ok_or(StoreError::NotFound { entity: "job", id })
    }

    fn job_status(&self, id: JobId) -> Result<JobStatus, StoreError> {
        Ok(self.read_job(id)?.status)
    }

    fn finish_job(
        &self,
        id: JobId,
        completed_at: DateTime<Utc>,
        object_count: Option<i64>,
        status: JobStatus,
    ) -> Result<(), StoreError> {
        if !status.is_terminal() {
            return Err(StoreError::Constraint(format!(
                "finish_job requires a terminal status, got {status}"
            )));
        }
        let mut guard = self.lock()?;
        let inner = &mut *guard;
        let job = inner
            .jobs
            .get_mut(&id)
            .ok_or(StoreError::NotFound { entity: "job", id })?;
        if let Some(txn) = inner.txn.as_mut() {
            txn.jobs.entry(id).or_insert_with(|| job.clone());
        }
        job.completed_at = Some(completed_at);
        job.object_count = object_count;
        job.status = status;
        Ok(())
    }

    fn queued_jobs(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut jobs: Vec<_> = self
            .lock()?
            .jobs
            .values()
            .filter(|j| j.status == JobStatus::Queued)
            .cloned()
            .collect();
        jobs.sort_by_key(|j| (j.queued_at, j.id));
        Ok(jobs)
    }

    fn insert_findings(&self, job_id: JobId, findings: &[Finding]) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.jobs.contains_key(&job_id) {
            return Err(StoreError::Constraint(format!(
                "findings reference unknown job {job_id}"
            )));
        }
        let prior_len = inner.findings.get(&job_id).map_or(0, Vec::len);
        if let Some(txn) = inner.txn.as_mut() {
            txn.findings.entry(job_id).or_insert(prior_len);
        }
        inner
            .findings
            .entry(job_id)
            .or_default()
            .extend_from_slice(findings);
        Ok(())
    }

    fn findings_for_job(&self, job_id: JobId) -> Result<Vec<Finding>, StoreError> {
        Ok(self
            .lock()?
            .findings
            .get(&job_id)
            .cloned()
            .unwrap_or_default())
    }

    fn begin_transaction(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.txn.is_some() {
            return Err(StoreError::Transaction(
                "a transaction is already open".into(),
            ));
        }
        inner.txn = Some(TxnUndo::default());
        Ok(())
    }

    fn commit(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if inner.txn.take().is_none() {
            return Err(StoreError::Transaction("no open transaction".into()));
        }
        Ok(())
    }

    fn rollback(&self) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        let Some(undo) = inner.txn.take() else {
            return Err(StoreError::Transaction("no open transaction".into()));
        };
        for (id, record) in undo.jobs {
            inner.jobs.insert(id, record);
        }
        for (id, len) in undo.findings {
            if len == 0 {
                inner.findings.remove(&id);
            } else if let Some(batch) = inner.findings.get_mut(&id) {
                batch.truncate(len);
            }
        }
        Ok(())
    }
}
