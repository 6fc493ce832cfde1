//! Job submission and queue control.
//!
//! [`JobService`] is the producer-side API: it validates a submission
//! against the visibility rules, resolves the script through the
//! drift-detection gate, creates the job record, and hands the loaded item
//! to the queue. It also owns the store-touching queue operations the queue
//! itself stays ignorant of: cancel-all, refresh-from-store, and grants.
//!
//! The service holds its own store handle; the worker holds another.
//! Refresh is not safe to invoke concurrently with itself; callers
//! serialize refresh requests.

use chrono::Utc;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::plugin::PluginManager;
use crate::queue::{JobQueue, QueueItem};
use crate::store::CheckStore;
use crate::types::{CheckId, JobId, JobStatus, LinkId, UserId};

/// Producer-side API over the store, plugin manager and queue.
pub struct JobService {
    store: Arc<dyn CheckStore>,
    plugins: Arc<PluginManager>,
    queue: Arc<JobQueue>,
}

impl JobService {
    pub fn new(
        store: Arc<dyn CheckStore>,
        plugins: Arc<PluginManager>,
        queue: Arc<JobQueue>,
    ) -> Self {
        Self {
            store,
            plugins,
            queue,
        }
    }

    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Submit one execution request.
    ///
    /// Validates that the link is open and grants the requested check, that
    /// the definition is not retired, and that the script still matches its
    /// registered digest. Only then is the job record created (QUEUED) and
    /// the loaded item pushed.
    pub fn submit(&self, check_id: CheckId, link_id: LinkId) -> Result<JobId> {
        let link = self.store.read_link(link_id)?;
        if !link.is_open() {
            return Err(Error::LinkClosed { link_id });
        }
        if link.check_id != check_id {
            return Err(Error::LinkMismatch { link_id, check_id });
        }

        let def = self.store.read_definition(check_id)?;
        if !def.is_active() {
            return Err(Error::RetiredCheck { check_id });
        }

        let script = self.plugins.resolve_for_execution(check_id)?;
        let job_id = self.store.insert_job(check_id, link_id, Utc::now())?;
        self.queue.put(QueueItem {
            job_id,
            check_id,
            script,
        });
        info!(job_id, check_id, link_id, "job submitted");
        Ok(job_id)
    }

    /// Cancel every job still waiting in the queue.
    ///
    /// Items already dequeued are untouched; their terminal status is
    /// decided solely by their own execution. Returns how many jobs were
    /// transitioned to CANCELLED.
    pub fn cancel_all_queued(&self) -> Result<usize> {
        let mut cancelled = 0;
        for item in self.queue.drain() {
            // Only still-QUEUED jobs transition; anything else is left as is.
            match self.store.job_status(item.job_id)? {
                JobStatus::Queued => {
                    self.store
                        .finish_job(item.job_id, Utc::now(), None, JobStatus::Cancelled)?;
                    cancelled += 1;
                }
                status => {
                    warn!(job_id = item.job_id, %status, "drained job already terminal");
                }
            }
        }
        info!(cancelled, "cancelled queued jobs");
        Ok(cancelled)
    }

    /// Drop every queued item without touching the store.
    ///
    /// The jobs stay QUEUED in the store and will come back on the next
    /// `refresh_from_store`.
    pub fn drain_without_cancel(&self) -> usize {
        self.queue.drain().len()
    }

    /// Rebuild the in-memory queue from store-side QUEUED jobs.
    ///
    /// Jobs already queued in memory, and optionally the one currently
    /// executing, are skipped. A job whose script cannot be resolved
    /// (missing file, hash drift, load failure) is immediately marked
    /// FAILED and excluded, so one broken unit never blocks the backlog.
    /// Returns how many jobs were enqueued.
    pub fn refresh_from_store(&self, currently_executing: Option<JobId>) -> Result<usize> {
        let in_memory: std::collections::HashSet<JobId> =
            self.queue.pending_job_ids().into_iter().collect();

        let mut enqueued = 0;
        for job in self.store.queued_jobs()? {
            if in_memory.contains(&job.id) || currently_executing == Some(job.id) {
                continue;
            }
            match self.plugins.resolve_for_execution(job.check_id) {
                Ok(script) => {
                    self.queue.put(QueueItem {
                        job_id: job.id,
                        check_id: job.check_id,
                        script,
                    });
                    enqueued += 1;
                }
                Err(e) => {
                    warn!(job_id = job.id, check_id = job.check_id, error = %e,
                        "script unresolvable, marking job failed");
                    self.store
                        .finish_job(job.id, Utc::now(), None, JobStatus::Failed)?;
                }
            }
        }
        info!(enqueued, "queue refreshed from store");
        Ok(enqueued)
    }

    /// Open a visibility link for a (user, check) pair.
    pub fn grant(&self, user_id: UserId, check_id: CheckId) -> Result<LinkId> {
        Ok(self.store.insert_link(user_id, check_id, Utc::now())?)
    }

    /// Close a visibility link; running and queued jobs are unaffected.
    pub fn revoke(&self, link_id: LinkId) -> Result<()> {
        Ok(self.store.close_link(link_id, Utc::now())?)
    }
}
