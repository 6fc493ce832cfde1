//! The single job consumer.
//!
//! Exactly one worker drains the queue, so checks execute one at a time in
//! a total order and no locking is needed around "only one check runs".
//! Each dequeued job walks the status machine:
//!
//! ```text
//! QUEUED ──► EXECUTED | FAILED | CANCELLED
//! ```
//!
//! All transitions are terminal. The in-flight window between dequeue and
//! completion is not persisted; instead the worker re-reads the job's
//! status right after dequeue and silently skips anything no longer QUEUED
//! (that is how a lazy cancellation lands). Findings are only ever written
//! together with the EXECUTED status inside one transaction, so a FAILED
//! job can never have findings.

use chrono::Utc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::queue::{JobQueue, QueueItem};
use crate::store::CheckStore;
use crate::types::{JobId, JobStatus};

/// Why a job ended in FAILED.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureReason {
    /// Availability test returned false or raised.
    Availability,
    /// The execute phase raised.
    Execution(String),
    /// The terminal transaction could not be committed.
    Store(String),
}

/// Terminal outcome of one dequeued item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// Check completed; `object_count` is `None` when it found nothing.
    Executed { object_count: Option<i64> },
    Failed(FailureReason),
    /// Persisted status was no longer QUEUED at dequeue; nothing was run or
    /// written.
    Skipped,
}

/// Lifecycle notification emitted on subscriber channels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobEvent {
    Started { job_id: JobId },
    Finished { job_id: JobId, outcome: JobOutcome },
}

/// Fan-out of [`JobEvent`] to any number of subscribers.
///
/// Disconnected subscribers are pruned on the next emit; a subscriber that
/// stops listening never blocks the worker.
#[derive(Default)]
pub struct EventBus {
    senders: Mutex<Vec<Sender<JobEvent>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self) -> Receiver<JobEvent> {
        let (tx, rx) = mpsc::channel();
        self.senders.lock().expect("event bus mutex poisoned").push(tx);
        rx
    }

    pub fn emit(&self, event: JobEvent) {
        let mut senders = self.senders.lock().expect("event bus mutex poisoned");
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// The single consumer of the job queue.
///
/// Holds its own store handle, distinct from any handle the producers use.
pub struct Worker {
    store: Arc<dyn CheckStore>,
    queue: Arc<JobQueue>,
    events: Arc<EventBus>,
    current: Arc<Mutex<Option<JobId>>>,
}

/// Handle to a spawned worker thread.
pub struct WorkerHandle {
    join: JoinHandle<()>,
    queue: Arc<JobQueue>,
    current: Arc<Mutex<Option<JobId>>>,
}

impl WorkerHandle {
    /// Job currently executing, if any.
    pub fn current_job(&self) -> Option<JobId> {
        *self.current.lock().expect("current-job mutex poisoned")
    }

    /// Close the queue and wait for the worker to drain and exit.
    pub fn shutdown(self) {
        self.queue.close();
        if self.join.join().is_err() {
            error!("worker thread panicked");
        }
    }
}

impl Worker {
    pub fn new(
        store: Arc<dyn CheckStore>,
        queue: Arc<JobQueue>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            store,
            queue,
            events,
            current: Arc::new(Mutex::new(None)),
        }
    }

    /// Shared slot holding the id of the job being executed right now.
    ///
    /// `JobService::refresh_from_store` reads it to avoid re-enqueueing the
    /// in-flight job.
    pub fn current_slot(&self) -> Arc<Mutex<Option<JobId>>> {
        Arc::clone(&self.current)
    }

    /// Spawn the consumer thread.
    pub fn spawn(self) -> WorkerHandle {
        let queue = Arc::clone(&self.queue);
        let current = Arc::clone(&self.current);
        let join = std::thread::Builder::new()
            .name("checkrun-worker".into())
            .spawn(move || self.run())
            .expect("failed to spawn worker thread");
        WorkerHandle {
            join,
            queue,
            current,
        }
    }

    fn run(&self) {
        debug!("worker loop started");
        while let Some(item) = self.queue.pop_blocking() {
            let job_id = item.job_id;
            *self.current.lock().expect("current-job mutex poisoned") = Some(job_id);
            self.events.emit(JobEvent::Started { job_id });

            let outcome = self.process_item(item);
            info!(job_id, ?outcome, "job finished");

            *self.current.lock().expect("current-job mutex poisoned") = None;
            self.events.emit(JobEvent::Finished { job_id, outcome });
        }
        debug!("worker loop ended");
    }

    /// Run one dequeued item through the status machine.
    ///
    /// Exposed on the struct (rather than buried in the thread loop) so the
    /// state machine is testable without spawning anything.
    pub fn process_item(&self, item: QueueItem) -> JobOutcome {
        let job_id = item.job_id;

        // Late-cancellation gate: an operator may have cancelled the job
        // between submission and dequeue.
        match self.store.job_status(job_id) {
            Ok(JobStatus::Queued) => {}
            Ok(status) => {
                debug!(job_id, %status, "job no longer queued, skipping");
                return JobOutcome::Skipped;
            }
            Err(e) => {
                warn!(job_id, error = %e, "could not re-read job status, skipping");
                return JobOutcome::Skipped;
            }
        }

        // Availability test. False and raised are both a FAILED job with no
        // execution attempt.
        match item.script.availability() {
            Ok(true) => {}
            Ok(false) => {
                warn!(job_id, check_id = item.check_id, "availability test returned false");
                return self.fail(job_id, FailureReason::Availability);
            }
            Err(e) => {
                warn!(job_id, check_id = item.check_id, error = %e, "availability test raised");
                return self.fail(job_id, FailureReason::Availability);
            }
        }

        let report = match item.script.execute(job_id) {
            Ok(report) => report,
            Err(e) => {
                error!(job_id, check_id = item.check_id, error = %e, "execute raised");
                return self.fail(job_id, FailureReason::Execution(e.to_string()));
            }
        };

        match report {
            // Completed but found nothing: a success with a null count.
            None => match self
                .store
                .finish_job(job_id, Utc::now(), None, JobStatus::Executed)
            {
                Ok(()) => JobOutcome::Executed { object_count: None },
                Err(e) => {
                    error!(job_id, error = %e, "failed to record empty execution");
                    self.fail(job_id, FailureReason::Store(e.to_string()))
                }
            },
            Some(report) => self.commit_report(job_id, report),
        }
    }

    /// Write EXECUTED + count and the findings batch as one atomic unit.
    fn commit_report(&self, job_id: JobId, report: crate::script::CheckReport) -> JobOutcome {
        if let Err(e) = self.store.begin_transaction() {
            error!(job_id, error = %e, "could not open result transaction");
            return self.fail(job_id, FailureReason::Store(e.to_string()));
        }

        let written = self
            .store
            .finish_job(
                job_id,
                Utc::now(),
                Some(report.object_count),
                JobStatus::Executed,
            )
            .and_then(|()| self.store.insert_findings(job_id, &report.findings))
            .and_then(|()| self.store.commit());

        match written {
            Ok(()) => JobOutcome::Executed {
                object_count: Some(report.object_count),
            },
            Err(e) => {
                error!(job_id, error = %e, "result transaction failed, rolling back");
                if let Err(rb) = self.store.rollback() {
                    error!(job_id, error = %rb, "rollback failed");
                }
                self.fail(job_id, FailureReason::Store(e.to_string()))
            }
        }
    }

    /// Best-effort FAILED write with a null count.
    ///
    /// If even this write fails there is no further recovery; the error is
    /// logged and the outcome still reports the original reason.
    fn fail(&self, job_id: JobId, reason: FailureReason) -> JobOutcome {
        if let Err(e) = self
            .store
            .finish_job(job_id, Utc::now(), None, JobStatus::Failed)
        {
            error!(job_id, error = %e, "could not record FAILED status");
        }
        JobOutcome::Failed(reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Finding;
    use crate::queue::QueueItem;
    use crate::store::{MemoryStore, StoreError};
    use crate::testutil::StubCheck;
    use crate::types::Severity;

    fn worker_over(store: Arc<dyn CheckStore>) -> Worker {
        Worker::new(store, Arc::new(JobQueue::new()), Arc::new(EventBus::new()))
    }

    fn queued_job(store: &MemoryStore) -> JobId {
        store.insert_job(10, 20, Utc::now()).unwrap()
    }

    fn item_with(job_id: JobId, script: StubCheck) -> QueueItem {
        QueueItem {
            job_id,
            check_id: 10,
            script: Box::new(script),
        }
    }

    // =========================================================================
    // Status machine
    // =========================================================================

    #[test]
    fn test_cancelled_job_is_skipped_without_writes() {
        let store = Arc::new(MemoryStore::new());
        let job = queued_job(&store);
        store
            .finish_job(job, Utc::now(), None, JobStatus::Cancelled)
            .unwrap();
        let cancelled_at = store.read_job(job).unwrap().completed_at;

        let worker = worker_over(store.clone());
        let outcome = worker.process_item(item_with(job, StubCheck::named("chk_stub")));

        assert_eq!(outcome, JobOutcome::Skipped);
        let record = store.read_job(job).unwrap();
        assert_eq!(record.status, JobStatus::Cancelled);
        // Untouched: the skip performed no additional write.
        assert_eq!(record.completed_at, cancelled_at);
        assert!(store.findings_for_job(job).unwrap().is_empty());
    }

    #[test]
    fn test_availability_false_fails_without_execution() {
        let store = Arc::new(MemoryStore::new());
        let job = queued_job(&store);

        let worker = worker_over(store.clone());
        let outcome =
            worker.process_item(item_with(job, StubCheck::named("chk_stub").unavailable()));

        assert_eq!(outcome, JobOutcome::Failed(FailureReason::Availability));
        let record = store.read_job(job).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.object_count, None);
        assert!(store.findings_for_job(job).unwrap().is_empty());
    }

    #[test]
    fn test_availability_error_treated_as_unavailable() {
        let store = Arc::new(MemoryStore::new());
        let job = queued_job(&store);

        let worker = worker_over(store.clone());
        let outcome = worker.process_item(item_with(
            job,
            StubCheck::named("chk_stub").availability_raises("probe exploded"),
        ));

        assert_eq!(outcome, JobOutcome::Failed(FailureReason::Availability));
        assert_eq!(store.job_status(job).unwrap(), JobStatus::Failed);
    }

    #[test]
    fn test_execute_error_fails_with_null_count() {
        let store = Arc::new(MemoryStore::new());
        let job = queued_job(&store);

        let worker = worker_over(store.clone());
        let outcome = worker.process_item(item_with(
            job,
            StubCheck::named("chk_stub").execute_raises("boom"),
        ));

        assert!(matches!(
            outcome,
            JobOutcome::Failed(FailureReason::Execution(_))
        ));
        let record = store.read_job(job).unwrap();
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.object_count, None);
        assert!(store.findings_for_job(job).unwrap().is_empty());
    }

    #[test]
    fn test_empty_result_is_executed_with_null_count() {
        let store = Arc::new(MemoryStore::new());
        let job = queued_job(&store);

        let worker = worker_over(store.clone());
        let outcome = worker.process_item(item_with(job, StubCheck::named("chk_stub")));

        assert_eq!(outcome, JobOutcome::Executed { object_count: None });
        let record = store.read_job(job).unwrap();
        assert_eq!(record.status, JobStatus::Executed);
        assert_eq!(record.object_count, None);
    }

    #[test]
    fn test_findings_committed_with_count_in_one_unit() {
        let store = Arc::new(MemoryStore::new());
        let job = queued_job(&store);

        let findings = vec![
            Finding::new("f1", "obj1", Severity::Trivial),
            Finding::new("f2", "obj2", Severity::Warning),
            Finding::new("f3", "obj3", Severity::Error),
        ];
        let worker = worker_over(store.clone());
        let outcome = worker.process_item(item_with(
            job,
            StubCheck::named("chk_stub").with_report(3, findings),
        ));

        assert_eq!(
            outcome,
            JobOutcome::Executed {
                object_count: Some(3)
            }
        );
        let record = store.read_job(job).unwrap();
        assert_eq!(record.status, JobStatus::Executed);
        assert_eq!(record.object_count, Some(3));
        assert_eq!(store.findings_for_job(job).unwrap().len(), 3);
    }

    // =========================================================================
    // Transaction failure path
    // =========================================================================

    /// Store wrapper that fails every findings insert, to force the
    /// rollback path.
    struct FindingsFailStore(MemoryStore);

    impl CheckStore for FindingsFailStore {
        fn insert_definition(
            &self,
            meta: crate::model::DefinitionMeta,
            registered_at: chrono::DateTime<Utc>,
        ) -> Result<crate::types::CheckId, StoreError> {
            self.0.insert_definition(meta, registered_at)
        }
        fn read_definition(
            &self,
            id: crate::types::CheckId,
        ) -> Result<crate::model::CheckDefinition, StoreError> {
            self.0.read_definition(id)
        }
        fn update_definition(
            &self,
            id: crate::types::CheckId,
            meta: crate::model::DefinitionMeta,
        ) -> Result<(), StoreError> {
            self.0.update_definition(id, meta)
        }
        fn retire_definition(
            &self,
            id: crate::types::CheckId,
            when: chrono::DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.0.retire_definition(id, when)
        }
        fn all_definitions(&self) -> Result<Vec<crate::model::CheckDefinition>, StoreError> {
            self.0.all_definitions()
        }
        fn insert_link(
            &self,
            user_id: crate::types::UserId,
            check_id: crate::types::CheckId,
            begin: chrono::DateTime<Utc>,
        ) -> Result<crate::types::LinkId, StoreError> {
            self.0.insert_link(user_id, check_id, begin)
        }
        fn read_link(
            &self,
            id: crate::types::LinkId,
        ) -> Result<crate::model::VisibilityLink, StoreError> {
            self.0.read_link(id)
        }
        fn find_open_link(
            &self,
            user_id: crate::types::UserId,
            check_id: crate::types::CheckId,
        ) -> Result<Option<crate::model::VisibilityLink>, StoreError> {
            self.0.find_open_link(user_id, check_id)
        }
        fn close_link(
            &self,
            id: crate::types::LinkId,
            end: chrono::DateTime<Utc>,
        ) -> Result<(), StoreError> {
            self.0.close_link(id, end)
        }
        fn insert_job(
            &self,
            check_id: crate::types::CheckId,
            link_id: crate::types::LinkId,
            queued_at: chrono::DateTime<Utc>,
        ) -> Result<JobId, StoreError> {
            self.0.insert_job(check_id, link_id, queued_at)
        }
        fn read_job(&self, id: JobId) -> Result<crate::model::JobRecord, StoreError> {
            self.0.read_job(id)
        }
        fn job_status(&self, id: JobId) -> Result<JobStatus, StoreError> {
            self.0.job_status(id)
        }
        fn finish_job(
            &self,
            id: JobId,
            completed_at: chrono::DateTime<Utc>,
            object_count: Option<i64>,
            status: JobStatus,
        ) -> Result<(), StoreError> {
            self.0.finish_job(id, completed_at, object_count, status)
        }
        fn queued_jobs(&self) -> Result<Vec<crate::model::JobRecord>, StoreError> {
            self.0.queued_jobs()
        }
        fn insert_findings(&self, _job_id: JobId, _findings: &[Finding]) -> Result<(), StoreError> {
            Err(StoreError::Io("disk full".into()))
        }
        fn findings_for_job(&self, job_id: JobId) -> Result<Vec<Finding>, StoreError> {
            self.0.findings_for_job(job_id)
        }
        fn begin_transaction(&self) -> Result<(), StoreError> {
            self.0.begin_transaction()
        }
        fn commit(&self) -> Result<(), StoreError> {
            self.0.commit()
        }
        fn rollback(&self) -> Result<(), StoreError> {
            self.0.rollback()
        }
    }

    #[test]
    fn test_transaction_failure_rolls_back_then_marks_failed() {
        let store = Arc::new(FindingsFailStore(MemoryStore::new()));
        let job = store.insert_job(10, 20, Utc::now()).unwrap();

        let worker = worker_over(store.clone());
        let outcome = worker.process_item(item_with(
            job,
            StubCheck::named("chk_stub")
                .with_report(2, vec![Finding::new("f", "obj", Severity::Warning)]),
        ));

        assert!(matches!(outcome, JobOutcome::Failed(FailureReason::Store(_))));
        let record = store.read_job(job).unwrap();
        // EXECUTED was rolled back; the fallback FAILED write stands, with
        // no findings and no count.
        assert_eq!(record.status, JobStatus::Failed);
        assert_eq!(record.object_count, None);
        assert!(store.findings_for_job(job).unwrap().is_empty());
    }

    // =========================================================================
    // Worker thread and events
    // =========================================================================

    #[test]
    fn test_spawned_worker_drains_queue_and_emits_events() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(JobQueue::new());
        let events = Arc::new(EventBus::new());
        let rx = events.subscribe();

        let job = queued_job(&store);
        queue.put(item_with(job, StubCheck::named("chk_stub")));

        let worker = Worker::new(store.clone(), Arc::clone(&queue), Arc::clone(&events));
        let handle = worker.spawn();
        handle.shutdown();

        assert_eq!(store.job_status(job).unwrap(), JobStatus::Executed);
        let received: Vec<JobEvent> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                JobEvent::Started { job_id: job },
                JobEvent::Finished {
                    job_id: job,
                    outcome: JobOutcome::Executed { object_count: None }
                },
            ]
        );
    }

    #[test]
    fn test_worker_executes_in_submission_order() {
        let store = Arc::new(MemoryStore::new());
        let queue = Arc::new(JobQueue::new());
        let events = Arc::new(EventBus::new());
        let rx = events.subscribe();

        let first = queued_job(&store);
        let second = queued_job(&store);
        queue.put(item_with(first, StubCheck::named("chk_stub")));
        queue.put(item_with(second, StubCheck::named("chk_stub")));

        let handle = Worker::new(store, Arc::clone(&queue), events).spawn();
        handle.shutdown();

        let started: Vec<JobId> = rx
            .try_iter()
            .filter_map(|e| match e {
                JobEvent::Started { job_id } => Some(job_id),
                JobEvent::Finished { .. } => None,
            })
            .collect();
        assert_eq!(started, vec![first, second]);
    }

    #[test]
    fn test_event_bus_prunes_dropped_subscribers() {
        let bus = EventBus::new();
        let rx = bus.subscribe();
        drop(rx);
        // Must not block or error with no listeners left.
        bus.emit(JobEvent::Started { job_id: 1 });
        let rx2 = bus.subscribe();
        bus.emit(JobEvent::Started { job_id: 2 });
        assert_eq!(rx2.try_iter().count(), 1);
    }
}
