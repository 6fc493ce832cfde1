//! checkrun library
//!
//! A check-script registry with a durable job queue and a single worker.
//! Operators register independently-authored check units, submit execution
//! jobs against them, and get findings persisted atomically with each
//! job's terminal status.

pub mod checks;
pub mod cli;
pub mod config;
pub mod error;
pub mod hash;
pub mod model;
pub mod plugin;
pub mod queue;
pub mod registry;
pub mod script;
pub mod service;
pub mod store;
pub mod types;
pub mod worker;

#[cfg(test)]
pub(crate) mod testutil;

// Re-export main types for convenience
pub use config::{AppConfig, ScriptDirConfig};
pub use error::{Error, Result};
pub use hash::ContentHash;
pub use model::{CheckDefinition, DefinitionMeta, Finding, JobRecord, VisibilityLink};
pub use plugin::{FileStatus, IntegrityError, NewScript, PluginManager};
pub use queue::{JobQueue, QueueItem};
pub use registry::{LoadError, ScriptRegistry};
pub use script::{CheckReport, CheckScript, ScriptFactory};
pub use service::JobService;
pub use store::{CheckStore, MemoryStore, StoreError};
pub use types::{CheckId, JobId, JobStatus, LinkId, ObjectKind, Severity, UserId};
pub use worker::{EventBus, FailureReason, JobEvent, JobOutcome, Worker, WorkerHandle};
