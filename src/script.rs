//! The check-script capability contract.
//!
//! Every loadable unit implements [`CheckScript`]. The trait is the whole
//! capability set: descriptive metadata, an availability probe, and the
//! execute phase. Instances are created fresh per load request and discarded
//! after use; the registry never caches them.

use crate::model::Finding;
use crate::types::{JobId, ObjectKind};

/// Result of a check execution that examined at least one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    /// How many objects the check examined.
    pub object_count: i64,
    /// Observations to persist with the job. May be empty even when
    /// `object_count` is positive.
    pub findings: Vec<Finding>,
}

/// A loadable verification unit.
///
/// Scripts are third-party code as far as the core is concerned, so both
/// fallible capabilities return `anyhow` errors: whatever goes wrong inside
/// a unit is opaque to the worker beyond "it failed".
pub trait CheckScript: Send {
    /// Identifier of the unit. Must equal the script file's base name.
    fn name(&self) -> &str;

    /// Human-readable summary of what the check verifies.
    fn description(&self) -> &str;

    /// Author recorded with the definition.
    fn author(&self) -> &str;

    /// Kind of result object this check produces.
    fn object_kind(&self) -> ObjectKind;

    /// Probe the resources the check needs (connectivity, paths, grants).
    ///
    /// `Ok(false)` and `Err(_)` are both treated as "not available"; the
    /// distinction only matters for logging.
    fn availability(&self) -> anyhow::Result<bool>;

    /// Run the check for the given job.
    ///
    /// Returns `Ok(None)` when the check completed but examined nothing
    /// worth reporting. That is a success, not a failure.
    fn execute(&self, job_id: JobId) -> anyhow::Result<Option<CheckReport>>;
}

impl std::fmt::Debug for dyn CheckScript {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CheckScript")
            .field("name", &self.name())
            .finish_non_exhaustive()
    }
}

/// Constructor for a fresh script instance.
///
/// The registry maps unit identifiers to factories instead of importing
/// arbitrary code by name; populating the map is an explicit act done at
/// startup or by a validated discovery pass.
pub type ScriptFactory = Box<dyn Fn() -> Box<dyn CheckScript> + Send + Sync>;
