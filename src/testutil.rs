//! Shared helpers for unit tests.

use crate::model::Finding;
use crate::script::{CheckReport, CheckScript};
use crate::types::{JobId, ObjectKind};

/// Write a throwaway script folder with the given file names.
pub(crate) fn script_dir(files: &[&str]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("failed to create temp script dir");
    for name in files {
        std::fs::write(dir.path().join(name), format!("body of {name}\n"))
            .expect("failed to write script file");
    }
    dir
}

enum Availability {
    Available,
    Unavailable,
    Raises(String),
}

enum Execution {
    Empty,
    Report(CheckReport),
    Raises(String),
}

/// Configurable in-memory check used throughout the unit tests.
pub(crate) struct StubCheck {
    name: String,
    availability: Availability,
    execution: Execution,
}

impl StubCheck {
    /// Available check whose execute completes with no findings.
    pub(crate) fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            availability: Availability::Available,
            execution: Execution::Empty,
        }
    }

    pub(crate) fn unavailable(mut self) -> Self {
        self.availability = Availability::Unavailable;
        self
    }

    pub(crate) fn availability_raises(mut self, msg: &str) -> Self {
        self.availability = Availability::Raises(msg.to_string());
        self
    }

    pub(crate) fn execute_raises(mut self, msg: &str) -> Self {
        self.execution = Execution::Raises(msg.to_string());
        self
    }

    pub(crate) fn with_report(mut self, object_count: i64, findings: Vec<Finding>) -> Self {
        self.execution = Execution::Report(CheckReport {
            object_count,
            findings,
        });
        self
    }
}

impl CheckScript for StubCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "stub check for tests"
    }

    fn author(&self) -> &str {
        "tests"
    }

    fn object_kind(&self) -> ObjectKind {
        ObjectKind::File
    }

    fn availability(&self) -> anyhow::Result<bool> {
        match &self.availability {
            Availability::Available => Ok(true),
            Availability::Unavailable => Ok(false),
            Availability::Raises(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }

    fn execute(&self, _job_id: JobId) -> anyhow::Result<Option<CheckReport>> {
        match &self.execution {
            Execution::Empty => Ok(None),
            Execution::Report(report) => Ok(Some(report.clone())),
            Execution::Raises(msg) => Err(anyhow::anyhow!("{msg}")),
        }
    }
}
