//! A check that audits the files under a target directory.
//!
//! Walks the tree, counts every file it sees, and reports one finding per
//! file, flagging extensionless files as warnings.

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

use crate::model::Finding;
use crate::script::{CheckReport, CheckScript};
use crate::types::{JobId, ObjectKind, Severity};

/// Directory audit check.
pub struct FileAuditCheck {
    name: String,
    target: PathBuf,
}

impl FileAuditCheck {
    /// Audit `target`, reporting under the given unit identifier.
    pub fn new(name: impl Into<String>, target: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
        }
    }

    fn walk(
        &self,
        dir: &Path,
        examined: &mut i64,
        findings: &mut Vec<Finding>,
    ) -> anyhow::Result<()> {
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                self.walk(&path, examined, findings)?;
                continue;
            }
            if !file_type.is_file() {
                continue;
            }
            *examined += 1;

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let severity = if path.extension().is_some() {
                Severity::Trivial
            } else {
                Severity::Warning
            };
            let modified: Option<DateTime<Utc>> = entry
                .metadata()
                .and_then(|m| m.modified())
                .ok()
                .map(DateTime::from);
            findings.push(Finding {
                name: file_name,
                identifier: path.display().to_string(),
                comment: None,
                author: Some(self.author().to_string()),
                occurred_at: modified,
                severity,
            });
        }
        Ok(())
    }
}

impl CheckScript for FileAuditCheck {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "audits files under the target directory"
    }

    fn author(&self) -> &str {
        "checkrun"
    }

    fn object_kind(&self) -> ObjectKind {
        ObjectKind::File
    }

    fn availability(&self) -> anyhow::Result<bool> {
        Ok(self.target.is_dir())
    }

    fn execute(&self, _job_id: JobId) -> anyhow::Result<Option<CheckReport>> {
        let mut examined = 0;
        let mut findings = Vec::new();
        self.walk(&self.target, &mut examined, &mut findings)?;
        if examined == 0 {
            return Ok(None);
        }
        Ok(Some(CheckReport {
            object_count: examined,
            findings,
        }))
    }
}
