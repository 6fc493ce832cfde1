//! Plugin manager: registration lifecycle of check definitions.
//!
//! Sits between the script registry and the persistence gateway. Discovery
//! of new units never persists anything; registration pins the unit's
//! current content hash; resolution for execution re-verifies that hash so
//! a job only ever runs code matching what was reviewed at registration
//! time.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::model::{CheckDefinition, DefinitionMeta};
use crate::registry::ScriptRegistry;
use crate::script::CheckScript;
use crate::store::CheckStore;
use crate::types::CheckId;

/// Drift detected between a registered definition and the file on disk.
#[derive(Error, Debug)]
pub enum IntegrityError {
    /// The backing file has been deleted since registration.
    #[error("script file missing for registered check: {path}")]
    Missing { path: PathBuf },

    /// The file's content no longer matches the registered digest.
    #[error("script content changed since registration: {path}")]
    HashMismatch { path: PathBuf },
}

/// A not-yet-registered unit found in the script folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewScript {
    /// Unit identifier (file base name).
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    /// Result of the availability probe at discovery time.
    pub ready: bool,
}

/// Integrity state of a registered definition's backing file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// File present, digest matches the registered one.
    Verified,
    /// File has been deleted.
    Missing,
    /// File present but its content changed since registration.
    Drifted,
}

/// Owns the register / update / retire lifecycle of check definitions.
pub struct PluginManager {
    registry: Arc<ScriptRegistry>,
    store: Arc<dyn CheckStore>,
}

impl PluginManager {
    pub fn new(registry: Arc<ScriptRegistry>, store: Arc<dyn CheckStore>) -> Self {
        Self { registry, store }
    }

    pub fn registry(&self) -> &ScriptRegistry {
        &self.registry
    }

    /// Units present in the folder but absent from the store.
    ///
    /// The known-name set includes retired definitions, so a retired
    /// unit's file never resurfaces as "new"; bringing it back is an
    /// explicit `register`. Loads each candidate and probes its
    /// availability. A candidate that fails to load or whose probe errors
    /// is logged and excluded; one bad unit must not hide the others.
    pub fn search_new(&self) -> Result<Vec<NewScript>> {
        let registered: std::collections::BTreeSet<String> = self
            .store
            .all_definitions()?
            .into_iter()
            .map(|d| d.name)
            .collect();

        let mut found = Vec::new();
        for id in self.registry.discover()?.difference(&registered) {
            let script = match self.registry.load(id) {
                Ok(script) => script,
                Err(e) => {
                    warn!(id, error = %e, "skipping undiscoverable script");
                    continue;
                }
            };
            let ready = match script.availability() {
                Ok(ready) => ready,
                Err(e) => {
                    warn!(id, error = %e, "availability probe raised, skipping");
                    continue;
                }
            };
            found.push(NewScript {
                id: id.clone(),
                name: script.name().to_string(),
                description: script.description().to_string(),
                author: script.author().to_string(),
                ready,
            });
        }
        Ok(found)
    }

    /// Register a unit: load it, hash its source, persist the definition.
    pub fn register(&self, id: &str) -> Result<CheckId> {
        let script = self.registry.load(id)?;
        let hash = self.registry.hash(id)?;
        let check_id = self.store.insert_definition(
            DefinitionMeta {
                name: script.name().to_string(),
                description: script.description().to_string(),
                author: script.author().to_string(),
                object_kind: script.object_kind(),
                hash,
            },
            Utc::now(),
        )?;
        info!(id, check_id, "registered check definition");
        Ok(check_id)
    }

    /// Reload the unit behind an existing definition and refresh its
    /// metadata and digest.
    pub fn update(&self, check_id: CheckId) -> Result<()> {
        let def = self.store.read_definition(check_id)?;
        let script = self.registry.load(&def.name)?;
        let hash = self.registry.hash(&def.name)?;
        self.store.update_definition(
            check_id,
            DefinitionMeta {
                name: script.name().to_string(),
                description: script.description().to_string(),
                author: script.author().to_string(),
                object_kind: script.object_kind(),
                hash,
            },
        )?;
        info!(check_id, "updated check definition");
        Ok(())
    }

    /// Set the retirement timestamp. The definition and its history remain.
    pub fn retire(&self, check_id: CheckId, when: DateTime<Utc>) -> Result<()> {
        self.store.retire_definition(check_id, when)?;
        info!(check_id, "retired check definition");
        Ok(())
    }

    /// Reload and hash-verify the unit behind a definition.
    ///
    /// This is the drift-detection gate: it fails with [`IntegrityError`]
    /// when the file was deleted or its content changed since registration.
    pub fn resolve_for_execution(&self, check_id: CheckId) -> Result<Box<dyn CheckScript>> {
        let def = self.store.read_definition(check_id)?;
        let path = self.registry.script_path(&def.name);
        if !path.exists() {
            return Err(IntegrityError::Missing { path }.into());
        }
        if !self.registry.verify_hash(&def.name, &def.hash)? {
            return Err(IntegrityError::HashMismatch { path }.into());
        }
        Ok(self.registry.load(&def.name)?)
    }

    /// Every non-retired definition with the integrity state of its file.
    pub fn audit_definitions(&self) -> Result<Vec<(CheckDefinition, FileStatus)>> {
        let mut audited = Vec::new();
        for def in self.store.all_definitions()? {
            if def.retired_at.is_some() {
                continue;
            }
            let path = self.registry.script_path(&def.name);
            let status = if !path.exists() {
                FileStatus::Missing
            } else if self.registry.verify_hash(&def.name, &def.hash)? {
                FileStatus::Verified
            } else {
                FileStatus::Drifted
            };
            audited.push((def, status));
        }
        Ok(audited)
    }
}
