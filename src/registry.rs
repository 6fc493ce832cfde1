//! Script registry and loader.
//!
//! Maps stable unit identifiers to factories, discovers candidate files in
//! the configured folder, and computes content digests. Loading is
//! deliberately decoupled from hashing: diffing the directory listing
//! against registered names never instantiates any unit, while `load`
//! always produces a fresh instance so availability and update flows can
//! confirm the contract is satisfiable.
//!
//! There is no import-by-name here. A unit only becomes loadable once a
//! factory for its identifier has been registered explicitly, and
//! registration validates the instance against its identifier up front.

use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::debug;

use crate::config::ScriptDirConfig;
use crate::hash::{self, ContentHash};
use crate::script::{CheckScript, ScriptFactory};

/// Errors raised while resolving or instantiating a unit.
#[derive(Error, Debug)]
pub enum LoadError {
    /// The backing file is not on disk.
    #[error("script file does not exist: {path}")]
    FileMissing { path: PathBuf },

    /// No factory has been registered for the identifier.
    #[error("no script registered under identifier '{id}'")]
    NotRegistered { id: String },

    /// The instance does not satisfy the capability contract.
    #[error("script '{id}' violates its contract: {reason}")]
    Contract { id: String, reason: String },

    /// Reading the unit's source failed.
    #[error("failed to read script '{id}': {source}")]
    Read {
        id: String,
        #[source]
        source: io::Error,
    },
}

/// Registry of loadable check units.
pub struct ScriptRegistry {
    config: ScriptDirConfig,
    factories: HashMap<String, ScriptFactory>,
}

impl ScriptRegistry {
    pub fn new(config: ScriptDirConfig) -> Self {
        Self {
            config,
            factories: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ScriptDirConfig {
        &self.config
    }

    /// Register a factory under a unit identifier.
    ///
    /// Instantiates the unit once to validate the contract: the instance's
    /// `name()` must equal the identifier (the same rule the filesystem
    /// convention imposes on file base names). The probe instance is
    /// discarded.
    pub fn register_factory(
        &mut self,
        id: impl Into<String>,
        factory: ScriptFactory,
    ) -> Result<(), LoadError> {
        let id = id.into();
        let probe = factory();
        if probe.name() != id {
            return Err(LoadError::Contract {
                reason: format!("unit reports name '{}'", probe.name()),
                id,
            });
        }
        if probe.description().is_empty() {
            return Err(LoadError::Contract {
                id,
                reason: "unit reports an empty description".into(),
            });
        }
        debug!(id, "registered script factory");
        self.factories.insert(id, factory);
        Ok(())
    }

    /// Identifiers with a registered factory.
    pub fn registered_ids(&self) -> BTreeSet<String> {
        self.factories.keys().cloned().collect()
    }

    /// List unit identifiers of qualifying files in the configured folder.
    ///
    /// Pure filesystem read: nothing is instantiated, nothing is verified.
    pub fn discover(&self) -> io::Result<BTreeSet<String>> {
        let mut found = BTreeSet::new();
        for entry in std::fs::read_dir(&self.config.folder)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if self.config.matches(name) {
                if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                    found.insert(stem.to_string());
                }
            }
        }
        debug!(count = found.len(), "discovered script files");
        Ok(found)
    }

    /// Path of the file backing an identifier.
    pub fn script_path(&self, id: &str) -> PathBuf {
        self.config.script_path(id)
    }

    /// Resolve an identifier to a fresh script instance.
    ///
    /// Fails if the backing file is gone or no factory is registered. Each
    /// call constructs a new instance; nothing is cached across calls.
    pub fn load(&self, id: &str) -> Result<Box<dyn CheckScript>, LoadError> {
        let path = self.script_path(id);
        if !path.exists() {
            return Err(LoadError::FileMissing { path });
        }
        let factory = self
            .factories
            .get(id)
            .ok_or_else(|| LoadError::NotRegistered { id: id.to_string() })?;
        Ok(factory())
    }

    /// Digest of the unit's current source on disk.
    pub fn hash(&self, id: &str) -> Result<ContentHash, LoadError> {
        ContentHash::of_file(self.script_path(id)).map_err(|source| LoadError::Read {
            id: id.to_string(),
            source,
        })
    }

    /// Recompute and compare against a stored digest.
    pub fn verify_hash(&self, id: &str, expected: &ContentHash) -> Result<bool, LoadError> {
        hash::verify_file(self.script_path(id), expected).map_err(|source| LoadError::Read {
            id: id.to_string(),
            source,
        })
    }
}
