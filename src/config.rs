//! Application configuration.
//!
//! Loaded from a JSON file, mirroring the layout the operators already
//! maintain: a `scripts` section describing where check units live and how
//! their files are named.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Where check-script files live and how they are named.
///
/// A qualifying file is `<folder>/<prefix><rest>.<extension>`; its unit
/// identifier is the base name without the extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptDirConfig {
    /// Directory scanned for check units.
    pub folder: PathBuf,
    /// Required file-name prefix, e.g. `chk_`.
    #[serde(default)]
    pub prefix: String,
    /// File extension without the dot.
    #[serde(default = "default_extension")]
    pub extension: String,
}

fn default_extension() -> String {
    "chk".to_string()
}

impl ScriptDirConfig {
    pub fn new(folder: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            folder: folder.into(),
            prefix: prefix.into(),
            extension: default_extension(),
        }
    }

    /// Full path of the file backing a unit identifier.
    pub fn script_path(&self, id: &str) -> PathBuf {
        self.folder.join(format!("{}.{}", id, self.extension))
    }

    /// Whether a file name matches the `prefix*.extension` convention.
    pub fn matches(&self, file_name: &str) -> bool {
        file_name.starts_with(&self.prefix)
            && Path::new(file_name)
                .extension()
                .is_some_and(|ext| ext == self.extension.as_str())
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    pub scripts: ScriptDirConfig,
}

impl AppConfig {
    /// Load and validate a configuration file.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("invalid config JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.scripts.folder.as_os_str().is_empty() {
            return Err(Error::config("scripts.folder must not be empty"));
        }
        if self.scripts.extension.is_empty() {
            return Err(Error::config("scripts.extension must not be empty"));
        }
        if self.scripts.extension.starts_with('.') {
            return Err(Error::config(
                "scripts.extension is written without the leading dot",
            ));
        }
        Ok(())
    }
}
