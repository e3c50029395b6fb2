//! Coordinator configuration
//!
//! Loaded from TOML, then optionally overridden from the environment:
//!
//! ```toml
//! consistency = "written"
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tandem_core::{Consistency, MutationError, Result};

/// Environment variable that overrides [`CoordinatorConfig::consistency`].
pub const CONSISTENCY_ENV_VAR: &str = "TANDEM_CONSISTENCY";

/// Settings fixed for the lifetime of a coordinator
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Checkpoint every coordinated write waits for
    pub consistency: Consistency,
}

impl CoordinatorConfig {
    /// Create a configuration with the given consistency level.
    pub fn new(consistency: Consistency) -> Self {
        Self { consistency }
    }

    /// Parse a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| MutationError::invalid(format!("Invalid TOML: {e}")))
    }

    /// Load configuration from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            MutationError::invalid(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;
        Self::from_toml_str(&content)
    }

    /// Apply overrides from `(name, value)` pairs, ignoring unrelated names.
    pub fn merge_with_vars<I, K, V>(&mut self, vars: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            if key.as_ref() == CONSISTENCY_ENV_VAR {
                self.consistency = value.as_ref().parse()?;
            }
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn merge_with_env(&mut self) -> Result<()> {
        self.merge_with_vars(std::env::vars())
    }
}
