//! Configuration handling for polaris.
//!
//! Settings come from `polaris.toml` in the working directory (or the file
//! named by `--config`); command-line flags override file values.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PolarisError;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = "polaris.toml";

/// Polaris configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PolarisConfig {
    /// Project name reported in file handles and links.
    #[serde(default = "default_project")]
    pub project: String,

    /// Directory served as the project root.
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Choices requested per autocomplete query.
    #[serde(default = "default_complete_limit")]
    pub complete_limit: usize,

    /// Hits returned per search.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Suffix of the JSON sidecar holding a file's usages.
    #[serde(default = "default_usages_suffix")]
    pub usages_suffix: String,

    /// Suffix of the JSON sidecar holding the types a file declares.
    #[serde(default = "default_types_suffix")]
    pub types_suffix: String,
}

fn default_project() -> String {
    "default".to_string()
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_complete_limit() -> usize {
    8
}

fn default_search_limit() -> usize {
    20
}

fn default_usages_suffix() -> String {
    ".usages.json".to_string()
}

fn default_types_suffix() -> String {
    ".types.json".to_string()
}

impl Default for PolarisConfig {
    fn default() -> Self {
        Self {
            project: default_project(),
            root: default_root(),
            complete_limit: default_complete_limit(),
            search_limit: default_search_limit(),
            usages_suffix: default_usages_suffix(),
            types_suffix: default_types_suffix(),
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub project: Option<String>,
    pub root: Option<PathBuf>,
}

impl PolarisConfig {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self, PolarisError> {
        let content = fs::read_to_string(path).map_err(|e| PolarisError::Config {
            message: format!("failed to read config file {}: {}", path.display(), e),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, PolarisError> {
        toml::from_str(content).map_err(|e| PolarisError::Config {
            message: format!("failed to parse config file: {}", e),
        })
    }

    /// Load `explicit` if given (it must exist), else `polaris.toml` in `dir`
    /// when present, else defaults.
    pub fn discover(explicit: Option<&Path>, dir: &Path) -> Result<Self, PolarisError> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        let path = dir.join(CONFIG_FILE);
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply(mut self, overrides: CliOverrides) -> Self {
        if let Some(project) = overrides.project {
            self.project = project;
        }
        if let Some(root) = overrides.root {
            self.root = root;
        }
        self
    }
}
