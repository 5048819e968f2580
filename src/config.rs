//! Config file loading and validation.
//!
//! The config is a TOML file with one `[[projects]]` block per Uploadcare
//! project to dump. Field names match the API's camelCase convention:
//!
//! ```toml
//! [[projects]]
//! name = "my-project"
//! publicKey = "demopublickey"
//! secretKey = "demosecretkey"
//! ```
//!
//! Validation collects every problem into one [`ConfigError::Invalid`] so
//! an operator can fix the whole file in one pass.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Credentials for one Uploadcare project.
///
/// `name` doubles as the output directory name for the project's dump.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCredential {
    /// Project name, unique within the config.
    #[serde(default)]
    pub name: String,
    /// API public key, unique within the config.
    #[serde(default)]
    pub public_key: String,
    /// API secret key, used to sign requests.
    #[serde(default)]
    pub secret_key: String,
}

/// The parsed config file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Projects to dump, in file order.
    #[serde(default)]
    pub projects: Vec<ProjectCredential>,
}

/// A single problem found while validating a config.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigIssue {
    /// The config has no `[[projects]]` blocks at all.
    #[error("create a [[projects]] block for each project you want to dump")]
    NoProjects,

    /// A project is missing a required field.
    #[error("project {index}: set \"{field}\" for each project")]
    MissingField {
        /// Zero-based position of the project in the config.
        index: usize,
        /// The missing field, in its TOML spelling.
        field: &'static str,
    },

    /// Two projects share the same name.
    #[error("each project should have a unique name; name {name:?} appears more than once")]
    DuplicateName {
        /// The repeated name.
        name: String,
    },

    /// Two projects share the same public key.
    #[error("each project should have a unique publicKey; publicKey for {name:?} is also used by {other:?}")]
    DuplicatePublicKey {
        /// The later project using the key.
        name: String,
        /// The earlier project that already used it.
        other: String,
    },
}

/// Errors from loading or validating a config file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Read {
        /// Path that was attempted.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        /// Path that was attempted.
        path: PathBuf,
        /// The underlying TOML error.
        #[source]
        source: toml::de::Error,
    },

    /// The config parsed but its contents are invalid.
    #[error("invalid config:\n{}", join_issues(.issues))]
    Invalid {
        /// Every problem found, in config order.
        issues: Vec<ConfigIssue>,
    },
}

fn join_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}

impl Config {
    /// Loads and parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Read`] if the file cannot be read and
    /// [`ConfigError::Parse`] if it is not valid TOML. Call
    /// [`validate`](Self::validate) afterwards to check the contents.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Returns every validation problem in the config, in config order.
    #[must_use]
    pub fn issues(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.projects.is_empty() {
            issues.push(ConfigIssue::NoProjects);
            return issues;
        }

        let mut names: HashMap<&str, usize> = HashMap::new();
        let mut public_keys: HashMap<&str, &str> = HashMap::new();

        for (index, project) in self.projects.iter().enumerate() {
            if project.name.is_empty() {
                issues.push(ConfigIssue::MissingField {
                    index,
                    field: "name",
                });
            }
            if project.public_key.is_empty() {
                issues.push(ConfigIssue::MissingField {
                    index,
                    field: "publicKey",
                });
            }
            if project.secret_key.is_empty() {
                issues.push(ConfigIssue::MissingField {
                    index,
                    field: "secretKey",
                });
            }
            if !project.name.is_empty() && names.insert(&project.name, index).is_some() {
                issues.push(ConfigIssue::DuplicateName {
                    name: project.name.clone(),
                });
            }
            if !project.public_key.is_empty() {
                if let Some(other) = public_keys.insert(&project.public_key, &project.name) {
                    issues.push(ConfigIssue::DuplicatePublicKey {
                        name: project.name.clone(),
                        other: other.to_string(),
                    });
                }
            }
        }

        issues
    }

    /// Validates the config contents.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] carrying every problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid { issues })
        }
    }
}
