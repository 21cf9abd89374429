//! Role grant configuration.
//!
//! Roles can be declared in a YAML (or JSON) document instead of code:
//!
//! ```yaml
//! roles:
//!   user:
//!     scopes: ["posts:read", "profile:write"]
//!   admin:
//!     scopes: posts:write
//!     include: user
//! ```
//!
//! Roles are granted in document order, so an included role must be declared
//! before the roles that include it.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use dirs_next::config_dir;
use indexmap::IndexMap;
use mblock_types::Scopes;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::ScopeRegistry;

static NAME_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9:._*/-]*$").expect("valid name pattern"));

/// Environment variable overriding the roles file location.
pub const ROLES_PATH_ENV: &str = "MBLOCK_ROLES_PATH";

/// Parsed roles document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RolesConfig {
    #[serde(default)]
    pub roles: IndexMap<String, RoleGrant>,
}

/// Scopes granted to a single role.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RoleGrant {
    #[serde(default)]
    pub scopes: Scopes,
    /// Roles whose scopes are copied into this one.
    #[serde(default, deserialize_with = "deserialize_one_or_many")]
    pub include: Vec<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read roles file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse roles file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("Role '{role}' includes '{include}', which is not declared before it")]
    UnknownInclude { role: String, include: String },
}

impl RolesConfig {
    /// Parses a YAML or JSON roles document.
    pub fn parse(content: &str, origin: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Parse {
            path: origin.to_path_buf(),
            source,
        })
    }

    /// Checks names and include ordering without touching a registry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (position, (role, grant)) in self.roles.iter().enumerate() {
            validate_name(role)?;
            for scope in grant.scopes.iter() {
                validate_name(scope)?;
            }
            for include in &grant.include {
                let declared_before = self.roles.get_index_of(include).is_some_and(|index| index < position);
                if !declared_before {
                    return Err(ConfigError::UnknownInclude {
                        role: role.clone(),
                        include: include.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    /// Grants every role, in document order, into `registry`.
    pub fn apply(&self, registry: &mut ScopeRegistry) -> Result<(), ConfigError> {
        self.validate()?;
        for (role, grant) in &self.roles {
            registry
                .grant_role_including(role.clone(), grant.scopes.clone(), &grant.include)
                .map_err(|_| ConfigError::UnknownInclude {
                    role: role.clone(),
                    include: grant.include.join(", "),
                })?;
        }
        debug!(role_count = self.roles.len(), "applied roles configuration");
        Ok(())
    }
}

/// Returns the default roles file path.
pub fn default_roles_path() -> PathBuf {
    if let Ok(path) = env::var(ROLES_PATH_ENV)
        && !path.trim().is_empty()
    {
        return PathBuf::from(path);
    }

    config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mblock")
        .join("roles.yaml")
}

/// Loads and validates a roles file. A missing file yields an empty configuration.
pub fn load_roles_from_path(path: &Path) -> Result<RolesConfig, ConfigError> {
    if !path.exists() {
        debug!(path = %path.display(), "roles file not found; using empty configuration");
        return Ok(RolesConfig::default());
    }

    let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = RolesConfig::parse(&content, path)?;
    config.validate()?;
    Ok(config)
}

fn validate_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: "names cannot be empty".to_string(),
        });
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(ConfigError::InvalidName {
            name: name.to_string(),
            reason: "names may only contain letters, digits and ':', '.', '_', '*', '/', '-'".to_string(),
        });
    }
    Ok(())
}

fn deserialize_one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Scopes::deserialize(deserializer)?.into_vec())
}
