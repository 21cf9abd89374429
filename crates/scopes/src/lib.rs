//! # mblock scopes
//!
//! Authorization scopes for method blocks.
//!
//! - **[`ScopeRegistry`]**: maps roles to flattened scope sets and records
//!   which scopes each method path requires.
//! - **[`check`]**: the permission predicate comparing required scopes with
//!   the claims a caller presents.
//! - **[`config`]**: loads role grants from a YAML/JSON file.
//!
//! The registry is an explicit value. Build it during startup, then share it
//! read-only (or behind a lock if it must change while requests are in flight).
//!
//! ```rust
//! use mblock_scopes::{ScopeRegistry, check};
//! use mblock_types::Scopes;
//!
//! let mut registry = ScopeRegistry::new();
//! registry.grant_role("user", ["read"]);
//! registry.grant_role_including("admin", ["write"], ["user"]).unwrap();
//!
//! let claims = Scopes::from(registry.scopes_by_role(["admin"]));
//! assert!(check(Some(&Scopes::from(["read", "write"])), &claims));
//! ```

pub mod check;
pub mod config;
pub mod error;
pub mod registry;

pub use check::{check, check_value};
pub use config::{ConfigError, RoleGrant, RolesConfig, default_roles_path, load_roles_from_path};
pub use error::ScopeError;
pub use registry::ScopeRegistry;
