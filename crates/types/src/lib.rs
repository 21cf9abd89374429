//! # mblock types
//!
//! Types shared by every crate in the workspace:
//!
//! - **[`ServiceError`]**: the structured error surface handed to a transport
//!   layer (`status`, `type`, `message`, `code`, `debug`, `errors`).
//! - **[`Scopes`]**: a permission requirement or claim, either a single scope
//!   string or a list of them.
//! - **[`Record`]**: the field/value mapping stored by storage backends and
//!   inspected by the match engine.

pub mod error;
pub mod scopes;

pub use error::{ErrorCode, ServiceError};
pub use scopes::Scopes;

/// A stored record: an arbitrary field/value mapping that carries an `id` field.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Name of the identifier field every record is keyed by.
pub const RECORD_ID_FIELD: &str = "id";
