//! Ready-made steps for method blocks.
//!
//! - [`verify`]: authentication, scope and result checks
//! - [`data`]: payload merging, validation and formatting via the block's model
//! - [`db`]: storage reads and writes through a [`Storage`](mblock_query::Storage)
//!
//! Every function here returns a [`Step`](crate::Step); add it to a block
//! with [`MethodBlock::step`](crate::MethodBlock::step) or inside
//! [`compose`](crate::compose).

use serde_json::Value;

pub mod data;
pub mod db;
pub mod verify;

/// Meta key holding the authenticated caller's id.
pub const USER_ID_KEY: &str = "userId";
/// Meta key holding the caller's scope claims.
pub const SCOPES_KEY: &str = "scopes";
/// Meta key holding the id of the resource a request targets.
pub const RESOURCE_ID_KEY: &str = "resourceId";

/// Truthiness of an optional JSON value: absent, `null`, `false`, `0` and `""` are false.
pub(crate) fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => false,
        Some(Value::Number(number)) => number.as_f64().is_some_and(|number| number != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(_) => true,
    }
}
