//! Verification steps. Each passes the previous output through unchanged
//! when its check holds and fails with the matching business error otherwise.

use mblock_scopes::{ScopeError, check};
use mblock_types::{RECORD_ID_FIELD, Scopes, ServiceError};
use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

use super::{SCOPES_KEY, USER_ID_KEY, is_truthy};
use crate::{Context, Step, executor::json_type};

/// Fails 401 `NotLoggedIn` unless `meta.userId` is truthy.
pub fn verify_authed() -> Step {
    Step::sync(|ctx, output| {
        if is_truthy(ctx.meta().get(USER_ID_KEY)) {
            Ok(output)
        } else {
            Err(ServiceError::not_logged_in().with_message("Must provide valid credentials"))
        }
    })
}

/// Whether the caller's `meta.scopes` claims satisfy the block's required scopes.
///
/// Missing claims count as an empty list. Claims that are neither a string nor
/// a list of strings are a `ScopeError`.
pub fn has_scopes(ctx: &Context) -> Result<bool, ScopeError> {
    trace!(path = %ctx.path(), required = ?ctx.scopes(), "checking scopes");
    let claims = match ctx.meta().get(SCOPES_KEY) {
        None | Some(Value::Null) => Scopes::default(),
        Some(claims) => Scopes::deserialize(claims).map_err(|_| ScopeError::invalid_claim_type(json_type(claims)))?,
    };
    Ok(check(ctx.scopes(), &claims))
}

/// Fails 403 `Forbidden` unless [`has_scopes`] holds.
pub fn verify_scopes() -> Step {
    Step::sync(|ctx, output| {
        if has_scopes(ctx)? {
            Ok(output)
        } else {
            Err(ServiceError::forbidden().with_message("Insufficient permissions to access this resource"))
        }
    })
}

/// Fails 403 `Forbidden` when `meta[field]` is absent.
pub fn has_meta(field: impl Into<String>) -> Step {
    let field = field.into();
    Step::sync(move |ctx, output| {
        if ctx.meta().contains_key(&field) {
            Ok(output)
        } else {
            Err(ServiceError::forbidden())
        }
    })
}

/// Fails 401 `Unauthorized` when `meta[field]` is absent or falsy.
pub fn has_auth(field: impl Into<String>) -> Step {
    let field = field.into();
    Step::sync(move |ctx, output| {
        if is_truthy(ctx.meta().get(&field)) {
            Ok(output)
        } else {
            Err(ServiceError::unauthorized())
        }
    })
}

/// Fails 404 `NoResults` when the output is falsy, an empty list, or an object without an `id`.
pub fn verify_found() -> Step {
    Step::sync(|_, output: Value| {
        let found = match &output {
            Value::Array(items) => !items.is_empty(),
            Value::Object(record) => is_truthy(record.get(RECORD_ID_FIELD)),
            other => is_truthy(Some(other)),
        };
        if found { Ok(output) } else { Err(ServiceError::no_results()) }
    })
}

/// Fails 404 `NotFound` when the output is `null` or an empty list.
pub fn result_exists() -> Step {
    Step::sync(|_, output: Value| match &output {
        Value::Null => Err(ServiceError::not_found()),
        Value::Array(items) if items.is_empty() => Err(ServiceError::not_found()),
        _ => Ok(output),
    })
}

/// Fails 403 `Forbidden` unless `output[result_field]` equals `meta[meta_field]`.
pub fn result_matches_meta(result_field: impl Into<String>, meta_field: impl Into<String>) -> Step {
    let result_field = result_field.into();
    let meta_field = meta_field.into();
    Step::sync(move |ctx, output: Value| {
        let matched = match (output.get(&result_field), ctx.meta().get(&meta_field)) {
            (Some(result), Some(meta)) => result == meta,
            _ => false,
        };
        if matched { Ok(output) } else { Err(ServiceError::forbidden()) }
    })
}

/// Fails 403 `Forbidden` unless `output[field]` equals `meta.userId`.
pub fn verify_ownership_on_field(field: impl Into<String>) -> Step {
    let field = field.into();
    Step::sync(move |ctx, output: Value| {
        let owned = match (output.get(&field), ctx.meta().get(USER_ID_KEY)) {
            (Some(owner), Some(user)) => owner == user,
            _ => false,
        };
        if owned {
            Ok(output)
        } else {
            Err(ServiceError::forbidden().with_message("No permission to do that on this resource"))
        }
    })
}
