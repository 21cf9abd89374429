//! The permission predicate.

use mblock_types::Scopes;
use serde_json::Value;

use crate::ScopeError;

/// Checks that the `required` scopes are met by the caller's `claims`.
///
/// | required | claims | result |
/// |---|---|---|
/// | absent or empty | any | `true` |
/// | single | single | equality |
/// | single | many | membership |
/// | many | single | `false`, one claim never meets a multi-scope requirement |
/// | many | many | every required scope is claimed |
pub fn check(required: Option<&Scopes>, claims: &Scopes) -> bool {
    let Some(required) = required.filter(|required| !required.is_empty()) else {
        return true;
    };

    match (required, claims) {
        (Scopes::Single(required), Scopes::Single(claim)) => required == claim,
        (Scopes::Single(required), Scopes::Many(claims)) => claims.contains(required),
        (Scopes::Many(_), Scopes::Single(_)) => false,
        (Scopes::Many(required), Scopes::Many(claims)) => required.iter().all(|scope| claims.contains(scope)),
    }
}

/// JSON front door for [`check`], used where scopes arrive as untyped values
/// (for example the `scopes` field of a caller's meta).
///
/// `null` or an empty string/array for `required` always passes. Otherwise
/// `claims` must be a string or an array of strings.
pub fn check_value(required: &Value, claims: &Value) -> Result<bool, ScopeError> {
    let required = match required {
        Value::Null => None,
        other => Some(scopes_from_value(other).map_err(ScopeError::invalid_requirement_type)?),
    };
    if required.as_ref().is_none_or(Scopes::is_empty) {
        return Ok(true);
    }

    let claims = scopes_from_value(claims).map_err(ScopeError::invalid_claim_type)?;
    Ok(check(required.as_ref(), &claims))
}

fn scopes_from_value(value: &Value) -> Result<Scopes, String> {
    match value {
        Value::String(scope) => Ok(Scopes::Single(scope.clone())),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(str::to_string).ok_or_else(|| describe(item)))
            .collect::<Result<Vec<_>, _>>()
            .map(Scopes::Many),
        other => Err(describe(other)),
    }
}

fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
    .to_string()
}
