//! Payload steps: merging trusted meta into input, and model-backed
//! validation and formatting.

use mblock_types::ServiceError;
use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::{USER_ID_KEY, is_truthy};
use crate::{Context, Step, executor::json_type, model::Model};

/// Field written by [`set_owner_id`] when no field name is given.
pub const OWNER_ID_FIELD: &str = "ownerId";

/// Copies `meta[from]` into `input[to]` for every `(to, from)` pair.
///
/// Pairs whose meta key is absent are skipped. The merged input becomes the
/// output; with an empty keymap the input is handed on untouched.
pub fn merge_from_meta<I, K, V>(keymap: I) -> Step
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    let keymap: Vec<(String, String)> = keymap.into_iter().map(|(to, from)| (to.into(), from.into())).collect();
    Step::sync(move |ctx, _| {
        if keymap.is_empty() {
            return Ok(ctx.input().clone());
        }
        let mut merged = input_object(ctx)?;
        for (to, from) in &keymap {
            if let Some(value) = ctx.meta().get(from) {
                merged.insert(to.clone(), value.clone());
            }
        }
        Ok(Value::Object(merged))
    })
}

/// Stamps the caller as owner unless the input already names one.
///
/// When `input[field]` is not set, stores `meta.userId` as `state.ownerId`
/// and adds it to the output under `field`. An empty `field` means
/// [`OWNER_ID_FIELD`].
pub fn set_owner_id(field: impl Into<String>) -> Step {
    let field = match field.into() {
        field if field.is_empty() => OWNER_ID_FIELD.to_string(),
        field => field,
    };
    Step::sync(move |ctx, output: Value| {
        if is_truthy(ctx.input().get(&field)) {
            return Ok(output);
        }
        let owner = ctx.meta().get(USER_ID_KEY).cloned().unwrap_or(Value::Null);
        ctx.state().insert(OWNER_ID_FIELD, owner.clone());

        let mut stamped = match output {
            Value::Object(record) => record,
            Value::Null => Map::new(),
            other => {
                return Err(ServiceError::bad_request()
                    .with_message(format!("cannot set '{field}' on a {} output", json_type(&other))));
            }
        };
        stamped.insert(field.clone(), owner);
        Ok(Value::Object(stamped))
    })
}

/// Validates the input against the block's model and hands it on.
pub fn validate_input() -> Step {
    Step::sync(|ctx, _| {
        validate(ctx, ctx.input())?;
        Ok(ctx.input().clone())
    })
}

/// Validates the previous output against the block's model and hands it on.
pub fn validate_output() -> Step {
    Step::sync(|ctx, output: Value| {
        validate(ctx, &output)?;
        Ok(output)
    })
}

/// Formats the input with the block's model.
pub fn format_input() -> Step {
    Step::sync(|ctx, _| Ok(require_model(ctx)?.format(ctx.input())))
}

/// Formats the previous output with the block's model.
pub fn format_output() -> Step {
    Step::sync(|ctx, output: Value| Ok(require_model(ctx)?.format(&output)))
}

/// Fails 400 `Validation` when the input carries keys the model does not declare.
pub fn prevent_bogus_payload_keys() -> Step {
    Step::sync(|ctx, output: Value| {
        let unknown = require_model(ctx)?.unknown_keys(ctx.input());
        if unknown.is_empty() {
            Ok(output)
        } else {
            Err(ServiceError::validation().with_message(format!("Invalid keys in payload: {}", unknown.join(", "))))
        }
    })
}

/// Hands on the caller's input, discarding the previous output.
pub fn take_input() -> Step {
    Step::sync(|ctx, _| Ok(ctx.input().clone()))
}

/// Logs the output at debug level and hands it on.
pub fn debug(message: impl Into<String>) -> Step {
    let message = message.into();
    Step::sync(move |ctx, output: Value| {
        debug!(path = %ctx.path(), output = %output, "{message}");
        Ok(output)
    })
}

fn require_model(ctx: &Context) -> Result<&dyn Model, ServiceError> {
    ctx.model().ok_or_else(|| {
        warn!(path = %ctx.path(), "method block has no model but uses a model step");
        ServiceError::new(500, "Validation").with_message("Method block definition is missing a model")
    })
}

fn validate(ctx: &Context, data: &Value) -> Result<(), ServiceError> {
    require_model(ctx)?.validate(data).map_err(|errors| {
        debug!(path = %ctx.path(), errors = %errors, "validation failed");
        ServiceError::validation().with_message("Data validation failed").with_errors(errors)
    })
}

fn input_object(ctx: &Context) -> Result<Map<String, Value>, ServiceError> {
    match ctx.input() {
        Value::Object(input) => Ok(input.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(ServiceError::bad_request().with_message(format!("expected an object payload, found {}", json_type(other)))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        MethodBlock,
        middleware::testing::{apply, context},
        model::{FieldKind, FieldModel, FieldSpec},
    };
    use serde_json::json;

    fn modelled() -> MethodBlock {
        MethodBlock::new("posts.create").step(take_input()).model(
            FieldModel::new()
                .field("title", FieldSpec::required().of_kind(FieldKind::String))
                .field("draft", FieldSpec::optional().with_default(json!(true))),
        )
    }

    #[tokio::test]
    async fn merge_from_meta_overwrites_present_keys_only() {
        let ctx = context(&modelled(), json!({"title": "t", "authorId": "spoofed"}), json!({"userId": "u1"}));
        let step = merge_from_meta([("authorId", "userId"), ("orgId", "orgId")]);
        let merged = apply(&step, &ctx, Value::Null).await.expect("merge");
        assert_eq!(merged, json!({"title": "t", "authorId": "u1"}));
    }

    #[tokio::test]
    async fn merge_from_meta_without_keymap_returns_input() {
        let ctx = context(&modelled(), json!("raw"), json!({}));
        let step = merge_from_meta(Vec::<(String, String)>::new());
        assert_eq!(apply(&step, &ctx, Value::Null).await.expect("merge"), json!("raw"));
    }

    #[tokio::test]
    async fn set_owner_id_stamps_output_and_state() {
        let ctx = context(&modelled(), json!({"title": "t"}), json!({"userId": "u1"}));
        let stamped = apply(&set_owner_id("authorId"), &ctx, json!({"title": "t"})).await.expect("stamp");
        assert_eq!(stamped, json!({"title": "t", "authorId": "u1"}));
        assert_eq!(ctx.state().get("ownerId"), Some(json!("u1")));

        let defaulted = apply(&set_owner_id(""), &ctx, json!({})).await.expect("stamp");
        assert_eq!(defaulted, json!({"ownerId": "u1"}));
    }

    #[tokio::test]
    async fn set_owner_id_keeps_an_explicit_owner() {
        let ctx = context(&modelled(), json!({"ownerId": "u9"}), json!({"userId": "u1"}));
        let output = apply(&set_owner_id("ownerId"), &ctx, json!({"ownerId": "u9"})).await.expect("pass");
        assert_eq!(output, json!({"ownerId": "u9"}));
        assert!(!ctx.state().contains_key("ownerId"));
    }

    #[tokio::test]
    async fn validation_failures_carry_field_errors() {
        let ctx = context(&modelled(), json!({"draft": false}), json!({}));
        let error = apply(&validate_input(), &ctx, Value::Null).await.expect_err("title missing");
        assert_eq!((error.status, error.kind.as_str()), (Some(400), "Validation"));
        assert_eq!(error.errors, Some(json!({"title": "is required"})));

        let valid = apply(&validate_output(), &ctx, json!({"title": "ok"})).await.expect("valid output");
        assert_eq!(valid, json!({"title": "ok"}));
    }

    #[tokio::test]
    async fn model_steps_without_model_are_internal_errors() {
        let bare = MethodBlock::new("bare").step(take_input());
        let ctx = context(&bare, json!({}), json!({}));
        for step in [validate_input(), format_output(), prevent_bogus_payload_keys()] {
            let error = apply(&step, &ctx, Value::Null).await.expect_err("no model");
            assert_eq!((error.status, error.kind.as_str()), (Some(500), "Validation"));
        }
    }

    #[tokio::test]
    async fn formatting_applies_model_defaults() {
        let ctx = context(&modelled(), json!({"title": "a"}), json!({}));
        assert_eq!(apply(&format_input(), &ctx, Value::Null).await.expect("format"), json!({"title": "a", "draft": true}));
        assert_eq!(apply(&format_output(), &ctx, json!({"title": "b", "draft": false})).await.expect("format"), json!({"title": "b", "draft": false}));
    }

    #[tokio::test]
    async fn bogus_payload_keys_are_rejected() {
        let ctx = context(&modelled(), json!({"title": "a", "admin": true}), json!({}));
        let error = apply(&prevent_bogus_payload_keys(), &ctx, Value::Null).await.expect_err("bogus key");
        assert_eq!(error.kind, "Validation");
        assert_eq!(error.message, "Invalid keys in payload: admin");
    }
}
