//! Chain executor: runs a method block's steps against one context.
//!
//! - [`run`] validates the block synchronously, builds the [`Context`] and
//!   returns the future that drives the chain
//! - [`compose`] packs several steps into one, run as a sub-chain against the
//!   same context without its step list
//! - `fold::sequential_fold` is the loop underneath both, with the
//!   "step output must not be a step" check as its guard

use std::sync::Arc;

use futures_util::future::{BoxFuture, FutureExt};
use mblock_types::ServiceError;
use serde_json::{Map, Value, json};
use thiserror::Error;
use tracing::debug;

use crate::{
    block::{MethodBlock, Step, StepOutput},
    context::Context,
};

pub mod fold;
pub use fold::sequential_fold;

/// Future driving one run; resolves with the last step's output or the first error.
pub type ChainRun = BoxFuture<'static, Result<Value, ServiceError>>;

/// Problems with a block definition, reported before anything executes.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("method block is missing a path")]
    MissingPath,

    #[error("method block '{path}' has no steps")]
    MissingSteps { path: String },

    #[error("meta for method block '{path}' must be an object, found {found}")]
    InvalidMeta { path: String, found: String },

    #[error("method block path '{path}' is defined more than once")]
    DuplicatePath { path: String },
}

impl SetupError {
    pub fn missing_steps(path: impl Into<String>) -> Self {
        SetupError::MissingSteps { path: path.into() }
    }

    pub fn invalid_meta(path: impl Into<String>, found: impl Into<String>) -> Self {
        SetupError::InvalidMeta {
            path: path.into(),
            found: found.into(),
        }
    }

    pub fn duplicate_path(path: impl Into<String>) -> Self {
        SetupError::DuplicatePath { path: path.into() }
    }
}

impl From<SetupError> for ServiceError {
    fn from(error: SetupError) -> Self {
        ServiceError::new(500, "ConfigurationError").with_message(error.to_string())
    }
}

/// Checks the parts of a block the executor cannot run without.
pub fn validate_block(block: &MethodBlock) -> Result<(), SetupError> {
    if block.path.is_empty() {
        return Err(SetupError::MissingPath);
    }
    if block.fns.is_empty() {
        return Err(SetupError::missing_steps(&block.path));
    }
    Ok(())
}

/// Runs `block` with the caller's `input` and trusted `meta`.
///
/// Setup problems (no path, no steps, non-object meta) are returned
/// immediately; nothing has run at that point. The returned future executes
/// the steps one at a time, feeding each step's output to the next. On the
/// first error the block's `on_error` hook is notified once and the error is
/// returned unchanged.
///
/// ```rust
/// use mblock_engine::{MethodBlock, Step, run};
/// use serde_json::{Value, json};
///
/// let block = MethodBlock::new("greet")
///     .step(Step::sync(|ctx, _| Ok(ctx.input().clone())))
///     .step(Step::sync(|_, name: Value| Ok(json!(format!("hello {}", name.as_str().unwrap_or("?"))))));
///
/// let output = futures_util::FutureExt::now_or_never(run(&block, json!("ada"), Value::Null)?)
///     .expect("steps never suspend")?;
/// assert_eq!(output, json!("hello ada"));
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn run(block: &MethodBlock, input: Value, meta: Value) -> Result<ChainRun, SetupError> {
    validate_block(block)?;
    let meta = match meta {
        Value::Null => Map::new(),
        Value::Object(meta) => meta,
        other => return Err(SetupError::invalid_meta(&block.path, json_type(&other))),
    };

    let ctx = Context::new(block, input, meta);
    let steps = ctx.shared_fns().unwrap_or_else(|| Arc::from(Vec::new()));
    debug!(path = %ctx.path(), step_count = steps.len(), "running method block");

    Ok(async move {
        let result = run_steps(&ctx, &steps, Value::Null).await;
        if let Err(error) = &result {
            debug!(path = %ctx.path(), error_type = %error.kind, status = error.effective_status(), "method block failed");
            if let Some(hook) = ctx.on_error() {
                hook.notify(&ctx, error);
            }
        }
        result
    }
    .boxed())
}

/// Packs `fns` into a single step.
///
/// The composed step runs its members as a sub-chain seeded with the
/// incoming output, against the same context minus the step list. `None`
/// entries are skipped, which allows conditional inclusion:
///
/// ```rust
/// use mblock_engine::{Step, compose, middleware::verify};
///
/// let require_auth = true;
/// let step: Step = compose([require_auth.then(verify::verify_authed), Some(verify::verify_scopes())]);
/// # let _ = step;
/// ```
pub fn compose<I, S>(fns: I) -> Step
where
    I: IntoIterator<Item = S>,
    S: Into<Option<Step>>,
{
    let steps: Arc<[Step]> = fns.into_iter().filter_map(Into::into).collect();
    Step::new(move |ctx: Context, output: Value| {
        let steps = Arc::clone(&steps);
        async move {
            let nested = ctx.without_fns();
            run_steps(&nested, &steps, output).await
        }
    })
}

async fn run_steps(ctx: &Context, steps: &[Step], initial: Value) -> Result<Value, ServiceError> {
    fold::sequential_fold(
        steps,
        StepOutput::Value(initial),
        |output| output_must_not_be_step(ctx, output),
        |step, output| step.invoke(ctx.clone(), output),
    )
    .await
}

/// Guard of the step fold: a step handing on another step was never invoked.
fn output_must_not_be_step(ctx: &Context, output: StepOutput) -> Result<Value, ServiceError> {
    match output {
        StepOutput::Value(value) => Ok(value),
        StepOutput::Step(_) => Err(ServiceError::middleware()
            .with_message("Method block chain returned a step instead of a value")
            .with_debug(json!({
                "path": ctx.path(),
                "details": "Steps in `fns` must return a value, not a step. A nested step factory is probably missing its invocation.",
            }))),
    }
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
