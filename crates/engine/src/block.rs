//! Method block definitions and the callables they hold.
//!
//! A [`MethodBlock`] is a named, ordered list of [`Step`]s plus the metadata
//! the steps read at run time (required scopes, model, static meta). Blocks are
//! plain values: build them once at startup and hand them to
//! [`run`](crate::run) or [`Service::generate`](crate::Service::generate).

use std::{
    fmt,
    future::Future,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::Arc,
};

use futures_util::future::{self, BoxFuture, FutureExt};
use mblock_types::{Scopes, ServiceError};
use serde_json::{Map, Value};
use tracing::warn;

use crate::{context::Context, model::Model};

/// Future returned by a single step invocation.
pub type StepFuture = BoxFuture<'static, Result<StepOutput, ServiceError>>;

type StepFn = dyn Fn(Context, Value) -> StepFuture + Send + Sync;
type HookFn = dyn Fn(&Context, &ServiceError) -> anyhow::Result<()> + Send + Sync;

/// What a step hands to the next one.
///
/// Returning [`StepOutput::Step`] is always a wiring mistake (a step factory
/// that was never invoked); the executor turns it into a `MiddlewareError`.
#[derive(Debug, Clone)]
pub enum StepOutput {
    Value(Value),
    Step(Step),
}

impl From<Value> for StepOutput {
    fn from(value: Value) -> Self {
        StepOutput::Value(value)
    }
}

impl From<Step> for StepOutput {
    fn from(step: Step) -> Self {
        StepOutput::Step(step)
    }
}

/// One link of a chain: `(ctx, previous_output) -> future<output>`.
///
/// Cloning is cheap; clones share the same callable.
#[derive(Clone)]
pub struct Step(Arc<StepFn>);

impl Step {
    /// Wraps an async step.
    pub fn new<F, Fut, T>(step: F) -> Self
    where
        F: Fn(Context, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T, ServiceError>> + Send + 'static,
        T: Into<StepOutput> + Send + 'static,
    {
        Self(Arc::new(move |ctx: Context, output: Value| {
            let pending = step(ctx, output);
            async move { pending.await.map(Into::into) }.boxed()
        }))
    }

    /// Wraps a step that finishes without suspending.
    pub fn sync<F, T>(step: F) -> Self
    where
        F: Fn(&Context, Value) -> Result<T, ServiceError> + Send + Sync + 'static,
        T: Into<StepOutput> + Send + 'static,
    {
        Self(Arc::new(move |ctx: Context, output: Value| future::ready(step(&ctx, output).map(Into::into)).boxed()))
    }

    pub fn invoke(&self, ctx: Context, output: Value) -> StepFuture {
        (self.0)(ctx, output)
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step").finish_non_exhaustive()
    }
}

/// Observer called once when a top-level run fails.
///
/// The hook cannot change the outcome: whatever it returns, and even if it
/// panics, the caller receives the original error.
#[derive(Clone)]
pub struct ErrorHook(Arc<HookFn>);

impl ErrorHook {
    pub fn new<F>(hook: F) -> Self
    where
        F: Fn(&Context, &ServiceError) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self(Arc::new(hook))
    }

    pub(crate) fn notify(&self, ctx: &Context, error: &ServiceError) {
        match catch_unwind(AssertUnwindSafe(|| (self.0)(ctx, error))) {
            Ok(Ok(())) => {}
            Ok(Err(hook_error)) => {
                warn!(path = %ctx.path(), error = %hook_error, "on_error hook failed; keeping original error");
            }
            Err(_) => {
                warn!(path = %ctx.path(), "on_error hook panicked; keeping original error");
            }
        }
    }
}

impl fmt::Debug for ErrorHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorHook").finish_non_exhaustive()
    }
}

/// A named unit of business logic.
#[derive(Debug, Clone, Default)]
pub struct MethodBlock {
    /// Unique name of the block, e.g. `users.read`.
    pub path: String,
    /// Steps in execution order.
    pub fns: Vec<Step>,
    /// Scopes a caller must hold. `None` or empty means no requirement.
    pub scopes: Option<Scopes>,
    /// Model consulted by the validation and formatting steps.
    pub model: Option<Arc<dyn Model>>,
    /// Static, application-defined metadata about the block.
    pub meta: Map<String, Value>,
    pub on_error: Option<ErrorHook>,
}

impl MethodBlock {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.fns.push(step);
        self
    }

    pub fn steps(mut self, steps: impl IntoIterator<Item = Step>) -> Self {
        self.fns.extend(steps);
        self
    }

    pub fn scopes(mut self, scopes: impl Into<Scopes>) -> Self {
        self.scopes = Some(scopes.into());
        self
    }

    pub fn model(mut self, model: impl Model + 'static) -> Self {
        self.model = Some(Arc::new(model));
        self
    }

    pub fn meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    pub fn on_error<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Context, &ServiceError) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.on_error = Some(ErrorHook::new(hook));
        self
    }
}
