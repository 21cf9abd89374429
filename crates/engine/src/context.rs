//! Per-invocation execution context.
//!
//! A [`Context`] is an immutable core shared behind an `Arc` (the block's
//! definition plus the caller's `input` and `meta`) and a separately owned
//! [`State`] cell that steps of one run use as scratch space. Cloning a
//! context is cheap and every clone sees the same state.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mblock_types::Scopes;
use serde_json::{Map, Value};

use crate::{
    block::{ErrorHook, MethodBlock, Step},
    model::Model,
};

#[derive(Debug, Clone)]
struct ContextCore {
    path: String,
    fns: Option<Arc<[Step]>>,
    scopes: Option<Scopes>,
    model: Option<Arc<dyn Model>>,
    block_meta: Map<String, Value>,
    on_error: Option<ErrorHook>,
    input: Value,
    meta: Map<String, Value>,
}

/// Read-only view of one method block invocation.
#[derive(Debug, Clone)]
pub struct Context {
    core: Arc<ContextCore>,
    state: State,
}

impl Context {
    /// Builds the context for one invocation of `block` with empty state.
    pub fn new(block: &MethodBlock, input: Value, meta: Map<String, Value>) -> Self {
        let core = ContextCore {
            path: block.path.clone(),
            fns: Some(Arc::from(block.fns.as_slice())),
            scopes: block.scopes.clone(),
            model: block.model.clone(),
            block_meta: block.meta.clone(),
            on_error: block.on_error.clone(),
            input,
            meta,
        };
        Self {
            core: Arc::new(core),
            state: State::default(),
        }
    }

    /// Copy of this context without the step list, sharing the same state.
    ///
    /// Composed sub-chains run against this view so they never see the
    /// enclosing block's steps.
    pub fn without_fns(&self) -> Self {
        let core = ContextCore {
            fns: None,
            ..ContextCore::clone(&self.core)
        };
        Self {
            core: Arc::new(core),
            state: self.state.clone(),
        }
    }

    pub fn path(&self) -> &str {
        &self.core.path
    }

    /// The block's steps; `None` inside composed sub-chains.
    pub fn fns(&self) -> Option<&[Step]> {
        self.core.fns.as_deref()
    }

    pub fn scopes(&self) -> Option<&Scopes> {
        self.core.scopes.as_ref()
    }

    pub fn model(&self) -> Option<&dyn Model> {
        self.core.model.as_deref()
    }

    /// Static metadata declared on the block.
    pub fn block_meta(&self) -> &Map<String, Value> {
        &self.core.block_meta
    }

    /// Untrusted caller payload.
    pub fn input(&self) -> &Value {
        &self.core.input
    }

    /// Trusted, application-supplied metadata (user id, claims, resource id).
    pub fn meta(&self) -> &Map<String, Value> {
        &self.core.meta
    }

    pub fn state(&self) -> &State {
        &self.state
    }

    pub(crate) fn shared_fns(&self) -> Option<Arc<[Step]>> {
        self.core.fns.clone()
    }

    pub(crate) fn on_error(&self) -> Option<&ErrorHook> {
        self.core.on_error.as_ref()
    }
}

/// Mutable scratch map owned by a single run.
#[derive(Debug, Clone, Default)]
pub struct State(Arc<Mutex<Map<String, Value>>>);

impl State {
    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn insert(&self, key: impl Into<String>, value: Value) -> Option<Value> {
        self.lock().insert(key.into(), value)
    }

    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    pub fn snapshot(&self) -> Map<String, Value> {
        self.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block() -> MethodBlock {
        MethodBlock::new("things.read")
            .step(Step::sync(|_, output| Ok(output)))
            .scopes(["things:read"])
    }

    #[test]
    fn carries_block_fields_and_channels() {
        let meta = json!({"userId": "u1"}).as_object().cloned().expect("meta object");
        let ctx = Context::new(&block(), json!({"name": "box"}), meta);

        assert_eq!(ctx.path(), "things.read");
        assert_eq!(ctx.fns().map(<[Step]>::len), Some(1));
        assert_eq!(ctx.scopes(), Some(&Scopes::from(["things:read"])));
        assert_eq!(ctx.input(), &json!({"name": "box"}));
        assert_eq!(ctx.meta().get("userId"), Some(&json!("u1")));
        assert!(ctx.state().snapshot().is_empty());
    }

    #[test]
    fn without_fns_hides_steps_and_shares_state() {
        let ctx = Context::new(&block(), Value::Null, Map::new());
        let nested = ctx.without_fns();

        assert!(nested.fns().is_none());
        assert_eq!(nested.path(), ctx.path());

        nested.state().insert("seen", json!(true));
        assert_eq!(ctx.state().get("seen"), Some(json!(true)));
    }

    #[test]
    fn each_context_starts_with_its_own_state() {
        let first = Context::new(&block(), Value::Null, Map::new());
        let second = Context::new(&block(), Value::Null, Map::new());
        first.state().insert("count", json!(1));
        assert!(!second.state().contains_key("count"));
    }
}
