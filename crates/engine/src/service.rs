//! A set of method blocks addressable by path.

use std::sync::Arc;

use indexmap::IndexMap;
use mblock_scopes::ScopeRegistry;
use mblock_types::{Scopes, ServiceError};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::{
    block::MethodBlock,
    executor::{self, SetupError},
    model::Model,
};

/// Method blocks keyed by path, in definition order.
///
/// Built once with [`Service::generate`], which also records every block's
/// required scopes in the caller's [`ScopeRegistry`].
#[derive(Debug, Default)]
pub struct Service {
    blocks: IndexMap<String, MethodBlock>,
}

impl Service {
    /// Validates `blocks` and registers their scopes under their paths.
    ///
    /// Nothing is registered unless every block is valid and every path is unique.
    pub fn generate<I>(blocks: I, registry: &mut ScopeRegistry) -> Result<Self, SetupError>
    where
        I: IntoIterator<Item = MethodBlock>,
    {
        let mut generated = IndexMap::new();
        for block in blocks {
            executor::validate_block(&block)?;
            if generated.contains_key(&block.path) {
                return Err(SetupError::duplicate_path(&block.path));
            }
            generated.insert(block.path.clone(), block);
        }

        for block in generated.values() {
            if let Some(scopes) = &block.scopes {
                registry.register(block.path.clone(), scopes.clone());
            }
            debug!(path = %block.path, step_count = block.fns.len(), scopes = ?block.scopes, "generated method block");
        }
        info!(block_count = generated.len(), "service generated");
        Ok(Self { blocks: generated })
    }

    /// Runs the block at `path`. Unknown paths fail 404 `NotFound`.
    pub async fn call(&self, path: &str, input: Value, meta: Value) -> Result<Value, ServiceError> {
        let block = self
            .blocks
            .get(path)
            .ok_or_else(|| ServiceError::not_found().with_message(format!("No method block at '{path}'")))?;
        executor::run(block, input, meta)?.await
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.blocks.keys().map(String::as_str)
    }

    pub fn block(&self, path: &str) -> Option<&MethodBlock> {
        self.blocks.get(path)
    }

    pub fn scopes(&self, path: &str) -> Option<&Scopes> {
        self.blocks.get(path)?.scopes.as_ref()
    }

    pub fn model(&self, path: &str) -> Option<&Arc<dyn Model>> {
        self.blocks.get(path)?.model.as_ref()
    }

    pub fn meta(&self, path: &str) -> Option<&Map<String, Value>> {
        self.blocks.get(path).map(|block| &block.meta)
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
