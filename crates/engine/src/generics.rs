//! Generic CRUD steps over a [`Storage`].
//!
//! Each method returns one composed step suitable as a block's entire `fns`
//! (or a part of it). Scope verification always runs first; authentication is
//! checked only where the options ask for it.

use std::sync::Arc;

use indexmap::IndexMap;
use mblock_query::{QueryOptions, Storage};

use crate::{
    Step, compose,
    middleware::{data, db, verify},
};

/// Options for [`Generics::create`], [`Generics::update`] and [`Generics::remove`].
#[derive(Debug, Clone)]
pub struct WriteOptions {
    /// Base query options for the storage step.
    pub db: QueryOptions,
    /// Require `meta.userId` before touching storage.
    pub require_auth: bool,
    /// Target the record whose `id` is `meta.resourceId`.
    pub on_resource_id: bool,
    /// Meta keys copied into the payload on create, as `input key -> meta key`.
    pub merge_from_meta: IndexMap<String, String>,
    /// Check the payload with the block's model: full validation on create,
    /// unknown keys only on update.
    pub validate: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            db: QueryOptions::default(),
            require_auth: true,
            on_resource_id: false,
            merge_from_meta: IndexMap::new(),
            validate: true,
        }
    }
}

/// Options for [`Generics::read`] and [`Generics::list`].
#[derive(Debug, Clone, Default)]
pub struct ReadOptions {
    pub db: QueryOptions,
    pub on_resource_id: bool,
}

/// Factory for CRUD steps bound to one storage backend.
#[derive(Clone)]
pub struct Generics {
    storage: Arc<dyn Storage>,
}

impl Generics {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    /// Builds the payload from input (plus meta keys), optionally validates it, and saves it.
    pub fn create(&self, table: &str, options: WriteOptions) -> Step {
        compose([
            options.require_auth.then(verify::verify_authed),
            Some(verify::verify_scopes()),
            Some(data::merge_from_meta(options.merge_from_meta)),
            options.validate.then(data::format_output),
            options.validate.then(data::validate_output),
            Some(db::create(Arc::clone(&self.storage), table)),
        ])
    }

    /// Fetches one record; fails 404 `NoResults` when nothing matches.
    pub fn read(&self, table: &str, options: ReadOptions) -> Step {
        compose([
            Some(verify::verify_scopes()),
            options.on_resource_id.then(db::set_where_from_resource_id),
            Some(db::read(Arc::clone(&self.storage), table, options.db)),
            Some(verify::verify_found()),
        ])
    }

    pub fn list(&self, table: &str, options: ReadOptions) -> Step {
        compose([
            Some(verify::verify_scopes()),
            options.on_resource_id.then(db::set_where_from_resource_id),
            Some(db::list(Arc::clone(&self.storage), table, options.db)),
        ])
    }

    /// Patches matching records with the caller's input.
    ///
    /// Unknown payload keys are rejected before anything is written.
    pub fn update(&self, table: &str, options: WriteOptions) -> Step {
        compose([
            options.require_auth.then(verify::verify_authed),
            Some(verify::verify_scopes()),
            options.validate.then(data::prevent_bogus_payload_keys),
            options.on_resource_id.then(db::set_where_from_resource_id),
            Some(data::take_input()),
            Some(db::update(Arc::clone(&self.storage), table, options.db)),
        ])
    }

    pub fn remove(&self, table: &str, options: WriteOptions) -> Step {
        compose([
            options.require_auth.then(verify::verify_authed),
            Some(verify::verify_scopes()),
            options.on_resource_id.then(db::set_where_from_resource_id),
            Some(db::remove(Arc::clone(&self.storage), table, options.db)),
        ])
    }
}

impl std::fmt::Debug for Generics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Generics").finish_non_exhaustive()
    }
}
