//! # mblock engine
//!
//! Runs method blocks: named, ordered chains of async steps sharing one
//! immutable per-invocation [`Context`].
//!
//! ## Key pieces
//!
//! - **[`MethodBlock`] / [`Step`]**: the definition a chain is built from
//! - **[`run`]**: validates a block and returns the future that executes it
//! - **[`compose`]**: packs several steps into one sub-chain step
//! - **[`Service`]**: a path-addressable set of blocks whose scopes are
//!   recorded in a [`ScopeRegistry`](mblock_scopes::ScopeRegistry)
//! - **[`middleware`]**: verification, data and storage steps
//! - **[`Generics`]**: composed CRUD steps over a [`Storage`](mblock_query::Storage)
//!
//! ## Usage
//!
//! ```rust
//! use mblock_engine::{MethodBlock, Step, compose, middleware::verify, run};
//! use serde_json::{Value, json};
//!
//! let block = MethodBlock::new("profile.read")
//!     .scopes(["profile:read"])
//!     .step(compose([Some(verify::verify_authed()), Some(verify::verify_scopes())]))
//!     .step(Step::sync(|ctx, _| Ok(json!({"user": ctx.meta().get("userId").cloned()}))));
//!
//! let meta = json!({"userId": "u1", "scopes": ["profile:read"]});
//! let chain = run(&block, Value::Null, meta)?;
//! let profile = futures_util::FutureExt::now_or_never(chain).expect("steps never suspend")?;
//! assert_eq!(profile, json!({"user": "u1"}));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod block;
pub mod context;
pub mod executor;
pub mod generics;
pub mod middleware;
pub mod model;
pub mod service;

pub use block::{ErrorHook, MethodBlock, Step, StepFuture, StepOutput};
pub use context::{Context, State};
pub use executor::{ChainRun, SetupError, compose, run};
pub use generics::{Generics, ReadOptions, WriteOptions};
pub use model::{FieldKind, FieldModel, FieldSpec, Model};
pub use service::Service;
