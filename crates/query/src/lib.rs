//! # mblock query
//!
//! Boolean record matching and the storage collaborator built on it.
//!
//! Matching happens in two independent stages:
//!
//! 1. [`MatchCondition::normalize`] turns shorthand `where` objects into a
//!    canonical `And`/`Or`/`Leaf` tree (and rejects unknown operators).
//! 2. [`MatchCondition::evaluate`] walks that tree against a record.
//!
//! [`matches`] runs both stages in one call. [`MemoryStore`] applies the same
//! evaluator to reads, updates and removals.

pub mod condition;
pub mod error;
pub mod matcher;
pub mod store;

pub use condition::{Leaf, MatchCondition, Operator};
pub use error::{QueryError, StoreError};
pub use matcher::matches;
pub use store::{MemoryStore, QueryOptions, Storage};
