//! Convenient re-exports of commonly used types from docrepo.
//!
//! ```ignore
//! use docrepo::prelude::*;
//! ```
//!
//! This provides access to:
//! - The repository and its configuration
//! - Filter and index option fragments
//! - Store traits and builders
//! - Error types

pub use docrepo_core::{
    backend::{StoreBuilder, StoreCollection, StoreDatabase, UpdateOutcome},
    config::RepositoryConfig,
    document::{Entity, EntityExt},
    error::{ErrorKind, RepositoryError, RepositoryResult, StoreError, StoreResult},
    filter::{FieldOp, Filter, Predicate, PredicateVisitor},
    index::{Collation, CollationStrength, IndexModel, IndexOption, IndexOptions},
    query::{FindSpec, Sort, SortDirection},
    repository::Repository,
};
