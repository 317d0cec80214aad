//! A typed repository layer over MongoDB-style document stores.
//!
//! This crate is the core of the docrepo project and provides:
//!
//! - **Filter construction** ([`filter`]) - Composable predicate fragments lowered to store filters
//! - **Index configuration** ([`index`]) - Index option fragments and index models
//! - **Repository** ([`repository`]) - Typed CRUD over one collection
//! - **Full-text search** ([`search`]) - Weighted text indexes and relevance-ranked search
//! - **Store abstraction** ([`backend`]) - Traits implemented by store adapters
//! - **Error handling** ([`error`]) - Store errors and the composable repository error taxonomy
//! - **Entities** ([`document`]) - Mapping between entity types and documents
//! - **Read options** ([`query`], [`page`], [`cursor`]) - Paging, sorting and typed result streams
//! - **Configuration** ([`config`]) - Repository tunables
//!
//! # Example
//!
//! ```ignore
//! use docrepo::prelude::*;
//! use bson::oid::ObjectId;
//! use serde::{Serialize, Deserialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! pub struct User {
//!     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
//!     pub id: Option<ObjectId>,
//!     pub name: String,
//! }
//!
//! let users: Repository<User, _> = Repository::new(&store, "users");
//! let id = users.create(&User { id: None, name: "Alice".into() }).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_core;

pub mod backend;
pub mod config;
pub mod cursor;
pub mod document;
pub mod error;
pub mod filter;
pub mod index;
pub mod page;
pub mod query;
pub mod repository;
pub mod search;
