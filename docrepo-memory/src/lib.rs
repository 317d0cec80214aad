//! In-memory document store for docrepo.
//!
//! This crate provides a thread-safe, in-memory implementation of the store traits in
//! `docrepo-core`. It uses async-aware read-write locks for concurrent access and is meant for
//! development, tests and small data sets.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Native filters** - Evaluates the same filter documents the repository sends to MongoDB
//! - **Index constraints** - Unique, sparse, partial and TTL indexes behave like the real store
//! - **Text search** - `$text` queries with weighted relevance scores
//!
//! # Quick Start
//!
//! ```ignore
//! use docrepo::{prelude::*, memory::InMemoryStore};
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
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder().build().await?;
//!     let users: Repository<User, _> = Repository::new(&store, "users");
//!
//!     let id = users.create(&User { id: None, name: "Alice".to_string() }).await?;
//!     let alice = users.find_by_id(&id).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_memory;

mod evaluator;
pub mod store;
mod text;
mod update;

pub use store::{InMemoryCollection, InMemoryStore, InMemoryStoreBuilder};
