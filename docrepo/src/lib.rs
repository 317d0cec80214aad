//! Main docrepo crate: typed repositories over MongoDB-style document stores.
//!
//! This crate is the primary entry point. It re-exports the core types from `docrepo-core`
//! and gives access to the available stores.
//!
//! # Features
//!
//! - **Typed repositories** - Define entities with Serde and get CRUD, paging and counting
//! - **Composable filters** - Build filters from small, inspectable predicate fragments
//! - **Index options** - Configure indexes from option fragments, including TTL and collation
//! - **Full-text search** - Weighted text indexes with relevance-ranked results
//! - **Typed errors** - Every failure names the operation and why it failed
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
//!     pub email: String,
//!     pub age: i32,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = InMemoryStore::builder().build().await?;
//!     let users: Repository<User, _> = Repository::new(&store, "users");
//!
//!     users.create_index("email", [IndexOption::Unique(true)]).await?;
//!
//!     let id = users
//!         .create(&User { id: None, email: "alice@example.com".into(), age: 34 })
//!         .await?;
//!
//!     let adults = users
//!         .find_many_by_filter(0, 0, &[Filter::gte("age", 18)])
//!         .await?;
//!
//!     match users.find_by_id("not-an-id").await {
//!         Err(err) if err.is_invalid_id() => println!("{err}"),
//!         _ => unreachable!(),
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! # Stores
//!
//! - [`memory`] - In-memory store for development and testing
//! - [`mongodb`] - MongoDB store (requires the `mongodb` feature)

pub mod prelude;

pub use docrepo_core::{backend, config, cursor, document, error, filter, index, page, query, repository, search};

// Re-export BSON types for convenience
pub use bson;

/// In-memory store.
pub mod memory {
    pub use docrepo_memory::{InMemoryCollection, InMemoryStore, InMemoryStoreBuilder};
}

/// MongoDB store.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docrepo_mongodb::{MongoConfig, MongoDbCollection, MongoDbStore, MongoDbStoreBuilder};
}
