//! MongoDB store for docrepo.
//!
//! This crate implements the store traits of `docrepo-core` on top of the official async
//! driver. Filters, updates and index definitions are already in MongoDB's native form, so the
//! adapter mostly translates options and normalizes driver errors.
//!
//! To use this store, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docrepo = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Connection
//!
//! Connection settings come from a [`MongoConfig`], either built in code, deserialized, or read
//! from the environment with [`MongoConfig::from_env`].
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{backend::StoreBuilder, mongodb::{MongoConfig, MongoDbStoreBuilder}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStoreBuilder::from_config(MongoConfig::from_env())
//!         .build()
//!         .await?;
//!
//!     store.shutdown().await?;
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docrepo_mongodb;

pub mod config;
pub mod error;
pub mod options;
pub mod store;

pub use config::MongoConfig;
pub use store::{MongoDbCollection, MongoDbStore, MongoDbStoreBuilder};
