//! Store abstraction consumed by the repository.
//!
//! # Overview
//!
//! A repository talks to exactly one collection of a document store through the
//! [`StoreCollection`] trait. Filters and update documents arrive already in the store's
//! native document form, so an adapter only has to execute them and normalize its failures
//! into [`StoreError`](crate::error::StoreError).
//!
//! # Traits
//!
//! - [`StoreDatabase`]: Hands out collection handles by name
//! - [`StoreCollection`]: The operations a repository issues against one collection
//! - [`StoreBuilder`]: Factory trait for connecting a store from its configuration

use std::{fmt::Debug, sync::Arc, time::Duration};

use async_trait::async_trait;
use bson::{Bson, Document};

use crate::{cursor::DocumentStream, error::StoreResult, index::IndexModel, query::FindSpec};

/// Outcome of an update.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    /// Documents the filter selected.
    pub matched: u64,
    /// Documents whose content actually changed.
    pub modified: u64,
}

/// A database: a namespace of collections.
pub trait StoreDatabase {
    type Collection: StoreCollection;

    /// Returns the handle of the named collection. Collections are created lazily by the
    /// store on first write.
    fn collection(&self, name: &str) -> Self::Collection;
}

/// One collection of a document store.
///
/// # Thread Safety
///
/// Implementations must be safe to share between tasks; a repository may be used from many
/// tasks at once and issues every call through `&self`.
///
/// # Error Handling
///
/// Every native failure is reported as a [`StoreError`](crate::error::StoreError). Unique
/// index violations must be reported as `DuplicateKey` and exceeded time limits as
/// `Timeout`, the repository derives its error kinds from them.
#[async_trait]
pub trait StoreCollection: Send + Sync + Debug {
    /// The collection's name.
    fn name(&self) -> &str;

    /// Inserts one document, generating `_id` when absent. Returns the document's `_id`.
    async fn insert_one(&self, document: Document) -> StoreResult<Bson>;

    /// Streams the documents matching `filter`.
    async fn find(&self, filter: Document, spec: FindSpec) -> StoreResult<DocumentStream>;

    /// Returns the first document matching `filter`, if any.
    async fn find_one(&self, filter: Document, spec: FindSpec) -> StoreResult<Option<Document>>;

    /// Applies `update` to the first document matching `filter`.
    async fn update_one(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome>;

    /// Applies `update` to every document matching `filter`.
    async fn update_many(&self, filter: Document, update: Document)
    -> StoreResult<UpdateOutcome>;

    /// Deletes the first document matching `filter`. Returns the number deleted.
    async fn delete_one(&self, filter: Document) -> StoreResult<u64>;

    /// Deletes every document matching `filter`. Returns the number deleted.
    async fn delete_many(&self, filter: Document) -> StoreResult<u64>;

    /// Counts the documents matching `filter`.
    async fn count_documents(
        &self,
        filter: Document,
        max_time: Option<Duration>,
    ) -> StoreResult<u64>;

    /// Builds an index. Returns the index name.
    async fn create_index(&self, model: IndexModel) -> StoreResult<String>;
}

#[async_trait]
impl<C> StoreCollection for Arc<C>
where
    C: StoreCollection + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        (**self).insert_one(document).await
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> StoreResult<DocumentStream> {
        (**self).find(filter, spec).await
    }

    async fn find_one(&self, filter: Document, spec: FindSpec) -> StoreResult<Option<Document>> {
        (**self).find_one(filter, spec).await
    }

    async fn update_one(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        (**self).update_one(filter, update).await
    }

    async fn update_many(
        &self,
        filter: Document,
        update: Document,
    ) -> StoreResult<UpdateOutcome> {
        (**self).update_many(filter, update).await
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<u64> {
        (**self).delete_one(filter).await
    }

    async fn delete_many(&self, filter: Document) -> StoreResult<u64> {
        (**self).delete_many(filter).await
    }

    async fn count_documents(
        &self,
        filter: Document,
        max_time: Option<Duration>,
    ) -> StoreResult<u64> {
        (**self).count_documents(filter, max_time).await
    }

    async fn create_index(&self, model: IndexModel) -> StoreResult<String> {
        (**self).create_index(model).await
    }
}

/// Factory trait for connecting a store.
///
/// Implementers carry the store's configuration and produce a ready [`StoreDatabase`].
#[async_trait]
pub trait StoreBuilder {
    /// The store type this builder produces.
    type Store: StoreDatabase;

    /// Connects and returns the store.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`](crate::error::StoreError) if the store cannot be reached or
    /// the configuration is invalid.
    async fn build(self) -> StoreResult<Self::Store>;
}
