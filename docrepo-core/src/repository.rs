//! The typed repository.
//!
//! A [`Repository`] binds one entity type to one store collection and exposes typed CRUD on
//! top of it. Every failure comes back as a [`RepositoryError`] tagged with the operation that
//! failed, so callers can branch on [`ErrorKind`]s instead of on store-specific errors.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::prelude::*;
//!
//! let repo: Repository<User, _> = Repository::new(&store, "users");
//!
//! let id = repo.create(&user).await?;
//! let active = repo
//!     .find_many_by_filter(0, 0, &[Filter::eq("status", "active")])
//!     .await?;
//! ```

use std::marker::PhantomData;

use bson::{Bson, Document, doc};
use tracing::{debug, warn};

use crate::{
    backend::{StoreCollection, StoreDatabase},
    cursor::EntityCursor,
    document::{Entity, EntityExt, id_to_hex, parse_id, parse_ids},
    error::{ErrorKind, RepositoryError, RepositoryResult, StoreError},
    filter::{Predicate, compose},
    index::{IndexModel, IndexOption, IndexOptions},
    page::Pagination,
    query::FindSpec,
    config::RepositoryConfig,
};

/// Typed access to one collection.
///
/// The repository holds only the collection handle and its configuration; it keeps no state
/// between calls and is `Send + Sync` whenever the collection is.
#[derive(Debug)]
pub struct Repository<T, C> {
    collection: C,
    config: RepositoryConfig,
    _marker: PhantomData<fn() -> T>,
}

impl<T, C> Clone for Repository<T, C>
where
    C: Clone,
{
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            config: self.config.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T, C> Repository<T, C>
where
    T: Entity,
    C: StoreCollection,
{
    /// Binds a repository to the named collection of `database`.
    pub fn new<D>(database: &D, collection_name: &str) -> Self
    where
        D: StoreDatabase<Collection = C>,
    {
        Self::from_collection(database.collection(collection_name))
    }

    /// Binds a repository to an existing collection handle.
    pub fn from_collection(collection: C) -> Self {
        Self {
            collection,
            config: RepositoryConfig::default(),
            _marker: PhantomData,
        }
    }

    pub fn with_config(mut self, config: RepositoryConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &RepositoryConfig {
        &self.config
    }

    pub fn collection(&self) -> &C {
        &self.collection
    }

    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Builds an ascending single-field index on `key`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::IndexCreationFailed`]; a unique index that existing documents
    /// already violate also carries [`ErrorKind::Duplicate`].
    pub async fn create_index(
        &self,
        key: &str,
        options: impl IntoIterator<Item = IndexOption>,
    ) -> RepositoryResult<()> {
        let model = IndexModel::ascending(key, IndexOptions::from_options(options));
        debug!(
            target: "docrepo::repository",
            collection = self.collection_name(),
            index = %model.resolved_name(),
            "creating index"
        );

        self.build_index(model).await
    }

    /// Inserts `entity` and returns the hex form of its new identifier.
    ///
    /// An `_id` that encodes to `null` is dropped so the store assigns one.
    pub async fn create(&self, entity: &T) -> RepositoryResult<String> {
        debug!(target: "docrepo::repository", collection = self.collection_name(), "creating document");

        let mut document = entity
            .to_document()
            .map_err(|e| self.fail(ErrorKind::CreateFailed, e))?;
        if matches!(document.get("_id"), Some(Bson::Null)) {
            document.remove("_id");
        }

        let inserted = self
            .collection
            .insert_one(document)
            .await
            .map_err(|e| self.fail(ErrorKind::CreateFailed, e))?;

        id_to_hex(&inserted).map_err(|e| self.fail(ErrorKind::CreateFailed, e))
    }

    /// Fetches the entity with identifier `id`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::FindByIdFailed`], plus [`ErrorKind::InvalidId`] when `id` is
    /// malformed (the store is not called) or [`ErrorKind::NotFound`] when nothing matched.
    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<T> {
        debug!(target: "docrepo::repository", collection = self.collection_name(), id, "finding document by id");

        let oid = parse_id(id).map_err(|e| RepositoryError::from_store(ErrorKind::FindByIdFailed, e))?;
        let found = self
            .collection
            .find_one(doc! { "_id": oid }, self.read_spec())
            .await
            .map_err(|e| self.fail(ErrorKind::FindByIdFailed, e))?;

        let document = found
            .ok_or_else(|| RepositoryError::from_store(ErrorKind::FindByIdFailed, StoreError::NoDocuments))?;

        T::from_document(document).map_err(|e| self.fail(ErrorKind::FindByIdFailed, e))
    }

    /// Fetches every entity whose identifier is in `ids`, in store order.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::FindByIdsFailed`], plus [`ErrorKind::InvalidId`] when any
    /// identifier is malformed or [`ErrorKind::NotFound`] when none matched.
    pub async fn find_by_ids<S: AsRef<str>>(&self, ids: &[S]) -> RepositoryResult<Vec<T>> {
        debug!(target: "docrepo::repository", collection = self.collection_name(), count = ids.len(), "finding documents by ids");

        let oids = parse_ids(ids).map_err(|e| RepositoryError::from_store(ErrorKind::FindByIdsFailed, e))?;
        let filter = doc! { "_id": { "$in": oids } };

        self.collect(ErrorKind::FindByIdsFailed, filter, self.read_spec()).await
    }

    /// Overwrites the stored fields of document `id` with the fields of `entity`.
    ///
    /// Any `_id` carried by `entity` is ignored. Returns the number of documents that actually
    /// changed, so writing identical values yields `0`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::UpdateFailed`], plus [`ErrorKind::InvalidId`] or
    /// [`ErrorKind::NotFound`] when no document has that identifier.
    pub async fn update(&self, id: &str, entity: &T) -> RepositoryResult<u64> {
        debug!(target: "docrepo::repository", collection = self.collection_name(), id, "updating document");

        let oid = parse_id(id).map_err(|e| RepositoryError::from_store(ErrorKind::UpdateFailed, e))?;
        let mut fields = entity
            .to_document()
            .map_err(|e| self.fail(ErrorKind::UpdateFailed, e))?;
        fields.remove("_id");

        let outcome = self
            .collection
            .update_one(doc! { "_id": oid }, doc! { "$set": fields })
            .await
            .map_err(|e| self.fail(ErrorKind::UpdateFailed, e))?;

        if outcome.matched == 0 {
            return Err(RepositoryError::with_kind(ErrorKind::UpdateFailed, ErrorKind::NotFound));
        }

        Ok(outcome.modified)
    }

    /// Sets `fields` on every document matching `filters`.
    ///
    /// Returns the number of documents modified; matching nothing is not an error.
    pub async fn update_many<I, K, V>(&self, fields: I, filters: &[Predicate]) -> RepositoryResult<u64>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Bson>,
    {
        let fields = fields
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect::<Document>();
        debug!(
            target: "docrepo::repository",
            collection = self.collection_name(),
            fields = fields.len(),
            filters = filters.len(),
            "updating documents"
        );

        let outcome = self
            .collection
            .update_many(compose(filters), doc! { "$set": fields })
            .await
            .map_err(|e| self.fail(ErrorKind::UpdateManyFailed, e))?;

        Ok(outcome.modified)
    }

    /// Deletes the document with identifier `id`. Returns the number deleted.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::DeleteFailed`], plus [`ErrorKind::InvalidId`] or
    /// [`ErrorKind::NotFound`] when nothing was deleted.
    pub async fn delete(&self, id: &str) -> RepositoryResult<u64> {
        debug!(target: "docrepo::repository", collection = self.collection_name(), id, "deleting document");

        let oid = parse_id(id).map_err(|e| RepositoryError::from_store(ErrorKind::DeleteFailed, e))?;
        let deleted = self
            .collection
            .delete_one(doc! { "_id": oid })
            .await
            .map_err(|e| self.fail(ErrorKind::DeleteFailed, e))?;

        if deleted == 0 {
            return Err(RepositoryError::with_kind(ErrorKind::DeleteFailed, ErrorKind::NotFound));
        }

        Ok(deleted)
    }

    /// Deletes every document matching `filters`; matching nothing is not an error.
    pub async fn delete_many(&self, filters: &[Predicate]) -> RepositoryResult<u64> {
        debug!(target: "docrepo::repository", collection = self.collection_name(), filters = filters.len(), "deleting documents");

        self.collection
            .delete_many(compose(filters))
            .await
            .map_err(|e| self.fail(ErrorKind::DeleteManyFailed, e))
    }

    /// Returns one page of the entities matching `filters`, in store order.
    ///
    /// A `limit` of zero means the configured default page size.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::FindManyFailed`], plus [`ErrorKind::NotFound`] when the page
    /// is empty.
    pub async fn find_many_by_filter(
        &self,
        skip: u64,
        limit: u64,
        filters: &[Predicate],
    ) -> RepositoryResult<Vec<T>> {
        let page = self.page(skip, limit);
        debug!(
            target: "docrepo::repository",
            collection = self.collection_name(),
            skip = page.skip,
            limit = page.limit,
            filters = filters.len(),
            "finding documents by filter"
        );

        let spec = FindSpec::builder()
            .skip(page.skip)
            .limit(page.limit)
            .max_time(self.config.max_time())
            .build();

        self.collect(ErrorKind::FindManyFailed, compose(filters), spec).await
    }

    /// Returns the first entity matching `filters`.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::FindOneFailed`], plus [`ErrorKind::NotFound`] when nothing
    /// matched.
    pub async fn find_one_by_filter(&self, filters: &[Predicate]) -> RepositoryResult<T> {
        debug!(target: "docrepo::repository", collection = self.collection_name(), filters = filters.len(), "finding document by filter");

        let found = self
            .collection
            .find_one(compose(filters), self.read_spec())
            .await
            .map_err(|e| self.fail(ErrorKind::FindOneFailed, e))?;

        let document = found
            .ok_or_else(|| RepositoryError::from_store(ErrorKind::FindOneFailed, StoreError::NoDocuments))?;

        T::from_document(document).map_err(|e| self.fail(ErrorKind::FindOneFailed, e))
    }

    /// Reports whether any document matches `filters`. Never fails with not-found.
    pub async fn exists(&self, filters: &[Predicate]) -> RepositoryResult<bool> {
        Ok(self.count(filters).await? > 0)
    }

    /// Counts the documents matching `filters`.
    pub async fn count(&self, filters: &[Predicate]) -> RepositoryResult<u64> {
        debug!(target: "docrepo::repository", collection = self.collection_name(), filters = filters.len(), "counting documents");

        self.collection
            .count_documents(compose(filters), self.config.max_time())
            .await
            .map_err(|e| self.fail(ErrorKind::FindOneFailed, e))
    }

    pub(crate) fn page(&self, skip: u64, limit: u64) -> Pagination {
        Pagination::new(skip, limit).resolve(self.config.default_page_size)
    }

    pub(crate) async fn build_index(&self, model: IndexModel) -> RepositoryResult<()> {
        self.collection
            .create_index(model)
            .await
            .map(|_| ())
            .map_err(|e| self.fail(ErrorKind::IndexCreationFailed, e))
    }

    /// Runs a find and drains its cursor; an empty result is not-found.
    pub(crate) async fn collect(
        &self,
        operation: ErrorKind,
        filter: Document,
        spec: FindSpec,
    ) -> RepositoryResult<Vec<T>> {
        let stream = self
            .collection
            .find(filter, spec)
            .await
            .map_err(|e| self.fail(operation, e))?;

        let entities = EntityCursor::<T>::new(stream)
            .collect_all()
            .await
            .map_err(|e| self.fail(operation, e))?;

        if entities.is_empty() {
            return Err(RepositoryError::with_kind(operation, ErrorKind::NotFound));
        }

        Ok(entities)
    }

    pub(crate) fn fail(&self, operation: ErrorKind, cause: StoreError) -> RepositoryError {
        warn!(
            target: "docrepo::repository",
            collection = self.collection_name(),
            error = %cause,
            "{operation}"
        );
        RepositoryError::from_store(operation, cause)
    }

    fn read_spec(&self) -> FindSpec {
        FindSpec::builder().max_time(self.config.max_time()).build()
    }
}
