use std::time::Duration;

use async_trait::async_trait;
use bson::{Bson, Document};
use futures::{StreamExt, TryStreamExt};
use mongodb::{
    Client, Collection as MongoCollection, IndexModel as DriverIndexModel,
    options::ClientOptions,
};
use tracing::info;

use docrepo_core::{
    backend::{StoreBuilder, StoreCollection, StoreDatabase, UpdateOutcome},
    cursor::DocumentStream,
    error::{StoreError, StoreResult},
    index::IndexModel,
    query::FindSpec,
};

use crate::{
    config::MongoConfig,
    error::map_error,
    options::{count_options, find_one_options, find_options, index_options},
};

/// A MongoDB database.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: impl Into<String>) -> Self {
        Self { client, database: database.into() }
    }

    pub fn builder(uri: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(uri, database)
    }

    pub fn database_name(&self) -> &str {
        &self.database
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Closes the client's connections. Handles obtained from this store stop working.
    pub async fn shutdown(self) -> StoreResult<()> {
        info!(target: "docrepo::mongodb", database = %self.database, "shutting down client");
        self.client.shutdown().await;

        Ok(())
    }
}

impl StoreDatabase for MongoDbStore {
    type Collection = MongoDbCollection;

    fn collection(&self, name: &str) -> Self::Collection {
        MongoDbCollection {
            name: name.to_string(),
            inner: self.client.database(&self.database).collection(name),
        }
    }
}

/// One MongoDB collection.
#[derive(Debug, Clone)]
pub struct MongoDbCollection {
    name: String,
    inner: MongoCollection<Document>,
}

impl MongoDbCollection {
    /// The driver handle, for operations the repository does not cover.
    pub fn inner(&self) -> &MongoCollection<Document> {
        &self.inner
    }
}

#[async_trait]
impl StoreCollection for MongoDbCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        Ok(self
            .inner
            .insert_one(document)
            .await
            .map_err(map_error)?
            .inserted_id)
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> StoreResult<DocumentStream> {
        let cursor = self
            .inner
            .find(filter)
            .with_options(find_options(&spec))
            .await
            .map_err(map_error)?;

        Ok(cursor.map_err(map_error).boxed())
    }

    async fn find_one(&self, filter: Document, spec: FindSpec) -> StoreResult<Option<Document>> {
        self.inner
            .find_one(filter)
            .with_options(find_one_options(&spec))
            .await
            .map_err(map_error)
    }

    async fn update_one(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        let result = self.inner.update_one(filter, update).await.map_err(map_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn update_many(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        let result = self.inner.update_many(filter, update).await.map_err(map_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
        })
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<u64> {
        Ok(self.inner.delete_one(filter).await.map_err(map_error)?.deleted_count)
    }

    async fn delete_many(&self, filter: Document) -> StoreResult<u64> {
        Ok(self.inner.delete_many(filter).await.map_err(map_error)?.deleted_count)
    }

    async fn count_documents(&self, filter: Document, max_time: Option<Duration>) -> StoreResult<u64> {
        self.inner
            .count_documents(filter)
            .with_options(count_options(max_time))
            .await
            .map_err(map_error)
    }

    async fn create_index(&self, model: IndexModel) -> StoreResult<String> {
        let model = DriverIndexModel::builder()
            .keys(model.keys.clone())
            .options(index_options(&model.options))
            .build();

        Ok(self.inner.create_index(model).await.map_err(map_error)?.index_name)
    }
}

/// Connects a [`MongoDbStore`].
///
/// The driver connects lazily, so `build` only fails for malformed configuration; an
/// unreachable server surfaces on the first operation.
#[derive(Debug, Clone)]
pub struct MongoDbStoreBuilder {
    config: MongoConfig,
}

impl MongoDbStoreBuilder {
    pub fn new(uri: &str, database: &str) -> Self {
        Self::from_config(MongoConfig::new(uri, database))
    }

    pub fn from_config(config: MongoConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreBuilder for MongoDbStoreBuilder {
    type Store = MongoDbStore;

    async fn build(self) -> StoreResult<Self::Store> {
        let mut options = ClientOptions::parse(&self.config.uri)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if let Some(app_name) = &self.config.app_name {
            options.app_name = Some(app_name.clone());
        }
        if let Some(timeout) = self.config.connect_timeout() {
            options.connect_timeout = Some(timeout);
        }
        if let Some(timeout) = self.config.server_selection_timeout() {
            options.server_selection_timeout = Some(timeout);
        }

        let client = Client::with_options(options).map_err(|e| StoreError::Backend(e.to_string()))?;
        info!(target: "docrepo::mongodb", database = %self.config.database, "connected client");

        Ok(MongoDbStore::new(client, self.config.database))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_takes_settings_from_config() {
        let config = MongoConfig::new("mongodb://db.internal:27017", "billing")
            .with_app_name("billing-api")
            .with_connect_timeout(Duration::from_secs(3));

        let builder = MongoDbStoreBuilder::from_config(config.clone());

        assert_eq!(builder.config, config);
        assert_eq!(builder.config.app_name.as_deref(), Some("billing-api"));
    }
}
