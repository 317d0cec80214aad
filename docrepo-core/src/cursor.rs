//! Typed iteration over a store's result stream.

use std::marker::PhantomData;

use bson::Document;
use futures::{TryStreamExt, stream::BoxStream};

use crate::{
    document::{Entity, EntityExt},
    error::StoreResult,
};

/// A stream of raw documents produced by a store.
pub type DocumentStream = BoxStream<'static, StoreResult<Document>>;

/// Decodes entities from a [`DocumentStream`] as they are pulled.
///
/// The cursor owns the underlying stream; dropping the cursor releases it, whichever way the
/// caller leaves the loop.
pub struct EntityCursor<T> {
    stream: DocumentStream,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Entity> EntityCursor<T> {
    pub fn new(stream: DocumentStream) -> Self {
        Self { stream, _marker: PhantomData }
    }

    /// Pulls and decodes the next entity, `None` once the stream is exhausted.
    pub async fn next_entity(&mut self) -> StoreResult<Option<T>> {
        match self.stream.try_next().await? {
            Some(document) => Ok(Some(T::from_document(document)?)),
            None => Ok(None),
        }
    }

    /// Drains the cursor, stopping at the first failure.
    pub async fn collect_all(mut self) -> StoreResult<Vec<T>> {
        let mut entities = Vec::new();
        while let Some(entity) = self.next_entity().await? {
            entities.push(entity);
        }
        Ok(entities)
    }
}

impl<T> std::fmt::Debug for EntityCursor<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityCursor").finish_non_exhaustive()
    }
}
