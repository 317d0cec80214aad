//! Entities and their document form.
//!
//! Any serde type can be stored. Fields are mapped to document keys by their serde names; the
//! repository never inspects them.

use bson::{Bson, Document, de::deserialize_from_document, oid::ObjectId, ser::serialize_to_document};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// A record type that can be stored in a repository.
///
/// Implemented for every `Serialize + Deserialize` type, there is nothing to implement by hand.
///
/// # Example
///
/// ```ignore
/// use bson::oid::ObjectId;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
///     pub id: Option<ObjectId>,
///     pub name: String,
///     pub email: String,
/// }
/// ```
pub trait Entity: Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {}

impl<T> Entity for T where T: Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {}

/// Conversion between an entity and its document form.
pub trait EntityExt: Entity {
    /// Encodes this entity as a top-level document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the entity does not encode to a document
    /// (for example a bare string or number).
    fn to_document(&self) -> StoreResult<Document>;

    /// Decodes an entity from a stored document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Serialization`] if the document's shape does not fit.
    fn from_document(document: Document) -> StoreResult<Self>;
}

impl<T: Entity> EntityExt for T {
    fn to_document(&self) -> StoreResult<Document> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: Document) -> StoreResult<Self> {
        Ok(deserialize_from_document(document)?)
    }
}

/// Parses a 24-character hex identifier.
pub fn parse_id(id: &str) -> StoreResult<ObjectId> {
    ObjectId::parse_str(id).map_err(|_| StoreError::InvalidObjectId(id.to_string()))
}

/// Parses every identifier, failing on the first malformed one.
pub fn parse_ids<S: AsRef<str>>(ids: &[S]) -> StoreResult<Vec<ObjectId>> {
    ids.iter().map(|id| parse_id(id.as_ref())).collect()
}

/// The hex form of a store-assigned identifier.
pub fn id_to_hex(id: &Bson) -> StoreResult<String> {
    match id {
        Bson::ObjectId(oid) => Ok(oid.to_hex()),
        other => Err(StoreError::InvalidObjectId(other.to_string())),
    }
}
