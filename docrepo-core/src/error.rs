//! Error types and result types for repository and store operations.
//!
//! Two layers are involved:
//!
//! - [`StoreError`] is what a store adapter reports. Every backend normalizes its native
//!   failures into this enum so the repository never has to know which driver it talks to.
//! - [`RepositoryError`] is what callers of the repository see. It is a composition of an
//!   operation-specific [`ErrorKind`], optional sub-kinds ([`ErrorKind::NotFound`],
//!   [`ErrorKind::Duplicate`], [`ErrorKind::InvalidId`]) and the underlying [`StoreError`].
//!
//! Membership in any of those layers can be tested independently:
//!
//! ```ignore
//! match repo.find_by_id(&id).await {
//!     Err(err) if err.is_not_found() => { /* no such document */ }
//!     Err(err) if err.is(ErrorKind::FindByIdFailed) => { /* anything else that went wrong */ }
//!     Ok(user) => { /* ... */ }
//! }
//! ```

use std::fmt;

use bson::error::Error as BsonError;
use thiserror::Error;

/// A normalized failure reported by a store adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StoreError {
    /// A write violated a unique index (including the `_id` index).
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    /// The store reported that no document matched.
    #[error("no documents matched")]
    NoDocuments,
    /// A string could not be parsed as a store identifier.
    #[error("invalid object id: {0}")]
    InvalidObjectId(String),
    /// Serialization/deserialization error when converting between entities and BSON.
    #[error("serialization error: {0}")]
    Serialization(String),
    /// The operation exceeded its time limit.
    #[error("operation timed out: {0}")]
    Timeout(String),
    /// Any other error raised by the underlying store.
    #[error("backend error: {0}")]
    Backend(String),
}

/// A specialized `Result` type for store adapter operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<BsonError> for StoreError {
    fn from(err: BsonError) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// The kinds a [`RepositoryError`] can be tagged with.
///
/// The first kind of an error always names the operation that failed; the remaining kinds
/// narrow down why.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    #[error("document not found")]
    NotFound,
    #[error("document already exists")]
    Duplicate,
    #[error("invalid document id")]
    InvalidId,
    #[error("failed to create collection index")]
    IndexCreationFailed,
    #[error("failed to create document")]
    CreateFailed,
    #[error("failed to update document")]
    UpdateFailed,
    #[error("failed to update documents")]
    UpdateManyFailed,
    #[error("failed to delete document")]
    DeleteFailed,
    #[error("failed to delete documents")]
    DeleteManyFailed,
    #[error("failed to find document by id")]
    FindByIdFailed,
    #[error("failed to find documents by ids")]
    FindByIdsFailed,
    #[error("failed to find any documents by the given filter")]
    FindManyFailed,
    #[error("failed to find a document by the given filter")]
    FindOneFailed,
}

/// The error returned by every [`Repository`](crate::repository::Repository) operation.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryError {
    kinds: Vec<ErrorKind>,
    source: Option<StoreError>,
}

/// A specialized `Result` type for repository operations.
pub type RepositoryResult<T> = Result<T, RepositoryError>;

impl RepositoryError {
    /// Creates an error tagged with a single operation kind.
    pub fn new(operation: ErrorKind) -> Self {
        Self { kinds: vec![operation], source: None }
    }

    /// Creates an error tagged with `operation` followed by `sub_kind`.
    pub fn with_kind(operation: ErrorKind, sub_kind: ErrorKind) -> Self {
        Self::new(operation).and_kind(sub_kind)
    }

    /// Wraps a store failure, deriving sub-kinds from the cause.
    ///
    /// Duplicate-key violations add [`ErrorKind::Duplicate`], "no documents" adds
    /// [`ErrorKind::NotFound`] and unparsable identifiers add [`ErrorKind::InvalidId`].
    pub fn from_store(operation: ErrorKind, cause: StoreError) -> Self {
        let error = Self::new(operation);
        let error = match &cause {
            StoreError::DuplicateKey(_) => error.and_kind(ErrorKind::Duplicate),
            StoreError::NoDocuments => error.and_kind(ErrorKind::NotFound),
            StoreError::InvalidObjectId(_) => error.and_kind(ErrorKind::InvalidId),
            _ => error,
        };

        error.with_source(cause)
    }

    /// Appends a kind, unless the error is already tagged with it.
    pub fn and_kind(mut self, kind: ErrorKind) -> Self {
        if !self.kinds.contains(&kind) {
            self.kinds.push(kind);
        }
        self
    }

    /// Attaches the underlying store error.
    pub fn with_source(mut self, source: StoreError) -> Self {
        self.source = Some(source);
        self
    }

    /// Returns true if this error is tagged with `kind`, at any position.
    pub fn is(&self, kind: ErrorKind) -> bool {
        self.kinds.contains(&kind)
    }

    pub fn is_not_found(&self) -> bool {
        self.is(ErrorKind::NotFound)
    }

    pub fn is_duplicate(&self) -> bool {
        self.is(ErrorKind::Duplicate)
    }

    pub fn is_invalid_id(&self) -> bool {
        self.is(ErrorKind::InvalidId)
    }

    /// Returns true if the store gave up because the operation ran past its time limit.
    pub fn is_timeout(&self) -> bool {
        matches!(self.source, Some(StoreError::Timeout(_)))
    }

    /// The kind naming the operation that failed.
    pub fn operation(&self) -> ErrorKind {
        self.kinds[0]
    }

    /// All kinds, operation first.
    pub fn kinds(&self) -> &[ErrorKind] {
        &self.kinds
    }

    /// The underlying store error, if any.
    pub fn store_error(&self) -> Option<&StoreError> {
        self.source.as_ref()
    }
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, kind) in self.kinds.iter().enumerate() {
            if index > 0 {
                f.write_str(": ")?;
            }
            write!(f, "{kind}")?;
        }

        if let Some(source) = &self.source {
            write!(f, ": {source}")?;
        }

        Ok(())
    }
}

impl std::error::Error for RepositoryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|source| source as &(dyn std::error::Error + 'static))
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn test_from_store_tags_duplicate() {
        let err = RepositoryError::from_store(
            ErrorKind::CreateFailed,
            StoreError::DuplicateKey("email_1".to_string()),
        );

        assert!(err.is(ErrorKind::CreateFailed));
        assert!(err.is_duplicate());
        assert!(!err.is_not_found());
        assert_eq!(err.operation(), ErrorKind::CreateFailed);
    }

    #[test]
    fn test_from_store_tags_not_found() {
        let err = RepositoryError::from_store(ErrorKind::FindOneFailed, StoreError::NoDocuments);

        assert_eq!(err.kinds(), &[ErrorKind::FindOneFailed, ErrorKind::NotFound]);
    }

    #[test]
    fn test_generic_store_failure_has_no_sub_kind() {
        let err = RepositoryError::from_store(
            ErrorKind::DeleteManyFailed,
            StoreError::Backend("connection reset".to_string()),
        );

        assert_eq!(err.kinds(), &[ErrorKind::DeleteManyFailed]);
        assert!(err.source().is_some());
    }

    #[test]
    fn test_and_kind_does_not_repeat() {
        let err = RepositoryError::with_kind(ErrorKind::DeleteFailed, ErrorKind::NotFound)
            .and_kind(ErrorKind::NotFound);

        assert_eq!(err.kinds().len(), 2);
    }

    #[test]
    fn test_timeout_is_detected_through_source() {
        let err = RepositoryError::from_store(
            ErrorKind::FindManyFailed,
            StoreError::Timeout("operation exceeded time limit".to_string()),
        );

        assert!(err.is_timeout());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_display_joins_layers() {
        let err = RepositoryError::with_kind(ErrorKind::FindByIdFailed, ErrorKind::InvalidId)
            .with_source(StoreError::InvalidObjectId("xyz".to_string()));

        assert_eq!(
            err.to_string(),
            "failed to find document by id: invalid document id: invalid object id: xyz"
        );
    }
}
