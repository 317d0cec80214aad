//! Read options passed alongside a filter to the store.
//!
//! A [`FindSpec`] carries everything about a read that is not the filter itself: paging,
//! ordering, relevance scoring and the server-side time limit.
//!
//! ```ignore
//! use docrepo::query::{FindSpec, SortDirection};
//!
//! let spec = FindSpec::builder()
//!     .skip(20)
//!     .limit(10)
//!     .sort("created_at", SortDirection::Desc)
//!     .build();
//! ```

use std::time::Duration;

use bson::{Bson, Document};

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    /// Ascending order (A to Z, 0 to 9, earliest to latest).
    Asc,
    /// Descending order (Z to A, 9 to 0, latest to earliest).
    Desc,
}

impl SortDirection {
    pub fn as_bson(&self) -> Bson {
        match self {
            SortDirection::Asc => Bson::Int32(1),
            SortDirection::Desc => Bson::Int32(-1),
        }
    }
}

/// Which field to sort by and in which direction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: SortDirection,
}

impl Sort {
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self { field: field.into(), direction }
    }

    /// The store's sort document, `{ field: 1 | -1 }`.
    pub fn to_document(&self) -> Document {
        let mut sort = Document::new();
        sort.insert(self.field.clone(), self.direction.as_bson());
        sort
    }
}

/// Options of a single read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub skip: Option<u64>,
    pub limit: Option<u64>,
    pub sort: Option<Sort>,
    /// Project the text-search relevance score into this field and order by it, best first.
    ///
    /// Takes precedence over `sort`.
    pub text_score: Option<String>,
    /// Server-side time limit.
    pub max_time: Option<Duration>,
}

impl FindSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> FindSpecBuilder {
        FindSpecBuilder::new()
    }
}

/// Builder for [`FindSpec`].
#[derive(Debug, Default)]
pub struct FindSpecBuilder {
    spec: FindSpec,
}

impl FindSpecBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of matching documents to pass over.
    pub fn skip(mut self, skip: u64) -> Self {
        self.spec.skip = Some(skip);
        self
    }

    /// Maximum number of documents to return.
    pub fn limit(mut self, limit: u64) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.spec.sort = Some(Sort::new(field, direction));
        self
    }

    pub fn text_score(mut self, field: impl Into<String>) -> Self {
        self.spec.text_score = Some(field.into());
        self
    }

    pub fn max_time(mut self, max_time: Option<Duration>) -> Self {
        self.spec.max_time = max_time;
        self
    }

    pub fn build(self) -> FindSpec {
        self.spec
    }
}
