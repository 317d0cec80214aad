//! Skip/limit paging of list operations.

use serde::{Deserialize, Serialize};

/// Page size used when a caller asks for a limit of zero.
pub const DEFAULT_PAGE_SIZE: u64 = 10;

/// Which slice of a result set to return.
///
/// A `limit` of zero does not mean "nothing": it stands for the default page size.
///
/// # Example
///
/// ```ignore
/// use docrepo::page::Pagination;
///
/// let page = Pagination::new(20, 0).resolve(10);
/// assert_eq!(page.limit, 10);
/// ```
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// Number of matching documents to pass over.
    pub skip: u64,
    /// Maximum number of documents to return.
    pub limit: u64,
}

impl Pagination {
    pub fn new(skip: u64, limit: u64) -> Self {
        Self { skip, limit }
    }

    /// Replaces a zero limit with `default_page_size`.
    pub fn resolve(self, default_page_size: u64) -> Self {
        let limit = if self.limit == 0 { default_page_size } else { self.limit };
        Self { skip: self.skip, limit }
    }
}

impl Default for Pagination {
    fn default() -> Self {
        Self { skip: 0, limit: DEFAULT_PAGE_SIZE }
    }
}
