//! Repository configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::page::DEFAULT_PAGE_SIZE;

/// Tunables shared by every operation of a repository.
///
/// Every field has a default, so a partial (or empty) configuration document deserializes.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Page size used by list operations called with a limit of zero.
    pub default_page_size: u64,
    /// Server-side time limit of reads and counts, in milliseconds.
    pub max_time_ms: Option<u64>,
}

impl RepositoryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default_page_size(mut self, default_page_size: u64) -> Self {
        self.default_page_size = default_page_size;
        self
    }

    pub fn with_max_time(mut self, max_time: Duration) -> Self {
        self.max_time_ms = Some(u64::try_from(max_time.as_millis()).unwrap_or(u64::MAX));
        self
    }

    pub fn max_time(&self) -> Option<Duration> {
        self.max_time_ms.map(Duration::from_millis)
    }
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self { default_page_size: DEFAULT_PAGE_SIZE, max_time_ms: None }
    }
}
