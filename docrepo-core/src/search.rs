//! Full-text search over a repository's collection.
//!
//! A collection gets one compound text index covering every searchable field, each with its
//! own weight. Searches are ranked by the store's relevance score, best match first.
//!
//! ```ignore
//! repo.create_full_text_index([("name", 10), ("bio", 5), ("tags", 1)], Some("english"))
//!     .await?;
//!
//! let hits = repo.search(0, 10, "web -test").await?;
//! ```

use tracing::debug;

use crate::{
    backend::StoreCollection,
    document::Entity,
    error::{ErrorKind, RepositoryResult},
    filter::{Filter, compose},
    index::{IndexModel, IndexOption, IndexOptions},
    query::FindSpec,
    repository::Repository,
};

/// Language used when none is given.
pub const DEFAULT_LANGUAGE: &str = "english";

/// Field the relevance score is projected into.
pub const SCORE_FIELD: &str = "score";

impl<T, C> Repository<T, C>
where
    T: Entity,
    C: StoreCollection,
{
    /// Builds the collection's text index over the weighted fields.
    ///
    /// The index is sparse and named `<language>_fts_index`. An empty or missing `language`
    /// falls back to [`DEFAULT_LANGUAGE`].
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::IndexCreationFailed`], for instance when the collection already
    /// has a different text index.
    pub async fn create_full_text_index<K>(
        &self,
        weights: impl IntoIterator<Item = (K, i32)>,
        language: Option<&str>,
    ) -> RepositoryResult<()>
    where
        K: Into<String>,
    {
        let language = language
            .filter(|language| !language.is_empty())
            .unwrap_or(DEFAULT_LANGUAGE);
        let options = IndexOptions::from_options([
            IndexOption::Name(format!("{language}_fts_index")),
            IndexOption::Sparse(true),
        ]);
        let model = IndexModel::text(weights, language, options);
        debug!(
            target: "docrepo::repository",
            collection = self.collection_name(),
            language,
            fields = model.keys.len(),
            "creating full-text index"
        );

        self.build_index(model).await
    }

    /// Returns one page of the documents matching `term`, most relevant first.
    ///
    /// The term is handed to the store as is: words are OR-ed, `-word` excludes and
    /// `"a phrase"` must appear verbatim. A `limit` of zero means the default page size.
    ///
    /// # Errors
    ///
    /// Fails with [`ErrorKind::FindManyFailed`], plus [`ErrorKind::NotFound`] when nothing
    /// matched.
    pub async fn search(&self, skip: u64, limit: u64, term: &str) -> RepositoryResult<Vec<T>> {
        let page = self.page(skip, limit);
        debug!(
            target: "docrepo::repository",
            collection = self.collection_name(),
            skip = page.skip,
            limit = page.limit,
            term,
            "searching documents"
        );

        let spec = FindSpec::builder()
            .skip(page.skip)
            .limit(page.limit)
            .text_score(SCORE_FIELD)
            .max_time(self.config().max_time())
            .build();

        self.collect(ErrorKind::FindManyFailed, compose(&[Filter::text_search(term)]), spec)
            .await
    }
}
