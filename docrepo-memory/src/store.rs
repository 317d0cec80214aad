//! In-memory storage implementation.
//!
//! Collections keep their documents in insertion order, which is the natural order reads
//! return them in. Indexes are not used to speed anything up; they exist to enforce the same
//! constraints the real store enforces (uniqueness, TTL expiry) and to back `$text` queries.

use std::{cmp::Ordering, collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use bson::{Bson, DateTime, Document, doc, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use tracing::debug;

use docrepo_core::{
    backend::{StoreBuilder, StoreCollection, StoreDatabase, UpdateOutcome},
    cursor::DocumentStream,
    error::{StoreError, StoreResult},
    index::IndexModel,
    query::{FindSpec, SortDirection},
};

use crate::{
    evaluator::{CompiledFilter, Comparable, compare_field, lookup},
    text::{TextIndex, TextQuery},
    update::UpdateSpec,
};

type StoreMap = HashMap<String, CollectionState>;

/// Thread-safe in-memory document store.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing it to be
/// safely shared across async tasks. Clones, and every collection handle they hand out, share
/// the same underlying data.
///
/// # Performance
///
/// Every operation scans the whole collection. This is fine for tests and development data
/// sets; use the MongoDB adapter for anything larger.
///
/// # Example
///
/// ```ignore
/// use docrepo_memory::InMemoryStore;
/// use docrepo::repository::Repository;
///
/// let store = InMemoryStore::new();
/// let users: Repository<User, _> = Repository::new(&store, "users");
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// collection name -> collection state
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty store.
    pub fn new() -> Self {
        Self { store: Arc::new(RwLock::new(StoreMap::new())) }
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }
}

impl StoreDatabase for InMemoryStore {
    type Collection = InMemoryCollection;

    fn collection(&self, name: &str) -> Self::Collection {
        InMemoryCollection {
            name: name.to_string(),
            store: self.store.clone(),
        }
    }
}

/// One collection of an [`InMemoryStore`].
#[derive(Clone, Debug)]
pub struct InMemoryCollection {
    name: String,
    store: Arc<RwLock<StoreMap>>,
}

#[derive(Debug, Default)]
struct CollectionState {
    documents: Vec<Document>,
    /// Stored with their resolved name filled in.
    indexes: Vec<IndexModel>,
}

/// A TTL index: documents expire `after` past the date at `field`.
struct ExpiryRule {
    field: String,
    after_ms: i64,
}

impl ExpiryRule {
    fn is_expired(&self, document: &Document, now: DateTime) -> bool {
        let earliest = lookup(document, &self.field)
            .into_iter()
            .flat_map(|value| match value {
                Bson::DateTime(date) => vec![*date],
                Bson::Array(items) => items
                    .iter()
                    .filter_map(|item| match item {
                        Bson::DateTime(date) => Some(*date),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            })
            .min();

        earliest.is_some_and(|date| {
            date.timestamp_millis().saturating_add(self.after_ms) <= now.timestamp_millis()
        })
    }
}

/// A unique index as enforced on writes.
struct UniqueRule {
    name: String,
    fields: Vec<String>,
    sparse: bool,
    partial: Option<CompiledFilter>,
}

impl UniqueRule {
    /// The document's keys in this index, `None` when the index skips the document.
    ///
    /// Array values fan out into one key per element, as a multikey index does.
    fn keys(&self, document: &Document) -> Option<Vec<Vec<Bson>>> {
        let values = self
            .fields
            .iter()
            .map(|field| {
                lookup(document, field)
                    .into_iter()
                    .flat_map(|value| match value {
                        Bson::Array(items) if !items.is_empty() => items.clone(),
                        other => vec![other.clone()],
                    })
                    .collect::<Vec<_>>()
            })
            .collect::<Vec<_>>();

        if self.sparse && values.iter().all(Vec::is_empty) {
            return None;
        }
        if let Some(partial) = &self.partial {
            if !partial.matches(document, None) {
                return None;
            }
        }

        let mut keys = vec![Vec::new()];
        for candidates in values {
            let candidates = if candidates.is_empty() {
                vec![Bson::Null]
            } else {
                candidates
            };
            keys = keys
                .into_iter()
                .flat_map(|prefix: Vec<Bson>| {
                    candidates.iter().map(move |value| {
                        let mut key = prefix.clone();
                        key.push(value.clone());
                        key
                    })
                })
                .collect();
        }

        Some(keys)
    }

    /// The first of `keys` also present in `others`.
    fn shared<'a>(keys: &'a [Vec<Bson>], others: &[Vec<Bson>]) -> Option<&'a Vec<Bson>> {
        keys.iter()
            .find(|key| others.iter().any(|other| same_key(key, other)))
    }

    fn duplicate(&self, collection: &str, key: &[Bson]) -> StoreError {
        let key = self
            .fields
            .iter()
            .zip(key)
            .map(|(field, value)| (field.clone(), value.clone()))
            .collect::<Document>();

        StoreError::DuplicateKey(format!(
            "E11000 duplicate key error collection: {collection} index: {} dup key: {key}",
            self.name
        ))
    }
}

fn same_key(left: &[Bson], right: &[Bson]) -> bool {
    left.len() == right.len()
        && left
            .iter()
            .zip(right)
            .all(|(l, r)| Comparable::from(l) == Comparable::from(r))
}

fn text_index_required() -> StoreError {
    StoreError::Backend("text index required for $text query".to_string())
}

impl CollectionState {
    fn expiry_rules(&self) -> Vec<ExpiryRule> {
        self.indexes
            .iter()
            .filter_map(|index| {
                let after = index.options.expire_after?;
                let (field, _) = index.keys.iter().next()?;
                Some(ExpiryRule {
                    field: field.clone(),
                    after_ms: i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
                })
            })
            .collect()
    }

    fn unique_rules(&self) -> StoreResult<Vec<UniqueRule>> {
        let mut rules = vec![UniqueRule {
            name: "_id_".to_string(),
            fields: vec!["_id".to_string()],
            sparse: false,
            partial: None,
        }];

        for index in &self.indexes {
            if index.options.unique != Some(true) || index.is_text() {
                continue;
            }
            rules.push(UniqueRule {
                name: index.resolved_name(),
                fields: index.keys.keys().cloned().collect(),
                sparse: index.options.sparse == Some(true),
                partial: index
                    .options
                    .partial_filter_expression
                    .as_ref()
                    .map(CompiledFilter::compile)
                    .transpose()?,
            });
        }

        Ok(rules)
    }

    fn text_index(&self) -> Option<TextIndex> {
        self.indexes
            .iter()
            .find(|index| index.is_text())
            .map(TextIndex::from_model)
    }

    fn purge_expired(&mut self, collection: &str, now: DateTime) {
        let rules = self.expiry_rules();
        if rules.is_empty() {
            return;
        }

        let before = self.documents.len();
        self.documents
            .retain(|document| !rules.iter().any(|rule| rule.is_expired(document, now)));

        let purged = before - self.documents.len();
        if purged > 0 {
            debug!(target: "docrepo::memory", collection, purged, "purged expired documents");
        }
    }

    /// Positions of the live documents matching `filter`, with their text score.
    fn matching(
        &self,
        filter: &CompiledFilter,
        now: DateTime,
    ) -> StoreResult<Vec<(usize, Option<f64>)>> {
        let text = match filter.text() {
            Some(search) => {
                let index = self.text_index().ok_or_else(text_index_required)?;
                let language = search.language.as_deref().unwrap_or(index.language());
                let query = TextQuery::parse(&search.search, language);
                Some((index, query))
            }
            None => None,
        };
        let expiry = self.expiry_rules();

        let mut hits = Vec::new();
        for (position, document) in self.documents.iter().enumerate() {
            if expiry.iter().any(|rule| rule.is_expired(document, now)) {
                continue;
            }

            let score = text
                .as_ref()
                .and_then(|(index, query)| index.score(document, query));
            if filter.matches(document, score) {
                hits.push((position, score));
            }
        }

        Ok(hits)
    }

    /// Fails if `candidate` would collide with another document in a unique index.
    /// `replacing` is the position of the document `candidate` replaces.
    fn check_unique(
        &self,
        collection: &str,
        candidate: &Document,
        replacing: Option<usize>,
    ) -> StoreResult<()> {
        for rule in self.unique_rules()? {
            let Some(keys) = rule.keys(candidate) else {
                continue;
            };

            let collision = self
                .documents
                .iter()
                .enumerate()
                .filter(|(position, _)| Some(*position) != replacing)
                .filter_map(|(_, document)| rule.keys(document))
                .find_map(|others| UniqueRule::shared(&keys, &others).cloned());

            if let Some(key) = collision {
                return Err(rule.duplicate(collection, &key));
            }
        }

        Ok(())
    }

    fn add_index(&mut self, collection: &str, mut model: IndexModel) -> StoreResult<String> {
        if model.keys.is_empty() {
            return Err(StoreError::Backend("index keys cannot be empty".to_string()));
        }
        for (field, kind) in &model.keys {
            let valid = match kind {
                Bson::Int32(direction) => *direction == 1 || *direction == -1,
                Bson::Int64(direction) => *direction == 1 || *direction == -1,
                Bson::String(kind) => kind == "text",
                _ => false,
            };
            if !valid {
                return Err(StoreError::Backend(format!("bad index key pattern for field {field}: {kind}")));
            }
        }
        if model.options.expire_after.is_some() && model.keys.len() != 1 {
            return Err(StoreError::Backend(
                "TTL indexes are single-field indexes, compound indexes do not support TTL".to_string(),
            ));
        }

        let name = model.resolved_name();
        model.options.name = Some(name.clone());

        for existing in &self.indexes {
            let existing_name = existing.resolved_name();
            if existing_name == name {
                if existing == &model {
                    return Ok(name);
                }
                return Err(StoreError::Backend(format!(
                    "an index named {name} already exists with different options"
                )));
            }
            if existing.keys == model.keys {
                return Err(StoreError::Backend(format!(
                    "index already exists with a different name: {existing_name}"
                )));
            }
            if existing.is_text() && model.is_text() {
                return Err(StoreError::Backend(format!(
                    "a collection may have at most one text index, found {existing_name}"
                )));
            }
        }

        self.indexes.push(model);

        // Existing documents have to satisfy a new unique index.
        if let Err(err) = self.check_existing_unique(collection, &name) {
            self.indexes.pop();
            return Err(err);
        }

        debug!(target: "docrepo::memory", collection, index = %name, "created index");
        Ok(name)
    }

    fn check_existing_unique(&self, collection: &str, name: &str) -> StoreResult<()> {
        let rules = self.unique_rules()?;
        let Some(rule) = rules.iter().find(|rule| rule.name == name) else {
            return Ok(());
        };

        let mut seen: Vec<Vec<Bson>> = Vec::new();
        for keys in self.documents.iter().filter_map(|document| rule.keys(document)) {
            if let Some(key) = UniqueRule::shared(&keys, &seen) {
                return Err(rule.duplicate(collection, key));
            }
            seen.extend(keys);
        }

        Ok(())
    }
}

impl InMemoryCollection {
    async fn select(&self, filter: &Document, spec: &FindSpec) -> StoreResult<Vec<Document>> {
        let compiled = CompiledFilter::compile(filter)?;
        if spec.text_score.is_some() && compiled.text().is_none() {
            return Err(StoreError::Backend(
                "query requires text score metadata, but it is not available".to_string(),
            ));
        }

        let store = self.store.read().await;
        let empty = CollectionState::default();
        let state = store.get(&self.name).unwrap_or(&empty);

        let mut hits = state.matching(&compiled, DateTime::now())?;
        if spec.text_score.is_some() {
            hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
        } else if let Some(sort) = &spec.sort {
            hits.sort_by(|a, b| {
                let ordering = compare_field(&state.documents[a.0], &state.documents[b.0], &sort.field);
                match sort.direction {
                    SortDirection::Asc => ordering,
                    SortDirection::Desc => ordering.reverse(),
                }
            });
        }

        let skip = usize::try_from(spec.skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = match spec.limit {
            None | Some(0) => usize::MAX,
            Some(limit) => usize::try_from(limit).unwrap_or(usize::MAX),
        };

        Ok(hits
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|(position, score)| {
                let mut document = state.documents[position].clone();
                if let (Some(field), Some(score)) = (&spec.text_score, score) {
                    document.insert(field.clone(), score);
                }
                document
            })
            .collect())
    }

    async fn update(&self, filter: Document, update: Document, multi: bool) -> StoreResult<UpdateOutcome> {
        let compiled = CompiledFilter::compile(&filter)?;
        let update = UpdateSpec::parse(&update)?;

        let mut store = self.store.write().await;
        let state = store.entry(self.name.clone()).or_default();
        let now = DateTime::now();
        state.purge_expired(&self.name, now);

        let mut hits = state.matching(&compiled, now)?;
        if !multi {
            hits.truncate(1);
        }

        let mut outcome = UpdateOutcome::default();
        for (position, _) in hits {
            outcome.matched += 1;

            let updated = update.apply(&state.documents[position])?;
            if updated == state.documents[position] {
                continue;
            }

            state.check_unique(&self.name, &updated, Some(position))?;
            state.documents[position] = updated;
            outcome.modified += 1;
        }

        debug!(
            target: "docrepo::memory",
            collection = %self.name,
            matched = outcome.matched,
            modified = outcome.modified,
            "updated documents"
        );
        Ok(outcome)
    }

    async fn delete(&self, filter: Document, multi: bool) -> StoreResult<u64> {
        let compiled = CompiledFilter::compile(&filter)?;

        let mut store = self.store.write().await;
        let Some(state) = store.get_mut(&self.name) else {
            return Ok(0);
        };
        let now = DateTime::now();
        state.purge_expired(&self.name, now);

        let mut hits = state.matching(&compiled, now)?;
        if !multi {
            hits.truncate(1);
        }

        for (position, _) in hits.iter().rev() {
            state.documents.remove(*position);
        }

        Ok(hits.len() as u64)
    }
}

#[async_trait]
impl StoreCollection for InMemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn insert_one(&self, document: Document) -> StoreResult<Bson> {
        // The store puts a generated _id first.
        let (id, document) = match document.get("_id") {
            Some(id) => (id.clone(), document),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                let mut with_id = doc! { "_id": id.clone() };
                for (key, value) in document {
                    with_id.insert(key, value);
                }
                (id, with_id)
            }
        };

        let mut store = self.store.write().await;
        let state = store.entry(self.name.clone()).or_default();
        state.purge_expired(&self.name, DateTime::now());
        state.check_unique(&self.name, &document, None)?;
        state.documents.push(document);

        Ok(id)
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> StoreResult<DocumentStream> {
        let documents = self.select(&filter, &spec).await?;
        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn find_one(&self, filter: Document, mut spec: FindSpec) -> StoreResult<Option<Document>> {
        spec.limit = Some(1);
        Ok(self.select(&filter, &spec).await?.into_iter().next())
    }

    async fn update_one(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        self.update(filter, update, false).await
    }

    async fn update_many(&self, filter: Document, update: Document) -> StoreResult<UpdateOutcome> {
        self.update(filter, update, true).await
    }

    async fn delete_one(&self, filter: Document) -> StoreResult<u64> {
        self.delete(filter, false).await
    }

    async fn delete_many(&self, filter: Document) -> StoreResult<u64> {
        self.delete(filter, true).await
    }

    // Every call completes immediately, so there is no time limit to enforce.
    async fn count_documents(&self, filter: Document, _max_time: Option<Duration>) -> StoreResult<u64> {
        let compiled = CompiledFilter::compile(&filter)?;

        let store = self.store.read().await;
        let empty = CollectionState::default();
        let state = store.get(&self.name).unwrap_or(&empty);

        Ok(state.matching(&compiled, DateTime::now())?.len() as u64)
    }

    async fn create_index(&self, model: IndexModel) -> StoreResult<String> {
        if let Some(partial) = &model.options.partial_filter_expression {
            CompiledFilter::compile(partial)?;
        }

        let mut store = self.store.write().await;
        let state = store.entry(self.name.clone()).or_default();
        state.purge_expired(&self.name, DateTime::now());
        state.add_index(&self.name, model)
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
///
/// Collections can be seeded with documents, which is handy for fixtures.
///
/// # Example
///
/// ```ignore
/// use docrepo_memory::InMemoryStore;
/// use docrepo::backend::StoreBuilder;
///
/// let store = InMemoryStore::builder()
///     .with_documents("users", vec![doc! { "name": "Ada" }])
///     .build()
///     .await?;
/// ```
#[derive(Default, Debug)]
pub struct InMemoryStoreBuilder {
    seed: Vec<(String, Vec<Document>)>,
}

impl InMemoryStoreBuilder {
    pub fn with_documents(mut self, collection: impl Into<String>, documents: Vec<Document>) -> Self {
        self.seed.push((collection.into(), documents));
        self
    }
}

#[async_trait]
impl StoreBuilder for InMemoryStoreBuilder {
    type Store = InMemoryStore;

    /// Builds the store, inserting the seeded documents in order.
    ///
    /// # Errors
    ///
    /// Fails with [`StoreError::DuplicateKey`] if seeded documents share an `_id`.
    async fn build(self) -> StoreResult<Self::Store> {
        let store = InMemoryStore::new();

        for (collection, documents) in self.seed {
            let collection = store.collection(&collection);
            for document in documents {
                collection.insert_one(document).await?;
            }
        }

        Ok(store)
    }
}
