//! Index configuration.
//!
//! An index is described by an [`IndexModel`]: its key document plus an [`IndexOptions`]
//! record. Options are assembled from [`IndexOption`] fragments applied in order, each writing
//! one field of the record.
//!
//! ```ignore
//! use docrepo::index::{IndexOption, IndexOptions};
//!
//! let options = IndexOptions::from_options([
//!     IndexOption::Unique(true),
//!     IndexOption::Name("uniq_email".to_string()),
//! ]);
//! ```

use std::time::Duration;

use bson::{Bson, Document};

use crate::filter::{Predicate, compose};

/// Comparison strength of a collation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollationStrength {
    /// Base characters only.
    Primary,
    /// Base characters and diacritics.
    Secondary,
    /// Base characters, diacritics and case.
    Tertiary,
    Quaternary,
    Identical,
}

impl CollationStrength {
    pub fn level(&self) -> u32 {
        match self {
            CollationStrength::Primary => 1,
            CollationStrength::Secondary => 2,
            CollationStrength::Tertiary => 3,
            CollationStrength::Quaternary => 4,
            CollationStrength::Identical => 5,
        }
    }
}

/// Language-specific string comparison rules attached to an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collation {
    pub locale: String,
    pub strength: Option<CollationStrength>,
    pub case_level: Option<bool>,
    pub numeric_ordering: Option<bool>,
}

impl Collation {
    pub fn new(locale: impl Into<String>) -> Self {
        Self {
            locale: locale.into(),
            strength: None,
            case_level: None,
            numeric_ordering: None,
        }
    }

    pub fn with_strength(mut self, strength: CollationStrength) -> Self {
        self.strength = Some(strength);
        self
    }

    pub fn with_case_level(mut self, case_level: bool) -> Self {
        self.case_level = Some(case_level);
        self
    }

    pub fn with_numeric_ordering(mut self, numeric_ordering: bool) -> Self {
        self.numeric_ordering = Some(numeric_ordering);
        self
    }
}

/// The option record handed to the store when an index is built.
///
/// Unset fields are left to the store's defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IndexOptions {
    pub unique: Option<bool>,
    pub sparse: Option<bool>,
    /// Documents expire once the indexed date is older than this.
    pub expire_after: Option<Duration>,
    pub name: Option<String>,
    pub partial_filter_expression: Option<Document>,
    pub collation: Option<Collation>,
    pub wildcard_projection: Option<Document>,
    pub hidden: Option<bool>,
    /// Per-field weights of a text index.
    pub weights: Option<Document>,
    /// Stopword and stemming language of a text index.
    pub default_language: Option<String>,
}

impl IndexOptions {
    /// Applies every fragment in order to a fresh record.
    ///
    /// Fragments touching the same field overwrite each other, last one wins.
    pub fn from_options(options: impl IntoIterator<Item = IndexOption>) -> Self {
        options.into_iter().fold(Self::default(), |mut record, option| {
            option.apply(&mut record);
            record
        })
    }
}

/// A single index option fragment.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexOption {
    /// Rejects writes that would duplicate an indexed value.
    Unique(bool),
    /// Skips documents that lack the indexed field.
    Sparse(bool),
    /// Expires documents this many seconds after the indexed date.
    ExpireAfterSeconds(u32),
    /// Explicit index name.
    Name(String),
    /// Only indexes documents matching this filter.
    PartialFilterExpression(Document),
    Collation(Collation),
    /// Field selection of a wildcard index.
    WildcardProjection(Document),
    /// Hides the index from the query planner.
    Hidden(bool),
}

impl IndexOption {
    /// Expiry expressed as a [`Duration`]; sub-second precision is dropped.
    pub fn ttl(after: Duration) -> Self {
        let seconds = u32::try_from(after.as_secs()).unwrap_or(u32::MAX);
        IndexOption::ExpireAfterSeconds(seconds)
    }

    /// Partial filter built from predicate fragments.
    pub fn partial_filter(predicates: &[Predicate]) -> Self {
        IndexOption::PartialFilterExpression(compose(predicates))
    }

    /// Writes this fragment's field into `options`.
    pub fn apply(self, options: &mut IndexOptions) {
        match self {
            IndexOption::Unique(unique) => options.unique = Some(unique),
            IndexOption::Sparse(sparse) => options.sparse = Some(sparse),
            IndexOption::ExpireAfterSeconds(seconds) => {
                options.expire_after = Some(Duration::from_secs(u64::from(seconds)))
            }
            IndexOption::Name(name) => options.name = Some(name),
            IndexOption::PartialFilterExpression(filter) => {
                options.partial_filter_expression = Some(filter)
            }
            IndexOption::Collation(collation) => options.collation = Some(collation),
            IndexOption::WildcardProjection(projection) => {
                options.wildcard_projection = Some(projection)
            }
            IndexOption::Hidden(hidden) => options.hidden = Some(hidden),
        }
    }
}

/// Describes one index: its keys and its options.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexModel {
    pub keys: Document,
    pub options: IndexOptions,
}

impl IndexModel {
    pub fn new(keys: Document, options: IndexOptions) -> Self {
        Self { keys, options }
    }

    /// Single-field ascending index.
    pub fn ascending(field: impl Into<String>, options: IndexOptions) -> Self {
        let mut keys = Document::new();
        keys.insert(field.into(), 1_i32);
        Self { keys, options }
    }

    /// Compound text index over every weighted field.
    ///
    /// Weights and default language are written into `options`, overriding whatever was
    /// there.
    pub fn text<K>(
        weights: impl IntoIterator<Item = (K, i32)>,
        language: impl Into<String>,
        mut options: IndexOptions,
    ) -> Self
    where
        K: Into<String>,
    {
        let mut keys = Document::new();
        let mut weight_doc = Document::new();

        for (field, weight) in weights {
            let field = field.into();
            keys.insert(field.clone(), "text");
            weight_doc.insert(field, weight);
        }

        options.weights = Some(weight_doc);
        options.default_language = Some(language.into());

        Self { keys, options }
    }

    /// True for indexes with at least one `"text"` key.
    pub fn is_text(&self) -> bool {
        self.keys
            .values()
            .any(|direction| matches!(direction, Bson::String(kind) if kind == "text"))
    }

    /// The explicit name, or the name the store derives from the keys (`email_1`,
    /// `name_text_bio_text`).
    pub fn resolved_name(&self) -> String {
        if let Some(name) = &self.options.name {
            return name.clone();
        }

        self.keys
            .iter()
            .map(|(field, direction)| {
                let direction = match direction {
                    Bson::Int32(value) => value.to_string(),
                    Bson::Int64(value) => value.to_string(),
                    Bson::Double(value) => value.to_string(),
                    Bson::String(value) => value.clone(),
                    other => other.to_string(),
                };
                format!("{field}_{direction}")
            })
            .collect::<Vec<_>>()
            .join("_")
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;
    use crate::filter::Filter;

    #[test]
    fn test_each_fragment_writes_its_own_field() {
        let collation = Collation::new("en").with_strength(CollationStrength::Secondary);
        let options = IndexOptions::from_options([
            IndexOption::Unique(true),
            IndexOption::Sparse(true),
            IndexOption::ExpireAfterSeconds(3600),
            IndexOption::Name("session_ttl".to_string()),
            IndexOption::PartialFilterExpression(doc! { "active": true }),
            IndexOption::Collation(collation.clone()),
            IndexOption::WildcardProjection(doc! { "meta": 1 }),
            IndexOption::Hidden(false),
        ]);

        assert_eq!(
            options,
            IndexOptions {
                unique: Some(true),
                sparse: Some(true),
                expire_after: Some(Duration::from_secs(3600)),
                name: Some("session_ttl".to_string()),
                partial_filter_expression: Some(doc! { "active": true }),
                collation: Some(collation),
                wildcard_projection: Some(doc! { "meta": 1 }),
                hidden: Some(false),
                weights: None,
                default_language: None,
            }
        );
    }

    #[test]
    fn test_last_fragment_wins() {
        let options = IndexOptions::from_options([
            IndexOption::Name("first".to_string()),
            IndexOption::Unique(true),
            IndexOption::Name("second".to_string()),
        ]);

        assert_eq!(options.name.as_deref(), Some("second"));
        assert_eq!(options.unique, Some(true));
    }

    #[test]
    fn test_no_fragments_is_default() {
        assert_eq!(IndexOptions::from_options([]), IndexOptions::default());
    }

    #[test]
    fn test_ttl_truncates_to_seconds() {
        assert_eq!(
            IndexOption::ttl(Duration::from_millis(90_500)),
            IndexOption::ExpireAfterSeconds(90)
        );
    }

    #[test]
    fn test_partial_filter_from_predicates() {
        let option = IndexOption::partial_filter(&[Filter::exists("email", true)]);

        assert_eq!(
            option,
            IndexOption::PartialFilterExpression(doc! { "email": { "$exists": true } })
        );
    }

    #[test]
    fn test_resolved_names() {
        let ascending = IndexModel::ascending("email", IndexOptions::default());
        assert_eq!(ascending.resolved_name(), "email_1");
        assert!(!ascending.is_text());

        let text = IndexModel::text([("name", 10), ("bio", 5)], "english", IndexOptions::default());
        assert_eq!(text.resolved_name(), "name_text_bio_text");
        assert!(text.is_text());

        let named = IndexModel::ascending(
            "email",
            IndexOptions::from_options([IndexOption::Name("uniq_email".to_string())]),
        );
        assert_eq!(named.resolved_name(), "uniq_email");
    }

    #[test]
    fn test_text_model_carries_weights_and_language() {
        let model = IndexModel::text(
            [("name", 10), ("bio", 5), ("tags", 1)],
            "spanish",
            IndexOptions::from_options([IndexOption::Sparse(true)]),
        );

        assert_eq!(model.keys, doc! { "name": "text", "bio": "text", "tags": "text" });
        assert_eq!(model.options.weights, Some(doc! { "name": 10, "bio": 5, "tags": 1 }));
        assert_eq!(model.options.default_language.as_deref(), Some("spanish"));
        assert_eq!(model.options.sparse, Some(true));
    }
}
