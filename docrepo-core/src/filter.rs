//! Composable filter construction.
//!
//! Filters are built from [`Predicate`] fragments. Each fragment is a plain value describing
//! one clause; nothing is evaluated until a slice of fragments is lowered into the store's
//! native query document by [`compose`].
//!
//! # Filter Expression API
//!
//! The [`Filter`] struct provides static constructors for every fragment:
//!
//! - Comparison: `eq`, `ne`, `gt`, `gte`, `lt`, `lte`
//! - Membership: `is_in`
//! - Existence: `exists`
//! - Pattern: `regex`
//! - Full text: `text_search`
//! - Logical: `and`, `or`
//!
//! ```ignore
//! use docrepo::filter::{Filter, compose};
//!
//! let filter = compose(&[
//!     Filter::and([Filter::gt("age", 30), Filter::eq("status", "active")]),
//!     Filter::exists("email", true),
//! ]);
//! // { "$and": [{ "age": { "$gt": 30 } }, { "status": "active" }], "email": { "$exists": true } }
//! ```

use std::convert::Infallible;

use bson::{Bson, Document, doc};

/// Comparison operators for single-field predicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldOp {
    /// Equal to (exact match).
    Eq,
    /// Not equal to.
    Ne,
    /// Greater than.
    Gt,
    /// Greater than or equal to.
    Gte,
    /// Less than.
    Lt,
    /// Less than or equal to.
    Lte,
}

impl FieldOp {
    /// The store operator this comparison lowers to.
    pub fn operator(&self) -> &'static str {
        match self {
            FieldOp::Eq => "$eq",
            FieldOp::Ne => "$ne",
            FieldOp::Gt => "$gt",
            FieldOp::Gte => "$gte",
            FieldOp::Lt => "$lt",
            FieldOp::Lte => "$lte",
        }
    }
}

/// A single filter fragment.
///
/// Fragments are inert values: they can be cloned, compared, inspected and lowered any number
/// of times without affecting each other.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// All children must match.
    And(Vec<Predicate>),
    /// Any child must match.
    Or(Vec<Predicate>),
    /// Field comparison.
    Field {
        field: String,
        op: FieldOp,
        value: Bson,
    },
    /// The field equals one of the values.
    In { field: String, values: Vec<Bson> },
    /// The field is present (`true`) or absent (`false`).
    Exists(String, bool),
    /// The field matches a regular expression.
    Regex {
        field: String,
        pattern: String,
        options: String,
    },
    /// Free-text search against the collection's text index.
    TextSearch(String),
}

impl Predicate {
    /// Combines this predicate with another using logical AND.
    ///
    /// If this predicate is already an AND, the other predicate is appended to it.
    pub fn and(self, other: Predicate) -> Self {
        match self {
            Predicate::And(mut list) => {
                list.push(other);
                Predicate::And(list)
            }
            _ => Predicate::And(vec![self, other]),
        }
    }

    /// Combines this predicate with another using logical OR.
    ///
    /// If this predicate is already an OR, the other predicate is appended to it.
    pub fn or(self, other: Predicate) -> Self {
        match self {
            Predicate::Or(mut list) => {
                list.push(other);
                Predicate::Or(list)
            }
            _ => Predicate::Or(vec![self, other]),
        }
    }

    /// Lowers this predicate into its single `(key, condition)` clause.
    pub fn clause(&self) -> (String, Bson) {
        let Ok(clause) = FilterTranslator.visit_predicate(self);
        clause
    }

    /// Appends this predicate's clause to `filter`.
    ///
    /// A document cannot hold the same key twice, so a clause whose key is already taken is
    /// moved into the filter's `$and` array instead.
    pub fn apply(&self, mut filter: Document) -> Document {
        let (key, condition) = self.clause();

        if !filter.contains_key(&key) {
            filter.insert(key, condition);
            return filter;
        }

        let clause = Bson::Document(doc! { key: condition });
        match filter.get_mut("$and") {
            Some(Bson::Array(clauses)) => clauses.push(clause),
            _ => {
                filter.insert("$and", Bson::Array(vec![clause]));
            }
        }

        filter
    }
}

/// Folds fragments left to right into one filter document.
///
/// An empty slice yields an empty document, which matches every document.
pub fn compose(predicates: &[Predicate]) -> Document {
    predicates
        .iter()
        .fold(Document::new(), |filter, predicate| predicate.apply(filter))
}

/// Static constructors for [`Predicate`] fragments.
pub struct Filter;

impl Filter {
    /// Matches documents where the field equals the value.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Self::field(field, FieldOp::Eq, value)
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Self::field(field, FieldOp::Ne, value)
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Self::field(field, FieldOp::Gt, value)
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Self::field(field, FieldOp::Gte, value)
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Self::field(field, FieldOp::Lt, value)
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Predicate {
        Self::field(field, FieldOp::Lte, value)
    }

    /// Matches documents where the field equals any of the values.
    pub fn is_in<V>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Predicate
    where
        V: Into<Bson>,
    {
        Predicate::In {
            field: field.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// Matches documents where the field is present (`exists == true`) or missing.
    pub fn exists(field: impl Into<String>, exists: bool) -> Predicate {
        Predicate::Exists(field.into(), exists)
    }

    /// Matches documents where the string field matches `pattern`.
    ///
    /// `options` uses the store's regex flags (`i`, `m`, `s`, `x`).
    pub fn regex(
        field: impl Into<String>,
        pattern: impl Into<String>,
        options: impl Into<String>,
    ) -> Predicate {
        Predicate::Regex {
            field: field.into(),
            pattern: pattern.into(),
            options: options.into(),
        }
    }

    /// Full-text search against the collection's text index.
    ///
    /// The term is passed to the store untouched: space separated words are OR-ed,
    /// `-word` excludes and `"a phrase"` must appear as written.
    pub fn text_search(term: impl Into<String>) -> Predicate {
        Predicate::TextSearch(term.into())
    }

    /// Combines predicates such that all must match.
    pub fn and(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::And(predicates.into_iter().collect())
    }

    /// Combines predicates such that any can match.
    pub fn or(predicates: impl IntoIterator<Item = Predicate>) -> Predicate {
        Predicate::Or(predicates.into_iter().collect())
    }

    fn field(field: impl Into<String>, op: FieldOp, value: impl Into<Bson>) -> Predicate {
        Predicate::Field { field: field.into(), op, value: value.into() }
    }
}

/// Walks a [`Predicate`] tree.
pub trait PredicateVisitor {
    type Output;
    type Error;

    fn visit_and(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error>;
    fn visit_or(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error>;
    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error>;
    fn visit_exists(&mut self, field: &str, exists: bool) -> Result<Self::Output, Self::Error>;
    fn visit_regex(
        &mut self,
        field: &str,
        pattern: &str,
        options: &str,
    ) -> Result<Self::Output, Self::Error>;
    fn visit_text_search(&mut self, term: &str) -> Result<Self::Output, Self::Error>;

    fn visit_predicate(&mut self, predicate: &Predicate) -> Result<Self::Output, Self::Error> {
        match predicate {
            Predicate::And(predicates) => self.visit_and(predicates),
            Predicate::Or(predicates) => self.visit_or(predicates),
            Predicate::Field { field, op, value } => self.visit_field(field, *op, value),
            Predicate::In { field, values } => self.visit_in(field, values),
            Predicate::Exists(field, exists) => self.visit_exists(field, *exists),
            Predicate::Regex { field, pattern, options } => {
                self.visit_regex(field, pattern, options)
            }
            Predicate::TextSearch(term) => self.visit_text_search(term),
        }
    }
}

/// Lowers predicates into the store's native `(key, condition)` clauses.
pub struct FilterTranslator;

impl FilterTranslator {
    fn logical(
        &mut self,
        operator: &str,
        predicates: &[Predicate],
    ) -> Result<(String, Bson), Infallible> {
        let clauses = predicates
            .iter()
            .map(|predicate| {
                // Each child gets a fresh accumulator.
                predicate
                    .apply(Document::new())
                    .into()
            })
            .collect::<Vec<Bson>>();

        Ok((operator.to_string(), Bson::Array(clauses)))
    }
}

impl PredicateVisitor for FilterTranslator {
    type Output = (String, Bson);
    type Error = Infallible;

    fn visit_and(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error> {
        self.logical("$and", predicates)
    }

    fn visit_or(&mut self, predicates: &[Predicate]) -> Result<Self::Output, Self::Error> {
        self.logical("$or", predicates)
    }

    fn visit_field(
        &mut self,
        field: &str,
        op: FieldOp,
        value: &Bson,
    ) -> Result<Self::Output, Self::Error> {
        let condition = match op {
            FieldOp::Eq => value.clone(),
            _ => Bson::Document(doc! { op.operator(): value.clone() }),
        };

        Ok((field.to_string(), condition))
    }

    fn visit_in(&mut self, field: &str, values: &[Bson]) -> Result<Self::Output, Self::Error> {
        Ok((field.to_string(), Bson::Document(doc! { "$in": values.to_vec() })))
    }

    fn visit_exists(&mut self, field: &str, exists: bool) -> Result<Self::Output, Self::Error> {
        Ok((field.to_string(), Bson::Document(doc! { "$exists": exists })))
    }

    fn visit_regex(
        &mut self,
        field: &str,
        pattern: &str,
        options: &str,
    ) -> Result<Self::Output, Self::Error> {
        Ok((
            field.to_string(),
            Bson::Document(doc! { "$regex": pattern, "$options": options }),
        ))
    }

    fn visit_text_search(&mut self, term: &str) -> Result<Self::Output, Self::Error> {
        Ok(("$text".to_string(), Bson::Document(doc! { "$search": term })))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn test_comparison_clauses() {
        let filter = compose(&[
            Filter::eq("status", "active"),
            Filter::ne("role", "admin"),
            Filter::gt("age", 30),
            Filter::gte("score", 1.5),
            Filter::lt("visits", 10_i64),
            Filter::lte("rank", 3),
        ]);

        assert_eq!(
            filter,
            doc! {
                "status": "active",
                "role": { "$ne": "admin" },
                "age": { "$gt": 30 },
                "score": { "$gte": 1.5 },
                "visits": { "$lt": 10_i64 },
                "rank": { "$lte": 3 },
            }
        );
    }

    #[test]
    fn test_membership_existence_pattern_and_text() {
        let filter = compose(&[
            Filter::is_in("tags", ["go", "rust"]),
            Filter::exists("email", false),
            Filter::regex("name", "^jo", "i"),
            Filter::text_search("web -test"),
        ]);

        assert_eq!(
            filter,
            doc! {
                "tags": { "$in": ["go", "rust"] },
                "email": { "$exists": false },
                "name": { "$regex": "^jo", "$options": "i" },
                "$text": { "$search": "web -test" },
            }
        );
    }

    #[test]
    fn test_nested_logical_operators() {
        let filter = compose(&[Filter::and([
            Filter::or([Filter::eq("status", "active"), Filter::eq("status", "pending")]),
            Filter::gt("age", 30),
        ])]);

        assert_eq!(
            filter,
            doc! {
                "$and": [
                    { "$or": [{ "status": "active" }, { "status": "pending" }] },
                    { "age": { "$gt": 30 } },
                ]
            }
        );
    }

    #[test]
    fn test_empty_logical_operator_is_delegated() {
        assert_eq!(compose(&[Filter::or([])]), doc! { "$or": [] });
        assert_eq!(compose(&[Filter::and([])]), doc! { "$and": [] });
    }

    #[test]
    fn test_colliding_keys_move_into_and() {
        let filter = compose(&[
            Filter::gt("age", 18),
            Filter::lt("age", 65),
            Filter::lte("age", 64),
        ]);

        assert_eq!(
            filter,
            doc! {
                "age": { "$gt": 18 },
                "$and": [{ "age": { "$lt": 65 } }, { "age": { "$lte": 64 } }],
            }
        );
    }

    #[test]
    fn test_colliding_and_clauses_nest() {
        let filter = compose(&[
            Filter::and([Filter::eq("a", 1)]),
            Filter::and([Filter::eq("b", 2)]),
        ]);

        assert_eq!(
            filter,
            doc! { "$and": [{ "a": 1 }, { "$and": [{ "b": 2 }] }] }
        );
    }

    #[test]
    fn test_chaining_flattens() {
        let predicate = Filter::eq("a", 1)
            .and(Filter::eq("b", 2))
            .and(Filter::eq("c", 3));

        assert_eq!(
            predicate,
            Predicate::And(vec![Filter::eq("a", 1), Filter::eq("b", 2), Filter::eq("c", 3)])
        );
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        assert!(compose(&[]).is_empty());
    }

    fn arb_leaf() -> impl Strategy<Value = Predicate> {
        let field = prop_oneof![Just("age"), Just("name"), Just("status"), Just("score")];
        (field, any::<i32>(), 0..5_u8).prop_map(|(field, value, op)| match op {
            0 => Filter::eq(field, value),
            1 => Filter::gt(field, value),
            2 => Filter::lte(field, value),
            3 => Filter::is_in(field, [value, value.wrapping_add(1)]),
            _ => Filter::exists(field, value % 2 == 0),
        })
    }

    fn arb_predicate() -> impl Strategy<Value = Predicate> {
        arb_leaf().prop_recursive(3, 16, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Predicate::And),
                prop::collection::vec(inner, 0..4).prop_map(Predicate::Or),
            ]
        })
    }

    proptest! {
        #[test]
        fn logical_children_are_lowered_in_isolation(
            children in prop::collection::vec(arb_predicate(), 0..5),
        ) {
            let filter = compose(&[Filter::or(children.clone())]);
            let expected = children
                .iter()
                .map(|child| Bson::Document(compose(std::slice::from_ref(child))))
                .collect::<Vec<_>>();

            prop_assert_eq!(filter.get("$or"), Some(&Bson::Array(expected)));
        }

        #[test]
        fn lowering_does_not_leak_between_filters(
            predicates in prop::collection::vec(arb_predicate(), 0..6),
        ) {
            let first = compose(&predicates);
            let seeded = predicates
                .iter()
                .fold(doc! { "tenant": "acme" }, |filter, predicate| predicate.apply(filter));
            let second = compose(&predicates);

            prop_assert_eq!(&first, &second);
            prop_assert_eq!(seeded.get("tenant"), Some(&Bson::String("acme".to_string())));
        }
    }
}
