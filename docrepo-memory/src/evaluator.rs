//! Filter document evaluation for in-memory collections.
//!
//! Filters arrive in the store's native document form. They are compiled once into a
//! [`CompiledFilter`] tree, which rejects malformed filters up front, and then matched against
//! every candidate document.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};
use regex::{Regex, RegexBuilder};

use docrepo_core::error::{StoreError, StoreResult};

/// Comparable view of a BSON value.
///
/// Numbers of every width compare as `f64`, so `Int32(3)`, `Int64(3)` and `Double(3.0)` are
/// equal. Values of different types never order against each other.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All integers and floats normalized to f64
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Anything else, compared structurally.
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(f64::from(*value)),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(items) => Comparable::Array(items.iter().map(Comparable::from).collect()),
            Bson::Document(doc) => Comparable::Map(
                doc.iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>(),
            ),
            other => Comparable::Other(other),
        }
    }
}

impl PartialEq for Comparable<'_> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl PartialOrd for Comparable<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.bytes().partial_cmp(&b.bytes()),
            _ => None,
        }
    }
}

impl Comparable<'_> {
    // Cross-type sort order of the store.
    fn type_rank(&self) -> u8 {
        match self {
            Comparable::Null => 0,
            Comparable::Number(_) => 1,
            Comparable::String(_) => 2,
            Comparable::Map(_) => 3,
            Comparable::Array(_) => 4,
            Comparable::ObjectId(_) => 5,
            Comparable::Bool(_) => 6,
            Comparable::DateTime(_) => 7,
            Comparable::Other(_) => 8,
        }
    }
}

/// Every value reachable at a dotted `path`.
///
/// Arrays met along the way fan out: `tags.name` on `{ tags: [{ name: "a" }, { name: "b" }] }`
/// yields both names. A numeric segment also indexes into arrays.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = match segments.next().and_then(|first| document.get(first)) {
        Some(value) => vec![value],
        None => return Vec::new(),
    };

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            match value {
                Bson::Document(inner) => next.extend(inner.get(segment)),
                Bson::Array(items) => {
                    if let Some(item) = segment.parse::<usize>().ok().and_then(|i| items.get(i)) {
                        next.push(item);
                    }
                    for item in items {
                        if let Bson::Document(inner) = item {
                            next.extend(inner.get(segment));
                        }
                    }
                }
                _ => {}
            }
        }
        current = next;
    }

    current
}

/// Orders two documents by the value at `path`, missing values first.
pub(crate) fn compare_field(left: &Document, right: &Document, path: &str) -> Ordering {
    let left = lookup(left, path).first().map(|v| Comparable::from(*v)).unwrap_or(Comparable::Null);
    let right = lookup(right, path).first().map(|v| Comparable::from(*v)).unwrap_or(Comparable::Null);

    left.type_rank()
        .cmp(&right.type_rank())
        .then_with(|| left.partial_cmp(&right).unwrap_or(Ordering::Equal))
}

// Each value, plus the elements of array values.
fn candidates<'a>(values: &[&'a Bson]) -> impl Iterator<Item = &'a Bson> {
    values.iter().flat_map(|value| {
        let elements: &'a [Bson] = match *value {
            Bson::Array(items) => items.as_slice(),
            _ => &[],
        };
        std::iter::once(*value).chain(elements.iter())
    })
}

fn equals_any(values: &[&Bson], expected: &Bson) -> bool {
    if matches!(expected, Bson::Null) && values.is_empty() {
        return true;
    }

    let expected = Comparable::from(expected);
    candidates(values).any(|value| Comparable::from(value) == expected)
}

fn compares_any(values: &[&Bson], bound: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
    let bound = Comparable::from(bound);
    candidates(values).any(|value| {
        Comparable::from(value)
            .partial_cmp(&bound)
            .is_some_and(&accept)
    })
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Backend(message.into())
}

/// A single-field condition such as `{ $gt: 3 }`.
#[derive(Debug)]
enum Condition {
    Eq(Bson),
    Ne(Bson),
    Gt(Bson),
    Gte(Bson),
    Lt(Bson),
    Lte(Bson),
    In(Vec<Bson>),
    Nin(Vec<Bson>),
    Exists(bool),
    Regex(Regex),
    Not(Vec<Condition>),
}

impl Condition {
    fn matches(&self, values: &[&Bson]) -> bool {
        match self {
            Condition::Eq(expected) => equals_any(values, expected),
            Condition::Ne(expected) => !equals_any(values, expected),
            Condition::Gt(bound) => compares_any(values, bound, |o| o == Ordering::Greater),
            Condition::Gte(bound) => compares_any(values, bound, |o| o != Ordering::Less),
            Condition::Lt(bound) => compares_any(values, bound, |o| o == Ordering::Less),
            Condition::Lte(bound) => compares_any(values, bound, |o| o != Ordering::Greater),
            Condition::In(options) => options.iter().any(|option| equals_any(values, option)),
            Condition::Nin(options) => !options.iter().any(|option| equals_any(values, option)),
            Condition::Exists(exists) => values.is_empty() != *exists,
            Condition::Regex(regex) => candidates(values)
                .any(|value| matches!(value, Bson::String(text) if regex.is_match(text))),
            Condition::Not(conditions) => !conditions.iter().all(|c| c.matches(values)),
        }
    }

    fn compile_all(value: &Bson) -> StoreResult<Vec<Condition>> {
        let operators = match value {
            Bson::Document(operators) if is_operator_document(operators) => operators,
            literal => return Ok(vec![Condition::Eq(literal.clone())]),
        };

        let options = match operators.get("$options") {
            None => None,
            Some(Bson::String(options)) => Some(options.as_str()),
            Some(_) => return Err(invalid("$options has to be a string")),
        };
        if options.is_some() && !operators.contains_key("$regex") {
            return Err(invalid("$options needs a $regex"));
        }

        let mut conditions = Vec::with_capacity(operators.len());
        for (operator, argument) in operators {
            let condition = match operator.as_str() {
                "$eq" => Condition::Eq(argument.clone()),
                "$ne" => Condition::Ne(argument.clone()),
                "$gt" => Condition::Gt(argument.clone()),
                "$gte" => Condition::Gte(argument.clone()),
                "$lt" => Condition::Lt(argument.clone()),
                "$lte" => Condition::Lte(argument.clone()),
                "$in" => Condition::In(array_argument(operator, argument)?),
                "$nin" => Condition::Nin(array_argument(operator, argument)?),
                "$exists" => Condition::Exists(truthy(argument)),
                "$regex" => Condition::Regex(compile_regex(argument, options.unwrap_or_default())?),
                "$options" => continue,
                "$not" => match argument {
                    Bson::Document(inner) if is_operator_document(inner) => {
                        Condition::Not(Condition::compile_all(argument)?)
                    }
                    _ => return Err(invalid("$not needs a document of operators")),
                },
                other => return Err(invalid(format!("unknown operator: {other}"))),
            };
            conditions.push(condition);
        }

        Ok(conditions)
    }
}

fn is_operator_document(document: &Document) -> bool {
    document.keys().next().is_some_and(|key| key.starts_with('$'))
}

fn array_argument(operator: &str, argument: &Bson) -> StoreResult<Vec<Bson>> {
    match argument {
        Bson::Array(values) => Ok(values.clone()),
        _ => Err(invalid(format!("{operator} needs an array"))),
    }
}

fn truthy(value: &Bson) -> bool {
    match value {
        Bson::Boolean(value) => *value,
        Bson::Int32(value) => *value != 0,
        Bson::Int64(value) => *value != 0,
        Bson::Double(value) => *value != 0.0,
        Bson::Null => false,
        _ => true,
    }
}

fn compile_regex(pattern: &Bson, options: &str) -> StoreResult<Regex> {
    let Bson::String(pattern) = pattern else {
        return Err(invalid("$regex has to be a string"));
    };

    let mut builder = RegexBuilder::new(pattern);
    for flag in options.chars() {
        match flag {
            'i' => builder.case_insensitive(true),
            'm' => builder.multi_line(true),
            's' => builder.dot_matches_new_line(true),
            'x' => builder.ignore_whitespace(true),
            other => return Err(invalid(format!("invalid flag in regex options: {other}"))),
        };
    }

    builder
        .build()
        .map_err(|e| invalid(format!("invalid regular expression: {e}")))
}

/// The `$text` clause of a filter.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextSearch {
    pub search: String,
    pub language: Option<String>,
}

#[derive(Debug)]
enum Matcher {
    And(Vec<Matcher>),
    Or(Vec<Matcher>),
    Nor(Vec<Matcher>),
    Text,
    Field { path: String, conditions: Vec<Condition> },
}

impl Matcher {
    fn compile(filter: &Document, text: &mut Option<TextSearch>) -> StoreResult<Self> {
        let mut clauses = Vec::with_capacity(filter.len());

        for (key, value) in filter {
            let clause = match key.as_str() {
                "$and" => Matcher::And(Self::compile_branches(key, value, text)?),
                "$or" => Matcher::Or(Self::compile_branches(key, value, text)?),
                "$nor" => Matcher::Nor(Self::compile_branches(key, value, text)?),
                "$text" => {
                    if text.is_some() {
                        return Err(invalid("too many text expressions"));
                    }
                    *text = Some(parse_text(value)?);
                    Matcher::Text
                }
                other if other.starts_with('$') => {
                    return Err(invalid(format!("unknown top level operator: {other}")));
                }
                path => Matcher::Field {
                    path: path.to_string(),
                    conditions: Condition::compile_all(value)?,
                },
            };
            clauses.push(clause);
        }

        Ok(Matcher::And(clauses))
    }

    fn compile_branches(
        operator: &str,
        value: &Bson,
        text: &mut Option<TextSearch>,
    ) -> StoreResult<Vec<Matcher>> {
        let branches = match value {
            Bson::Array(branches) if !branches.is_empty() => branches,
            _ => return Err(invalid(format!("{operator} must be a nonempty array"))),
        };

        branches
            .iter()
            .map(|branch| match branch {
                Bson::Document(branch) => Self::compile(branch, text),
                _ => Err(invalid(format!("{operator} entries need to be full objects"))),
            })
            .collect()
    }

    fn matches(&self, document: &Document, text_score: Option<f64>) -> bool {
        match self {
            Matcher::And(all) => all.iter().all(|m| m.matches(document, text_score)),
            Matcher::Or(any) => any.iter().any(|m| m.matches(document, text_score)),
            Matcher::Nor(none) => !none.iter().any(|m| m.matches(document, text_score)),
            Matcher::Text => text_score.is_some(),
            Matcher::Field { path, conditions } => {
                let values = lookup(document, path);
                conditions.iter().all(|condition| condition.matches(&values))
            }
        }
    }
}

fn parse_text(value: &Bson) -> StoreResult<TextSearch> {
    let Bson::Document(spec) = value else {
        return Err(invalid("$text expects an object"));
    };

    let search = match spec.get("$search") {
        Some(Bson::String(search)) => search.clone(),
        _ => return Err(invalid("$search needs a string")),
    };
    let language = match spec.get("$language") {
        None => None,
        Some(Bson::String(language)) => Some(language.clone()),
        Some(_) => return Err(invalid("$language needs a string")),
    };

    Ok(TextSearch { search, language })
}

/// A validated filter, ready to be matched against documents.
#[derive(Debug)]
pub(crate) struct CompiledFilter {
    root: Matcher,
    text: Option<TextSearch>,
}

impl CompiledFilter {
    /// Compiles `filter`, rejecting unknown operators and malformed arguments.
    pub fn compile(filter: &Document) -> StoreResult<Self> {
        let mut text = None;
        let root = Matcher::compile(filter, &mut text)?;
        Ok(Self { root, text })
    }

    /// The filter's `$text` clause, if it has one.
    pub fn text(&self) -> Option<&TextSearch> {
        self.text.as_ref()
    }

    /// Matches `document`. `text_score` is the document's relevance for the filter's
    /// `$text` clause, `None` when it does not match it.
    pub fn matches(&self, document: &Document, text_score: Option<f64>) -> bool {
        self.root.matches(document, text_score)
    }
}

#[cfg(test)]
mod tests {
    use bson::doc;

    use super::*;

    fn matches(filter: Document, document: Document) -> bool {
        CompiledFilter::compile(&filter).unwrap().matches(&document, None)
    }

    #[test]
    fn test_literal_equality() {
        assert!(matches(doc! { "name": "Ada" }, doc! { "name": "Ada", "age": 36 }));
        assert!(!matches(doc! { "name": "Ada" }, doc! { "name": "Bob" }));
        assert!(matches(doc! { "age": 36_i64 }, doc! { "age": 36 }));
        assert!(matches(doc! {}, doc! { "anything": true }));
    }

    #[test]
    fn test_array_fields_match_any_element() {
        let document = doc! { "tags": ["go", "rust"] };

        assert!(matches(doc! { "tags": "rust" }, document.clone()));
        assert!(matches(doc! { "tags": ["go", "rust"] }, document.clone()));
        assert!(!matches(doc! { "tags": { "$ne": "go" } }, document.clone()));
        assert!(matches(doc! { "tags": { "$in": ["java", "go"] } }, document.clone()));
        assert!(matches(doc! { "tags": { "$nin": ["java"] } }, document));
    }

    #[test]
    fn test_null_matches_missing() {
        assert!(matches(doc! { "email": Bson::Null }, doc! { "name": "Ada" }));
        assert!(matches(doc! { "email": Bson::Null }, doc! { "email": Bson::Null }));
        assert!(!matches(doc! { "email": Bson::Null }, doc! { "email": "a@b.c" }));
    }

    #[test]
    fn test_range_operators() {
        let document = doc! { "age": 30, "name": "Ada" };

        assert!(matches(doc! { "age": { "$gt": 18, "$lte": 30 } }, document.clone()));
        assert!(!matches(doc! { "age": { "$lt": 30 } }, document.clone()));
        assert!(matches(doc! { "age": { "$gte": 29.5 } }, document.clone()));
        // cross-type comparisons never match
        assert!(!matches(doc! { "name": { "$gt": 1 } }, document.clone()));
        assert!(!matches(doc! { "missing": { "$lt": 100 } }, document));
    }

    #[test]
    fn test_exists() {
        let document = doc! { "a": { "b": 1 } };

        assert!(matches(doc! { "a.b": { "$exists": true } }, document.clone()));
        assert!(matches(doc! { "a.c": { "$exists": false } }, document.clone()));
        assert!(!matches(doc! { "a": { "$exists": 0 } }, document));
    }

    #[test]
    fn test_regex_with_options() {
        let document = doc! { "name": "Kayla TestJohnson" };

        assert!(matches(doc! { "name": { "$regex": "^kay", "$options": "i" } }, document.clone()));
        assert!(!matches(doc! { "name": { "$regex": "^kay" } }, document.clone()));
        assert!(matches(doc! { "name": { "$not": { "$regex": "^Bob" } } }, document));
    }

    #[test]
    fn test_logical_operators() {
        let document = doc! { "status": "active", "age": 40 };

        assert!(matches(
            doc! { "$or": [{ "status": "pending" }, { "age": { "$gt": 30 } }] },
            document.clone()
        ));
        assert!(matches(
            doc! { "$and": [{ "status": "active" }, { "age": 40 }] },
            document.clone()
        ));
        assert!(!matches(doc! { "$nor": [{ "status": "active" }] }, document));
    }

    #[test]
    fn test_dotted_paths_through_arrays() {
        let document = doc! { "orders": [{ "sku": "a1" }, { "sku": "b2" }] };

        assert!(matches(doc! { "orders.sku": "b2" }, document.clone()));
        assert!(matches(doc! { "orders.0.sku": "a1" }, document.clone()));
        assert!(!matches(doc! { "orders.sku": "c3" }, document));
    }

    #[test]
    fn test_malformed_filters_are_rejected() {
        for filter in [
            doc! { "$or": [] },
            doc! { "$and": [] },
            doc! { "$and": "nope" },
            doc! { "$where": "1 == 1" },
            doc! { "age": { "$between": [1, 2] } },
            doc! { "age": { "$in": 3 } },
            doc! { "name": { "$regex": "(" } },
            doc! { "name": { "$options": "i" } },
            doc! { "name": { "$not": "plain" } },
            doc! { "$text": { "$search": 1 } },
        ] {
            assert!(CompiledFilter::compile(&filter).is_err(), "accepted {filter}");
        }
    }

    #[test]
    fn test_text_clause_is_extracted() {
        let compiled = CompiledFilter::compile(&doc! {
            "$text": { "$search": "web -test" },
            "active": true,
        })
        .unwrap();

        assert_eq!(compiled.text().map(|t| t.search.as_str()), Some("web -test"));
        assert!(compiled.matches(&doc! { "active": true }, Some(1.0)));
        assert!(!compiled.matches(&doc! { "active": true }, None));
    }

    #[test]
    fn test_sort_order_puts_missing_first() {
        let a = doc! { "n": 2 };
        let b = doc! { "n": 10 };
        let missing = doc! {};

        assert_eq!(compare_field(&a, &b, "n"), Ordering::Less);
        assert_eq!(compare_field(&missing, &a, "n"), Ordering::Less);
        assert_eq!(compare_field(&b, &b, "n"), Ordering::Equal);
    }
}
