//! Text indexes and relevance scoring.
//!
//! Scoring follows the store's term-frequency model. Within one indexed string, the k-th
//! repeat of a term adds `1 / 2^k` to its frequency, and the result is scaled by how much of
//! the string the term makes up:
//!
//! ```text
//! score(term, string) = weight(field) * freq * (0.5 * count / tokens + 0.5)
//! ```
//!
//! Per-string scores are summed across fields and array elements, and a document's relevance
//! is the sum over the query's terms. Words are not stemmed.

use std::collections::{HashMap, HashSet};

use bson::{Bson, Document};

use docrepo_core::index::IndexModel;

use crate::evaluator::lookup;

const WILDCARD: &str = "$**";

const ENGLISH_STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "if", "in", "into", "is", "it",
    "no", "not", "of", "on", "or", "such", "that", "the", "their", "then", "there", "these",
    "they", "this", "to", "was", "will", "with",
];

fn stopwords(language: &str) -> &'static [&'static str] {
    match language {
        "english" | "en" => ENGLISH_STOPWORDS,
        _ => &[],
    }
}

/// Lowercased alphanumeric runs of `text`, minus the language's stopwords.
pub(crate) fn tokenize(text: &str, language: &str) -> Vec<String> {
    let stopwords = stopwords(language);

    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(str::to_lowercase)
        .filter(|token| !stopwords.contains(&token.as_str()))
        .collect()
}

/// A parsed `$search` string.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct TextQuery {
    /// Positive terms, OR-ed. Words of phrases are included.
    pub terms: Vec<String>,
    /// A document containing any of these is excluded.
    pub negated: Vec<String>,
    /// Every phrase must appear verbatim (case-insensitively).
    pub phrases: Vec<String>,
    pub negated_phrases: Vec<String>,
}

impl TextQuery {
    pub fn parse(search: &str, language: &str) -> Self {
        let mut query = TextQuery::default();
        let mut rest = search.trim_start();

        while !rest.is_empty() {
            let negated = rest.starts_with('-');
            let body = if negated { &rest[1..] } else { rest };

            if let Some(quoted) = body.strip_prefix('"') {
                let end = quoted.find('"').unwrap_or(quoted.len());
                let phrase = quoted[..end].to_lowercase();
                if negated {
                    query.negated_phrases.push(phrase);
                } else {
                    query.terms.extend(tokenize(&phrase, language));
                    query.phrases.push(phrase);
                }
                rest = quoted.get(end + 1..).unwrap_or("");
            } else {
                let end = body.find(char::is_whitespace).unwrap_or(body.len());
                let tokens = tokenize(&body[..end], language);
                if negated {
                    query.negated.extend(tokens);
                } else {
                    query.terms.extend(tokens);
                }
                rest = &body[end..];
            }

            rest = rest.trim_start();
        }

        let mut seen = HashSet::new();
        query.terms.retain(|term| seen.insert(term.clone()));
        query
    }
}

/// The text index of a collection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TextIndex {
    fields: Vec<(String, f64)>,
    wildcard: Option<f64>,
    language: String,
}

fn weight_of(weights: Option<&Document>, field: &str) -> f64 {
    match weights.and_then(|weights| weights.get(field)) {
        Some(Bson::Int32(weight)) => f64::from(*weight),
        Some(Bson::Int64(weight)) => *weight as f64,
        Some(Bson::Double(weight)) => *weight,
        _ => 1.0,
    }
}

impl TextIndex {
    pub fn from_model(model: &IndexModel) -> Self {
        let weights = model.options.weights.as_ref();
        let mut fields = Vec::new();
        let mut wildcard = None;

        for (field, kind) in &model.keys {
            if !matches!(kind, Bson::String(kind) if kind == "text") {
                continue;
            }
            if field == WILDCARD {
                wildcard = Some(weight_of(weights, field));
            } else {
                fields.push((field.clone(), weight_of(weights, field)));
            }
        }

        // Weights may name fields the wildcard covers.
        if wildcard.is_some() {
            if let Some(weights) = weights {
                for (field, _) in weights {
                    if field != WILDCARD && !fields.iter().any(|(f, _)| f == field) {
                        fields.push((field.clone(), weight_of(Some(weights), field)));
                    }
                }
            }
        }

        let language = model
            .options
            .default_language
            .clone()
            .unwrap_or_else(|| "english".to_string());

        Self { fields, wildcard, language }
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    /// Relevance of `document` for `query`, `None` when it does not match.
    pub fn score(&self, document: &Document, query: &TextQuery) -> Option<f64> {
        if query.terms.is_empty() {
            return None;
        }

        let strings = self.indexed_strings(document);
        let mut term_scores: HashMap<String, f64> = HashMap::new();

        for (text, weight) in &strings {
            let tokens = tokenize(text, &self.language);
            if tokens.is_empty() {
                continue;
            }

            // term -> (exp, freq, count)
            let mut stats: HashMap<&str, (f64, f64, u32)> = HashMap::new();
            for token in &tokens {
                let entry = stats.entry(token.as_str()).or_insert((0.0, 0.0, 0));
                entry.0 = if entry.2 == 0 { 1.0 } else { entry.0 * 2.0 };
                entry.1 += 1.0 / entry.0;
                entry.2 += 1;
            }

            let total = tokens.len() as f64;
            for (term, (_, freq, count)) in stats {
                let coefficient = 0.5 * f64::from(count) / total + 0.5;
                *term_scores.entry(term.to_string()).or_default() += weight * freq * coefficient;
            }
        }

        if query.negated.iter().any(|term| term_scores.contains_key(term)) {
            return None;
        }

        let lowered = || strings.iter().map(|(text, _)| text.to_lowercase());
        if query.negated_phrases.iter().any(|phrase| lowered().any(|text| text.contains(phrase))) {
            return None;
        }
        if !query.phrases.iter().all(|phrase| lowered().any(|text| text.contains(phrase))) {
            return None;
        }

        let mut matched = false;
        let mut score = 0.0;
        for term in &query.terms {
            if let Some(term_score) = term_scores.get(term) {
                matched = true;
                score += term_score;
            }
        }

        matched.then_some(score)
    }

    fn indexed_strings<'a>(&self, document: &'a Document) -> Vec<(&'a str, f64)> {
        let mut strings = Vec::new();

        for (field, weight) in &self.fields {
            for value in lookup(document, field) {
                collect_strings(value, *weight, &mut strings);
            }
        }

        if let Some(weight) = self.wildcard {
            for (field, value) in document {
                if field == "_id" || self.fields.iter().any(|(f, _)| f == field) {
                    continue;
                }
                collect_strings(value, weight, &mut strings);
            }
        }

        strings
    }
}

fn collect_strings<'a>(value: &'a Bson, weight: f64, out: &mut Vec<(&'a str, f64)>) {
    match value {
        Bson::String(text) => out.push((text.as_str(), weight)),
        Bson::Array(items) => {
            for item in items {
                collect_strings(item, weight, out);
            }
        }
        Bson::Document(inner) => {
            for (_, item) in inner {
                collect_strings(item, weight, out);
            }
        }
        _ => {}
    }
}
