//! Conversion of docrepo read and index options into driver options.

use bson::{Document, doc};
use mongodb::options::{
    Collation as DriverCollation, CollationStrength as DriverStrength, CountOptions, FindOneOptions,
    FindOptions, IndexOptions as DriverIndexOptions,
};

use docrepo_core::{
    index::{Collation, CollationStrength, IndexOptions},
    query::FindSpec,
};

fn text_score_meta() -> Document {
    doc! { "$meta": "textScore" }
}

/// Projection and sort for a read. A text score replaces the requested sort: results come
/// back in descending relevance.
fn projection_and_sort(spec: &FindSpec) -> (Option<Document>, Option<Document>) {
    match &spec.text_score {
        Some(field) => {
            let meta = doc! { field.clone(): text_score_meta() };
            (Some(meta.clone()), Some(meta))
        }
        None => (None, spec.sort.as_ref().map(|sort| sort.to_document())),
    }
}

pub fn find_options(spec: &FindSpec) -> FindOptions {
    let (projection, sort) = projection_and_sort(spec);

    let mut options = FindOptions::default();
    options.skip = spec.skip;
    // The driver reads a limit of 0 as "no limit", same as ours.
    options.limit = spec.limit.map(|limit| i64::try_from(limit).unwrap_or(i64::MAX));
    options.projection = projection;
    options.sort = sort;
    options.max_time = spec.max_time;
    options
}

pub fn find_one_options(spec: &FindSpec) -> FindOneOptions {
    let (projection, sort) = projection_and_sort(spec);

    let mut options = FindOneOptions::default();
    options.skip = spec.skip;
    options.projection = projection;
    options.sort = sort;
    options.max_time = spec.max_time;
    options
}

pub fn count_options(max_time: Option<std::time::Duration>) -> CountOptions {
    let mut options = CountOptions::default();
    options.max_time = max_time;
    options
}

fn strength(strength: CollationStrength) -> DriverStrength {
    match strength {
        CollationStrength::Primary => DriverStrength::Primary,
        CollationStrength::Secondary => DriverStrength::Secondary,
        CollationStrength::Tertiary => DriverStrength::Tertiary,
        CollationStrength::Quaternary => DriverStrength::Quaternary,
        CollationStrength::Identical => DriverStrength::Identical,
    }
}

pub fn collation(collation: &Collation) -> DriverCollation {
    let mut driver = DriverCollation::default();
    driver.locale = collation.locale.clone();
    driver.strength = collation.strength.map(strength);
    driver.case_level = collation.case_level;
    driver.numeric_ordering = collation.numeric_ordering;
    driver
}

pub fn index_options(options: &IndexOptions) -> DriverIndexOptions {
    let mut driver = DriverIndexOptions::default();
    driver.name = options.name.clone();
    driver.unique = options.unique;
    driver.sparse = options.sparse;
    driver.expire_after = options.expire_after;
    driver.partial_filter_expression = options.partial_filter_expression.clone();
    driver.collation = options.collation.as_ref().map(collation);
    driver.wildcard_projection = options.wildcard_projection.clone();
    driver.hidden = options.hidden;
    driver.weights = options.weights.clone();
    driver.default_language = options.default_language.clone();
    driver
}
