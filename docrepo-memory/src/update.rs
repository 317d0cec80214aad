//! Update document application.

use bson::{Bson, Document};

use docrepo_core::error::{StoreError, StoreResult};

/// A parsed update document. Supports `$set` and `$unset`, both with dotted paths.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct UpdateSpec {
    set: Document,
    unset: Vec<String>,
}

impl UpdateSpec {
    pub fn parse(update: &Document) -> StoreResult<Self> {
        if update.is_empty() {
            return Err(StoreError::Backend("update document requires atomic operators".to_string()));
        }

        let mut spec = UpdateSpec::default();
        for (operator, argument) in update {
            let Bson::Document(fields) = argument else {
                return Err(StoreError::Backend(format!("modifiers for {operator} must be an object")));
            };

            match operator.as_str() {
                "$set" => {
                    for (path, value) in fields {
                        spec.set.insert(path.clone(), value.clone());
                    }
                }
                "$unset" => spec.unset.extend(fields.keys().cloned()),
                other if other.starts_with('$') => {
                    return Err(StoreError::Backend(format!("unsupported update operator: {other}")));
                }
                _ => {
                    return Err(StoreError::Backend(
                        "update document requires atomic operators".to_string(),
                    ));
                }
            }
        }

        Ok(spec)
    }

    /// Returns the updated copy of `document`.
    pub fn apply(&self, document: &Document) -> StoreResult<Document> {
        let mut updated = document.clone();

        for (path, value) in &self.set {
            set_path(&mut updated, path, value.clone())?;
        }
        for path in &self.unset {
            unset_path(&mut updated, path);
        }

        if updated.get("_id") != document.get("_id") {
            return Err(StoreError::Backend(
                "performing an update on the path '_id' would modify the immutable field '_id'"
                    .to_string(),
            ));
        }

        Ok(updated)
    }
}

fn set_path(document: &mut Document, path: &str, value: Bson) -> StoreResult<()> {
    let Some((head, rest)) = path.split_once('.') else {
        document.insert(path, value);
        return Ok(());
    };

    if !document.contains_key(head) {
        document.insert(head, Document::new());
    }

    match document.get_mut(head) {
        Some(Bson::Document(inner)) => set_path(inner, rest, value),
        _ => Err(StoreError::Backend(format!("cannot create field '{rest}' in element '{head}'"))),
    }
}

fn unset_path(document: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            document.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Bson::Document(inner)) = document.get_mut(head) {
                unset_path(inner, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use bson::{doc, oid::ObjectId};

    use super::*;

    #[test]
    fn test_set_keeps_field_order_and_creates_paths() {
        let spec = UpdateSpec::parse(&doc! { "$set": { "name": "Bea", "address.city": "Oslo" } }).unwrap();

        let updated = spec.apply(&doc! { "name": "Ada", "age": 36 }).unwrap();

        assert_eq!(updated, doc! { "name": "Bea", "age": 36, "address": { "city": "Oslo" } });
    }

    #[test]
    fn test_unset() {
        let spec = UpdateSpec::parse(&doc! { "$unset": { "age": "", "a.b": "" } }).unwrap();

        let updated = spec.apply(&doc! { "age": 36, "a": { "b": 1, "c": 2 } }).unwrap();

        assert_eq!(updated, doc! { "a": { "c": 2 } });
    }

    #[test]
    fn test_id_is_immutable() {
        let oid = ObjectId::new();
        let spec = UpdateSpec::parse(&doc! { "$set": { "_id": ObjectId::new() } }).unwrap();

        assert!(spec.apply(&doc! { "_id": oid }).is_err());

        let same = UpdateSpec::parse(&doc! { "$set": { "_id": oid } }).unwrap();
        assert!(same.apply(&doc! { "_id": oid }).is_ok());
    }

    #[test]
    fn test_cannot_descend_into_scalar() {
        let spec = UpdateSpec::parse(&doc! { "$set": { "age.years": 3 } }).unwrap();

        assert!(spec.apply(&doc! { "age": 36 }).is_err());
    }

    #[test]
    fn test_rejects_replacement_and_unknown_operators() {
        assert!(UpdateSpec::parse(&doc! {}).is_err());
        assert!(UpdateSpec::parse(&doc! { "name": "Bea" }).is_err());
        assert!(UpdateSpec::parse(&doc! { "$inc": { "age": 1 } }).is_err());
        assert!(UpdateSpec::parse(&doc! { "$set": 1 }).is_err());
    }
}
