use anyhow::{anyhow, Context, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::model::Id;

/// A stored resource in its untyped form. Every document carries an `id`.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Bootcamps,
    Courses,
    Reviews,
    Sessions,
}

impl Collection {
    pub const ALL: [Collection; 5] = [
        Collection::Users,
        Collection::Bootcamps,
        Collection::Courses,
        Collection::Reviews,
        Collection::Sessions,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Collection::Users => "users",
            Collection::Bootcamps => "bootcamps",
            Collection::Courses => "courses",
            Collection::Reviews => "reviews",
            Collection::Sessions => "sessions",
        }
    }
}

impl std::fmt::Display for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed resource that lives in one collection.
pub trait Resource: Serialize + DeserializeOwned + Send + Sync {
    const COLLECTION: Collection;
    /// Human-readable name used in error messages.
    const LABEL: &'static str;
    /// Fields that are stored but never returned or queryable from the API.
    const HIDDEN_FIELDS: &'static [&'static str] = &[];

    fn id(&self) -> &Id;
}

pub fn to_document<T: Serialize>(value: &T) -> Result<Document> {
    match serde_json::to_value(value).context("Failed to serialize resource")? {
        Value::Object(map) => Ok(map),
        other => Err(anyhow!("Resource serialized to a non-object value: {}", other)),
    }
}

pub fn from_document<T: DeserializeOwned>(document: Document) -> Result<T> {
    serde_json::from_value(Value::Object(document)).context("Failed to deserialize stored document")
}

pub fn document_id(document: &Document) -> Option<&str> {
    document.get("id").and_then(Value::as_str)
}

/// Resolve a dotted path such as `location.city`.
pub fn get_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Keep only the selected (possibly dotted) fields. `id` is always kept.
pub fn project(document: &Document, fields: &[String]) -> Document {
    let mut projected = Document::new();
    if let Some(id) = document.get("id") {
        projected.insert("id".to_string(), id.clone());
    }
    for field in fields {
        let Some(value) = get_path(document, field) else {
            continue;
        };
        insert_path(&mut projected, field, value.clone());
    }
    projected
}

fn insert_path(target: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Shallow merge used by every store's `update`: keys in `patch` replace
/// keys in `target`, and a `null` in the patch removes the key.
pub fn merge_patch(target: &mut Document, patch: Document) {
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        if value.is_null() {
            target.remove(&key);
        } else {
            target.insert(key, value);
        }
    }
}

pub fn strip_fields(document: &mut Document, fields: &[&str]) {
    for field in fields {
        document.remove(*field);
    }
}
