use anyhow::{anyhow, Result};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

use crate::model::{angular_distance, document_id, get_path, merge_patch, project, Collection, Document};
use crate::query::{DocumentMatcher, Filter, FindOptions};
use crate::store::traits::{DocumentStore, Store};

/// Process-local store used by tests and `database.backend = "memory"`.
///
/// Locks are never held across an await point.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<Collection, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn matching(&self, collection: Collection, filter: &Filter) -> Vec<Document> {
        self.collections
            .read()
            .get(&collection)
            .map(|documents| {
                documents
                    .iter()
                    .filter(|document| DocumentMatcher::matches(document, filter))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[async_trait::async_trait]
impl DocumentStore for MemoryStore {
    async fn find(&self, collection: Collection, options: &FindOptions) -> Result<Vec<Document>> {
        let mut documents = self.matching(collection, &options.filter);
        if !options.sort.is_empty() {
            documents.sort_by(|a, b| DocumentMatcher::compare_for_sort(a, b, &options.sort));
        }

        let skip = usize::try_from(options.skip).unwrap_or(usize::MAX);
        let limit = options
            .limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(documents
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|document| match &options.projection {
                Some(fields) => project(&document, fields),
                None => document,
            })
            .collect())
    }

    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        Ok(self.collections.read().get(&collection).and_then(|documents| {
            documents
                .iter()
                .find(|document| document_id(document) == Some(id))
                .cloned()
        }))
    }

    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        Ok(self.matching(collection, filter).len() as u64)
    }

    async fn insert(&self, collection: Collection, document: Document) -> Result<Document> {
        let id = document_id(&document)
            .ok_or_else(|| anyhow!("Document inserted into {} has no id", collection))?
            .to_string();

        let mut collections = self.collections.write();
        let documents = collections.entry(collection).or_default();
        if documents.iter().any(|existing| document_id(existing) == Some(id.as_str())) {
            return Err(anyhow!("Duplicate id {} in {}", id, collection));
        }
        documents.push(document.clone());
        Ok(document)
    }

    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Option<Document>> {
        let mut collections = self.collections.write();
        let Some(document) = collections
            .get_mut(&collection)
            .and_then(|documents| documents.iter_mut().find(|d| document_id(d) == Some(id)))
        else {
            return Ok(None);
        };
        merge_patch(document, patch);
        Ok(Some(document.clone()))
    }

    async fn delete(&self, collection: Collection, id: &str) -> Result<bool> {
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(false);
        };
        let before = documents.len();
        documents.retain(|document| document_id(document) != Some(id));
        Ok(documents.len() < before)
    }

    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64> {
        let mut collections = self.collections.write();
        let Some(documents) = collections.get_mut(&collection) else {
            return Ok(0);
        };
        let before = documents.len();
        documents.retain(|document| !DocumentMatcher::matches(document, filter));
        Ok((before - documents.len()) as u64)
    }

    async fn find_within_radius(
        &self,
        collection: Collection,
        field: &str,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<Vec<Document>> {
        let coordinates_path = format!("{}.coordinates", field);
        Ok(self
            .matching(collection, &Filter::new())
            .into_iter()
            .filter(|document| {
                let Some(Value::Array(point)) = get_path(document, &coordinates_path) else {
                    return false;
                };
                match (point.first().and_then(Value::as_f64), point.get(1).and_then(Value::as_f64)) {
                    (Some(lng), Some(lat)) => angular_distance(latitude, longitude, lat, lng) <= radius,
                    _ => false,
                }
            })
            .collect())
    }
}

impl Store for MemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::{Comparison, Literal, Predicate, SortKey};
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap()
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        for (id, cost, created) in [("a", 5000, "2024-01-01"), ("b", 9000, "2024-02-01"), ("c", 12000, "2024-03-01")] {
            store
                .insert(
                    Collection::Bootcamps,
                    doc(json!({ "id": id, "averageCost": cost, "createdAt": created, "name": id.to_uppercase() })),
                )
                .await
                .unwrap();
        }
        store
    }

    #[tokio::test]
    async fn test_find_filters_sorts_and_pages() {
        let store = seeded().await;
        let options = FindOptions {
            filter: Filter::new().and("averageCost", Predicate::Compare(Comparison::Gte, Literal::parse("6000"))),
            projection: Some(vec!["name".to_string()]),
            sort: vec![SortKey::descending("createdAt")],
            skip: 1,
            limit: Some(5),
        };
        let found = store.find(Collection::Bootcamps, &options).await.unwrap();
        assert_eq!(found, vec![doc(json!({ "id": "b", "name": "B" }))]);
        assert_eq!(store.count(Collection::Bootcamps, &options.filter).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicate_id() {
        let store = seeded().await;
        let result = store.insert(Collection::Bootcamps, doc(json!({ "id": "a" }))).await;
        assert!(result.is_err());
        assert!(store.insert(Collection::Bootcamps, doc(json!({ "name": "no id" }))).await.is_err());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = seeded().await;
        let updated = store
            .update(Collection::Bootcamps, "a", doc(json!({ "averageCost": null, "housing": true })))
            .await
            .unwrap()
            .unwrap();
        assert!(!updated.contains_key("averageCost"));
        assert_eq!(updated["housing"], true);

        assert!(store.update(Collection::Bootcamps, "zzz", Document::new()).await.unwrap().is_none());
        assert!(store.delete(Collection::Bootcamps, "a").await.unwrap());
        assert!(!store.delete(Collection::Bootcamps, "a").await.unwrap());

        let removed = store
            .delete_many(Collection::Bootcamps, &Filter::new().eq("name", "B"))
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count(Collection::Bootcamps, &Filter::new()).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_within_radius() {
        let store = MemoryStore::new();
        store
            .insert(
                Collection::Bootcamps,
                doc(json!({ "id": "boston", "location": { "type": "Point", "coordinates": [-71.0589, 42.3601] } })),
            )
            .await
            .unwrap();
        store
            .insert(
                Collection::Bootcamps,
                doc(json!({ "id": "nyc", "location": { "type": "Point", "coordinates": [-74.0060, 40.7128] } })),
            )
            .await
            .unwrap();

        // 50 miles around Providence
        let radius = 50.0 / crate::model::EARTH_RADIUS_MILES;
        let found = store
            .find_within_radius(Collection::Bootcamps, "location", 41.8240, -71.4128, radius)
            .await
            .unwrap();
        let ids: Vec<&str> = found.iter().filter_map(document_id).collect();
        assert_eq!(ids, vec!["boston"]);
    }
}
