use anyhow::Result;

use crate::model::{from_document, to_document, Collection, Document, Resource};
use crate::query::{Filter, FindOptions};

/// Document collection accessor. Every document carries a string `id`.
#[async_trait::async_trait]
pub trait DocumentStore: Send + Sync {
    /// Matching documents with projection, sort, skip and limit applied.
    async fn find(&self, collection: Collection, options: &FindOptions) -> Result<Vec<Document>>;
    async fn find_by_id(&self, collection: Collection, id: &str) -> Result<Option<Document>>;
    async fn count(&self, collection: Collection, filter: &Filter) -> Result<u64>;
    /// Insert a new document; fails if the id is already taken.
    async fn insert(&self, collection: Collection, document: Document) -> Result<Document>;
    /// Shallow merge (`null` removes a key). Returns the updated document,
    /// or `None` if no document has that id.
    async fn update(&self, collection: Collection, id: &str, patch: Document) -> Result<Option<Document>>;
    async fn delete(&self, collection: Collection, id: &str) -> Result<bool>;
    async fn delete_many(&self, collection: Collection, filter: &Filter) -> Result<u64>;
    /// Documents whose GeoJSON point at `field` lies within `radius` radians
    /// of (`latitude`, `longitude`).
    async fn find_within_radius(
        &self,
        collection: Collection,
        field: &str,
        latitude: f64,
        longitude: f64,
        radius: f64,
    ) -> Result<Vec<Document>>;
}

/// Typed access on top of [`DocumentStore`].
#[async_trait::async_trait]
pub trait ResourceStore: DocumentStore {
    async fn get<R: Resource>(&self, id: &str) -> Result<Option<R>> {
        match self.find_by_id(R::COLLECTION, id).await? {
            Some(document) => Ok(Some(from_document(document)?)),
            None => Ok(None),
        }
    }

    async fn create<R: Resource>(&self, resource: &R) -> Result<()> {
        self.insert(R::COLLECTION, to_document(resource)?).await?;
        Ok(())
    }

    async fn patch<R: Resource>(&self, id: &str, patch: Document) -> Result<Option<R>> {
        match self.update(R::COLLECTION, id, patch).await? {
            Some(document) => Ok(Some(from_document(document)?)),
            None => Ok(None),
        }
    }

    async fn list<R: Resource>(&self, options: &FindOptions) -> Result<Vec<R>> {
        self.find(R::COLLECTION, options)
            .await?
            .into_iter()
            .map(from_document)
            .collect()
    }

    async fn find_one<R: Resource>(&self, filter: Filter) -> Result<Option<R>> {
        let options = FindOptions {
            limit: Some(1),
            ..FindOptions::filtered(filter)
        };
        Ok(self.list::<R>(&options).await?.into_iter().next())
    }
}

impl<T: DocumentStore + ?Sized> ResourceStore for T {}

pub trait Store: DocumentStore + Send + Sync {}
