use serde_json::Value;
use std::collections::HashMap;

use crate::error::ApiError;
use crate::model::{document_id, get_path, strip_fields, Collection, Document, Resource};
use crate::query::descriptor::{
    Filter, FindOptions, Join, Literal, Populate, Predicate, QueryDescriptor, SortKey,
};
use crate::query::envelope::{Pagination, PaginationEnvelope};
use crate::store::DocumentStore;

/// Executes a [`QueryDescriptor`] against one collection and packages the
/// page with its pagination links.
pub struct ResultBuilder<'a, S: ?Sized> {
    store: &'a S,
    collection: Collection,
    hidden: &'static [&'static str],
}

impl<'a, S: DocumentStore + ?Sized> ResultBuilder<'a, S> {
    pub fn new(store: &'a S, collection: Collection) -> Self {
        Self {
            store,
            collection,
            hidden: &[],
        }
    }

    pub fn for_resource<R: Resource>(store: &'a S) -> Self {
        Self {
            store,
            collection: R::COLLECTION,
            hidden: R::HIDDEN_FIELDS,
        }
    }

    pub async fn build(&self, descriptor: &QueryDescriptor) -> Result<PaginationEnvelope, ApiError> {
        self.reject_hidden_fields(descriptor)?;

        // Counted under the same filter as the page itself
        let total = self.store.count(self.collection, &descriptor.filter).await?;
        let mut data = self
            .store
            .find(self.collection, &descriptor.find_options())
            .await?;

        if let Some(populate) = &descriptor.populate {
            populate_documents(self.store, &mut data, populate).await?;
        }
        for document in &mut data {
            strip_fields(document, self.hidden);
        }

        let pagination = Pagination::compute(descriptor.page, descriptor.page_size, total);
        log::debug!(
            "{}: page {} returned {} of {} matching",
            self.collection,
            descriptor.page,
            data.len(),
            total
        );
        Ok(PaginationEnvelope::new(data, pagination))
    }

    fn reject_hidden_fields(&self, descriptor: &QueryDescriptor) -> Result<(), ApiError> {
        let is_hidden = |field: &str| {
            let root = field.split('.').next().unwrap_or(field);
            self.hidden.contains(&root)
        };
        let referenced = descriptor
            .filter
            .fields()
            .chain(descriptor.sort_keys.iter().map(|key| key.field.as_str()))
            .chain(descriptor.projection.iter().flatten().map(String::as_str));

        for field in referenced {
            if is_hidden(field) {
                return Err(ApiError::invalid(format!("Field '{}' cannot be queried", field)));
            }
        }
        Ok(())
    }
}

/// Expand `populate.field` on every document in place.
///
/// A reference whose target no longer exists becomes `null`; a reverse join
/// with no matches becomes an empty array.
pub async fn populate_documents<S: DocumentStore + ?Sized>(
    store: &S,
    documents: &mut [Document],
    populate: &Populate,
) -> anyhow::Result<()> {
    if documents.is_empty() {
        return Ok(());
    }

    match &populate.join {
        Join::Reference => {
            let ids: Vec<Literal> = documents
                .iter()
                .filter_map(|document| document.get(&populate.field).and_then(Value::as_str))
                .map(|id| Literal::exact(id))
                .collect();
            if ids.is_empty() {
                return Ok(());
            }

            let options = FindOptions {
                projection: populate.select.clone(),
                ..FindOptions::filtered(Filter::new().and("id", Predicate::In(ids)))
            };
            let found: HashMap<String, Document> = store
                .find(populate.from, &options)
                .await?
                .into_iter()
                .filter_map(|document| Some((document_id(&document)?.to_string(), document)))
                .collect();

            for document in documents.iter_mut() {
                let Some(id) = document.get(&populate.field).and_then(Value::as_str) else {
                    continue;
                };
                let expanded = found
                    .get(id)
                    .cloned()
                    .map(Value::Object)
                    .unwrap_or(Value::Null);
                document.insert(populate.field.clone(), expanded);
            }
        }
        Join::Reverse { foreign_field } => {
            let ids: Vec<Literal> = documents
                .iter()
                .filter_map(document_id)
                .map(|id| Literal::exact(id))
                .collect();

            let projection = populate.select.clone().map(|mut fields| {
                if !fields.contains(foreign_field) {
                    fields.push(foreign_field.clone());
                }
                fields
            });
            let options = FindOptions {
                projection,
                ..FindOptions::filtered(Filter::new().and(foreign_field.as_str(), Predicate::In(ids)))
            }
            .sorted(SortKey::ascending("createdAt"));

            let mut grouped: HashMap<String, Vec<Value>> = HashMap::new();
            for related in store.find(populate.from, &options).await? {
                let Some(parent) = get_path(&related, foreign_field)
                    .and_then(Value::as_str)
                    .map(str::to_string)
                else {
                    continue;
                };
                grouped.entry(parent).or_default().push(Value::Object(related));
            }

            for document in documents.iter_mut() {
                let related = document_id(document)
                    .and_then(|id| grouped.remove(id))
                    .unwrap_or_default();
                document.insert(populate.field.clone(), Value::Array(related));
            }
        }
    }
    Ok(())
}
