//! Fixture import and teardown for development databases.

use anyhow::{Context, Result};
use itertools::Itertools;
use serde_json::Value;
use std::path::Path;

use crate::logic::{recompute_average_cost, recompute_average_rating};
use crate::model::validation::slugify;
use crate::model::{
    format_timestamp, now, Bootcamp, Collection, Course, Document, Resource, Review, User, DEFAULT_PHOTO,
};
use crate::query::Filter;
use crate::services::PasswordHasher;
use crate::store::{DocumentStore, ResourceStore};

/// Raw fixture documents, one JSON array file per collection.
#[derive(Debug, Clone, Default)]
pub struct Fixtures {
    pub users: Vec<Document>,
    pub bootcamps: Vec<Document>,
    pub courses: Vec<Document>,
    pub reviews: Vec<Document>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SeedSummary {
    pub users: usize,
    pub bootcamps: usize,
    pub courses: usize,
    pub reviews: usize,
}

async fn read_fixture(dir: &Path, name: &str) -> Result<Vec<Document>> {
    let path = dir.join(format!("{}.json", name));
    let raw = tokio::fs::read_to_string(&path)
        .await
        .with_context(|| format!("Failed to read fixture {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("Invalid fixture {}", path.display()))
}

impl Fixtures {
    /// Read `users.json`, `bootcamps.json`, `courses.json` and `reviews.json` from `dir`.
    pub async fn load(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        Ok(Self {
            users: read_fixture(dir, "users").await?,
            bootcamps: read_fixture(dir, "bootcamps").await?,
            courses: read_fixture(dir, "courses").await?,
            reviews: read_fixture(dir, "reviews").await?,
        })
    }
}

fn fill_default(document: &mut Document, key: &str, value: impl FnOnce() -> Value) {
    if !document.contains_key(key) {
        document.insert(key.to_string(), value());
    }
}

fn typed<R: Resource>(mut document: Document) -> Result<R> {
    let stamp = format_timestamp(&now());
    fill_default(&mut document, "createdAt", || Value::String(stamp));
    let id = document.get("id").cloned().unwrap_or(Value::Null);
    serde_json::from_value(Value::Object(document))
        .with_context(|| format!("Invalid {} fixture {}", R::LABEL, id))
}

async fn insert_all<S, R>(store: &S, resources: &[R]) -> Result<usize>
where
    S: DocumentStore + ?Sized,
    R: Resource,
{
    for resource in resources {
        store.create(resource).await?;
    }
    Ok(resources.len())
}

/// Insert every fixture, hashing plain-text user passwords and computing
/// the bootcamp aggregates from the imported courses and reviews.
pub async fn import_data<S: DocumentStore + ?Sized>(
    store: &S,
    hasher: &dyn PasswordHasher,
    fixtures: Fixtures,
) -> Result<SeedSummary> {
    let users = fixtures
        .users
        .into_iter()
        .map(|mut document| {
            let plain = document
                .get("password")
                .and_then(Value::as_str)
                .context("User fixture without a password")?;
            let hash = hasher.hash(plain)?;
            document.insert("password".to_string(), Value::String(hash));
            if let Some(email) = document.get("email").and_then(Value::as_str) {
                let email = email.trim().to_lowercase();
                document.insert("email".to_string(), Value::String(email));
            }
            typed::<User>(document)
        })
        .collect::<Result<Vec<_>>>()?;

    let bootcamps = fixtures
        .bootcamps
        .into_iter()
        .map(|mut document| {
            let name = document.get("name").and_then(Value::as_str).unwrap_or_default().to_string();
            fill_default(&mut document, "slug", || Value::String(slugify(&name)));
            fill_default(&mut document, "photo", || Value::String(DEFAULT_PHOTO.to_string()));
            typed::<Bootcamp>(document)
        })
        .collect::<Result<Vec<_>>>()?;

    let courses = fixtures
        .courses
        .into_iter()
        .map(typed::<Course>)
        .collect::<Result<Vec<_>>>()?;
    let reviews = fixtures
        .reviews
        .into_iter()
        .map(typed::<Review>)
        .collect::<Result<Vec<_>>>()?;

    let summary = SeedSummary {
        users: insert_all(store, &users).await?,
        bootcamps: insert_all(store, &bootcamps).await?,
        courses: insert_all(store, &courses).await?,
        reviews: insert_all(store, &reviews).await?,
    };

    for bootcamp_id in courses.iter().map(|c| c.bootcamp.as_str()).unique() {
        recompute_average_cost(store, bootcamp_id).await?;
    }
    for bootcamp_id in reviews.iter().map(|r| r.bootcamp.as_str()).unique() {
        recompute_average_rating(store, bootcamp_id).await?;
    }

    log::info!(
        "Imported {} users, {} bootcamps, {} courses, {} reviews",
        summary.users,
        summary.bootcamps,
        summary.courses,
        summary.reviews
    );
    Ok(summary)
}

/// Remove every document the fixtures can create, children first.
pub async fn destroy_data<S: DocumentStore + ?Sized>(store: &S) -> Result<u64> {
    let everything = Filter::new();
    let mut removed = 0;
    for collection in [
        Collection::Reviews,
        Collection::Courses,
        Collection::Bootcamps,
        Collection::Sessions,
        Collection::Users,
    ] {
        let count = store.delete_many(collection, &everything).await?;
        log::debug!("Deleted {} documents from {}", count, collection);
        removed += count;
    }
    Ok(removed)
}
