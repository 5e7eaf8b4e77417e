use anyhow::Result;
use serde_json::Value;

use crate::model::{Collection, Document};
use crate::query::{Filter, FindOptions};
use crate::store::DocumentStore;

/// Mean tuition rounded up to the next multiple of ten.
pub fn average_cost(tuitions: &[f64]) -> Option<i64> {
    if tuitions.is_empty() {
        return None;
    }
    let mean = tuitions.iter().sum::<f64>() / tuitions.len() as f64;
    Some(((mean / 10.0).ceil() * 10.0) as i64)
}

/// Mean rating to one decimal place.
pub fn average_rating(ratings: &[i64]) -> Option<f64> {
    if ratings.is_empty() {
        return None;
    }
    let mean = ratings.iter().sum::<i64>() as f64 / ratings.len() as f64;
    Some((mean * 10.0).round() / 10.0)
}

async fn numbers_of<S: DocumentStore + ?Sized>(
    store: &S,
    collection: Collection,
    bootcamp_id: &str,
    field: &str,
) -> Result<Vec<Value>> {
    let options = FindOptions {
        projection: Some(vec![field.to_string()]),
        ..FindOptions::filtered(Filter::new().eq("bootcamp", bootcamp_id))
    };
    Ok(store
        .find(collection, &options)
        .await?
        .into_iter()
        .filter_map(|mut document| document.remove(field))
        .collect())
}

async fn write_aggregate<S: DocumentStore + ?Sized>(
    store: &S,
    bootcamp_id: &str,
    field: &str,
    value: Value,
) -> Result<()> {
    let mut patch = Document::new();
    patch.insert(field.to_string(), value);
    // A bootcamp deleted in the meantime has nothing left to update
    if store.update(Collection::Bootcamps, bootcamp_id, patch).await?.is_none() {
        log::debug!("Bootcamp {} gone before {} was recomputed", bootcamp_id, field);
    }
    Ok(())
}

/// Recompute and store `averageCost` from the bootcamp's current courses.
pub async fn recompute_average_cost<S: DocumentStore + ?Sized>(
    store: &S,
    bootcamp_id: &str,
) -> Result<Option<i64>> {
    let tuitions: Vec<f64> = numbers_of(store, Collection::Courses, bootcamp_id, "tuition")
        .await?
        .iter()
        .filter_map(Value::as_f64)
        .collect();
    let cost = average_cost(&tuitions);

    write_aggregate(store, bootcamp_id, "averageCost", cost.map_or(Value::Null, Value::from)).await?;
    log::info!("Bootcamp {} averageCost -> {:?}", bootcamp_id, cost);
    Ok(cost)
}

/// Recompute and store `averageRating` from the bootcamp's current reviews.
pub async fn recompute_average_rating<S: DocumentStore + ?Sized>(
    store: &S,
    bootcamp_id: &str,
) -> Result<Option<f64>> {
    let ratings: Vec<i64> = numbers_of(store, Collection::Reviews, bootcamp_id, "rating")
        .await?
        .iter()
        .filter_map(Value::as_i64)
        .collect();
    let rating = average_rating(&ratings);

    write_aggregate(store, bootcamp_id, "averageRating", rating.map_or(Value::Null, Value::from)).await?;
    log::info!("Bootcamp {} averageRating -> {:?}", bootcamp_id, rating);
    Ok(rating)
}
