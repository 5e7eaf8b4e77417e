use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;

use crate::api::course_handlers::{bootcamp_summary, children_of, find_populated, require_bootcamp};
use crate::api::responses::{self, DataResponse, ListResponse};
use crate::api::{AppState, ValidJson};
use crate::error::ApiError;
use crate::logic::{authorize, ensure_owner, recompute_average_rating};
use crate::model::{Collection, Document, NewReview, Principal, Resource, Review, ReviewUpdate, Role};
use crate::query::{translate, Filter, PaginationEnvelope, ResultBuilder};
use crate::store::{DocumentStore, ResourceStore, Store};

const REVIEWERS: [Role; 2] = [Role::User, Role::Admin];

async fn existing_review<S: Store>(store: &S, id: &str) -> Result<Review, ApiError> {
    store
        .get::<Review>(id)
        .await?
        .ok_or_else(|| ApiError::not_found(Review::LABEL, id))
}

/// GET /api/v1/reviews
pub async fn list_reviews<S: Store>(
    State(state): State<AppState<S>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<PaginationEnvelope>, ApiError> {
    let descriptor = translate(params)?.with_populate(bootcamp_summary());
    let envelope = ResultBuilder::<S>::for_resource::<Review>(state.store.as_ref())
        .build(&descriptor)
        .await?;
    Ok(Json(envelope))
}

/// GET /api/v1/bootcamps/:id/reviews
pub async fn list_bootcamp_reviews<S: Store>(
    State(state): State<AppState<S>>,
    Path(bootcamp_id): Path<String>,
) -> Result<Json<ListResponse<Review>>, ApiError> {
    let store = state.store.as_ref();
    require_bootcamp(store, &bootcamp_id).await?;

    let reviews = store.list::<Review>(&children_of(&bootcamp_id)).await?;
    Ok(responses::list(reviews))
}

/// GET /api/v1/reviews/:id
pub async fn get_review<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Document>>, ApiError> {
    let review = find_populated(state.store.as_ref(), Collection::Reviews, Review::LABEL, &id).await?;
    Ok(responses::ok(review))
}

/// POST /api/v1/bootcamps/:id/reviews
pub async fn create_review<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(bootcamp_id): Path<String>,
    ValidJson(payload): ValidJson<NewReview>,
) -> Result<(StatusCode, Json<DataResponse<Review>>), ApiError> {
    authorize(&principal, &REVIEWERS)?;
    let store = state.store.as_ref();

    let bootcamp = require_bootcamp(store, &bootcamp_id).await?;
    let previous = store
        .find_one::<Review>(
            Filter::new()
                .eq("bootcamp", bootcamp.id.as_str())
                .eq("user", principal.user_id.as_str()),
        )
        .await?;
    if previous.is_some() {
        return Err(ApiError::Conflict("You have already reviewed this bootcamp".to_string()));
    }

    payload.validate()?;
    let review = payload.into_review(bootcamp.id.clone(), principal.user_id.clone());
    store.create(&review).await?;
    log::info!("User {} reviewed bootcamp {}", principal.user_id, bootcamp.id);

    recompute_average_rating(store, &bootcamp.id).await?;
    Ok(responses::created(review))
}

/// PUT /api/v1/reviews/:id
pub async fn update_review<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<ReviewUpdate>,
) -> Result<Json<DataResponse<Review>>, ApiError> {
    authorize(&principal, &REVIEWERS)?;
    let store = state.store.as_ref();

    let review = existing_review(store, &id).await?;
    ensure_owner(&principal, &review.user, &format!("update review {}", review.id))?;

    payload.validate()?;
    let touches_rating = payload.touches_rating();
    let updated = store
        .patch::<Review>(&id, payload.into_patch())
        .await?
        .ok_or_else(|| ApiError::not_found(Review::LABEL, &id))?;
    log::info!("User {} updated review {}", principal.user_id, id);

    if touches_rating {
        recompute_average_rating(store, &updated.bootcamp).await?;
    }
    Ok(responses::ok(updated))
}

/// DELETE /api/v1/reviews/:id
pub async fn delete_review<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Value>>, ApiError> {
    authorize(&principal, &REVIEWERS)?;
    let store = state.store.as_ref();

    let review = existing_review(store, &id).await?;
    ensure_owner(&principal, &review.user, &format!("delete review {}", review.id))?;

    store.delete(Collection::Reviews, &id).await?;
    log::info!("User {} deleted review {}", principal.user_id, id);

    recompute_average_rating(store, &review.bootcamp).await?;
    Ok(responses::empty())
}
