use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;

use crate::api::responses::{self, DataResponse, ListResponse};
use crate::api::{AppState, ValidJson};
use crate::error::ApiError;
use crate::logic::{authorize, ensure_owner, recompute_average_cost};
use crate::model::{Bootcamp, Collection, Course, CourseUpdate, Document, NewCourse, Principal, Resource, Role};
use crate::query::{
    populate_documents, translate, Filter, FindOptions, PaginationEnvelope, Populate, ResultBuilder, SortKey,
};
use crate::store::{DocumentStore, ResourceStore, Store};

const PUBLISHERS: [Role; 2] = [Role::Publisher, Role::Admin];

/// Embedded bootcamp shape for courses and reviews.
pub(crate) fn bootcamp_summary() -> Populate {
    Populate::reference("bootcamp", Collection::Bootcamps).select(&["name", "description"])
}

/// One document with its bootcamp expanded, or NotFound.
pub(crate) async fn find_populated<S: Store>(
    store: &S,
    collection: Collection,
    label: &str,
    id: &str,
) -> Result<Document, ApiError> {
    let mut document = store
        .find_by_id(collection, id)
        .await?
        .ok_or_else(|| ApiError::not_found(label, id))?;
    populate_documents(store, std::slice::from_mut(&mut document), &bootcamp_summary()).await?;
    Ok(document)
}

/// Children of one bootcamp, oldest first.
pub(crate) fn children_of(bootcamp_id: &str) -> FindOptions {
    FindOptions::filtered(Filter::new().eq("bootcamp", bootcamp_id)).sorted(SortKey::ascending("createdAt"))
}

pub(crate) async fn require_bootcamp<S: Store>(store: &S, id: &str) -> Result<Bootcamp, ApiError> {
    store
        .get::<Bootcamp>(id)
        .await?
        .ok_or_else(|| ApiError::not_found(Bootcamp::LABEL, id))
}

async fn existing_course<S: Store>(store: &S, id: &str) -> Result<Course, ApiError> {
    store
        .get::<Course>(id)
        .await?
        .ok_or_else(|| ApiError::not_found(Course::LABEL, id))
}

/// GET /api/v1/courses
pub async fn list_courses<S: Store>(
    State(state): State<AppState<S>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<PaginationEnvelope>, ApiError> {
    let descriptor = translate(params)?.with_populate(bootcamp_summary());
    let envelope = ResultBuilder::<S>::for_resource::<Course>(state.store.as_ref())
        .build(&descriptor)
        .await?;
    Ok(Json(envelope))
}

/// GET /api/v1/bootcamps/:id/courses
pub async fn list_bootcamp_courses<S: Store>(
    State(state): State<AppState<S>>,
    Path(bootcamp_id): Path<String>,
) -> Result<Json<ListResponse<Course>>, ApiError> {
    let store = state.store.as_ref();
    require_bootcamp(store, &bootcamp_id).await?;

    let courses = store.list::<Course>(&children_of(&bootcamp_id)).await?;
    Ok(responses::list(courses))
}

/// GET /api/v1/courses/:id
pub async fn get_course<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Document>>, ApiError> {
    let course = find_populated(state.store.as_ref(), Collection::Courses, Course::LABEL, &id).await?;
    Ok(responses::ok(course))
}

/// POST /api/v1/bootcamps/:id/courses
pub async fn create_course<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(bootcamp_id): Path<String>,
    ValidJson(payload): ValidJson<NewCourse>,
) -> Result<(StatusCode, Json<DataResponse<Course>>), ApiError> {
    authorize(&principal, &PUBLISHERS)?;
    let store = state.store.as_ref();

    let bootcamp = require_bootcamp(store, &bootcamp_id).await?;
    ensure_owner(
        &principal,
        &bootcamp.user,
        &format!("add a course to bootcamp {}", bootcamp.id),
    )?;

    payload.validate()?;
    let course = payload.into_course(bootcamp.id.clone(), principal.user_id.clone());
    store.create(&course).await?;
    log::info!("User {} added course {} to bootcamp {}", principal.user_id, course.id, bootcamp.id);

    recompute_average_cost(store, &bootcamp.id).await?;
    Ok(responses::created(course))
}

/// PUT /api/v1/courses/:id
pub async fn update_course<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<CourseUpdate>,
) -> Result<Json<DataResponse<Course>>, ApiError> {
    authorize(&principal, &PUBLISHERS)?;
    let store = state.store.as_ref();

    let course = existing_course(store, &id).await?;
    ensure_owner(&principal, &course.user, &format!("update course {}", course.id))?;

    payload.validate()?;
    let touches_tuition = payload.touches_tuition();
    let updated = store
        .patch::<Course>(&id, payload.into_patch())
        .await?
        .ok_or_else(|| ApiError::not_found(Course::LABEL, &id))?;
    log::info!("User {} updated course {}", principal.user_id, id);

    if touches_tuition {
        recompute_average_cost(store, &updated.bootcamp).await?;
    }
    Ok(responses::ok(updated))
}

/// DELETE /api/v1/courses/:id
pub async fn delete_course<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Value>>, ApiError> {
    authorize(&principal, &PUBLISHERS)?;
    let store = state.store.as_ref();

    let course = existing_course(store, &id).await?;
    ensure_owner(&principal, &course.user, &format!("delete course {}", course.id))?;

    store.delete(Collection::Courses, &id).await?;
    log::info!("User {} deleted course {}", principal.user_id, id);

    recompute_average_cost(store, &course.bootcamp).await?;
    Ok(responses::empty())
}
