use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;

use crate::api::responses::{self, DataResponse, ListResponse};
use crate::api::ValidJson;
use crate::api::AppState;
use crate::error::ApiError;
use crate::logic::{authorize, ensure_owner};
use crate::model::{
    miles_to_radians, Bootcamp, BootcampUpdate, Collection, Document, Location,
    NewBootcamp, Principal, Resource, Role,
};
use crate::query::{translate, Filter, PaginationEnvelope, Populate, ResultBuilder};
use crate::store::{DocumentStore, ResourceStore, Store};

const PUBLISHERS: [Role; 2] = [Role::Publisher, Role::Admin];

async fn existing_bootcamp<S: Store>(store: &S, id: &str) -> Result<Bootcamp, ApiError> {
    store
        .get::<Bootcamp>(id)
        .await?
        .ok_or_else(|| ApiError::not_found(Bootcamp::LABEL, id))
}

async fn ensure_unique_name<S: Store>(store: &S, name: &str, except: Option<&str>) -> Result<(), ApiError> {
    let existing = store
        .find_one::<Bootcamp>(Filter::new().eq("name", name.trim()))
        .await?;
    match existing {
        Some(bootcamp) if Some(bootcamp.id.as_str()) != except => Err(ApiError::Conflict(
            "Duplicate field value entered".to_string(),
        )),
        _ => Ok(()),
    }
}

async fn geocode_address<S: Store>(state: &AppState<S>, address: &str) -> Result<Location, ApiError> {
    state
        .geocoder
        .geocode(address)
        .await
        .map(Location::from)
        .map_err(|e| ApiError::upstream("Address could not be geocoded", e))
}

/// GET /api/v1/bootcamps
pub async fn list_bootcamps<S: Store>(
    State(state): State<AppState<S>>,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<PaginationEnvelope>, ApiError> {
    let descriptor = translate(params)?
        .with_populate(Populate::reverse("courses", Collection::Courses, "bootcamp"));

    let envelope = ResultBuilder::<S>::for_resource::<Bootcamp>(state.store.as_ref())
        .build(&descriptor)
        .await?;
    Ok(Json(envelope))
}

/// GET /api/v1/bootcamps/:id
pub async fn get_bootcamp<S: Store>(
    State(state): State<AppState<S>>,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Bootcamp>>, ApiError> {
    let bootcamp = existing_bootcamp(state.store.as_ref(), &id).await?;
    Ok(responses::ok(bootcamp))
}

/// POST /api/v1/bootcamps
pub async fn create_bootcamp<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    ValidJson(payload): ValidJson<NewBootcamp>,
) -> Result<(StatusCode, Json<DataResponse<Bootcamp>>), ApiError> {
    authorize(&principal, &PUBLISHERS)?;
    let store = state.store.as_ref();

    // Publishers may own a single bootcamp; admins any number
    let owned = store
        .count(Collection::Bootcamps, &Filter::new().eq("user", principal.user_id.as_str()))
        .await?;
    if owned > 0 && !principal.is_elevated() {
        return Err(ApiError::Conflict(format!(
            "The user with ID {} has already published a bootcamp",
            principal.user_id
        )));
    }

    payload.validate()?;
    if let Some(name) = payload.name.as_deref() {
        ensure_unique_name(store, name, None).await?;
    }
    let location = match payload.address.as_deref() {
        Some(address) => Some(geocode_address(&state, address).await?),
        None => None,
    };

    let bootcamp = payload.into_bootcamp(principal.user_id.clone(), location);
    store.create(&bootcamp).await?;
    log::info!("User {} created bootcamp {} ({})", principal.user_id, bootcamp.id, bootcamp.name);

    Ok(responses::created(bootcamp))
}

/// PUT /api/v1/bootcamps/:id
pub async fn update_bootcamp<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<BootcampUpdate>,
) -> Result<Json<DataResponse<Bootcamp>>, ApiError> {
    authorize(&principal, &PUBLISHERS)?;
    let store = state.store.as_ref();

    let bootcamp = existing_bootcamp(store, &id).await?;
    ensure_owner(&principal, &bootcamp.user, "update this bootcamp")?;

    payload.validate()?;
    if let Some(name) = payload.name.as_deref() {
        ensure_unique_name(store, name, Some(&id)).await?;
    }
    let location = match payload.address.as_deref() {
        Some(address) => Some(geocode_address(&state, address).await?),
        None => None,
    };

    let updated = store
        .patch::<Bootcamp>(&id, payload.into_patch(location))
        .await?
        .ok_or_else(|| ApiError::not_found(Bootcamp::LABEL, &id))?;
    log::info!("User {} updated bootcamp {}", principal.user_id, id);

    Ok(responses::ok(updated))
}

/// DELETE /api/v1/bootcamps/:id
///
/// Removes the bootcamp's courses and reviews along with it.
pub async fn delete_bootcamp<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Value>>, ApiError> {
    authorize(&principal, &PUBLISHERS)?;
    let store = state.store.as_ref();

    let bootcamp = existing_bootcamp(store, &id).await?;
    ensure_owner(&principal, &bootcamp.user, "delete this bootcamp")?;

    let children = Filter::new().eq("bootcamp", id.as_str());
    let courses = store.delete_many(Collection::Courses, &children).await?;
    let reviews = store.delete_many(Collection::Reviews, &children).await?;
    store.delete(Collection::Bootcamps, &id).await?;
    log::info!(
        "User {} deleted bootcamp {} with {} courses and {} reviews",
        principal.user_id,
        id,
        courses,
        reviews
    );

    Ok(responses::empty())
}

/// GET /api/v1/bootcamps/radius/:zipcode/:distance
pub async fn bootcamps_in_radius<S: Store>(
    State(state): State<AppState<S>>,
    Path((zipcode, distance)): Path<(String, String)>,
) -> Result<Json<ListResponse<Document>>, ApiError> {
    let distance: f64 = distance
        .parse()
        .ok()
        .filter(|d: &f64| d.is_finite() && *d >= 0.0)
        .ok_or_else(|| ApiError::invalid("Please provide a valid distance in miles"))?;

    let point = state
        .geocoder
        .geocode(&zipcode)
        .await
        .map_err(|e| ApiError::upstream("Zipcode could not be geocoded", e))?;

    let bootcamps = state
        .store
        .find_within_radius(
            Collection::Bootcamps,
            "location",
            point.latitude,
            point.longitude,
            miles_to_radians(distance),
        )
        .await?;
    log::debug!("{} bootcamps within {} miles of {}", bootcamps.len(), distance, zipcode);

    Ok(responses::list(bootcamps))
}

/// PUT /api/v1/bootcamps/:id/photo
///
/// Multipart upload with the image in the `file` field.
pub async fn upload_bootcamp_photo<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<DataResponse<String>>, ApiError> {
    authorize(&principal, &PUBLISHERS)?;
    let store = state.store.as_ref();

    let bootcamp = existing_bootcamp(store, &id).await?;
    ensure_owner(&principal, &bootcamp.user, "upload a photo on this bootcamp")?;

    let upload_error = || ApiError::invalid("Please upload an image file");
    let mut upload = None;
    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::invalid(e.body_text()))? {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or_default().to_string();
        let bytes = field.bytes().await.map_err(|e| ApiError::invalid(e.body_text()))?;
        upload = Some((content_type, bytes));
        break;
    }

    let (content_type, bytes) = upload.ok_or_else(upload_error)?;
    let Some(extension) = content_type
        .strip_prefix("image/")
        .and_then(|subtype| subtype.split(['+', ';']).next())
        .filter(|ext| !ext.is_empty())
    else {
        return Err(upload_error());
    };
    let max_bytes = state.settings.max_upload_bytes;
    if bytes.len() > max_bytes {
        return Err(ApiError::invalid(format!(
            "Please upload an image less than {} KB",
            max_bytes / 1024
        )));
    }

    let file_name = format!("photo_{}.{}", bootcamp.id, extension);
    let stored = state
        .files
        .store(&file_name, &bytes)
        .await
        .map_err(|e| ApiError::upstream("Problem with file upload", e))?;

    let mut patch = Document::new();
    patch.insert("photo".to_string(), Value::String(stored.clone()));
    store.update(Collection::Bootcamps, &id, patch).await?;
    log::info!("User {} uploaded {} for bootcamp {}", principal.user_id, stored, id);

    Ok(responses::ok(stored))
}

