use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde_json::Value;

use crate::api::auth_handlers::{ensure_email_free, hash_password};
use crate::api::responses::{self, DataResponse};
use crate::api::{AppState, ValidJson};
use crate::error::ApiError;
use crate::logic::authorize;
use crate::model::{Collection, Document, NewUser, Principal, Resource, Role, User, UserProfile, UserUpdate};
use crate::query::{translate, Filter, PaginationEnvelope, ResultBuilder};
use crate::store::{DocumentStore, ResourceStore, Store};

const ADMINS: [Role; 1] = [Role::Admin];

async fn existing_user<S: Store>(store: &S, id: &str) -> Result<User, ApiError> {
    store
        .get::<User>(id)
        .await?
        .ok_or_else(|| ApiError::not_found(User::LABEL, id))
}

/// GET /api/v1/auth/users
pub async fn list_users<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Json<PaginationEnvelope>, ApiError> {
    authorize(&principal, &ADMINS)?;
    let descriptor = translate(params)?;
    let envelope = ResultBuilder::<S>::for_resource::<User>(state.store.as_ref())
        .build(&descriptor)
        .await?;
    Ok(Json(envelope))
}

/// GET /api/v1/auth/users/:id
pub async fn get_user<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<UserProfile>>, ApiError> {
    authorize(&principal, &ADMINS)?;
    let user = existing_user(state.store.as_ref(), &id).await?;
    Ok(responses::ok(user.profile()))
}

/// POST /api/v1/auth/users
pub async fn create_user<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    ValidJson(payload): ValidJson<NewUser>,
) -> Result<(StatusCode, Json<DataResponse<UserProfile>>), ApiError> {
    authorize(&principal, &ADMINS)?;
    payload.validate(true)?;
    let store = state.store.as_ref();

    let email = payload.email.unwrap_or_default();
    ensure_email_free(store, &email, None).await?;

    let hash = hash_password(&state, payload.password.as_deref().unwrap_or_default())?;
    let user = User::new(
        payload.name.unwrap_or_default().trim().to_string(),
        email.trim().to_string(),
        payload.role.unwrap_or(Role::User),
        hash,
    );
    store.create(&user).await?;
    log::info!("Admin {} created user {} as {}", principal.user_id, user.id, user.role);

    Ok(responses::created(user.profile()))
}

/// PUT /api/v1/auth/users/:id
pub async fn update_user<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
    ValidJson(payload): ValidJson<UserUpdate>,
) -> Result<Json<DataResponse<UserProfile>>, ApiError> {
    authorize(&principal, &ADMINS)?;
    let store = state.store.as_ref();
    existing_user(store, &id).await?;
    payload.validate()?;

    let mut patch = Document::new();
    if let Some(name) = payload.name {
        patch.insert("name".to_string(), Value::String(name.trim().to_string()));
    }
    if let Some(email) = payload.email {
        ensure_email_free(store, &email, Some(&id)).await?;
        patch.insert("email".to_string(), Value::String(email.trim().to_lowercase()));
    }
    if let Some(role) = payload.role {
        patch.insert("role".to_string(), Value::String(role.as_str().to_string()));
    }

    let user = store
        .patch::<User>(&id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found(User::LABEL, &id))?;
    log::info!("Admin {} updated user {}", principal.user_id, id);

    Ok(responses::ok(user.profile()))
}

/// DELETE /api/v1/auth/users/:id
///
/// Open sessions of the user are closed as well.
pub async fn delete_user<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    Path(id): Path<String>,
) -> Result<Json<DataResponse<Value>>, ApiError> {
    authorize(&principal, &ADMINS)?;
    let store = state.store.as_ref();
    existing_user(store, &id).await?;

    store.delete(Collection::Users, &id).await?;
    let sessions = store
        .delete_many(Collection::Sessions, &Filter::new().eq("user", id.as_str()))
        .await?;
    log::info!("Admin {} deleted user {} ({} sessions closed)", principal.user_id, id, sessions);

    Ok(responses::empty())
}
