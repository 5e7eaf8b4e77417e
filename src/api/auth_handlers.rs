use axum::{
    extract::{Path, State},
    http::{header, HeaderMap},
    response::{IntoResponse, Json, Response},
};
use chrono::Duration;
use serde_json::Value;

use crate::api::responses::{self, DataResponse, TokenResponse};
use crate::api::user_extractor::TOKEN_COOKIE;
use crate::api::{AppState, ValidJson};
use crate::error::ApiError;
use crate::model::{
    format_timestamp, now, validate_new_password, Collection, Credentials, DetailsUpdate, Document,
    ForgotPassword, NewUser, PasswordChange, PasswordReset, Principal, Resource, Role, Session, User,
    UserProfile,
};
use crate::query::{Comparison, Filter, Literal, Predicate};
use crate::services::{tokens, EmailMessage};
use crate::store::{DocumentStore, ResourceStore, Store};

/// Lifetime of a password reset token.
pub const RESET_TOKEN_MINUTES: i64 = 10;

pub(crate) async fn find_by_email<S: Store>(store: &S, email: &str) -> Result<Option<User>, ApiError> {
    Ok(store
        .find_one::<User>(Filter::new().eq("email", email.trim().to_lowercase()))
        .await?)
}

/// Conflict when another user already holds `email`.
pub(crate) async fn ensure_email_free<S: Store>(
    store: &S,
    email: &str,
    except: Option<&str>,
) -> Result<(), ApiError> {
    match find_by_email(store, email).await? {
        Some(user) if Some(user.id.as_str()) != except => {
            Err(ApiError::Conflict("Duplicate field value entered".to_string()))
        }
        _ => Ok(()),
    }
}

pub(crate) fn hash_password<S>(state: &AppState<S>, plain: &str) -> Result<String, ApiError> {
    Ok(state.hasher.hash(plain)?)
}

async fn current_user<S: Store>(store: &S, principal: &Principal) -> Result<User, ApiError> {
    store
        .get::<User>(&principal.user_id)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authorized to access this route".to_string()))
}

fn session_cookie<S>(state: &AppState<S>, token: &str, max_age_secs: i64) -> String {
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        TOKEN_COOKIE, token, max_age_secs
    );
    if state.settings.secure_cookie {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Open a session for `user`, answering with the token in the body and in
/// an http-only cookie.
async fn send_token_response<S: Store>(state: &AppState<S>, user: &User) -> Result<Response, ApiError> {
    let token = tokens::generate_token();
    let lifetime = Duration::days(state.settings.session_days);
    let session = Session::new(tokens::digest(&token), user.id.clone(), now() + lifetime);
    state.store.create(&session).await?;

    let expired = Filter::new().eq("user", user.id.as_str()).and(
        "expiresAt",
        Predicate::Compare(Comparison::Lt, Literal::exact(format_timestamp(&now()))),
    );
    let purged = state.store.delete_many(Collection::Sessions, &expired).await?;
    if purged > 0 {
        log::debug!("Purged {} expired session(s) of user {}", purged, user.id);
    }

    let cookie = session_cookie(state, &token, lifetime.num_seconds());
    let body = TokenResponse {
        success: true,
        token,
    };
    Ok(([(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

/// POST /api/v1/auth/register
pub async fn register<S: Store>(
    State(state): State<AppState<S>>,
    ValidJson(payload): ValidJson<NewUser>,
) -> Result<Response, ApiError> {
    payload.validate(false)?;
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
    log::info!("Registered user {} as {}", user.id, user.role);

    send_token_response(&state, &user).await
}

/// POST /api/v1/auth/login
pub async fn login<S: Store>(
    State(state): State<AppState<S>>,
    ValidJson(credentials): ValidJson<Credentials>,
) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (
        credentials.email.filter(|e| !e.trim().is_empty()),
        credentials.password.filter(|p| !p.is_empty()),
    ) else {
        return Err(ApiError::invalid("Please provide an email and password"));
    };

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());
    let user = find_by_email(state.store.as_ref(), &email).await?.ok_or_else(invalid)?;
    if !state.hasher.verify(&password, &user.password) {
        log::info!("Failed login for user {}", user.id);
        return Err(invalid());
    }

    send_token_response(&state, &user).await
}

/// GET /api/v1/auth/logout
pub async fn logout<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
) -> Result<Response, ApiError> {
    if let Some(session_id) = &principal.session_id {
        state.store.delete(Collection::Sessions, session_id).await?;
    }
    log::info!("User {} logged out", principal.user_id);

    let cookie = session_cookie(&state, "none", 0);
    Ok(([(header::SET_COOKIE, cookie)], responses::empty()).into_response())
}

/// GET /api/v1/auth/me
pub async fn me<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
) -> Result<Json<DataResponse<UserProfile>>, ApiError> {
    let user = current_user(state.store.as_ref(), &principal).await?;
    Ok(responses::ok(user.profile()))
}

/// The configured public origin, else `http://{Host}`. Forwarding headers
/// are client-controlled and never used.
fn request_origin(public_url: Option<&str>, headers: &HeaderMap) -> String {
    if let Some(url) = public_url {
        return url.to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");
    format!("http://{}", host)
}

fn reset_fields(token: Option<String>, expire: Option<String>) -> Document {
    let mut patch = Document::new();
    patch.insert(
        "resetPasswordToken".to_string(),
        token.map_or(Value::Null, Value::String),
    );
    patch.insert(
        "resetPasswordExpire".to_string(),
        expire.map_or(Value::Null, Value::String),
    );
    patch
}

/// POST /api/v1/auth/forgotpassword
pub async fn forgot_password<S: Store>(
    State(state): State<AppState<S>>,
    headers: HeaderMap,
    ValidJson(payload): ValidJson<ForgotPassword>,
) -> Result<Json<DataResponse<String>>, ApiError> {
    let email = payload
        .email
        .filter(|e| !e.trim().is_empty())
        .ok_or_else(|| ApiError::invalid("Please add an email"))?;
    let store = state.store.as_ref();

    let user = find_by_email(store, &email)
        .await?
        .ok_or_else(|| ApiError::NotFound("There is no user with that email".to_string()))?;

    let reset_token = tokens::generate_token();
    let expires = now() + Duration::minutes(RESET_TOKEN_MINUTES);
    store
        .update(
            Collection::Users,
            &user.id,
            reset_fields(Some(tokens::digest(&reset_token)), Some(format_timestamp(&expires))),
        )
        .await?;

    let reset_url = format!(
        "{}/api/v1/auth/resetpassword/{}",
        request_origin(state.settings.public_url.as_deref(), &headers),
        reset_token
    );
    let message = EmailMessage {
        to: user.email.clone(),
        subject: "Password reset token".to_string(),
        text: format!(
            "You are receiving this email because you (or someone else) has requested the reset \
             of a password. Please make a PUT request to:\n\n{}",
            reset_url
        ),
    };

    if let Err(cause) = state.mailer.send(&message).await {
        store.update(Collection::Users, &user.id, reset_fields(None, None)).await?;
        return Err(ApiError::upstream("Email could not be sent", cause));
    }
    log::info!("Password reset requested for user {}", user.id);

    Ok(responses::ok("Email sent".to_string()))
}

/// PUT /api/v1/auth/resetpassword/:token
pub async fn reset_password<S: Store>(
    State(state): State<AppState<S>>,
    Path(reset_token): Path<String>,
    ValidJson(payload): ValidJson<PasswordReset>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();
    let filter = Filter::new().eq("resetPasswordToken", tokens::digest(&reset_token)).and(
        "resetPasswordExpire",
        Predicate::Compare(Comparison::Gt, Literal::exact(format_timestamp(&now()))),
    );
    let user = store
        .find_one::<User>(filter)
        .await?
        .ok_or_else(|| ApiError::invalid("Invalid token"))?;

    let password = validate_new_password(payload.password.as_deref())?;
    let mut patch = reset_fields(None, None);
    patch.insert("password".to_string(), Value::String(hash_password(&state, password)?));
    let user = store
        .patch::<User>(&user.id, patch)
        .await?
        .ok_or_else(|| ApiError::invalid("Invalid token"))?;
    log::info!("Password reset completed for user {}", user.id);

    send_token_response(&state, &user).await
}

/// PUT /api/v1/auth/updatedetails
pub async fn update_details<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    ValidJson(payload): ValidJson<DetailsUpdate>,
) -> Result<Json<DataResponse<UserProfile>>, ApiError> {
    payload.validate()?;
    let store = state.store.as_ref();

    let mut patch = Document::new();
    if let Some(name) = payload.name {
        patch.insert("name".to_string(), Value::String(name.trim().to_string()));
    }
    if let Some(email) = payload.email {
        ensure_email_free(store, &email, Some(&principal.user_id)).await?;
        patch.insert("email".to_string(), Value::String(email.trim().to_lowercase()));
    }

    let user = store
        .patch::<User>(&principal.user_id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found(User::LABEL, &principal.user_id))?;
    Ok(responses::ok(user.profile()))
}

/// PUT /api/v1/auth/updatepassword
pub async fn update_password<S: Store>(
    State(state): State<AppState<S>>,
    principal: Principal,
    ValidJson(payload): ValidJson<PasswordChange>,
) -> Result<Response, ApiError> {
    let store = state.store.as_ref();
    let user = current_user(store, &principal).await?;

    let current = payload.current_password.unwrap_or_default();
    if !state.hasher.verify(&current, &user.password) {
        return Err(ApiError::Unauthorized("Password is incorrect".to_string()));
    }
    let new_password = validate_new_password(payload.new_password.as_deref())?;

    let mut patch = Document::new();
    patch.insert("password".to_string(), Value::String(hash_password(&state, new_password)?));
    let user = store
        .patch::<User>(&user.id, patch)
        .await?
        .ok_or_else(|| ApiError::not_found(User::LABEL, &principal.user_id))?;
    log::info!("User {} changed their password", user.id);

    send_token_response(&state, &user).await
}
