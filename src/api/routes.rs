use axum::{
    extract::DefaultBodyLimit,
    http::Uri,
    routing::{get, post, put},
    Router,
};
use tower_http::services::ServeDir;

use crate::api::state::{AppState, Settings};
use crate::api::{auth_handlers, bootcamp_handlers, course_handlers, handlers, review_handlers, user_handlers};
use crate::error::ApiError;
use crate::store::traits::Store;

/// Room for multipart framing on top of the upload itself, so that oversized
/// images reach the handler and get a readable error.
const BODY_LIMIT_SLACK: usize = 64 * 1024;

pub fn create_router<S: Store + 'static>(settings: &Settings) -> Router<AppState<S>> {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        .nest("/api/v1", api_routes::<S>())
        // Uploaded bootcamp photos
        .nest_service("/uploads", ServeDir::new(&settings.upload_dir))
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(settings.max_upload_bytes + BODY_LIMIT_SLACK))
}

fn api_routes<S: Store + 'static>() -> Router<AppState<S>> {
    Router::new()
        // Bootcamps
        .route(
            "/bootcamps",
            get(bootcamp_handlers::list_bootcamps::<S>).post(bootcamp_handlers::create_bootcamp::<S>),
        )
        .route(
            "/bootcamps/radius/:zipcode/:distance",
            get(bootcamp_handlers::bootcamps_in_radius::<S>),
        )
        .route(
            "/bootcamps/:id",
            get(bootcamp_handlers::get_bootcamp::<S>)
                .put(bootcamp_handlers::update_bootcamp::<S>)
                .delete(bootcamp_handlers::delete_bootcamp::<S>),
        )
        .route(
            "/bootcamps/:id/photo",
            put(bootcamp_handlers::upload_bootcamp_photo::<S>),
        )
        // Courses
        .route(
            "/bootcamps/:id/courses",
            get(course_handlers::list_bootcamp_courses::<S>).post(course_handlers::create_course::<S>),
        )
        .route("/courses", get(course_handlers::list_courses::<S>))
        .route(
            "/courses/:id",
            get(course_handlers::get_course::<S>)
                .put(course_handlers::update_course::<S>)
                .delete(course_handlers::delete_course::<S>),
        )
        // Reviews
        .route(
            "/bootcamps/:id/reviews",
            get(review_handlers::list_bootcamp_reviews::<S>).post(review_handlers::create_review::<S>),
        )
        .route("/reviews", get(review_handlers::list_reviews::<S>))
        .route(
            "/reviews/:id",
            get(review_handlers::get_review::<S>)
                .put(review_handlers::update_review::<S>)
                .delete(review_handlers::delete_review::<S>),
        )
        // Authentication
        .route("/auth/register", post(auth_handlers::register::<S>))
        .route("/auth/login", post(auth_handlers::login::<S>))
        .route("/auth/logout", get(auth_handlers::logout::<S>))
        .route("/auth/me", get(auth_handlers::me::<S>))
        .route("/auth/forgotpassword", post(auth_handlers::forgot_password::<S>))
        .route("/auth/resetpassword/:token", put(auth_handlers::reset_password::<S>))
        .route("/auth/updatedetails", put(auth_handlers::update_details::<S>))
        .route("/auth/updatepassword", put(auth_handlers::update_password::<S>))
        // User administration
        .route(
            "/auth/users",
            get(user_handlers::list_users::<S>).post(user_handlers::create_user::<S>),
        )
        .route(
            "/auth/users/:id",
            get(user_handlers::get_user::<S>)
                .put(user_handlers::update_user::<S>)
                .delete(user_handlers::delete_user::<S>),
        )
}

async fn route_not_found(uri: Uri) -> ApiError {
    ApiError::NotFound(format!("Route {} not found", uri.path()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::state::AppContext;
    use crate::services::{BcryptPasswordHasher, LocalFileStorage, MemoryMailer, StaticGeocoder, MIN_COST};
    use crate::store::MemoryStore;
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app() -> Router {
        let settings = Settings {
            session_days: 1,
            secure_cookie: false,
            upload_dir: std::env::temp_dir(),
            max_upload_bytes: 1024,
            public_url: None,
        };
        let context = AppContext {
            store: Arc::new(MemoryStore::new()),
            geocoder: Arc::new(StaticGeocoder::new()),
            mailer: Arc::new(MemoryMailer::new()),
            files: Arc::new(LocalFileStorage::new(std::env::temp_dir())),
            hasher: Arc::new(BcryptPasswordHasher::with_cost(MIN_COST)),
            settings: settings.clone(),
        };
        create_router::<MemoryStore>(&settings).with_state(Arc::new(context))
    }

    async fn call(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = app()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = call("/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_empty_list_envelope() {
        let (status, body) = call("/api/v1/bootcamps").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            serde_json::json!({ "success": true, "count": 0, "pagination": {}, "data": [] })
        );
    }

    #[tokio::test]
    async fn test_bad_operator_is_rejected() {
        let (status, body) = call("/api/v1/courses?tuition%5Bneq%5D=5").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_protected_route_requires_token() {
        let (status, body) = call("/api/v1/auth/me").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Not authorized to access this route");
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let (status, body) = call("/api/v2/anything").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Route /api/v2/anything not found");
    }
}
