pub mod agenda;
pub mod appointments;
pub mod auth;
pub mod clients;
pub mod comments;
pub mod error;
pub mod files;
pub mod middleware;
pub mod stats;

use axum::{
    extract::{FromRequest, FromRequestParts},
    routing::{delete, get, post},
    Extension, Router,
};
use chrono_tz::Tz;
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Deserializer};

pub use error::{ApiError, ApiResult};

use crate::auth::TokenKeys;

/// `axum::Json` with rejections mapped to a 400 `{"error": ...}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// `axum::extract::Query` with the same error body as [`ApiJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

/// `axum::extract::Path` with the same error body as [`ApiJson`].
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// A date that parses but whose day, week or month runs past the calendar.
pub(crate) fn invalid_date() -> ApiError {
    ApiError::validation("Invalid date")
}

/// Trimmed value, or `None` when absent or blank.
pub(crate) fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Distinguishes a missing field (`None`) from an explicit `null`
/// (`Some(None)`) in PATCH bodies. Use with `#[serde(default)]`.
pub(crate) fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

async fn health_check() -> &'static str {
    "OK"
}

/// All application routes, with the database, token keys and clinic time
/// zone installed as extensions. HTTP-level layers (tracing, CORS, metrics)
/// are added by the binary.
pub fn router(db: DatabaseConnection, keys: TokenKeys, timezone: Tz) -> Router {
    let public_routes = Router::new()
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login));

    let protected_routes = Router::new()
        .route("/auth/me", get(auth::me).patch(auth::update_me))
        .route(
            "/clients",
            get(clients::list_clients).post(clients::create_client),
        )
        .route(
            "/clients/:id",
            get(clients::get_client)
                .patch(clients::update_client)
                .put(clients::update_client)
                .delete(clients::delete_client),
        )
        .route("/clients/:id/comments", post(comments::create_client_comment))
        .route(
            "/clients/:id/comments/:comment_id",
            delete(comments::delete_client_comment),
        )
        .route("/clients/:id/files", post(files::create_client_file))
        .route(
            "/clients/:id/files/:file_id",
            delete(files::delete_client_file),
        )
        .route(
            "/appointments",
            get(appointments::list_appointments).post(appointments::create_appointment),
        )
        .route(
            "/appointments/:id",
            get(appointments::get_appointment)
                .patch(appointments::update_appointment)
                .put(appointments::update_appointment)
                .delete(appointments::delete_appointment),
        )
        .route(
            "/appointments/:id/comments",
            post(comments::create_appointment_comment),
        )
        .route(
            "/appointments/:id/comments/:comment_id",
            delete(comments::delete_appointment_comment),
        )
        .route(
            "/appointments/:id/files",
            post(files::create_appointment_file),
        )
        .route(
            "/appointments/:id/files/:file_id",
            delete(files::delete_appointment_file),
        )
        .route("/stats", get(stats::get_stats))
        .route("/agenda/week", get(agenda::week))
        .route("/agenda/month", get(agenda::month))
        .route_layer(axum::middleware::from_fn(middleware::require_auth));

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", public_routes.merge(protected_routes))
        .layer(Extension(db))
        .layer(Extension(keys))
        .layer(Extension(timezone))
}
