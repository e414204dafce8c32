use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter,
    Set, SqlErr,
};
use serde::{Deserialize, Serialize};

use super::{double_option, non_blank, ApiError, ApiJson, ApiResult};
use crate::auth::{hash_password, verify_password, AuthUser, TokenKeys};
use crate::entities::user;

const DEFAULT_ROLE: &str = "fisioterapeuta";

#[derive(Deserialize)]
pub struct RegisterRequest {
    email: Option<String>,
    password: Option<String>,
    name: Option<String>,
    phone: Option<String>,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    email: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: i32,
    pub email: String,
    pub name: String,
    pub role: String,
    pub phone: Option<String>,
}

impl From<user::Model> for UserResponse {
    fn from(u: user::Model) -> Self {
        Self {
            id: u.id,
            email: u.email,
            name: u.name,
            role: u.role,
            phone: u.phone,
        }
    }
}

#[derive(Serialize)]
pub struct SessionResponse {
    token: String,
    user: UserResponse,
}

pub async fn register(
    Extension(db): Extension<DatabaseConnection>,
    Extension(keys): Extension<TokenKeys>,
    ApiJson(payload): ApiJson<RegisterRequest>,
) -> ApiResult<Response> {
    let (Some(email), Some(password), Some(name)) = (
        non_blank(payload.email),
        non_blank(payload.password),
        non_blank(payload.name),
    ) else {
        return Err(ApiError::validation("Name, email and password are required"));
    };
    let email = email.to_lowercase();

    let existing = user::Entity::find()
        .filter(user::Column::Email.eq(email.as_str()))
        .one(&db)
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already registered".into()));
    }

    let password_hash = hash_password(&password)?;
    let now = chrono::Utc::now();
    let new_user = user::ActiveModel {
        email: Set(email),
        password_hash: Set(password_hash),
        name: Set(name),
        role: Set(DEFAULT_ROLE.to_string()),
        phone: Set(non_blank(payload.phone)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let user = match new_user.insert(&db).await {
        Ok(u) => u,
        // Lost a race with a concurrent registration of the same address.
        Err(e) if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) => {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    tracing::Span::current()
        .record("table", "users")
        .record("action", "register_user")
        .record("user_id", user.id)
        .record("business_event", "Practitioner registered");
    metrics::counter!("physio_users_registered_total").increment(1);
    metrics::gauge!("physio_users_total").increment(1.0);

    let token = keys.issue(&user)?;
    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            token,
            user: user.into(),
        }),
    )
        .into_response())
}

pub async fn login(
    Extension(db): Extension<DatabaseConnection>,
    Extension(keys): Extension<TokenKeys>,
    ApiJson(payload): ApiJson<LoginRequest>,
) -> ApiResult<Json<SessionResponse>> {
    let (Some(email), Some(password)) = (non_blank(payload.email), non_blank(payload.password))
    else {
        return Err(ApiError::validation("Email and password are required"));
    };

    let user = user::Entity::find()
        .filter(user::Column::Email.eq(email.to_lowercase()))
        .one(&db)
        .await?;

    let Some(user) = user.filter(|u| verify_password(&password, &u.password_hash)) else {
        tracing::Span::current()
            .record("table", "users")
            .record("action", "login_user_failed");
        // Same answer for unknown email and wrong password.
        return Err(ApiError::InvalidCredentials);
    };

    tracing::Span::current()
        .record("table", "users")
        .record("action", "login_user")
        .record("user_id", user.id)
        .record("business_event", "Practitioner logged in");

    let token = keys.issue(&user)?;
    Ok(Json(SessionResponse {
        token,
        user: user.into(),
    }))
}

pub async fn me(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
) -> ApiResult<Json<UserResponse>> {
    // A token can outlive its account.
    let user = user::Entity::find_by_id(auth.id)
        .one(&db)
        .await?
        .ok_or(ApiError::Unauthorized)?;
    Ok(Json(user.into()))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    phone: Option<Option<String>>,
    current_password: Option<String>,
    new_password: Option<String>,
}

pub async fn update_me(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<UserResponse>> {
    let user = user::Entity::find_by_id(auth.id)
        .one(&db)
        .await?
        .ok_or(ApiError::Unauthorized)?;

    let new_hash = match non_blank(payload.new_password) {
        Some(new_password) => {
            let current = payload.current_password.unwrap_or_default();
            if !verify_password(&current, &user.password_hash) {
                return Err(ApiError::validation("Current password is incorrect"));
            }
            Some(hash_password(&new_password)?)
        }
        None => None,
    };

    let mut active_user = user.into_active_model();
    if let Some(name) = non_blank(payload.name) {
        active_user.name = Set(name);
    }
    if let Some(phone) = payload.phone {
        active_user.phone = Set(non_blank(phone));
    }
    if let Some(hash) = new_hash {
        active_user.password_hash = Set(hash);
    }
    active_user.updated_at = Set(chrono::Utc::now());

    let user = active_user.update(&db).await?;
    tracing::Span::current()
        .record("table", "users")
        .record("action", "update_profile");
    Ok(Json(user.into()))
}
