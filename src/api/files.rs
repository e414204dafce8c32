//! File links. Files are never uploaded here; a row only records where the
//! document lives.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use serde::Deserialize;
use serde_json::json;

use super::{
    appointments::owned_appointment, clients::owned_client, non_blank, ApiError, ApiJson,
    ApiPath, ApiResult,
};
use crate::auth::AuthUser;
use crate::entities::{appointment_file, client_file};

const DEFAULT_FILE_TYPE: &str = "document";

#[derive(Deserialize)]
pub struct CreateFileRequest {
    name: Option<String>,
    url: Option<String>,
    description: Option<String>,
    r#type: Option<String>,
}

struct NewFile {
    name: String,
    url: String,
    description: Option<String>,
    kind: String,
}

impl TryFrom<CreateFileRequest> for NewFile {
    type Error = ApiError;

    fn try_from(payload: CreateFileRequest) -> Result<Self, Self::Error> {
        let (Some(name), Some(url)) = (non_blank(payload.name), non_blank(payload.url)) else {
            return Err(ApiError::validation("Name and URL are required"));
        };
        let lower = url.to_ascii_lowercase();
        let host = lower
            .strip_prefix("https://")
            .or_else(|| lower.strip_prefix("http://"));
        if host.map_or(true, str::is_empty) {
            return Err(ApiError::validation("URL must start with http:// or https://"));
        }
        Ok(Self {
            name,
            url,
            description: non_blank(payload.description),
            kind: non_blank(payload.r#type).unwrap_or_else(|| DEFAULT_FILE_TYPE.to_string()),
        })
    }
}

pub async fn create_client_file(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(client_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<CreateFileRequest>,
) -> ApiResult<Response> {
    let client = owned_client(&db, auth.id, client_id).await?;
    let file = NewFile::try_from(payload)?;

    let file = client_file::ActiveModel {
        client_id: Set(client.id),
        name: Set(file.name),
        url: Set(file.url),
        description: Set(file.description),
        r#type: Set(file.kind),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    tracing::Span::current()
        .record("table", "client_files")
        .record("action", "create_client_file")
        .record("client_id", client.id);

    Ok((StatusCode::CREATED, Json(file)).into_response())
}

pub async fn delete_client_file(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath((client_id, file_id)): ApiPath<(i32, i32)>,
) -> ApiResult<Json<serde_json::Value>> {
    let client = owned_client(&db, auth.id, client_id).await?;

    let res = client_file::Entity::delete_many()
        .filter(client_file::Column::Id.eq(file_id))
        .filter(client_file::Column::ClientId.eq(client.id))
        .exec(&db)
        .await?;
    if res.rows_affected == 0 {
        return Err(ApiError::NotFound("File"));
    }

    tracing::Span::current()
        .record("table", "client_files")
        .record("action", "delete_client_file")
        .record("client_id", client.id);

    Ok(Json(json!({ "success": true })))
}

pub async fn create_appointment_file(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(appointment_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<CreateFileRequest>,
) -> ApiResult<Response> {
    let appointment = owned_appointment(&db, auth.id, appointment_id).await?;
    let file = NewFile::try_from(payload)?;

    let file = appointment_file::ActiveModel {
        appointment_id: Set(appointment.id),
        name: Set(file.name),
        url: Set(file.url),
        description: Set(file.description),
        r#type: Set(file.kind),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    tracing::Span::current()
        .record("table", "appointment_files")
        .record("action", "create_appointment_file")
        .record("appointment_id", appointment.id);

    Ok((StatusCode::CREATED, Json(file)).into_response())
}

pub async fn delete_appointment_file(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath((appointment_id, file_id)): ApiPath<(i32, i32)>,
) -> ApiResult<Json<serde_json::Value>> {
    let appointment = owned_appointment(&db, auth.id, appointment_id).await?;

    let res = appointment_file::Entity::delete_many()
        .filter(appointment_file::Column::Id.eq(file_id))
        .filter(appointment_file::Column::AppointmentId.eq(appointment.id))
        .exec(&db)
        .await?;
    if res.rows_affected == 0 {
        return Err(ApiError::NotFound("File"));
    }

    tracing::Span::current()
        .record("table", "appointment_files")
        .record("action", "delete_appointment_file")
        .record("appointment_id", appointment.id);

    Ok(Json(json!({ "success": true })))
}
