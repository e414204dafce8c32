//! Free-text session notes attached to a client or to an appointment.

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
use crate::entities::{appointment_comment, client_comment};

#[derive(Deserialize)]
pub struct CreateCommentRequest {
    content: Option<String>,
}

fn required_content(payload: CreateCommentRequest) -> ApiResult<String> {
    non_blank(payload.content).ok_or_else(|| ApiError::validation("Content is required"))
}

pub async fn create_client_comment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(client_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> ApiResult<Response> {
    let client = owned_client(&db, auth.id, client_id).await?;
    let content = required_content(payload)?;

    let comment = client_comment::ActiveModel {
        client_id: Set(client.id),
        content: Set(content),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    tracing::Span::current()
        .record("table", "client_comments")
        .record("action", "create_client_comment")
        .record("client_id", client.id);

    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub async fn delete_client_comment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath((client_id, comment_id)): ApiPath<(i32, i32)>,
) -> ApiResult<Json<serde_json::Value>> {
    let client = owned_client(&db, auth.id, client_id).await?;

    let res = client_comment::Entity::delete_many()
        .filter(client_comment::Column::Id.eq(comment_id))
        .filter(client_comment::Column::ClientId.eq(client.id))
        .exec(&db)
        .await?;
    if res.rows_affected == 0 {
        return Err(ApiError::NotFound("Comment"));
    }

    tracing::Span::current()
        .record("table", "client_comments")
        .record("action", "delete_client_comment")
        .record("client_id", client.id);

    Ok(Json(json!({ "success": true })))
}

pub async fn create_appointment_comment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(appointment_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<CreateCommentRequest>,
) -> ApiResult<Response> {
    let appointment = owned_appointment(&db, auth.id, appointment_id).await?;
    let content = required_content(payload)?;

    let comment = appointment_comment::ActiveModel {
        appointment_id: Set(appointment.id),
        content: Set(content),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&db)
    .await?;

    tracing::Span::current()
        .record("table", "appointment_comments")
        .record("action", "create_appointment_comment")
        .record("appointment_id", appointment.id);

    Ok((StatusCode::CREATED, Json(comment)).into_response())
}

pub async fn delete_appointment_comment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath((appointment_id, comment_id)): ApiPath<(i32, i32)>,
) -> ApiResult<Json<serde_json::Value>> {
    let appointment = owned_appointment(&db, auth.id, appointment_id).await?;

    let res = appointment_comment::Entity::delete_many()
        .filter(appointment_comment::Column::Id.eq(comment_id))
        .filter(appointment_comment::Column::AppointmentId.eq(appointment.id))
        .exec(&db)
        .await?;
    if res.rows_affected == 0 {
        return Err(ApiError::NotFound("Comment"));
    }

    tracing::Span::current()
        .record("table", "appointment_comments")
        .record("action", "delete_appointment_comment")
        .record("appointment_id", appointment.id);

    Ok(Json(json!({ "success": true })))
}
