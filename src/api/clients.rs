use std::collections::HashMap;

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    sea_query::{Expr, Func},
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, FromQueryResult,
    IntoActiveModel, ModelTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    appointments::{with_notes, AppointmentWithNotes},
    double_option, non_blank, ApiError, ApiJson, ApiPath, ApiQuery, ApiResult,
};
use crate::auth::AuthUser;
use crate::entities::{appointment, client, client_comment, client_file};

const RECENT_APPOINTMENTS: u64 = 10;

/// The client if it exists and belongs to `user_id`. Someone else's client
/// is reported exactly like a missing one.
pub(crate) async fn owned_client(
    db: &DatabaseConnection,
    user_id: i32,
    client_id: i32,
) -> ApiResult<client::Model> {
    client::Entity::find_by_id(client_id)
        .filter(client::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(ApiError::NotFound("Client"))
}

/// Accepts `YYYY-MM-DD` or a full RFC 3339 timestamp (date part kept).
fn parse_birth_date(raw: &str) -> ApiResult<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .ok_or_else(|| ApiError::validation(format!("Invalid birth date: {raw}")))
}

fn optional_birth_date(raw: Option<String>) -> ApiResult<Option<NaiveDate>> {
    non_blank(raw).map(|r| parse_birth_date(&r)).transpose()
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientSummary {
    #[serde(flatten)]
    pub client: client::Model,
    pub appointment_count: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetail {
    #[serde(flatten)]
    pub client: client::Model,
    pub appointments: Vec<AppointmentWithNotes>,
    pub comments: Vec<client_comment::Model>,
    pub files: Vec<client_file::Model>,
    pub appointment_count: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ListClientsParams {
    pub search: Option<String>,
    pub limit: Option<u64>,
}

#[derive(Debug, FromQueryResult)]
struct AppointmentCount {
    client_id: i32,
    count: i64,
}

pub async fn list_clients(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiQuery(params): ApiQuery<ListClientsParams>,
) -> ApiResult<Json<Vec<ClientSummary>>> {
    let mut query = client::Entity::find().filter(client::Column::UserId.eq(auth.id));

    if let Some(search) = non_blank(params.search) {
        let pattern = format!("%{}%", search.to_lowercase());
        query = query.filter(
            Condition::any()
                .add(
                    Expr::expr(Func::lower(Expr::col((client::Entity, client::Column::Name))))
                        .like(pattern.clone()),
                )
                .add(
                    Expr::expr(Func::lower(Expr::col((client::Entity, client::Column::Email))))
                        .like(pattern),
                )
                .add(client::Column::Phone.contains(search.as_str())),
        );
    }

    let clients = query
        .order_by_asc(client::Column::Name)
        .order_by_asc(client::Column::Id)
        .limit(params.limit)
        .all(&db)
        .await?;

    let counts: HashMap<i32, i64> = appointment::Entity::find()
        .select_only()
        .column(appointment::Column::ClientId)
        .column_as(Expr::col(appointment::Column::Id).count(), "count")
        .filter(appointment::Column::UserId.eq(auth.id))
        .group_by(appointment::Column::ClientId)
        .into_model::<AppointmentCount>()
        .all(&db)
        .await?
        .into_iter()
        .map(|row| (row.client_id, row.count))
        .collect();

    let summaries = clients
        .into_iter()
        .map(|client| ClientSummary {
            appointment_count: counts.get(&client.id).copied().unwrap_or(0),
            client,
        })
        .collect();

    Ok(Json(summaries))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateClientRequest {
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    birth_date: Option<String>,
    address: Option<String>,
    occupation: Option<String>,
    emergency_contact: Option<String>,
    emergency_phone: Option<String>,
    medical_history: Option<String>,
    allergies: Option<String>,
    medications: Option<String>,
    notes: Option<String>,
}

pub async fn create_client(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateClientRequest>,
) -> ApiResult<Response> {
    let (Some(name), Some(phone)) = (non_blank(payload.name), non_blank(payload.phone)) else {
        return Err(ApiError::validation("Name and phone are required"));
    };
    let birth_date = optional_birth_date(payload.birth_date)?;

    let now = Utc::now();
    let new_client = client::ActiveModel {
        user_id: Set(auth.id),
        name: Set(name),
        phone: Set(phone),
        email: Set(non_blank(payload.email)),
        birth_date: Set(birth_date),
        address: Set(non_blank(payload.address)),
        occupation: Set(non_blank(payload.occupation)),
        emergency_contact: Set(non_blank(payload.emergency_contact)),
        emergency_phone: Set(non_blank(payload.emergency_phone)),
        medical_history: Set(non_blank(payload.medical_history)),
        allergies: Set(non_blank(payload.allergies)),
        medications: Set(non_blank(payload.medications)),
        notes: Set(non_blank(payload.notes)),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let client = new_client.insert(&db).await?;

    tracing::Span::current()
        .record("table", "clients")
        .record("action", "create_client")
        .record("client_id", client.id)
        .record("business_event", "Client created");
    metrics::counter!("physio_clients_created_total").increment(1);
    metrics::gauge!("physio_clients_total").increment(1.0);

    Ok((StatusCode::CREATED, Json(client)).into_response())
}

pub async fn get_client(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(client_id): ApiPath<i32>,
) -> ApiResult<Json<ClientDetail>> {
    let client = owned_client(&db, auth.id, client_id).await?;

    let recent = client
        .find_related(appointment::Entity)
        .order_by_desc(appointment::Column::Date)
        .limit(RECENT_APPOINTMENTS)
        .all(&db)
        .await?;
    let appointments = with_notes(&db, recent).await?;

    let comments = client
        .find_related(client_comment::Entity)
        .order_by_desc(client_comment::Column::CreatedAt)
        .order_by_desc(client_comment::Column::Id)
        .all(&db)
        .await?;
    let files = client
        .find_related(client_file::Entity)
        .order_by_desc(client_file::Column::CreatedAt)
        .order_by_desc(client_file::Column::Id)
        .all(&db)
        .await?;
    let appointment_count = client.find_related(appointment::Entity).count(&db).await?;

    Ok(Json(ClientDetail {
        client,
        appointments,
        comments,
        files,
        appointment_count,
    }))
}

/// `name` and `phone` are only replaced by non-blank values. Every other
/// field is replaced when present; an explicit `null` clears it.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateClientRequest {
    name: Option<String>,
    phone: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    email: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    birth_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    address: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    occupation: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    emergency_contact: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    emergency_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    medical_history: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    allergies: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    medications: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    notes: Option<Option<String>>,
}

pub async fn update_client(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(client_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateClientRequest>,
) -> ApiResult<Json<client::Model>> {
    let existing = owned_client(&db, auth.id, client_id).await?;
    let mut active = existing.into_active_model();

    if let Some(name) = non_blank(payload.name) {
        active.name = Set(name);
    }
    if let Some(phone) = non_blank(payload.phone) {
        active.phone = Set(phone);
    }
    if let Some(birth_date) = payload.birth_date {
        active.birth_date = Set(optional_birth_date(birth_date)?);
    }
    if let Some(email) = payload.email {
        active.email = Set(non_blank(email));
    }
    if let Some(address) = payload.address {
        active.address = Set(non_blank(address));
    }
    if let Some(occupation) = payload.occupation {
        active.occupation = Set(non_blank(occupation));
    }
    if let Some(emergency_contact) = payload.emergency_contact {
        active.emergency_contact = Set(non_blank(emergency_contact));
    }
    if let Some(emergency_phone) = payload.emergency_phone {
        active.emergency_phone = Set(non_blank(emergency_phone));
    }
    if let Some(medical_history) = payload.medical_history {
        active.medical_history = Set(non_blank(medical_history));
    }
    if let Some(allergies) = payload.allergies {
        active.allergies = Set(non_blank(allergies));
    }
    if let Some(medications) = payload.medications {
        active.medications = Set(non_blank(medications));
    }
    if let Some(notes) = payload.notes {
        active.notes = Set(non_blank(notes));
    }
    active.updated_at = Set(Utc::now());

    let client = active.update(&db).await?;
    tracing::Span::current()
        .record("table", "clients")
        .record("action", "update_client")
        .record("client_id", client.id);

    Ok(Json(client))
}

pub async fn delete_client(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(client_id): ApiPath<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    let client = owned_client(&db, auth.id, client_id).await?;
    let appointment_count = client.find_related(appointment::Entity).count(&db).await?;
    // Appointments, comments and files go with it through ON DELETE CASCADE.
    client.delete(&db).await?;

    tracing::Span::current()
        .record("table", "clients")
        .record("action", "delete_client")
        .record("client_id", client_id);
    crate::metrics::client_removed(appointment_count);

    Ok(Json(json!({ "success": true })))
}
