use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, IntoActiveModel, LoaderTrait,
    ModelTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::{
    clients::owned_client, double_option, invalid_date, non_blank, ApiError, ApiJson, ApiPath,
    ApiQuery, ApiResult,
};
use crate::auth::AuthUser;
use crate::calendar;
use crate::entities::{
    appointment::{self, AppointmentStatus, AppointmentType},
    appointment_comment, appointment_file, client,
};

const DEFAULT_DURATION_MINUTES: i32 = 60;

/// The subset of a client embedded in appointment listings.
#[derive(Debug, Serialize)]
pub struct ClientBrief {
    pub id: i32,
    pub name: String,
    pub phone: String,
    pub email: Option<String>,
}

impl From<client::Model> for ClientBrief {
    fn from(c: client::Model) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone: c.phone,
            email: c.email,
        }
    }
}

/// An appointment with its session notes and file links.
#[derive(Debug, Serialize)]
pub struct AppointmentWithNotes {
    #[serde(flatten)]
    pub appointment: appointment::Model,
    pub comments: Vec<appointment_comment::Model>,
    pub files: Vec<appointment_file::Model>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentListItem {
    #[serde(flatten)]
    pub appointment: appointment::Model,
    pub client: Option<ClientBrief>,
    pub comments: Vec<appointment_comment::Model>,
    pub files: Vec<appointment_file::Model>,
}

#[derive(Debug, Serialize)]
pub struct AppointmentDetail {
    #[serde(flatten)]
    pub appointment: appointment::Model,
    pub client: Option<client::Model>,
    pub comments: Vec<appointment_comment::Model>,
    pub files: Vec<appointment_file::Model>,
}

/// Loads comments and files for each appointment, newest first, keeping the
/// input order.
pub(crate) async fn with_notes(
    db: &DatabaseConnection,
    appointments: Vec<appointment::Model>,
) -> ApiResult<Vec<AppointmentWithNotes>> {
    let comments = appointments
        .load_many(
            appointment_comment::Entity::find()
                .order_by_desc(appointment_comment::Column::CreatedAt)
                .order_by_desc(appointment_comment::Column::Id),
            db,
        )
        .await?;
    let files = appointments
        .load_many(
            appointment_file::Entity::find()
                .order_by_desc(appointment_file::Column::CreatedAt)
                .order_by_desc(appointment_file::Column::Id),
            db,
        )
        .await?;

    Ok(appointments
        .into_iter()
        .zip(comments)
        .zip(files)
        .map(|((appointment, comments), files)| AppointmentWithNotes {
            appointment,
            comments,
            files,
        })
        .collect())
}

/// The appointment if it exists and belongs to `user_id`.
pub(crate) async fn owned_appointment(
    db: &DatabaseConnection,
    user_id: i32,
    appointment_id: i32,
) -> ApiResult<appointment::Model> {
    appointment::Entity::find_by_id(appointment_id)
        .filter(appointment::Column::UserId.eq(user_id))
        .one(db)
        .await?
        .ok_or(ApiError::NotFound("Appointment"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListAppointmentsParams {
    pub limit: Option<u64>,
    pub upcoming: Option<bool>,
    /// A calendar day in the clinic zone.
    pub date: Option<NaiveDate>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub client_id: Option<i32>,
}

pub async fn list_appointments(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    Extension(tz): Extension<Tz>,
    ApiQuery(params): ApiQuery<ListAppointmentsParams>,
) -> ApiResult<Json<Vec<AppointmentListItem>>> {
    let upcoming = params.upcoming.unwrap_or(false);
    let mut query = appointment::Entity::find().filter(appointment::Column::UserId.eq(auth.id));

    // A specific day replaces the "from now on" bound of `upcoming`.
    if let Some(date) = params.date {
        let day = calendar::day_range(date, tz).ok_or_else(invalid_date)?;
        query = query
            .filter(appointment::Column::Date.gte(day.start))
            .filter(appointment::Column::Date.lt(day.end));
    } else if upcoming {
        query = query.filter(appointment::Column::Date.gte(Utc::now()));
    }
    if upcoming {
        query = query.filter(appointment::Column::Status.eq(AppointmentStatus::Scheduled));
    }
    if let Some(from) = params.from {
        query = query.filter(appointment::Column::Date.gte(from));
    }
    if let Some(to) = params.to {
        query = query.filter(appointment::Column::Date.lt(to));
    }
    if let Some(client_id) = params.client_id {
        query = query.filter(appointment::Column::ClientId.eq(client_id));
    }

    let appointments = query
        .order_by_asc(appointment::Column::Date)
        .order_by_asc(appointment::Column::Id)
        .limit(params.limit)
        .all(&db)
        .await?;

    let clients = appointments.load_one(client::Entity, &db).await?;
    let items = with_notes(&db, appointments)
        .await?
        .into_iter()
        .zip(clients)
        .map(|(a, client)| AppointmentListItem {
            appointment: a.appointment,
            client: client.map(ClientBrief::from),
            comments: a.comments,
            files: a.files,
        })
        .collect();

    Ok(Json(items))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateAppointmentRequest {
    client_id: Option<i32>,
    date: Option<DateTime<Utc>>,
    duration: Option<i32>,
    r#type: Option<AppointmentType>,
    notes: Option<String>,
}

fn check_duration(duration: i32) -> ApiResult<i32> {
    if duration > 0 {
        Ok(duration)
    } else {
        Err(ApiError::validation(
            "Duration must be a positive number of minutes",
        ))
    }
}

pub async fn create_appointment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiJson(payload): ApiJson<CreateAppointmentRequest>,
) -> ApiResult<Response> {
    let (Some(client_id), Some(date)) = (payload.client_id, payload.date) else {
        return Err(ApiError::validation("Client and date are required"));
    };
    let duration = check_duration(payload.duration.unwrap_or(DEFAULT_DURATION_MINUTES))?;
    let client = owned_client(&db, auth.id, client_id).await?;

    let now = Utc::now();
    let new_appointment = appointment::ActiveModel {
        client_id: Set(client.id),
        user_id: Set(auth.id),
        date: Set(date),
        duration: Set(duration),
        r#type: Set(payload.r#type.unwrap_or_default()),
        status: Set(AppointmentStatus::Scheduled),
        notes: Set(non_blank(payload.notes)),
        treatment_notes: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let appointment = new_appointment.insert(&db).await?;

    tracing::Span::current()
        .record("table", "appointments")
        .record("action", "create_appointment")
        .record("appointment_id", appointment.id)
        .record("client_id", client.id)
        .record("business_event", "Appointment scheduled");
    metrics::counter!("physio_appointments_created_total").increment(1);
    metrics::gauge!("physio_appointments_total").increment(1.0);

    Ok((
        StatusCode::CREATED,
        Json(AppointmentDetail {
            appointment,
            client: Some(client),
            comments: Vec::new(),
            files: Vec::new(),
        }),
    )
        .into_response())
}

async fn detail(
    db: &DatabaseConnection,
    appointment: appointment::Model,
    client: Option<client::Model>,
) -> ApiResult<AppointmentDetail> {
    let client = match client {
        Some(c) => Some(c),
        None => appointment.find_related(client::Entity).one(db).await?,
    };
    let notes = with_notes(db, vec![appointment])
        .await?
        .pop()
        .ok_or_else(|| ApiError::Internal("appointment notes did not load".into()))?;

    Ok(AppointmentDetail {
        appointment: notes.appointment,
        client,
        comments: notes.comments,
        files: notes.files,
    })
}

pub async fn get_appointment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(appointment_id): ApiPath<i32>,
) -> ApiResult<Json<AppointmentDetail>> {
    let appointment = owned_appointment(&db, auth.id, appointment_id).await?;
    Ok(Json(detail(&db, appointment, None).await?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAppointmentRequest {
    client_id: Option<i32>,
    date: Option<DateTime<Utc>>,
    duration: Option<i32>,
    r#type: Option<AppointmentType>,
    status: Option<AppointmentStatus>,
    #[serde(default, deserialize_with = "double_option")]
    notes: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    treatment_notes: Option<Option<String>>,
}

pub async fn update_appointment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(appointment_id): ApiPath<i32>,
    ApiJson(payload): ApiJson<UpdateAppointmentRequest>,
) -> ApiResult<Json<AppointmentDetail>> {
    let existing = owned_appointment(&db, auth.id, appointment_id).await?;
    let previous_status = existing.status;

    let client = match payload.client_id {
        Some(client_id) if client_id != existing.client_id => {
            Some(owned_client(&db, auth.id, client_id).await?)
        }
        _ => None,
    };

    let mut active = existing.into_active_model();
    if let Some(client) = &client {
        active.client_id = Set(client.id);
    }
    if let Some(date) = payload.date {
        active.date = Set(date);
    }
    if let Some(duration) = payload.duration {
        active.duration = Set(check_duration(duration)?);
    }
    if let Some(kind) = payload.r#type {
        active.r#type = Set(kind);
    }
    if let Some(status) = payload.status {
        active.status = Set(status);
    }
    if let Some(notes) = payload.notes {
        active.notes = Set(non_blank(notes));
    }
    if let Some(treatment_notes) = payload.treatment_notes {
        active.treatment_notes = Set(non_blank(treatment_notes));
    }
    active.updated_at = Set(Utc::now());

    let appointment = active.update(&db).await?;

    if appointment.status != previous_status {
        metrics::counter!(
            "physio_appointment_status_changes_total",
            "status" => appointment.status.as_str()
        )
        .increment(1);
    }
    tracing::Span::current()
        .record("table", "appointments")
        .record("action", "update_appointment")
        .record("appointment_id", appointment.id);

    Ok(Json(detail(&db, appointment, client).await?))
}

pub async fn delete_appointment(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    ApiPath(appointment_id): ApiPath<i32>,
) -> ApiResult<Json<serde_json::Value>> {
    let appointment = owned_appointment(&db, auth.id, appointment_id).await?;
    appointment.delete(&db).await?;

    tracing::Span::current()
        .record("table", "appointments")
        .record("action", "delete_appointment")
        .record("appointment_id", appointment_id);
    metrics::gauge!("physio_appointments_total").decrement(1.0);

    Ok(Json(json!({ "success": true })))
}
