//! Calendar views: the weekly time grid and the monthly overview.

use std::collections::BTreeMap;

use axum::{extract::Extension, Json};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, LoaderTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};

use super::{invalid_date, ApiError, ApiQuery, ApiResult};
use crate::auth::AuthUser;
use crate::calendar::{self, AgendaLayout, Block, Slot};
use crate::entities::{
    appointment::{self, AppointmentStatus, AppointmentType},
    client,
};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaEntry {
    pub id: i32,
    pub client_id: i32,
    pub client_name: Option<String>,
    pub date: DateTime<Utc>,
    /// Local start time, `HH:MM`.
    pub start: String,
    pub duration: i32,
    pub r#type: AppointmentType,
    pub status: AppointmentStatus,
    /// Absent when the appointment starts outside the drawn hours.
    pub block: Option<Block>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgendaDay {
    pub date: NaiveDate,
    pub is_today: bool,
    pub appointments: Vec<AgendaEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WeekView {
    pub layout: AgendaLayout,
    pub column_height: f64,
    pub slots: Vec<Slot>,
    pub week_start: NaiveDate,
    pub days: Vec<AgendaDay>,
    /// Offset of the current-time line, set only when today is in this week.
    pub now_marker: Option<f64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthDay {
    pub date: NaiveDate,
    pub in_month: bool,
    pub is_today: bool,
    pub appointments: Vec<AgendaEntry>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthView {
    pub year: i32,
    pub month: u32,
    pub days: Vec<MonthDay>,
}

/// The user's appointments in `[start, end)` bucketed by local date, in
/// start order.
async fn entries_by_day(
    db: &DatabaseConnection,
    user_id: i32,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    tz: Tz,
    layout: &AgendaLayout,
) -> ApiResult<BTreeMap<NaiveDate, Vec<AgendaEntry>>> {
    let appointments = appointment::Entity::find()
        .filter(appointment::Column::UserId.eq(user_id))
        .filter(appointment::Column::Date.gte(start))
        .filter(appointment::Column::Date.lt(end))
        .order_by_asc(appointment::Column::Date)
        .order_by_asc(appointment::Column::Id)
        .all(db)
        .await?;
    let clients = appointments.load_one(client::Entity, db).await?;

    let mut days: BTreeMap<NaiveDate, Vec<AgendaEntry>> = BTreeMap::new();
    for (apt, client) in appointments.into_iter().zip(clients) {
        let local = apt.date.with_timezone(&tz);
        let time = local.time();
        days.entry(local.date_naive()).or_default().push(AgendaEntry {
            id: apt.id,
            client_id: apt.client_id,
            client_name: client.map(|c| c.name),
            date: apt.date,
            start: local.format("%H:%M").to_string(),
            duration: apt.duration,
            r#type: apt.r#type,
            status: apt.status,
            block: layout.block(time, apt.duration),
        });
    }
    Ok(days)
}

#[derive(Debug, Default, Deserialize)]
pub struct WeekParams {
    pub date: Option<NaiveDate>,
}

pub async fn week(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    Extension(tz): Extension<Tz>,
    ApiQuery(params): ApiQuery<WeekParams>,
) -> ApiResult<Json<WeekView>> {
    let now = Utc::now().with_timezone(&tz);
    let today = now.date_naive();
    let anchor = params.date.unwrap_or(today);
    let layout = AgendaLayout::default();

    let range = calendar::week_range(anchor, tz).ok_or_else(invalid_date)?;
    let week_days = calendar::week_days(anchor).ok_or_else(invalid_date)?;
    let week_start = week_days.first().copied().ok_or_else(invalid_date)?;
    let mut by_day = entries_by_day(&db, auth.id, range.start, range.end, tz, &layout).await?;

    let days: Vec<AgendaDay> = week_days
        .into_iter()
        .map(|date| AgendaDay {
            date,
            is_today: date == today,
            appointments: by_day.remove(&date).unwrap_or_default(),
        })
        .collect();
    let now_marker = days
        .iter()
        .any(|d| d.is_today)
        .then(|| layout.now_marker(now.time()))
        .flatten();

    Ok(Json(WeekView {
        column_height: layout.column_height(),
        slots: layout.slots(),
        layout,
        week_start,
        days,
        now_marker,
    }))
}

#[derive(Debug, Default, Deserialize)]
pub struct MonthParams {
    /// `YYYY-MM`
    pub month: Option<String>,
}

fn parse_month(raw: &str) -> ApiResult<NaiveDate> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d")
        .map_err(|_| ApiError::validation(format!("Invalid month (expected YYYY-MM): {raw}")))
}

pub async fn month(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    Extension(tz): Extension<Tz>,
    ApiQuery(params): ApiQuery<MonthParams>,
) -> ApiResult<Json<MonthView>> {
    let today = calendar::local_date(Utc::now(), tz);
    let first = match params.month.as_deref() {
        Some(raw) => parse_month(raw)?,
        None => calendar::first_of_month(today),
    };

    let grid = calendar::month_grid(first.year(), first.month()).ok_or_else(invalid_date)?;
    let (Some(grid_first), Some(grid_last)) = (grid.first().copied(), grid.last().copied()) else {
        return Err(invalid_date());
    };
    let after_grid = grid_last
        .checked_add_days(Days::new(1))
        .ok_or_else(invalid_date)?;

    let layout = AgendaLayout::default();
    let start = calendar::start_of_day(grid_first, tz);
    let end = calendar::start_of_day(after_grid, tz);
    let mut by_day = entries_by_day(&db, auth.id, start, end, tz, &layout).await?;

    let days = grid
        .into_iter()
        .map(|date| MonthDay {
            date,
            in_month: date.month() == first.month(),
            is_today: date == today,
            appointments: by_day.remove(&date).unwrap_or_default(),
        })
        .collect();

    Ok(Json(MonthView {
        year: first.year(),
        month: first.month(),
        days,
    }))
}
