use std::ops::Range;

use axum::{extract::Extension, Json};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use sea_orm::{ColumnTrait, DatabaseConnection, DbErr, EntityTrait, PaginatorTrait, QueryFilter};
use serde::Serialize;

use super::{ApiError, ApiResult};
use crate::auth::AuthUser;
use crate::calendar;
use crate::entities::{appointment, client};

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_clients: u64,
    pub today_appointments: u64,
    pub week_appointments: u64,
    pub month_appointments: u64,
}

async fn appointments_in(
    db: &DatabaseConnection,
    user_id: i32,
    range: Range<DateTime<Utc>>,
) -> Result<u64, DbErr> {
    appointment::Entity::find()
        .filter(appointment::Column::UserId.eq(user_id))
        .filter(appointment::Column::Date.gte(range.start))
        .filter(appointment::Column::Date.lt(range.end))
        .count(db)
        .await
}

/// Dashboard counters for `now`, with day boundaries in `tz`.
pub async fn compute_stats(
    db: &DatabaseConnection,
    user_id: i32,
    now: DateTime<Utc>,
    tz: Tz,
) -> ApiResult<Stats> {
    let today = calendar::local_date(now, tz);
    let (Some(day), Some(week), Some(month)) = (
        calendar::day_range(today, tz),
        calendar::week_range(today, tz),
        calendar::month_range(today, tz),
    ) else {
        return Err(ApiError::Internal(format!("no calendar ranges for {today}")));
    };

    let (total_clients, today_appointments, week_appointments, month_appointments) = futures::try_join!(
        client::Entity::find()
            .filter(client::Column::UserId.eq(user_id))
            .count(db),
        appointments_in(db, user_id, day),
        appointments_in(db, user_id, week),
        appointments_in(db, user_id, month),
    )?;

    Ok(Stats {
        total_clients,
        today_appointments,
        week_appointments,
        month_appointments,
    })
}

pub async fn get_stats(
    Extension(db): Extension<DatabaseConnection>,
    Extension(auth): Extension<AuthUser>,
    Extension(tz): Extension<Tz>,
) -> ApiResult<Json<Stats>> {
    let stats = compute_stats(&db, auth.id, Utc::now(), tz).await?;
    Ok(Json(stats))
}
