use std::collections::HashMap;

use anyhow::Context;
use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use uuid::Uuid;

use super::rules::{parse_time, RollingWeek, DATE_FORMAT};
use super::SchedulingError;
use crate::auth::{Principal, Role};
use crate::models::DoctorAvailability;

/// One submitted opening: a single window on a single day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayWindow {
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Reads the weekly availability form. For each day of `week` the form may
/// carry `available_<date>=yes`, `start_time_<date>` and `end_time_<date>`;
/// a day yields a window only when all three are present.
pub fn parse_week_form(
    week: &RollingWeek,
    form: &HashMap<String, String>,
) -> Result<Vec<DayWindow>, SchedulingError> {
    let field = |name: &str, day: &str| {
        form.get(&format!("{}_{}", name, day))
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    };

    let mut windows = Vec::new();
    for date in week.days() {
        let day = date.format(DATE_FORMAT).to_string();
        let available = field("available", &day) == Some("yes");
        if let (true, Some(start), Some(end)) =
            (available, field("start_time", &day), field("end_time", &day))
        {
            windows.push(DayWindow {
                date,
                start_time: parse_time(start)?,
                end_time: parse_time(end)?,
            });
        }
    }
    Ok(windows)
}

/// Replaces the doctor's availability over the whole week with `windows`.
#[tracing::instrument(
    name = "Replacing weekly availability",
    skip(pool, doctor, windows),
    fields(doctor_id = %doctor.id, windows = windows.len())
)]
pub async fn set_week_availability(
    pool: &PgPool,
    doctor: &Principal,
    week: RollingWeek,
    windows: Vec<DayWindow>,
) -> Result<Vec<DoctorAvailability>, SchedulingError> {
    if doctor.role != Role::Doctor {
        return Err(SchedulingError::NotPermitted);
    }
    if let Some(stray) = windows.iter().find(|w| !week.contains(w.date)) {
        return Err(SchedulingError::InvalidInput(format!(
            "{} is outside the current week",
            stray.date
        )));
    }

    let mut transaction = pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool")?;

    sqlx::query("DELETE FROM doctor_availability WHERE doctor_id = $1 AND date >= $2 AND date <= $3")
        .bind(doctor.id)
        .bind(week.first_day())
        .bind(week.last_day())
        .execute(&mut *transaction)
        .await?;

    let mut saved = Vec::with_capacity(windows.len());
    for window in windows {
        let row = sqlx::query_as::<_, DoctorAvailability>(
            r#"
            INSERT INTO doctor_availability (id, doctor_id, date, start_time, end_time, is_available)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(doctor.id)
        .bind(window.date)
        .bind(window.start_time)
        .bind(window.end_time)
        .fetch_one(&mut *transaction)
        .await?;
        saved.push(row);
    }

    transaction
        .commit()
        .await
        .context("Failed to commit the availability")?;
    Ok(saved)
}

#[tracing::instrument(name = "Fetching weekly availability", skip(pool))]
pub async fn get_week_availability(
    pool: &PgPool,
    doctor_id: Uuid,
    week: RollingWeek,
) -> Result<Vec<DoctorAvailability>, SchedulingError> {
    let rows = sqlx::query_as::<_, DoctorAvailability>(
        r#"
        SELECT * FROM doctor_availability
        WHERE doctor_id = $1 AND date >= $2 AND date <= $3
        ORDER BY date, start_time
        "#,
    )
    .bind(doctor_id)
    .bind(week.first_day())
    .bind(week.last_day())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// An availability window together with who is offering it.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct AvailabilityListing {
    #[serde(flatten)]
    pub availability: DoctorAvailability,
    pub doctor_name: String,
    pub specialization: String,
}

impl<'c> FromRow<'c, PgRow> for AvailabilityListing {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(AvailabilityListing {
            availability: DoctorAvailability::from_row(row)?,
            doctor_name: row.try_get("doctor_name")?,
            specialization: row.try_get("specialization")?,
        })
    }
}

/// Open windows of every active doctor during the week.
#[tracing::instrument(name = "Fetching availability of active doctors", skip(pool))]
pub async fn active_doctors_availability(
    pool: &PgPool,
    week: RollingWeek,
) -> Result<Vec<AvailabilityListing>, SchedulingError> {
    let rows = sqlx::query_as::<_, AvailabilityListing>(
        r#"
        SELECT av.id, av.doctor_id, av.date, av.start_time, av.end_time, av.is_available,
               d.name AS doctor_name, d.specialization
        FROM doctor_availability av
        JOIN doctor d ON d.id = av.doctor_id
        WHERE av.date >= $1 AND av.date <= $2
          AND av.is_available = TRUE
          AND d.is_active = TRUE
        ORDER BY av.date, av.start_time
        "#,
    )
    .bind(week.first_day())
    .bind(week.last_day())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
