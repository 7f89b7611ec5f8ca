use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use enum_display::EnumDisplay;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

/// Lifecycle of an appointment. `Booked` is the only non-terminal state.
#[derive(Debug, EnumDisplay, Serialize, Deserialize, PartialEq, Eq, Copy, Clone, Hash)]
pub enum AppointmentStatus {
    Booked,
    Completed,
    Cancelled,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("{0:?} is not a valid appointment status")]
pub struct UnknownStatus(pub String);

impl std::str::FromStr for AppointmentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Booked" => Ok(AppointmentStatus::Booked),
            "Completed" => Ok(AppointmentStatus::Completed),
            "Cancelled" => Ok(AppointmentStatus::Cancelled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, AppointmentStatus::Booked)
    }

    /// Booked may move to either terminal state; a terminal state may only be
    /// re-asserted, never left.
    pub fn can_become(&self, next: AppointmentStatus) -> bool {
        match (self, next) {
            (_, AppointmentStatus::Booked) => false,
            (AppointmentStatus::Booked, _) => true,
            (current, next) => *current == next,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub status: AppointmentStatus,
    pub reason: Option<String>,
    pub created_at: NaiveDateTime,
}

fn decode_status(row: &PgRow) -> Result<AppointmentStatus, sqlx::Error> {
    let raw: String = row.try_get("status")?;
    raw.parse().map_err(|e: UnknownStatus| sqlx::Error::ColumnDecode {
        index: "status".into(),
        source: Box::new(e),
    })
}

impl<'c> FromRow<'c, PgRow> for Appointment {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Appointment {
            id: row.try_get("id")?,
            patient_id: row.try_get("patient_id")?,
            doctor_id: row.try_get("doctor_id")?,
            date: row.try_get("date")?,
            time: row.try_get("time")?,
            status: decode_status(row)?,
            reason: row.try_get("reason")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

/// An appointment joined with the names of the people involved.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct AppointmentDetails {
    #[serde(flatten)]
    pub appointment: Appointment,
    pub doctor_name: String,
    pub patient_name: String,
}

impl<'c> FromRow<'c, PgRow> for AppointmentDetails {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(AppointmentDetails {
            appointment: Appointment::from_row(row)?,
            doctor_name: row.try_get("doctor_name")?,
            patient_name: row.try_get("patient_name")?,
        })
    }
}

/// A completed visit together with the treatment recorded for it, if any.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub details: AppointmentDetails,
    pub diagnosis: Option<String>,
    pub prescription: Option<String>,
    pub notes: Option<String>,
}

impl<'c> FromRow<'c, PgRow> for HistoryEntry {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(HistoryEntry {
            details: AppointmentDetails::from_row(row)?,
            diagnosis: row.try_get("diagnosis")?,
            prescription: row.try_get("prescription")?,
            notes: row.try_get("notes")?,
        })
    }
}
