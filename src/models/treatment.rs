use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Clinical note attached to exactly one appointment.
#[derive(Debug, Serialize, Deserialize, FromRow, PartialEq, Eq, Clone)]
pub struct Treatment {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}
