use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::AccountStatus;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Patient {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub status: AccountStatus,
    // Stored and toggled by admins; nothing reads it yet.
    pub is_blacklisted: bool,
}

impl<'c> FromRow<'c, PgRow> for Patient {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Patient {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            age: row.try_get("age")?,
            gender: row.try_get("gender")?,
            address: row.try_get("address")?,
            status: row.try_get::<bool, _>("is_active")?.into(),
            is_blacklisted: row.try_get("is_blacklisted")?,
        })
    }
}
