use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, Row};
use uuid::Uuid;

use super::AccountStatus;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Doctor {
    pub id: Uuid,
    pub username: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub department_id: Uuid,
    pub experience: i32,
    pub status: AccountStatus,
}

impl<'c> FromRow<'c, PgRow> for Doctor {
    fn from_row(row: &PgRow) -> Result<Self, sqlx::Error> {
        Ok(Doctor {
            id: row.try_get("id")?,
            username: row.try_get("username")?,
            name: row.try_get("name")?,
            email: row.try_get("email")?,
            phone: row.try_get("phone")?,
            specialization: row.try_get("specialization")?,
            department_id: row.try_get("department_id")?,
            experience: row.try_get("experience")?,
            status: row.try_get::<bool, _>("is_active")?.into(),
        })
    }
}
