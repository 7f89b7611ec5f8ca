use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, FromRow, PartialEq, Eq, Clone)]
pub struct Department {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}
