use sqlx::PgPool;

use super::IdentityError;
use crate::models::Department;

/// Departments seeded at start-up.
pub const DEFAULT_DEPARTMENTS: [(&str, &str); 5] = [
    ("Cardiology", "Heart and cardiovascular system"),
    ("Orthopedics", "Bones, joints, and muscles"),
    ("Neurology", "Brain and nervous system"),
    ("Pediatrics", "Children's health"),
    ("General Medicine", "General health and wellness"),
];

#[tracing::instrument(name = "Listing departments", skip(pool))]
pub async fn list_departments(pool: &PgPool) -> Result<Vec<Department>, IdentityError> {
    let departments = sqlx::query_as::<_, Department>("SELECT * FROM department ORDER BY name")
        .fetch_all(pool)
        .await?;
    Ok(departments)
}
