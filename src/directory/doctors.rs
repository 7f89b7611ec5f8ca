use anyhow::Context;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{contains_pattern, optional, required, transition_account, IdentityError};
use crate::auth::compute_password_hash;
use crate::models::{AccountStatus, Doctor};
use crate::telemetry::spawn_blocking_with_tracing;

const DOCTOR_COLUMNS: &str =
    "id, username, name, email, phone, specialization, department_id, experience, is_active";

#[derive(Deserialize)]
pub struct DoctorForm {
    pub username: String,
    pub password: Secret<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub department_id: Uuid,
    pub experience: Option<String>,
}

pub struct NewDoctor {
    pub username: String,
    pub password: Secret<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub department_id: Uuid,
    pub experience: i32,
}

impl TryFrom<DoctorForm> for NewDoctor {
    type Error = IdentityError;

    fn try_from(form: DoctorForm) -> Result<Self, Self::Error> {
        Ok(NewDoctor {
            username: required("Username", &form.username)?,
            password: form.password,
            name: required("Name", &form.name)?,
            email: required("Email", &form.email)?,
            phone: optional(form.phone),
            specialization: required("Specialization", &form.specialization)?,
            department_id: form.department_id,
            experience: parse_experience(form.experience.as_deref())?,
        })
    }
}

/// Years of experience; blank means none, negative values are refused.
pub fn parse_experience(raw: Option<&str>) -> Result<i32, IdentityError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(0);
    }
    let years: i32 = raw
        .parse()
        .map_err(|_| IdentityError::Invalid("Experience must be a whole number.".into()))?;
    if years < 0 {
        return Err(IdentityError::Invalid("Experience cannot be negative.".into()));
    }
    Ok(years)
}

/// Full profile update, department and experience included.
#[derive(Deserialize)]
pub struct DoctorUpdateForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
    pub department_id: Uuid,
    pub experience: Option<String>,
}

/// Contact details only.
#[derive(Deserialize)]
pub struct DoctorEditForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub specialization: String,
}

/// Username is only compared with usernames and email with emails; unlike
/// patient registration there is no cross-field check.
#[tracing::instrument(name = "Adding a doctor", skip(pool, doctor), fields(username = %doctor.username))]
pub async fn add_doctor(pool: &PgPool, doctor: NewDoctor) -> Result<Doctor, IdentityError> {
    let existing = sqlx::query("SELECT 1 FROM doctor WHERE username = $1 OR email = $2 LIMIT 1")
        .bind(&doctor.username)
        .bind(&doctor.email)
        .fetch_optional(pool)
        .await?;
    if existing.is_some() {
        return Err(IdentityError::Duplicate);
    }
    ensure_department(pool, doctor.department_id).await?;

    let password = doctor.password;
    let password_hash = spawn_blocking_with_tracing(move || compute_password_hash(password))
        .await
        .context("Failed to spawn a blocking task")??;

    let sql = format!(
        r#"
        INSERT INTO doctor (id, username, password_hash, name, email, phone, specialization, department_id, experience, is_active)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE)
        RETURNING {DOCTOR_COLUMNS}
        "#
    );
    let created = sqlx::query_as::<_, Doctor>(&sql)
        .bind(Uuid::new_v4())
        .bind(&doctor.username)
        .bind(password_hash.expose_secret())
        .bind(&doctor.name)
        .bind(&doctor.email)
        .bind(&doctor.phone)
        .bind(&doctor.specialization)
        .bind(doctor.department_id)
        .bind(doctor.experience)
        .fetch_one(pool)
        .await?;
    Ok(created)
}

async fn ensure_department(pool: &PgPool, department_id: Uuid) -> Result<(), IdentityError> {
    let found = sqlx::query("SELECT 1 FROM department WHERE id = $1")
        .bind(department_id)
        .fetch_optional(pool)
        .await?;
    match found {
        Some(_) => Ok(()),
        None => Err(IdentityError::Invalid("Unknown department.".into())),
    }
}

#[tracing::instrument(name = "Fetching a doctor", skip(pool))]
pub async fn get_doctor(pool: &PgPool, id: Uuid) -> Result<Doctor, IdentityError> {
    sqlx::query_as::<_, Doctor>(&format!("SELECT {DOCTOR_COLUMNS} FROM doctor WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(IdentityError::NotFound("Doctor"))
}

#[tracing::instrument(name = "Updating a doctor", skip(pool, form))]
pub async fn update_doctor(
    pool: &PgPool,
    id: Uuid,
    form: DoctorUpdateForm,
) -> Result<Doctor, IdentityError> {
    let name = required("Name", &form.name)?;
    let email = required("Email", &form.email)?;
    let specialization = required("Specialization", &form.specialization)?;
    let experience = parse_experience(form.experience.as_deref())?;
    get_doctor(pool, id).await?;
    ensure_department(pool, form.department_id).await?;

    let sql = format!(
        r#"
        UPDATE doctor
        SET name = $1, email = $2, phone = $3, specialization = $4, department_id = $5, experience = $6
        WHERE id = $7
        RETURNING {DOCTOR_COLUMNS}
        "#
    );
    let updated = sqlx::query_as::<_, Doctor>(&sql)
        .bind(name)
        .bind(email)
        .bind(optional(form.phone))
        .bind(specialization)
        .bind(form.department_id)
        .bind(experience)
        .bind(id)
        .fetch_one(pool)
        .await?;
    Ok(updated)
}

#[tracing::instrument(name = "Editing doctor contact details", skip(pool, form))]
pub async fn edit_doctor(
    pool: &PgPool,
    id: Uuid,
    form: DoctorEditForm,
) -> Result<Doctor, IdentityError> {
    let name = required("Name", &form.name)?;
    let email = required("Email", &form.email)?;
    let specialization = required("Specialization", &form.specialization)?;

    let sql = format!(
        "UPDATE doctor SET name = $1, email = $2, phone = $3, specialization = $4 WHERE id = $5 RETURNING {DOCTOR_COLUMNS}"
    );
    sqlx::query_as::<_, Doctor>(&sql)
        .bind(name)
        .bind(email)
        .bind(optional(form.phone))
        .bind(specialization)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(IdentityError::NotFound("Doctor"))
}

/// Soft delete. The doctor's appointments and availability stay in place.
pub async fn deactivate_doctor(pool: &PgPool, id: Uuid) -> Result<AccountStatus, IdentityError> {
    transition_account(pool, "doctor", id, |_| AccountStatus::Deactivated)
        .await
        .map_err(|e| not_found_as(e, "Doctor"))
}

pub async fn toggle_doctor(pool: &PgPool, id: Uuid) -> Result<AccountStatus, IdentityError> {
    transition_account(pool, "doctor", id, |current| current.toggled())
        .await
        .map_err(|e| not_found_as(e, "Doctor"))
}

fn not_found_as(e: IdentityError, entity: &'static str) -> IdentityError {
    match e {
        IdentityError::NotFound(_) => IdentityError::NotFound(entity),
        e => e,
    }
}

pub async fn list_active_doctors(pool: &PgPool) -> Result<Vec<Doctor>, IdentityError> {
    let doctors = sqlx::query_as::<_, Doctor>(&format!(
        "SELECT {DOCTOR_COLUMNS} FROM doctor WHERE is_active = TRUE ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(doctors)
}

pub async fn count_active_doctors(pool: &PgPool) -> Result<i64, IdentityError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM doctor WHERE is_active = TRUE")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Case-insensitive substring match on name or specialization.
#[tracing::instrument(name = "Searching doctors", skip(pool))]
pub async fn search_doctors(
    pool: &PgPool,
    query: &str,
    active_only: bool,
) -> Result<Vec<Doctor>, IdentityError> {
    let sql = format!(
        r#"
        SELECT {DOCTOR_COLUMNS} FROM doctor
        WHERE (name ILIKE $1 OR specialization ILIKE $1)
          AND ($2 = FALSE OR is_active = TRUE)
        ORDER BY name
        "#
    );
    let doctors = sqlx::query_as::<_, Doctor>(&sql)
        .bind(contains_pattern(query))
        .bind(active_only)
        .fetch_all(pool)
        .await?;
    Ok(doctors)
}
