use anyhow::Context;
use secrecy::{ExposeSecret, Secret};
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::{contains_pattern, optional, required, transition_account, IdentityError};
use crate::auth::compute_password_hash;
use crate::models::{AccountStatus, Patient};
use crate::telemetry::spawn_blocking_with_tracing;

const PATIENT_COLUMNS: &str =
    "id, username, name, email, phone, age, gender, address, is_active, is_blacklisted";

#[derive(Deserialize)]
pub struct RegistrationForm {
    pub username: String,
    pub password: Secret<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

pub struct NewPatient {
    pub username: String,
    pub password: Secret<String>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<i32>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

impl TryFrom<RegistrationForm> for NewPatient {
    type Error = IdentityError;

    fn try_from(form: RegistrationForm) -> Result<Self, Self::Error> {
        if form.password.expose_secret().is_empty() {
            return Err(IdentityError::Invalid("Password is required.".into()));
        }
        Ok(NewPatient {
            username: required("Username", &form.username)?,
            password: form.password,
            name: required("Name", &form.name)?,
            email: required("Email", &form.email)?,
            phone: optional(form.phone),
            age: normalize_age(form.age.as_deref())?,
            gender: optional(form.gender),
            address: optional(form.address),
        })
    }
}

/// Blank stays unset; negative ages are clamped to zero rather than refused.
pub fn normalize_age(raw: Option<&str>) -> Result<Option<i32>, IdentityError> {
    let raw = raw.map(str::trim).unwrap_or_default();
    if raw.is_empty() {
        return Ok(None);
    }
    let age: i32 = raw
        .parse()
        .map_err(|_| IdentityError::Invalid("Age must be a whole number.".into()))?;
    Ok(Some(age.max(0)))
}

#[derive(Deserialize)]
pub struct ProfileForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub age: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
}

#[derive(Deserialize)]
pub struct PatientEditForm {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

/// Self-registration. Username and email are checked together, so a new
/// username that matches someone's email is refused as well.
#[tracing::instrument(name = "Registering a patient", skip(pool, patient), fields(username = %patient.username))]
pub async fn register_patient(pool: &PgPool, patient: NewPatient) -> Result<Patient, IdentityError> {
    let existing = sqlx::query(
        "SELECT 1 FROM patient WHERE username IN ($1, $2) OR email IN ($1, $2) LIMIT 1",
    )
    .bind(&patient.username)
    .bind(&patient.email)
    .fetch_optional(pool)
    .await?;
    if existing.is_some() {
        return Err(IdentityError::Duplicate);
    }

    let password = patient.password;
    let password_hash = spawn_blocking_with_tracing(move || compute_password_hash(password))
        .await
        .context("Failed to spawn a blocking task")??;

    let sql = format!(
        r#"
        INSERT INTO patient (id, username, password_hash, name, email, phone, age, gender, address, is_active, is_blacklisted)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, TRUE, FALSE)
        RETURNING {PATIENT_COLUMNS}
        "#
    );
    let created = sqlx::query_as::<_, Patient>(&sql)
        .bind(Uuid::new_v4())
        .bind(&patient.username)
        .bind(password_hash.expose_secret())
        .bind(&patient.name)
        .bind(&patient.email)
        .bind(&patient.phone)
        .bind(patient.age)
        .bind(&patient.gender)
        .bind(&patient.address)
        .fetch_one(pool)
        .await?;
    Ok(created)
}

#[tracing::instrument(name = "Fetching a patient", skip(pool))]
pub async fn get_patient(pool: &PgPool, id: Uuid) -> Result<Patient, IdentityError> {
    sqlx::query_as::<_, Patient>(&format!("SELECT {PATIENT_COLUMNS} FROM patient WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(IdentityError::NotFound("Patient"))
}

#[tracing::instrument(name = "Updating patient profile", skip(pool, form))]
pub async fn update_profile(
    pool: &PgPool,
    id: Uuid,
    form: ProfileForm,
) -> Result<Patient, IdentityError> {
    let name = required("Name", &form.name)?;
    let email = required("Email", &form.email)?;
    let age = normalize_age(form.age.as_deref())?;

    let sql = format!(
        r#"
        UPDATE patient
        SET name = $1, email = $2, phone = $3, age = $4, gender = $5, address = $6
        WHERE id = $7
        RETURNING {PATIENT_COLUMNS}
        "#
    );
    sqlx::query_as::<_, Patient>(&sql)
        .bind(name)
        .bind(email)
        .bind(optional(form.phone))
        .bind(age)
        .bind(optional(form.gender))
        .bind(optional(form.address))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(IdentityError::NotFound("Patient"))
}

#[tracing::instrument(name = "Editing patient contact details", skip(pool, form))]
pub async fn edit_patient(
    pool: &PgPool,
    id: Uuid,
    form: PatientEditForm,
) -> Result<Patient, IdentityError> {
    let name = required("Name", &form.name)?;
    let email = required("Email", &form.email)?;

    let sql = format!(
        "UPDATE patient SET name = $1, email = $2, phone = $3 WHERE id = $4 RETURNING {PATIENT_COLUMNS}"
    );
    sqlx::query_as::<_, Patient>(&sql)
        .bind(name)
        .bind(email)
        .bind(optional(form.phone))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(IdentityError::NotFound("Patient"))
}

pub async fn deactivate_patient(pool: &PgPool, id: Uuid) -> Result<AccountStatus, IdentityError> {
    transition_account(pool, "patient", id, |_| AccountStatus::Deactivated)
        .await
        .map_err(patient_not_found)
}

pub async fn toggle_patient(pool: &PgPool, id: Uuid) -> Result<AccountStatus, IdentityError> {
    transition_account(pool, "patient", id, |current| current.toggled())
        .await
        .map_err(patient_not_found)
}

fn patient_not_found(e: IdentityError) -> IdentityError {
    match e {
        IdentityError::NotFound(_) => IdentityError::NotFound("Patient"),
        e => e,
    }
}

/// Flips the blacklist flag and returns its new value.
#[tracing::instrument(name = "Toggling patient blacklist", skip(pool))]
pub async fn toggle_blacklist(pool: &PgPool, id: Uuid) -> Result<bool, IdentityError> {
    let flipped: Option<(bool,)> = sqlx::query_as(
        "UPDATE patient SET is_blacklisted = NOT is_blacklisted WHERE id = $1 RETURNING is_blacklisted",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;
    flipped
        .map(|(value,)| value)
        .ok_or(IdentityError::NotFound("Patient"))
}

pub async fn list_active_patients(pool: &PgPool) -> Result<Vec<Patient>, IdentityError> {
    let patients = sqlx::query_as::<_, Patient>(&format!(
        "SELECT {PATIENT_COLUMNS} FROM patient WHERE is_active = TRUE ORDER BY name"
    ))
    .fetch_all(pool)
    .await?;
    Ok(patients)
}

pub async fn count_active_patients(pool: &PgPool) -> Result<i64, IdentityError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM patient WHERE is_active = TRUE")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Case-insensitive substring match on name or email.
#[tracing::instrument(name = "Searching patients", skip(pool))]
pub async fn search_patients(pool: &PgPool, query: &str) -> Result<Vec<Patient>, IdentityError> {
    let sql = format!(
        "SELECT {PATIENT_COLUMNS} FROM patient WHERE name ILIKE $1 OR email ILIKE $1 ORDER BY name"
    );
    let patients = sqlx::query_as::<_, Patient>(&sql)
        .bind(contains_pattern(query))
        .fetch_all(pool)
        .await?;
    Ok(patients)
}

/// Everyone who has ever had an appointment with the doctor.
#[tracing::instrument(name = "Fetching a doctor's patients", skip(pool))]
pub async fn patients_of_doctor(pool: &PgPool, doctor_id: Uuid) -> Result<Vec<Patient>, IdentityError> {
    let sql = format!(
        r#"
        SELECT {PATIENT_COLUMNS} FROM patient
        WHERE id IN (SELECT DISTINCT patient_id FROM appointment WHERE doctor_id = $1)
        ORDER BY name
        "#
    );
    let patients = sqlx::query_as::<_, Patient>(&sql)
        .bind(doctor_id)
        .fetch_all(pool)
        .await?;
    Ok(patients)
}
