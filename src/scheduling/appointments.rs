use anyhow::Context;
use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use super::rules::{
    authorize_action, normalize_requested_slot, plan_transition, AppointmentAction, ConflictScope,
    DOCTOR_HORIZON_DAYS,
};
use super::SchedulingError;
use crate::auth::{Principal, Role};
use crate::models::{Appointment, AppointmentDetails, AppointmentStatus, HistoryEntry, Treatment};

const DETAILS_SELECT: &str = r#"
    SELECT a.id, a.patient_id, a.doctor_id, a.date, a.time, a.status, a.reason, a.created_at,
           d.name AS doctor_name, p.name AS patient_name
    FROM appointment a
    JOIN doctor d ON d.id = a.doctor_id
    JOIN patient p ON p.id = a.patient_id
"#;

#[derive(Debug)]
pub struct BookingRequest {
    pub doctor_id: Uuid,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub reason: Option<String>,
}

#[derive(Debug)]
pub struct TreatmentRecord {
    pub diagnosis: String,
    pub prescription: Option<String>,
    pub notes: Option<String>,
}

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[tracing::instrument(
    name = "Booking a new appointment",
    skip(pool, patient, request, now),
    fields(patient_id = %patient.id, doctor_id = %request.doctor_id)
)]
pub async fn book(
    pool: &PgPool,
    patient: &Principal,
    request: BookingRequest,
    now: NaiveDateTime,
) -> Result<Appointment, SchedulingError> {
    if patient.role != Role::Patient {
        return Err(SchedulingError::NotPermitted);
    }
    let doctor_exists = sqlx::query("SELECT 1 FROM doctor WHERE id = $1")
        .bind(request.doctor_id)
        .fetch_optional(pool)
        .await?
        .is_some();
    if !doctor_exists {
        return Err(SchedulingError::NotFound("Doctor"));
    }

    let (date, time) = normalize_requested_slot(request.date, request.time, now);
    if slot_is_taken(pool, request.doctor_id, date, time, ConflictScope::BookedOnly).await? {
        return Err(SchedulingError::SlotTaken);
    }

    let appointment = Appointment {
        id: Uuid::new_v4(),
        patient_id: patient.id,
        doctor_id: request.doctor_id,
        date,
        time,
        status: AppointmentStatus::Booked,
        reason: request.reason,
        created_at: Utc::now().naive_utc(),
    };
    insert_appointment(&appointment, pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                // Lost the race against a concurrent booking of the same slot
                SchedulingError::SlotTaken
            } else {
                e.into()
            }
        })?;
    Ok(appointment)
}

#[tracing::instrument(name = "Saving new appointment details in the database", skip(appointment, pool))]
async fn insert_appointment(appointment: &Appointment, pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO appointment (id, patient_id, doctor_id, date, time, status, reason, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(appointment.id)
    .bind(appointment.patient_id)
    .bind(appointment.doctor_id)
    .bind(appointment.date)
    .bind(appointment.time)
    .bind(appointment.status.to_string())
    .bind(&appointment.reason)
    .bind(appointment.created_at)
    .execute(pool)
    .await
    .map_err(|e| {
        tracing::error!("Failed to execute query: {}", e);
        e
    })?;
    Ok(())
}

async fn slot_is_taken(
    pool: &PgPool,
    doctor_id: Uuid,
    date: NaiveDate,
    time: NaiveTime,
    scope: ConflictScope,
) -> Result<bool, SchedulingError> {
    let sql = match scope {
        ConflictScope::BookedOnly => {
            "SELECT 1 FROM appointment WHERE doctor_id = $1 AND date = $2 AND time = $3 AND status = 'Booked' LIMIT 1"
        }
        ConflictScope::AnyStatus => {
            "SELECT 1 FROM appointment WHERE doctor_id = $1 AND date = $2 AND time = $3 LIMIT 1"
        }
    };
    let row = sqlx::query(sql)
        .bind(doctor_id)
        .bind(date)
        .bind(time)
        .fetch_optional(pool)
        .await?;
    Ok(row.is_some())
}

#[tracing::instrument(name = "Fetching an appointment", skip(pool))]
pub async fn fetch_appointment(pool: &PgPool, id: Uuid) -> Result<Appointment, SchedulingError> {
    sqlx::query_as::<_, Appointment>("SELECT * FROM appointment WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(SchedulingError::NotFound("Appointment"))
}

#[tracing::instrument(
    name = "Rescheduling an appointment",
    skip(pool, patient),
    fields(patient_id = %patient.id)
)]
pub async fn reschedule(
    pool: &PgPool,
    patient: &Principal,
    appointment_id: Uuid,
    new_date: NaiveDate,
    new_time: NaiveTime,
) -> Result<Appointment, SchedulingError> {
    let mut appointment = fetch_appointment(pool, appointment_id).await?;
    authorize_action(patient, &appointment, AppointmentAction::Reschedule)?;

    if slot_is_taken(
        pool,
        appointment.doctor_id,
        new_date,
        new_time,
        ConflictScope::AnyStatus,
    )
    .await?
    {
        return Err(SchedulingError::SlotOccupied);
    }

    sqlx::query("UPDATE appointment SET date = $1, time = $2 WHERE id = $3")
        .bind(new_date)
        .bind(new_time)
        .bind(appointment_id)
        .execute(pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                SchedulingError::SlotOccupied
            } else {
                e.into()
            }
        })?;

    appointment.date = new_date;
    appointment.time = new_time;
    Ok(appointment)
}

/// Cancels an appointment on behalf of its doctor, its patient, or an admin.
pub async fn cancel(
    pool: &PgPool,
    principal: &Principal,
    appointment_id: Uuid,
) -> Result<Appointment, SchedulingError> {
    transition(
        pool,
        principal,
        appointment_id,
        AppointmentStatus::Cancelled,
        AppointmentAction::Cancel,
    )
    .await
}

/// Status-only transition used by doctors and admins.
pub async fn mark(
    pool: &PgPool,
    principal: &Principal,
    appointment_id: Uuid,
    status: AppointmentStatus,
) -> Result<Appointment, SchedulingError> {
    transition(
        pool,
        principal,
        appointment_id,
        status,
        AppointmentAction::SetStatus,
    )
    .await
}

#[tracing::instrument(
    name = "Changing appointment status",
    skip(pool, principal, action),
    fields(principal_id = %principal.id, role = %principal.role)
)]
async fn transition(
    pool: &PgPool,
    principal: &Principal,
    appointment_id: Uuid,
    next: AppointmentStatus,
    action: AppointmentAction,
) -> Result<Appointment, SchedulingError> {
    let mut appointment = fetch_appointment(pool, appointment_id).await?;
    authorize_action(principal, &appointment, action)?;
    if !plan_transition(appointment.status, next)? {
        return Ok(appointment);
    }

    sqlx::query("UPDATE appointment SET status = $1 WHERE id = $2")
        .bind(next.to_string())
        .bind(appointment_id)
        .execute(pool)
        .await?;
    tracing::info!(from = %appointment.status, to = %next, "Appointment status changed");

    appointment.status = next;
    Ok(appointment)
}

/// Saves the treatment for an appointment (insert or update) and completes it
/// in the same transaction.
#[tracing::instrument(
    name = "Recording treatment",
    skip(pool, doctor, record),
    fields(doctor_id = %doctor.id)
)]
pub async fn complete_with_treatment(
    pool: &PgPool,
    doctor: &Principal,
    appointment_id: Uuid,
    record: TreatmentRecord,
) -> Result<Treatment, SchedulingError> {
    let appointment = fetch_appointment(pool, appointment_id).await?;
    authorize_action(doctor, &appointment, AppointmentAction::RecordTreatment)?;
    plan_transition(appointment.status, AppointmentStatus::Completed)?;

    let mut transaction = pool
        .begin()
        .await
        .context("Failed to acquire a Postgres connection from the pool")?;

    let treatment = sqlx::query_as::<_, Treatment>(
        r#"
        INSERT INTO treatment (id, appointment_id, diagnosis, prescription, notes, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (appointment_id) DO UPDATE
        SET diagnosis = EXCLUDED.diagnosis,
            prescription = EXCLUDED.prescription,
            notes = EXCLUDED.notes
        RETURNING *
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(appointment_id)
    .bind(&record.diagnosis)
    .bind(&record.prescription)
    .bind(&record.notes)
    .bind(Utc::now().naive_utc())
    .fetch_one(&mut *transaction)
    .await?;

    sqlx::query("UPDATE appointment SET status = $1 WHERE id = $2")
        .bind(AppointmentStatus::Completed.to_string())
        .bind(appointment_id)
        .execute(&mut *transaction)
        .await?;

    transaction
        .commit()
        .await
        .context("Failed to commit the treatment")?;
    Ok(treatment)
}

pub async fn treatment_for(
    pool: &PgPool,
    appointment_id: Uuid,
) -> Result<Option<Treatment>, SchedulingError> {
    let treatment = sqlx::query_as::<_, Treatment>("SELECT * FROM treatment WHERE appointment_id = $1")
        .bind(appointment_id)
        .fetch_optional(pool)
        .await?;
    Ok(treatment)
}

#[tracing::instrument(name = "Fetching upcoming appointments for a patient", skip(pool))]
pub async fn upcoming_for_patient(
    pool: &PgPool,
    patient_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let sql = format!(
        "{DETAILS_SELECT} WHERE a.patient_id = $1 AND a.date >= $2 AND a.status = 'Booked' ORDER BY a.date, a.time"
    );
    let rows = sqlx::query_as::<_, AppointmentDetails>(&sql)
        .bind(patient_id)
        .bind(today)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// The ten most recent appointments that are either dated before today or
/// already closed.
#[tracing::instrument(name = "Fetching past appointments for a patient", skip(pool))]
pub async fn past_for_patient(
    pool: &PgPool,
    patient_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let sql = format!(
        "{DETAILS_SELECT} WHERE a.patient_id = $1 AND (a.date < $2 OR a.status IN ('Completed', 'Cancelled')) \
         ORDER BY a.date DESC LIMIT 10"
    );
    let rows = sqlx::query_as::<_, AppointmentDetails>(&sql)
        .bind(patient_id)
        .bind(today)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[tracing::instrument(name = "Fetching the doctor's upcoming appointments", skip(pool))]
pub async fn upcoming_for_doctor(
    pool: &PgPool,
    doctor_id: Uuid,
    today: NaiveDate,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let sql = format!(
        "{DETAILS_SELECT} WHERE a.doctor_id = $1 AND a.date >= $2 AND a.date <= $3 AND a.status = 'Booked' \
         ORDER BY a.date, a.time"
    );
    let rows = sqlx::query_as::<_, AppointmentDetails>(&sql)
        .bind(doctor_id)
        .bind(today)
        .bind(today + Duration::days(DOCTOR_HORIZON_DAYS))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[tracing::instrument(name = "Fetching all upcoming appointments", skip(pool))]
pub async fn upcoming_all(
    pool: &PgPool,
    today: NaiveDate,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let sql = format!("{DETAILS_SELECT} WHERE a.date >= $1 AND a.status = 'Booked' ORDER BY a.date, a.time");
    let rows = sqlx::query_as::<_, AppointmentDetails>(&sql)
        .bind(today)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn upcoming_for_doctors(
    pool: &PgPool,
    doctor_ids: &[Uuid],
    today: NaiveDate,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    upcoming_for_any("a.doctor_id", pool, doctor_ids, today).await
}

pub async fn upcoming_for_patients(
    pool: &PgPool,
    patient_ids: &[Uuid],
    today: NaiveDate,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    upcoming_for_any("a.patient_id", pool, patient_ids, today).await
}

async fn upcoming_for_any(
    column: &'static str,
    pool: &PgPool,
    ids: &[Uuid],
    today: NaiveDate,
) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "{DETAILS_SELECT} WHERE {column} = ANY($1) AND a.date >= $2 AND a.status = 'Booked' ORDER BY a.date, a.time"
    );
    let rows = sqlx::query_as::<_, AppointmentDetails>(&sql)
        .bind(ids)
        .bind(today)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

#[tracing::instrument(name = "Fetching every appointment", skip(pool))]
pub async fn all_appointments(pool: &PgPool) -> Result<Vec<AppointmentDetails>, SchedulingError> {
    let sql = format!("{DETAILS_SELECT} ORDER BY a.date DESC, a.time DESC");
    let rows = sqlx::query_as::<_, AppointmentDetails>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

pub async fn count_appointments(pool: &PgPool) -> Result<i64, SchedulingError> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM appointment")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Completed visits of a patient, newest first, optionally narrowed to one
/// doctor.
#[tracing::instrument(name = "Fetching treatment history", skip(pool))]
pub async fn completed_history(
    pool: &PgPool,
    patient_id: Uuid,
    doctor_id: Option<Uuid>,
) -> Result<Vec<HistoryEntry>, SchedulingError> {
    let sql = r#"
        SELECT a.id, a.patient_id, a.doctor_id, a.date, a.time, a.status, a.reason, a.created_at,
               d.name AS doctor_name, p.name AS patient_name,
               t.diagnosis, t.prescription, t.notes
        FROM appointment a
        JOIN doctor d ON d.id = a.doctor_id
        JOIN patient p ON p.id = a.patient_id
        LEFT JOIN treatment t ON t.appointment_id = a.id
        WHERE a.patient_id = $1
          AND ($2::uuid IS NULL OR a.doctor_id = $2)
          AND a.status = 'Completed'
        ORDER BY a.date DESC
    "#;
    let rows = sqlx::query_as::<_, HistoryEntry>(sql)
        .bind(patient_id)
        .bind(doctor_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
