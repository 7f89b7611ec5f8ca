use std::collections::HashMap;

use actix_web::{web, HttpResponse};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PortalError, RedirectOnReject};
use crate::auth::{Principal, Requirement, Role};
use crate::directory::{doctors, patients};
use crate::scheduling::rules::{authorize_action, local_now, terminal_status, AppointmentAction};
use crate::scheduling::{self, RollingWeek, TreatmentRecord};
use crate::session::TypedSession;
use crate::utils::{json_page, see_other};

const DASHBOARD: &str = "/doctor/dashboard";

fn require_doctor(session: &TypedSession) -> Result<Principal, PortalError> {
    Ok(session.require(Requirement::Role(Role::Doctor))?)
}

#[tracing::instrument(name = "Doctor dashboard", skip_all)]
pub async fn doctor_dashboard(
    session: TypedSession,
    pool: web::Data<PgPool>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    let doctor = require_doctor(&session)?;
    let today = local_now().date();

    let profile = doctors::get_doctor(&pool, doctor.id).await.or_redirect("/login")?;
    let upcoming = scheduling::upcoming_for_doctor(&pool, doctor.id, today)
        .await
        .or_redirect("/login")?;
    let seen_patients = patients::patients_of_doctor(&pool, doctor.id)
        .await
        .or_redirect("/login")?;

    Ok(json_page(
        flash_messages,
        json!({
            "doctor": profile,
            "upcoming_appointments": upcoming,
            "patients": seen_patients,
        }),
    ))
}

#[tracing::instrument(name = "Doctor cancels an appointment", skip(session, pool))]
pub async fn doctor_cancel_appointment(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    let doctor = require_doctor(&session)?;
    scheduling::cancel(&pool, &doctor, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;

    FlashMessage::success("Appointment cancelled.").send();
    Ok(see_other(DASHBOARD))
}

pub async fn availability_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    let doctor = require_doctor(&session)?;
    let week = RollingWeek::starting(local_now().date());
    let availability = scheduling::get_week_availability(&pool, doctor.id, week)
        .await
        .or_redirect(DASHBOARD)?;

    // Keyed by date; days without a row are unavailable.
    let by_date: HashMap<String, _> = availability
        .into_iter()
        .map(|row| (row.date.to_string(), row))
        .collect();
    let days: Vec<String> = week.days().map(|d| d.to_string()).collect();

    Ok(json_page(
        flash_messages,
        json!({ "days": days, "availability": by_date }),
    ))
}

#[tracing::instrument(name = "Doctor submits weekly availability", skip_all)]
pub async fn set_availability(
    session: TypedSession,
    pool: web::Data<PgPool>,
    form: web::Form<HashMap<String, String>>,
) -> Result<HttpResponse, PortalError> {
    let doctor = require_doctor(&session)?;
    let week = RollingWeek::starting(local_now().date());
    let windows = scheduling::parse_week_form(&week, &form).or_redirect("/doctor/availability")?;
    scheduling::set_week_availability(&pool, &doctor, week, windows)
        .await
        .or_redirect("/doctor/availability")?;

    FlashMessage::success("Availability updated").send();
    Ok(see_other(DASHBOARD))
}

/// Status shortcut. Anything other than `Completed` or `Cancelled` is ignored.
#[tracing::instrument(name = "Doctor marks an appointment", skip(session, pool))]
pub async fn mark_appointment(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<(Uuid, String)>,
) -> Result<HttpResponse, PortalError> {
    let doctor = require_doctor(&session)?;
    let (appointment_id, raw_status) = path.into_inner();

    let appointment = scheduling::fetch_appointment(&pool, appointment_id)
        .await
        .or_redirect(DASHBOARD)?;
    authorize_action(&doctor, &appointment, AppointmentAction::SetStatus).or_redirect(DASHBOARD)?;

    if let Some(status) = terminal_status(&raw_status) {
        scheduling::mark(&pool, &doctor, appointment_id, status)
            .await
            .or_redirect(DASHBOARD)?;
        FlashMessage::success(format!("Appointment marked as {}", status)).send();
    }
    Ok(see_other(DASHBOARD))
}

pub async fn treatment_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    let doctor = require_doctor(&session)?;
    let appointment_id = path.into_inner();
    let appointment = scheduling::fetch_appointment(&pool, appointment_id)
        .await
        .or_redirect(DASHBOARD)?;
    authorize_action(&doctor, &appointment, AppointmentAction::RecordTreatment)
        .or_redirect(DASHBOARD)?;
    let treatment = scheduling::treatment_for(&pool, appointment_id)
        .await
        .or_redirect(DASHBOARD)?;

    Ok(json_page(
        flash_messages,
        json!({ "appointment": appointment, "treatment": treatment }),
    ))
}

#[derive(Deserialize)]
pub struct TreatmentForm {
    diagnosis: Option<String>,
    prescription: Option<String>,
    notes: Option<String>,
}

#[tracing::instrument(name = "Doctor records a treatment", skip(session, pool, form))]
pub async fn update_treatment(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    form: web::Form<TreatmentForm>,
) -> Result<HttpResponse, PortalError> {
    let doctor = require_doctor(&session)?;
    let TreatmentForm {
        diagnosis,
        prescription,
        notes,
    } = form.into_inner();
    let record = TreatmentRecord {
        diagnosis: diagnosis.unwrap_or_default(),
        prescription,
        notes,
    };
    scheduling::complete_with_treatment(&pool, &doctor, path.into_inner(), record)
        .await
        .or_redirect(DASHBOARD)?;

    FlashMessage::success("Treatment updated successfully").send();
    Ok(see_other(DASHBOARD))
}

#[tracing::instrument(name = "Doctor views patient history", skip(session, pool, flash_messages))]
pub async fn doctor_patient_history(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    let doctor = require_doctor(&session)?;
    let patient = patients::get_patient(&pool, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;
    let history = scheduling::completed_history(&pool, patient.id, Some(doctor.id))
        .await
        .or_redirect(DASHBOARD)?;

    Ok(json_page(
        flash_messages,
        json!({ "patient": patient, "appointments": history, "user_role": Role::Doctor }),
    ))
}
