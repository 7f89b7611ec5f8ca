use actix_web::{web, HttpResponse};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::Deserialize;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PortalError, RedirectOnReject};
use crate::auth::{Principal, Requirement, Role};
use crate::directory::departments::list_departments;
use crate::directory::patients::{self, ProfileForm};
use crate::directory::doctors;
use crate::scheduling::rules::{
    authorize_action, local_now, parse_date, parse_time, AppointmentAction,
};
use crate::scheduling::{self, BookingRequest, RollingWeek};
use crate::session::TypedSession;
use crate::utils::{json_page, see_other};

const DASHBOARD: &str = "/patient/dashboard";

fn require_patient(session: &TypedSession) -> Result<Principal, PortalError> {
    Ok(session.require(Requirement::Role(Role::Patient))?)
}

#[tracing::instrument(name = "Patient dashboard", skip_all)]
pub async fn patient_dashboard(
    session: TypedSession,
    pool: web::Data<PgPool>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    let patient = require_patient(&session)?;
    let today = local_now().date();

    let profile = patients::get_patient(&pool, patient.id).await.or_redirect("/login")?;
    let availability =
        scheduling::active_doctors_availability(&pool, RollingWeek::starting(today))
            .await
            .or_redirect("/login")?;
    let upcoming = scheduling::upcoming_for_patient(&pool, patient.id, today)
        .await
        .or_redirect("/login")?;
    let past = scheduling::past_for_patient(&pool, patient.id, today)
        .await
        .or_redirect("/login")?;
    let departments = list_departments(&pool).await.or_redirect("/login")?;

    Ok(json_page(
        flash_messages,
        json!({
            "patient": profile,
            "availabilities": availability,
            "upcoming_appointments": upcoming,
            "past_appointments": past,
            "departments": departments,
        }),
    ))
}

pub async fn edit_profile_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    let patient = require_patient(&session)?;
    let profile = patients::get_patient(&pool, patient.id).await.or_redirect(DASHBOARD)?;
    Ok(json_page(flash_messages, json!({ "patient": profile })))
}

#[tracing::instrument(name = "Patient edits profile", skip_all)]
pub async fn edit_profile(
    session: TypedSession,
    pool: web::Data<PgPool>,
    form: web::Form<ProfileForm>,
) -> Result<HttpResponse, PortalError> {
    let patient = require_patient(&session)?;
    patients::update_profile(&pool, patient.id, form.into_inner())
        .await
        .or_redirect("/patient/edit_profile")?;

    FlashMessage::success("Profile updated successfully").send();
    Ok(see_other(DASHBOARD))
}

pub async fn search_doctors_form(
    session: TypedSession,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_patient(&session)?;
    Ok(json_page(flash_messages, json!({ "doctors": [] })))
}

#[derive(Deserialize)]
pub struct DoctorSearchForm {
    #[serde(default)]
    search_query: String,
}

/// Active doctors whose name or specialization contains the query.
#[tracing::instrument(name = "Patient searches doctors", skip(session, pool, form, flash_messages))]
pub async fn search_doctors(
    session: TypedSession,
    pool: web::Data<PgPool>,
    form: web::Form<DoctorSearchForm>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_patient(&session)?;
    let found = doctors::search_doctors(&pool, &form.search_query, true)
        .await
        .or_redirect(DASHBOARD)?;
    Ok(json_page(
        flash_messages,
        json!({ "search_query": form.search_query, "doctors": found }),
    ))
}

pub async fn book_appointment_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_patient(&session)?;
    let doctor = doctors::get_doctor(&pool, path.into_inner()).await.or_redirect(DASHBOARD)?;
    let week = RollingWeek::starting(local_now().date());
    let availability: Vec<_> = scheduling::get_week_availability(&pool, doctor.id, week)
        .await
        .or_redirect(DASHBOARD)?
        .into_iter()
        .filter(|row| row.is_available)
        .collect();

    Ok(json_page(
        flash_messages,
        json!({ "doctor": doctor, "availabilities": availability }),
    ))
}

#[derive(Deserialize)]
pub struct BookingForm {
    date: String,
    time: String,
    reason: Option<String>,
}

#[tracing::instrument(name = "Patient books an appointment", skip(session, pool, form))]
pub async fn book_appointment(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    form: web::Form<BookingForm>,
) -> Result<HttpResponse, PortalError> {
    let patient = require_patient(&session)?;
    let doctor_id = path.into_inner();
    let booking_page = format!("/patient/book_appointment/{}", doctor_id);

    let request = BookingRequest {
        doctor_id,
        date: parse_date(&form.date).or_redirect(&booking_page)?,
        time: parse_time(&form.time).or_redirect(&booking_page)?,
        reason: form.into_inner().reason,
    };
    scheduling::book(&pool, &patient, request, local_now())
        .await
        .or_redirect(&booking_page)?;

    FlashMessage::success("Appointment booked successfully").send();
    Ok(see_other(DASHBOARD))
}

#[tracing::instrument(name = "Patient cancels an appointment", skip(session, pool))]
pub async fn cancel_appointment(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    let patient = require_patient(&session)?;
    scheduling::cancel(&pool, &patient, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;

    FlashMessage::success("Appointment cancelled successfully").send();
    Ok(see_other(DASHBOARD))
}

pub async fn reschedule_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    let patient = require_patient(&session)?;
    let appointment = scheduling::fetch_appointment(&pool, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;
    authorize_action(&patient, &appointment, AppointmentAction::Reschedule)
        .or_redirect(DASHBOARD)?;
    Ok(json_page(flash_messages, json!({ "appointment": appointment })))
}

#[derive(Deserialize)]
pub struct RescheduleForm {
    date: String,
    time: String,
}

#[tracing::instrument(name = "Patient reschedules an appointment", skip(session, pool, form))]
pub async fn reschedule_appointment(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    form: web::Form<RescheduleForm>,
) -> Result<HttpResponse, PortalError> {
    let patient = require_patient(&session)?;
    let appointment_id = path.into_inner();
    let reschedule_page = format!("/patient/appointment/{}/reschedule", appointment_id);

    let new_date = parse_date(&form.date).or_redirect(&reschedule_page)?;
    let new_time = parse_time(&form.time).or_redirect(&reschedule_page)?;
    scheduling::reschedule(&pool, &patient, appointment_id, new_date, new_time)
        .await
        .or_redirect(&reschedule_page)?;

    FlashMessage::success("Appointment rescheduled.").send();
    Ok(see_other(DASHBOARD))
}

#[tracing::instrument(name = "Patient views history", skip_all)]
pub async fn patient_history(
    session: TypedSession,
    pool: web::Data<PgPool>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    let patient = require_patient(&session)?;
    let profile = patients::get_patient(&pool, patient.id).await.or_redirect(DASHBOARD)?;
    let history = scheduling::completed_history(&pool, patient.id, None)
        .await
        .or_redirect(DASHBOARD)?;

    Ok(json_page(
        flash_messages,
        json!({ "patient": profile, "appointments": history, "user_role": Role::Patient }),
    ))
}
