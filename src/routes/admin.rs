use actix_web::{web, HttpResponse};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use super::{PortalError, RedirectOnReject};
use crate::auth::{Principal, Requirement, Role};
use crate::directory::departments::list_departments;
use crate::directory::doctors::{self, DoctorEditForm, DoctorForm, DoctorUpdateForm, NewDoctor};
use crate::directory::patients::{self, PatientEditForm};
use crate::models::{AccountStatus, AppointmentStatus};
use crate::scheduling::{self, rules::local_now};
use crate::session::TypedSession;
use crate::utils::{json_page, see_other};

const DASHBOARD: &str = "/admin/dashboard";
const APPOINTMENTS: &str = "/admin/view_appointments";

fn require_admin(session: &TypedSession) -> Result<Principal, PortalError> {
    Ok(session.require(Requirement::Role(Role::Admin))?)
}

fn lifecycle_word(status: AccountStatus) -> &'static str {
    match status {
        AccountStatus::Active => "activated",
        AccountStatus::Deactivated => "deactivated",
    }
}

#[tracing::instrument(name = "Admin dashboard", skip_all)]
pub async fn admin_dashboard(
    session: TypedSession,
    pool: web::Data<PgPool>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let today = local_now().date();

    let total_doctors = doctors::count_active_doctors(&pool).await.or_redirect(DASHBOARD)?;
    let total_patients = patients::count_active_patients(&pool).await.or_redirect(DASHBOARD)?;
    let total_appointments = scheduling::count_appointments(&pool).await.or_redirect(DASHBOARD)?;
    let upcoming = scheduling::upcoming_all(&pool, today).await.or_redirect(DASHBOARD)?;
    let active_patients = patients::list_active_patients(&pool).await.or_redirect(DASHBOARD)?;
    let active_doctors = doctors::list_active_doctors(&pool).await.or_redirect(DASHBOARD)?;

    Ok(json_page(
        flash_messages,
        json!({
            "total_doctors": total_doctors,
            "total_patients": total_patients,
            "total_appointments": total_appointments,
            "upcoming_appointments": upcoming,
            "patients": active_patients,
            "doctors": active_doctors,
        }),
    ))
}

pub async fn add_doctor_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let departments = list_departments(&pool).await.or_redirect(DASHBOARD)?;
    Ok(json_page(flash_messages, json!({ "departments": departments })))
}

#[tracing::instrument(name = "Admin adds a doctor", skip_all)]
pub async fn add_doctor(
    session: TypedSession,
    pool: web::Data<PgPool>,
    form: web::Form<DoctorForm>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let doctor = NewDoctor::try_from(form.into_inner()).or_redirect("/admin/add_doctor")?;
    doctors::add_doctor(&pool, doctor)
        .await
        .or_redirect("/admin/add_doctor")?;

    FlashMessage::success("Doctor added successfully").send();
    Ok(see_other(DASHBOARD))
}

pub async fn update_doctor_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let doctor = doctors::get_doctor(&pool, path.into_inner()).await.or_redirect(DASHBOARD)?;
    let departments = list_departments(&pool).await.or_redirect(DASHBOARD)?;
    Ok(json_page(
        flash_messages,
        json!({ "doctor": doctor, "departments": departments }),
    ))
}

#[tracing::instrument(name = "Admin updates a doctor", skip(session, pool, form))]
pub async fn update_doctor(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    form: web::Form<DoctorUpdateForm>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let doctor_id = path.into_inner();
    doctors::update_doctor(&pool, doctor_id, form.into_inner())
        .await
        .or_redirect(&format!("/admin/update_doctor/{}", doctor_id))?;

    FlashMessage::success("Doctor updated successfully").send();
    Ok(see_other(DASHBOARD))
}

pub async fn edit_doctor_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let doctor = doctors::get_doctor(&pool, path.into_inner()).await.or_redirect(DASHBOARD)?;
    Ok(json_page(flash_messages, json!({ "doctor": doctor })))
}

#[tracing::instrument(name = "Admin edits a doctor", skip(session, pool, form))]
pub async fn edit_doctor(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    form: web::Form<DoctorEditForm>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let doctor_id = path.into_inner();
    doctors::edit_doctor(&pool, doctor_id, form.into_inner())
        .await
        .or_redirect(&format!("/admin/doctor/{}/edit", doctor_id))?;
    Ok(see_other(DASHBOARD))
}

#[tracing::instrument(name = "Admin removes a doctor", skip(session, pool))]
pub async fn remove_doctor(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    doctors::deactivate_doctor(&pool, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;

    FlashMessage::success("Doctor removed successfully").send();
    Ok(see_other(DASHBOARD))
}

#[tracing::instrument(name = "Admin toggles a doctor", skip(session, pool))]
pub async fn toggle_doctor(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let status = doctors::toggle_doctor(&pool, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;

    FlashMessage::success(format!("Doctor {}", lifecycle_word(status))).send();
    Ok(see_other(DASHBOARD))
}

#[tracing::instrument(name = "Admin removes a patient", skip(session, pool))]
pub async fn remove_patient(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    patients::deactivate_patient(&pool, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;

    FlashMessage::success("Patient removed successfully").send();
    Ok(see_other(DASHBOARD))
}

#[tracing::instrument(name = "Admin toggles a patient", skip(session, pool))]
pub async fn toggle_patient(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let status = patients::toggle_patient(&pool, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;

    FlashMessage::success(format!("Patient {}", lifecycle_word(status))).send();
    Ok(see_other(DASHBOARD))
}

#[tracing::instrument(name = "Admin toggles a patient blacklist", skip(session, pool))]
pub async fn toggle_patient_blacklist(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let blacklisted = patients::toggle_blacklist(&pool, path.into_inner())
        .await
        .or_redirect(DASHBOARD)?;

    let message = if blacklisted {
        "Patient blacklisted"
    } else {
        "Patient removed from blacklist"
    };
    FlashMessage::success(message).send();
    Ok(see_other(DASHBOARD))
}

pub async fn edit_patient_form(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let patient = patients::get_patient(&pool, path.into_inner()).await.or_redirect(DASHBOARD)?;
    Ok(json_page(flash_messages, json!({ "patient": patient })))
}

#[tracing::instrument(name = "Admin edits a patient", skip(session, pool, form))]
pub async fn edit_patient(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
    form: web::Form<PatientEditForm>,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let patient_id = path.into_inner();
    patients::edit_patient(&pool, patient_id, form.into_inner())
        .await
        .or_redirect(&format!("/admin/patient/{}/edit", patient_id))?;
    Ok(see_other(DASHBOARD))
}

pub async fn view_appointments(
    session: TypedSession,
    pool: web::Data<PgPool>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let appointments = scheduling::all_appointments(&pool).await.or_redirect(DASHBOARD)?;
    Ok(json_page(
        flash_messages,
        json!({ "length": appointments.len(), "appointments": appointments }),
    ))
}

#[tracing::instrument(name = "Admin completes an appointment", skip(session, pool))]
pub async fn admin_complete_appointment(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    let admin = require_admin(&session)?;
    scheduling::mark(&pool, &admin, path.into_inner(), AppointmentStatus::Completed)
        .await
        .or_redirect(APPOINTMENTS)?;
    Ok(see_other(APPOINTMENTS))
}

#[tracing::instrument(name = "Admin cancels an appointment", skip(session, pool))]
pub async fn admin_cancel_appointment(
    session: TypedSession,
    pool: web::Data<PgPool>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, PortalError> {
    let admin = require_admin(&session)?;
    scheduling::cancel(&pool, &admin, path.into_inner())
        .await
        .or_redirect(APPOINTMENTS)?;
    Ok(see_other(APPOINTMENTS))
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SearchType {
    Doctor,
    Patient,
}

impl SearchType {
    /// Blank means doctor; anything unrecognised searches nothing.
    pub fn from_form(raw: &str) -> Option<Self> {
        match raw.trim() {
            "" | "doctor" => Some(SearchType::Doctor),
            "patient" => Some(SearchType::Patient),
            _ => None,
        }
    }
}

#[derive(Deserialize)]
pub struct AdminSearchForm {
    #[serde(default)]
    search_query: String,
    #[serde(default)]
    search_type: String,
}

pub async fn admin_search_form(
    session: TypedSession,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    Ok(json_page(
        flash_messages,
        json!({
            "search_query": "",
            "search_type": "doctor",
            "doctors": [],
            "patients": [],
            "appointments": [],
        }),
    ))
}

/// Doctors (by name or specialization) or patients (by name or email), with
/// their upcoming booked appointments.
#[tracing::instrument(name = "Admin search", skip(session, pool, form, flash_messages))]
pub async fn admin_search(
    session: TypedSession,
    pool: web::Data<PgPool>,
    form: web::Form<AdminSearchForm>,
    flash_messages: IncomingFlashMessages,
) -> Result<HttpResponse, PortalError> {
    require_admin(&session)?;
    let AdminSearchForm {
        search_query,
        search_type,
    } = form.into_inner();
    let search_query = search_query.trim().to_string();
    let today = local_now().date();

    let (found_doctors, found_patients, appointments) = match SearchType::from_form(&search_type) {
        Some(SearchType::Doctor) => {
            let found = doctors::search_doctors(&pool, &search_query, false)
                .await
                .or_redirect(DASHBOARD)?;
            let ids: Vec<Uuid> = found.iter().map(|d| d.id).collect();
            let appointments = scheduling::upcoming_for_doctors(&pool, &ids, today)
                .await
                .or_redirect(DASHBOARD)?;
            (found, Vec::new(), appointments)
        }
        Some(SearchType::Patient) => {
            let found = patients::search_patients(&pool, &search_query)
                .await
                .or_redirect(DASHBOARD)?;
            let ids: Vec<Uuid> = found.iter().map(|p| p.id).collect();
            let appointments = scheduling::upcoming_for_patients(&pool, &ids, today)
                .await
                .or_redirect(DASHBOARD)?;
            (Vec::new(), found, appointments)
        }
        None => {
            tracing::warn!(%search_type, "Unknown admin search type");
            (Vec::new(), Vec::new(), Vec::new())
        }
    };

    Ok(json_page(
        flash_messages,
        json!({
            "search_query": search_query,
            "search_type": search_type,
            "doctors": found_doctors,
            "patients": found_patients,
            "appointments": appointments,
        }),
    ))
}
