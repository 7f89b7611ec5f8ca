use actix_web::{web, HttpResponse};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use serde_json::json;
use sqlx::PgPool;

use super::{PortalError, RedirectOnReject};
use crate::directory::patients::{register_patient, NewPatient, RegistrationForm};
use crate::utils::{json_page, see_other};

pub async fn register_form(flash_messages: IncomingFlashMessages) -> HttpResponse {
    json_page(
        flash_messages,
        json!({
            "fields": ["username", "password", "name", "email", "phone", "age", "gender", "address"]
        }),
    )
}

#[tracing::instrument(name = "Patient self-registration", skip(form, pool))]
pub async fn register(
    form: web::Form<RegistrationForm>,
    pool: web::Data<PgPool>,
) -> Result<HttpResponse, PortalError> {
    let patient = NewPatient::try_from(form.into_inner()).or_redirect("/register")?;
    register_patient(&pool, patient).await.or_redirect("/register")?;

    FlashMessage::success("Registration successful! Please login").send();
    Ok(see_other("/login"))
}
