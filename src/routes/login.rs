use actix_web::{web, HttpResponse};
use actix_web_flash_messages::{FlashMessage, IncomingFlashMessages};
use secrecy::Secret;
use serde_json::json;
use sqlx::PgPool;

use super::PortalError;
use crate::auth::{validate_credentials, AuthError, Credentials, Requirement, Role};
use crate::session::TypedSession;
use crate::utils::{json_page, see_other};

#[derive(serde::Deserialize)]
pub struct LoginForm {
    username: String,
    password: Secret<String>,
    // Parsed by hand so an unknown role is a failed login, not a 400
    #[serde(default)]
    role: String,
}

/// Anyone with a session lands on their own dashboard, everyone else on login.
pub async fn index(session: TypedSession) -> HttpResponse {
    match session.require(Requirement::Authenticated) {
        Ok(principal) => see_other(principal.role.dashboard()),
        Err(_) => see_other("/login"),
    }
}

pub async fn login_form(flash_messages: IncomingFlashMessages) -> HttpResponse {
    json_page(
        flash_messages,
        json!({ "roles": [Role::Admin, Role::Doctor, Role::Patient] }),
    )
}

#[tracing::instrument(
    skip(form, pool, session),
    fields(username = tracing::field::Empty, user_id = tracing::field::Empty, role = %form.role)
)]
pub async fn login(
    form: web::Form<LoginForm>,
    pool: web::Data<PgPool>,
    session: TypedSession,
) -> Result<HttpResponse, PortalError> {
    let form = form.into_inner();
    let role: Role = match form.role.parse() {
        Ok(role) => role,
        Err(e) => {
            tracing::warn!(error = %e, "Login attempted with an unknown role");
            return Err(PortalError::rejected("Invalid credentials", "/login"));
        }
    };
    let credentials = Credentials {
        username: form.username,
        password: form.password,
        role,
    };
    tracing::Span::current().record("username", tracing::field::display(&credentials.username));

    match validate_credentials(credentials, &pool).await {
        Ok(principal) => {
            tracing::Span::current().record("user_id", tracing::field::display(&principal.id));
            session.renew();
            session
                .insert_principal(&principal)
                .map_err(|e| PortalError::UnexpectedError(e.into()))?;
            Ok(see_other(principal.role.dashboard()))
        }
        Err(AuthError::UnexpectedError(e)) => Err(PortalError::UnexpectedError(e)),
        Err(e) => Err(PortalError::rejected(e.to_string(), "/login")),
    }
}

pub async fn log_out(session: TypedSession) -> HttpResponse {
    session.log_out();
    FlashMessage::success("Logged out successfully").send();
    see_other("/login")
}
