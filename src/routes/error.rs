use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use actix_web_flash_messages::FlashMessage;

use crate::auth::AccessDenied;
use crate::directory::IdentityError;
use crate::scheduling::SchedulingError;
use crate::utils::{error_chain_fmt, see_other};

/// Failure of a portal request. Everything the user can fix comes back as a
/// flash message on a redirect; missing records are a hard 404.
#[derive(thiserror::Error)]
pub enum PortalError {
    // Same wording for "not logged in" and "wrong role".
    #[error("Please login to continue")]
    AccessDenied(#[from] AccessDenied),
    #[error("{message}")]
    Rejected {
        message: String,
        redirect_to: String,
    },
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl PortalError {
    pub fn rejected(message: impl Into<String>, redirect_to: impl Into<String>) -> Self {
        PortalError::Rejected {
            message: message.into(),
            redirect_to: redirect_to.into(),
        }
    }
}

impl std::fmt::Debug for PortalError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl ResponseError for PortalError {
    fn status_code(&self) -> StatusCode {
        match self {
            PortalError::AccessDenied(_) | PortalError::Rejected { .. } => StatusCode::SEE_OTHER,
            PortalError::NotFound(_) => StatusCode::NOT_FOUND,
            PortalError::UnexpectedError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        match self {
            PortalError::AccessDenied(reason) => {
                tracing::warn!(%reason, "Access denied");
                FlashMessage::warning(self.to_string()).send();
                see_other("/login")
            }
            PortalError::Rejected { message, redirect_to } => {
                FlashMessage::error(message.clone()).send();
                see_other(redirect_to)
            }
            PortalError::NotFound(_) => HttpResponse::NotFound().finish(),
            PortalError::UnexpectedError(_) => HttpResponse::new(self.status_code()),
        }
    }
}

/// Turns a domain failure into the portal's flash-and-redirect outcome.
pub trait RedirectOnReject<T> {
    fn or_redirect(self, redirect_to: &str) -> Result<T, PortalError>;
}

impl<T> RedirectOnReject<T> for Result<T, SchedulingError> {
    fn or_redirect(self, redirect_to: &str) -> Result<T, PortalError> {
        self.map_err(|e| match e {
            SchedulingError::NotFound(entity) => PortalError::NotFound(entity),
            SchedulingError::UnexpectedError(e) => PortalError::UnexpectedError(e),
            e => PortalError::rejected(e.to_string(), redirect_to),
        })
    }
}

impl<T> RedirectOnReject<T> for Result<T, IdentityError> {
    fn or_redirect(self, redirect_to: &str) -> Result<T, PortalError> {
        self.map_err(|e| match e {
            IdentityError::NotFound(entity) => PortalError::NotFound(entity),
            IdentityError::UnexpectedError(e) => PortalError::UnexpectedError(e),
            e => PortalError::rejected(e.to_string(), redirect_to),
        })
    }
}
