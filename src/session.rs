use std::future::{ready, Ready};

use actix_session::{Session, SessionExt, SessionGetError, SessionInsertError};
use actix_web::dev::Payload;
use actix_web::{FromRequest, HttpRequest};

use crate::auth::{authorize, AccessDenied, Principal, Requirement};

/// Typed view over the cookie session: the logged-in principal's id, role and
/// username, or nothing.
pub struct TypedSession(Session);

impl TypedSession {
    const PRINCIPAL_KEY: &'static str = "principal";

    pub fn renew(&self) {
        self.0.renew();
    }

    pub fn insert_principal(&self, principal: &Principal) -> Result<(), SessionInsertError> {
        self.0.insert(Self::PRINCIPAL_KEY, principal)
    }

    pub fn get_principal(&self) -> Result<Option<Principal>, SessionGetError> {
        self.0.get(Self::PRINCIPAL_KEY)
    }

    /// Runs the access gate against whatever principal the session carries.
    /// A session that cannot be decoded counts as anonymous.
    pub fn require(&self, requirement: Requirement) -> Result<Principal, AccessDenied> {
        let principal = self.get_principal().unwrap_or_else(|e| {
            tracing::warn!(error.cause_chain = ?e, "Discarding an unreadable session");
            None
        });
        authorize(principal, requirement)
    }

    pub fn log_out(self) {
        self.0.purge()
    }
}

impl FromRequest for TypedSession {
    type Error = <Session as FromRequest>::Error;
    type Future = Ready<Result<TypedSession, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        ready(Ok(TypedSession(req.get_session())))
    }
}
