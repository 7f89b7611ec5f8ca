mod credentials;
mod gate;

pub use credentials::{compute_password_hash, validate_credentials, AuthError, Credentials};
pub use gate::{authorize, AccessDenied, Principal, Requirement, Role, UnknownRole};
