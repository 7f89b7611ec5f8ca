mod admin;
mod doctor;
mod error;
mod health_check;
mod login;
mod patient;
mod register;

pub use admin::*;
pub use doctor::*;
pub use error::{PortalError, RedirectOnReject};
pub use health_check::*;
pub use login::*;
pub use patient::*;
pub use register::*;
