use crate::models::AppointmentStatus;
use crate::utils::error_chain_fmt;

#[derive(thiserror::Error)]
pub enum SchedulingError {
    #[error("This time slot is already booked. Please choose another time.")]
    SlotTaken,
    #[error("Doctor already has an appointment at that time.")]
    SlotOccupied,
    #[error("You are not allowed to modify this appointment.")]
    NotPermitted,
    #[error("Appointment is already {from} and cannot be marked {to}.")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },
    #[error("{0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for SchedulingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl From<sqlx::Error> for SchedulingError {
    fn from(e: sqlx::Error) -> Self {
        SchedulingError::UnexpectedError(anyhow::Error::new(e).context("Database query failed"))
    }
}
