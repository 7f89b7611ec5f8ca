//! Appointment scheduling: booking, rescheduling, status transitions,
//! treatment records and the per-doctor availability ledger.

mod appointments;
mod availability;
mod error;
pub mod rules;

pub use appointments::{
    all_appointments, book, cancel, complete_with_treatment, completed_history, count_appointments,
    fetch_appointment, mark, past_for_patient, reschedule, treatment_for, upcoming_all,
    upcoming_for_doctor, upcoming_for_doctors, upcoming_for_patient, upcoming_for_patients,
    BookingRequest, TreatmentRecord,
};
pub use availability::{
    active_doctors_availability, get_week_availability, parse_week_form, set_week_availability,
    AvailabilityListing, DayWindow,
};
pub use error::SchedulingError;
pub use rules::RollingWeek;
