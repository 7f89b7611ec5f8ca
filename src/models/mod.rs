pub mod appointments;
pub mod availability;
pub mod department;
pub mod doctor;
pub mod lifecycle;
pub mod patient;
pub mod treatment;

pub use appointments::{Appointment, AppointmentDetails, AppointmentStatus, HistoryEntry};
pub use availability::DoctorAvailability;
pub use department::Department;
pub use doctor::Doctor;
pub use lifecycle::AccountStatus;
pub use patient::Patient;
pub use treatment::Treatment;
