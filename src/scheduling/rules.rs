use chrono::{Duration, Local, NaiveDate, NaiveDateTime, NaiveTime, Timelike};

use super::SchedulingError;
use crate::auth::{Principal, Role};
use crate::models::{Appointment, AppointmentStatus};

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

/// How far ahead the doctor dashboard looks, inclusive of both ends.
pub const DOCTOR_HORIZON_DAYS: i64 = 7;

/// Local wall-clock time, truncated to whole seconds so it round-trips through
/// the database unchanged.
pub fn local_now() -> NaiveDateTime {
    let now = Local::now().naive_local();
    now.with_nanosecond(0).unwrap_or(now)
}

/// The seven calendar days `[start, start + 6]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RollingWeek {
    start: NaiveDate,
}

impl RollingWeek {
    pub fn starting(start: NaiveDate) -> Self {
        Self { start }
    }

    pub fn first_day(&self) -> NaiveDate {
        self.start
    }

    pub fn last_day(&self) -> NaiveDate {
        self.start + Duration::days(6)
    }

    pub fn days(&self) -> impl Iterator<Item = NaiveDate> {
        let start = self.start;
        (0..7).map(move |offset| start + Duration::days(offset))
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.first_day() <= date && date <= self.last_day()
    }
}

/// Requests in the past are pulled forward to `now`: an earlier date moves
/// both date and time, today with a time that is not strictly ahead moves
/// only the time.
pub fn normalize_requested_slot(
    date: NaiveDate,
    time: NaiveTime,
    now: NaiveDateTime,
) -> (NaiveDate, NaiveTime) {
    let today = now.date();
    let now_time = now.time();
    if date < today {
        (today, now_time)
    } else if date == today && time <= now_time {
        (date, now_time)
    } else {
        (date, time)
    }
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, SchedulingError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|_| SchedulingError::InvalidInput(format!("{:?} is not a valid date", raw)))
}

pub fn parse_time(raw: &str) -> Result<NaiveTime, SchedulingError> {
    NaiveTime::parse_from_str(raw.trim(), TIME_FORMAT)
        .map_err(|_| SchedulingError::InvalidInput(format!("{:?} is not a valid time", raw)))
}

/// Which existing appointments make a slot unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictScope {
    /// New bookings only collide with live bookings.
    BookedOnly,
    /// Moving an appointment collides with anything already on that slot.
    AnyStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentAction {
    Cancel,
    Reschedule,
    RecordTreatment,
    SetStatus,
}

/// Ownership layer on top of the role gate.
pub fn authorize_action(
    principal: &Principal,
    appointment: &Appointment,
    action: AppointmentAction,
) -> Result<(), SchedulingError> {
    use AppointmentAction::*;

    let allowed = match (principal.role, action) {
        (Role::Admin, Cancel | SetStatus) => true,
        (Role::Doctor, Cancel | RecordTreatment | SetStatus) => {
            appointment.doctor_id == principal.id
        }
        (Role::Patient, Cancel | Reschedule) => appointment.patient_id == principal.id,
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(SchedulingError::NotPermitted)
    }
}

/// Decides whether moving from `current` to `next` needs a write.
pub fn plan_transition(
    current: AppointmentStatus,
    next: AppointmentStatus,
) -> Result<bool, SchedulingError> {
    if !current.can_become(next) {
        return Err(SchedulingError::InvalidTransition {
            from: current,
            to: next,
        });
    }
    Ok(current != next)
}

/// Doctors mark appointments through a free-form path segment; only the
/// terminal statuses are honoured.
pub fn terminal_status(raw: &str) -> Option<AppointmentStatus> {
    raw.parse::<AppointmentStatus>()
        .ok()
        .filter(AppointmentStatus::is_terminal)
}
