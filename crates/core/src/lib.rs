//! Shared foundations for the yaruki bot: configuration, error taxonomy,
//! wall-clock helpers, and reminder scheduling.

pub mod clock;
pub mod config;
pub mod errors;
pub mod schedule;

pub use clock::{format_today, Clock, FixedClock, SystemClock};
pub use errors::{ApplicationError, InterfaceError};
pub use schedule::{parse_reminder_time, ScheduleError};
