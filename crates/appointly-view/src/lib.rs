//! Appointment view controller.
//!
//! Owns the in-memory mirror of the appointment collection and the scheduler
//! view state, and turns widget edit events into store calls.

pub mod changes;
pub mod controller;
pub mod locale;
pub mod view_state;

pub use changes::{
    ChangeSet, CommitMode, CommitReport, Operation, OperationReport, Outcome, SkipReason,
};
pub use controller::AppointmentController;
pub use locale::LocaleMessages;
pub use view_state::{Navigation, SchedulerView, ViewState};
