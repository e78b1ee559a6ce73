//! External collaborators consumed by the dispatch core
//!
//! Telemetry collection, reminder scheduling, and window management are not
//! owned by this crate; each is a trait with a thin default implementation
//! so the pipeline is exercisable end-to-end.

pub mod launcher;
pub mod reminders;
pub mod telemetry;

pub use launcher::{AppLauncher, ProcessLauncher};
pub use reminders::{JsonReminderStore, Reminder, ReminderKind, ReminderStore};
pub use telemetry::{ProcTelemetry, TelemetryProvider, TelemetrySnapshot};
