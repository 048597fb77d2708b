//! Plan lifecycle, base-week replication, derived progress and reminders.

pub mod lifecycle;
pub mod progress;
pub mod reminders;
pub mod replicate;

pub use lifecycle::{
    DEFAULT_DURATION_WEEKS, NewPlanRequest, PlanCreated, PlanManager, PlanRenewed, RenewRequest,
};
pub use progress::{ExpiryStatus, PlanProgress, StudentOverview, plan_progress, student_overview};
pub use reminders::{Audience, DueReminder, ReminderNotice, due_reminders, record_due_reminders};
pub use replicate::{
    ReplicationOutcome, ReplicationReport, ReplicationRequest, ReplicationSummary, replicate,
};
