mod hook;
mod scheduler;
mod types;

pub use hook::ReminderHook;
pub use scheduler::NotificationScheduler;
pub use types::{fire_instant, ScheduleOutcome, ScheduledNotification};
