use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// A one-shot reminder ahead of a pass.
#[derive(Debug, Clone)]
pub struct ScheduledNotification {
    pub id: Uuid,
    pub subscriber: String,
    /// Rise of the pass being announced.
    pub rise: DateTime<Utc>,
    pub fire_at: DateTime<Utc>,
    pub lead_minutes: u32,
    pub(super) delivered: Arc<AtomicBool>,
}

impl ScheduledNotification {
    pub fn is_delivered(&self) -> bool {
        self.delivered.load(Ordering::SeqCst)
    }
}

#[derive(Debug, Clone)]
pub enum ScheduleOutcome {
    Scheduled(ScheduledNotification),
    /// A reminder for the same subscriber and pass is already pending.
    AlreadyScheduled(ScheduledNotification),
    /// The fire instant is not in the future; nothing was scheduled.
    Skipped { fire_at: DateTime<Utc> },
}

impl ScheduleOutcome {
    pub fn notification(&self) -> Option<&ScheduledNotification> {
        match self {
            ScheduleOutcome::Scheduled(n) | ScheduleOutcome::AlreadyScheduled(n) => Some(n),
            ScheduleOutcome::Skipped { .. } => None,
        }
    }
}

pub fn fire_instant(rise: DateTime<Utc>, lead_minutes: u32) -> DateTime<Utc> {
    rise - Duration::minutes(i64::from(lead_minutes))
}
