use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use super::types::{fire_instant, ScheduleOutcome, ScheduledNotification};

#[derive(Debug)]
struct Pending {
    notification: ScheduledNotification,
    task: JoinHandle<()>,
}

/// One-shot reminders, each running as its own timer task.
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone, Default)]
pub struct NotificationScheduler {
    pending: Arc<Mutex<HashMap<Uuid, Pending>>>,
}

impl NotificationScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<Uuid, Pending>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Arrange for `on_fire` to run `lead_minutes` before `rise`.
    pub fn schedule<F>(
        &self,
        subscriber: &str,
        rise: DateTime<Utc>,
        lead_minutes: u32,
        now: DateTime<Utc>,
        on_fire: F,
    ) -> ScheduleOutcome
    where
        F: FnOnce(ScheduledNotification) + Send + 'static,
    {
        let fire_at = fire_instant(rise, lead_minutes);
        if fire_at <= now {
            log::warn!(
                "Reminder for {subscriber} not scheduled: fire time {fire_at} is already past"
            );
            return ScheduleOutcome::Skipped { fire_at };
        }

        // Held until the entry is inserted so a duplicate request cannot slip in between.
        let mut pending = self.lock();
        if let Some(existing) = pending
            .values()
            .find(|p| p.notification.subscriber == subscriber && p.notification.rise == rise)
        {
            log::info!(
                "Reminder {} for {subscriber} already pending",
                existing.notification.id
            );
            return ScheduleOutcome::AlreadyScheduled(existing.notification.clone());
        }

        let notification = ScheduledNotification {
            id: Uuid::new_v4(),
            subscriber: subscriber.to_string(),
            rise,
            fire_at,
            lead_minutes,
            delivered: Arc::new(AtomicBool::new(false)),
        };
        let delay = (fire_at - now).to_std().unwrap_or_default();

        let registry = self.pending.clone();
        let fired = notification.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let removed = registry
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&fired.id);
            if removed.is_some() && !fired.delivered.swap(true, Ordering::SeqCst) {
                log::info!("Reminder {} for {} firing", fired.id, fired.subscriber);
                on_fire(fired);
            }
        });

        log::info!(
            "Reminder {} for {subscriber} scheduled at {fire_at} (in {})",
            notification.id,
            humantime::format_duration(delay)
        );
        pending.insert(
            notification.id,
            Pending {
                notification: notification.clone(),
                task,
            },
        );
        ScheduleOutcome::Scheduled(notification)
    }

    /// Abort a pending reminder. Returns `false` if it is unknown or has already fired.
    pub fn cancel(&self, id: Uuid) -> bool {
        match self.lock().remove(&id) {
            Some(entry) => {
                entry.task.abort();
                log::info!("Reminder {id} cancelled");
                true
            }
            None => false,
        }
    }

    /// Pending reminders, optionally for one subscriber, in firing order.
    pub fn pending(&self, subscriber: Option<&str>) -> Vec<ScheduledNotification> {
        let mut notifications: Vec<_> = self
            .lock()
            .values()
            .filter(|p| subscriber.map_or(true, |s| p.notification.subscriber == s))
            .map(|p| p.notification.clone())
            .collect();
        notifications.sort_by_key(|n| (n.fire_at, n.id));
        notifications
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration as StdDuration;
    use tokio::sync::mpsc;

    fn minutes(m: i64) -> chrono::Duration {
        chrono::Duration::minutes(m)
    }

    fn counting(counter: &Arc<AtomicUsize>) -> impl FnOnce(ScheduledNotification) + Send + 'static {
        let counter = counter.clone();
        move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn skips_reminders_whose_time_has_passed() {
        let scheduler = NotificationScheduler::new();
        let now = Utc::now();

        let outcome = scheduler.schedule("a", now + minutes(10), 15, now, |_| {});
        assert!(matches!(outcome, ScheduleOutcome::Skipped { fire_at } if fire_at == now - minutes(5)));

        // Firing exactly now counts as past.
        let outcome = scheduler.schedule("a", now + minutes(15), 15, now, |_| {});
        assert!(matches!(outcome, ScheduleOutcome::Skipped { .. }));

        let rise = now + minutes(15) + chrono::Duration::seconds(1);
        let outcome = scheduler.schedule("a", rise, 15, now, |_| {});
        assert!(matches!(outcome, ScheduleOutcome::Scheduled(_)));
        assert_eq!(scheduler.pending(None).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn fires_once_at_lead_time_and_is_discarded() {
        let scheduler = NotificationScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();

        let outcome = scheduler.schedule("a", now + minutes(20), 15, now, counting(&counter));
        let notification = outcome.notification().unwrap().clone();
        assert_eq!(notification.fire_at, now + minutes(5));
        assert!(!notification.is_delivered());

        tokio::time::sleep(StdDuration::from_secs(299)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
        assert_eq!(scheduler.pending(None).len(), 1);

        tokio::time::sleep(StdDuration::from_secs(2)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(notification.is_delivered());
        assert!(scheduler.pending(None).is_empty());

        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!scheduler.cancel(notification.id));
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_requests_share_one_reminder() {
        let scheduler = NotificationScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();
        let rise = now + minutes(60);

        let first = scheduler.schedule("a", rise, 15, now, counting(&counter));
        let second = scheduler.schedule("a", rise, 15, now, counting(&counter));
        let other = scheduler.schedule("b", rise, 15, now, counting(&counter));

        let first_id = first.notification().unwrap().id;
        assert!(matches!(&second, ScheduleOutcome::AlreadyScheduled(n) if n.id == first_id));
        assert!(matches!(&other, ScheduleOutcome::Scheduled(n) if n.id != first_id));
        assert_eq!(scheduler.pending(None).len(), 2);
        assert_eq!(scheduler.pending(Some("a")).len(), 1);

        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_reminders_never_fire() {
        let scheduler = NotificationScheduler::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let now = Utc::now();

        let outcome = scheduler.schedule("a", now + minutes(30), 15, now, counting(&counter));
        let id = outcome.notification().unwrap().id;
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));
        assert!(!scheduler.cancel(Uuid::new_v4()));

        tokio::time::sleep(StdDuration::from_secs(3600)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn reminders_fire_independently_in_time_order() {
        let scheduler = NotificationScheduler::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let now = Utc::now();

        for (subscriber, offset) in [("late", 50), ("early", 20), ("middle", 35)] {
            let tx = tx.clone();
            scheduler.schedule(subscriber, now + minutes(offset), 15, now, move |n| {
                let _ = tx.send(n.subscriber);
            });
        }
        // A failing callback does not hold up the others.
        scheduler.schedule("broken", now + minutes(30), 15, now, |_| {
            panic!("delivery failed");
        });
        drop(tx);

        let order: Vec<_> = scheduler
            .pending(None)
            .into_iter()
            .map(|n| n.subscriber)
            .collect();
        assert_eq!(order, ["early", "broken", "middle", "late"]);

        let mut fired = Vec::new();
        while let Some(subscriber) = rx.recv().await {
            fired.push(subscriber);
        }
        assert_eq!(fired, ["early", "middle", "late"]);
        assert!(scheduler.pending(None).is_empty());
    }
}
