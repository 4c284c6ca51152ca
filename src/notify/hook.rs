use std::io;
use std::process::{Child, Command as StdCommand, Stdio};
use std::thread;

use super::types::ScheduledNotification;

/// Delivers fired reminders: always to the log, and to a shell command when one is configured.
///
/// The command runs under `sh -c` with the reminder described in the
/// `PASSWATCH_*` environment variables.
#[derive(Debug, Clone, Default)]
pub struct ReminderHook {
    command: Option<String>,
}

impl ReminderHook {
    pub fn new(command: Option<String>) -> Self {
        Self { command }
    }

    /// Returns the thread waiting on the spawned command, if one was started.
    pub fn deliver(
        &self,
        object: &str,
        notification: &ScheduledNotification,
    ) -> Option<thread::JoinHandle<()>> {
        log::info!(
            "Reminder for {}: {object} rises at {} (in {} minutes)",
            notification.subscriber,
            notification.rise,
            notification.lead_minutes
        );

        let command = self.command.as_deref()?;
        match spawn(command, object, notification) {
            Ok(child) => {
                log::info!(
                    "Reminder {} hook spawned (PID: {})",
                    notification.id,
                    child.id()
                );
                let id = notification.id;
                Some(thread::spawn(move || monitor(child, id)))
            }
            Err(e) => {
                log::error!("Reminder {} hook failed to start: {e}", notification.id);
                None
            }
        }
    }
}

fn spawn(command: &str, object: &str, notification: &ScheduledNotification) -> io::Result<Child> {
    StdCommand::new("sh")
        .arg("-c")
        .arg(command)
        .env("PASSWATCH_SUBSCRIBER", &notification.subscriber)
        .env("PASSWATCH_OBJECT", object)
        .env("PASSWATCH_RISE", notification.rise.to_rfc3339())
        .env("PASSWATCH_FIRE", notification.fire_at.to_rfc3339())
        .env(
            "PASSWATCH_LEAD_MINUTES",
            notification.lead_minutes.to_string(),
        )
        .stdin(Stdio::null())
        .spawn()
}

fn monitor(mut child: Child, id: uuid::Uuid) {
    match child.wait() {
        Ok(status) if status.success() => log::info!("Reminder {id} hook completed"),
        Ok(status) => log::error!(
            "Reminder {id} hook failed with exit code: {}",
            status.code().unwrap_or(-1)
        ),
        Err(e) => log::error!("Reminder {id} hook wait error: {e}"),
    }
}
