//! Notification delivery.
//!
//! [`NotificationService`] is the schedule/cancel seam the session talks to.
//! [`DesktopNotifier`] keeps scheduled items in memory and shows them through
//! the freedesktop notification daemon once they come due; the daemon loop
//! calls [`NotificationService::dispatch_due`] on every wakeup.

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use notify_rust::{Notification, Urgency};
use std::collections::BTreeMap;

use crate::common::constants::APP_NAME;

#[cfg_attr(test, mockall::automock)]
pub trait NotificationService: Send {
    /// Ask for permission to show notifications. `Ok(false)` means denied.
    fn request_permission(&mut self) -> Result<bool>;

    /// Schedule (or replace) the notification with this id.
    fn schedule(&mut self, id: &str, title: &str, body: &str, at: NaiveDateTime) -> Result<()>;

    fn cancel(&mut self, id: &str) -> Result<()>;

    /// Deliver everything due at `now`. Returns the ids delivered.
    fn dispatch_due(&mut self, now: NaiveDateTime) -> Result<Vec<String>>;

    /// Earliest pending delivery, if any.
    fn next_due(&self) -> Option<NaiveDateTime>;
}

#[derive(Debug, Clone, PartialEq)]
struct PendingNotification {
    title: String,
    body: String,
    at: NaiveDateTime,
}

#[derive(Debug, Default)]
pub struct DesktopNotifier {
    pending: BTreeMap<String, PendingNotification>,
}

impl DesktopNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    fn show(title: &str, body: &str) -> Result<()> {
        Notification::new()
            .summary(title)
            .body(body)
            .appname(APP_NAME)
            .icon("dialog-information")
            .urgency(Urgency::Normal)
            .show()
            .context("Failed to show desktop notification")?;
        Ok(())
    }
}

impl NotificationService for DesktopNotifier {
    fn request_permission(&mut self) -> Result<bool> {
        // A reachable notification server is the only permission a desktop has
        match notify_rust::get_server_information() {
            Ok(info) => {
                log_debug!("Notification server: {} {}", info.name, info.version);
                Ok(true)
            }
            Err(e) => {
                log_debug!("No notification server available: {}", e);
                Ok(false)
            }
        }
    }

    fn schedule(&mut self, id: &str, title: &str, body: &str, at: NaiveDateTime) -> Result<()> {
        self.pending.insert(
            id.to_string(),
            PendingNotification {
                title: title.to_string(),
                body: body.to_string(),
                at,
            },
        );
        Ok(())
    }

    fn cancel(&mut self, id: &str) -> Result<()> {
        self.pending.remove(id);
        Ok(())
    }

    fn dispatch_due(&mut self, now: NaiveDateTime) -> Result<Vec<String>> {
        let due: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, item)| item.at <= now)
            .map(|(id, _)| id.clone())
            .collect();

        let mut delivered = Vec::with_capacity(due.len());
        let mut failure = None;
        for id in due {
            let Some(item) = self.pending.remove(&id) else {
                continue;
            };
            match Self::show(&item.title, &item.body) {
                Ok(()) => delivered.push(id),
                Err(e) => failure = Some(e),
            }
        }

        match failure {
            Some(e) if delivered.is_empty() => Err(e),
            _ => Ok(delivered),
        }
    }

    fn next_due(&self) -> Option<NaiveDateTime> {
        self.pending.values().map(|item| item.at).min()
    }
}

/// Declines permission and drops everything.
///
/// One-shot commands use it while a daemon is running, so the daemon stays
/// the only process that schedules and records nudges.
#[derive(Debug, Default)]
pub struct DetachedNotifier;

impl NotificationService for DetachedNotifier {
    fn request_permission(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn schedule(&mut self, _id: &str, _title: &str, _body: &str, _at: NaiveDateTime) -> Result<()> {
        Ok(())
    }

    fn cancel(&mut self, _id: &str) -> Result<()> {
        Ok(())
    }

    fn dispatch_due(&mut self, _now: NaiveDateTime) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    fn next_due(&self) -> Option<NaiveDateTime> {
        None
    }
}
