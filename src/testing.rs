//! Test doubles shared by unit and integration tests.
//!
//! Compiled for `cfg(test)` and with the `testing-support` feature, which the
//! crate enables for its own integration tests.

use anyhow::Result;
use chrono::NaiveDateTime;
use std::sync::{Arc, Mutex};

use crate::nudge::NotificationService;

/// One notification handed to the service.
#[derive(Debug, Clone, PartialEq)]
pub struct Scheduled {
    pub id: String,
    pub title: String,
    pub body: String,
    pub at: NaiveDateTime,
}

/// In-memory notification service that records what it was asked to do.
///
/// Clones share the same log, so a test keeps one handle and gives the other
/// to the session.
#[derive(Debug, Clone)]
pub struct RecordingNotifier {
    granted: bool,
    pending: Arc<Mutex<Vec<Scheduled>>>,
    delivered: Arc<Mutex<Vec<Scheduled>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::with_permission(true)
    }

    pub fn with_permission(granted: bool) -> Self {
        Self {
            granted,
            pending: Arc::default(),
            delivered: Arc::default(),
        }
    }

    /// Notifications scheduled and not yet delivered or cancelled.
    pub fn pending(&self) -> Vec<Scheduled> {
        self.pending.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn pending_at(&self, id: &str) -> Option<NaiveDateTime> {
        self.pending().into_iter().find(|s| s.id == id).map(|s| s.at)
    }

    /// Everything delivered so far, in delivery order.
    pub fn delivered(&self) -> Vec<Scheduled> {
        self.delivered.lock().map(|d| d.clone()).unwrap_or_default()
    }

    pub fn delivered_ids(&self) -> Vec<String> {
        self.delivered().into_iter().map(|s| s.id).collect()
    }
}

impl Default for RecordingNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl NotificationService for RecordingNotifier {
    fn request_permission(&mut self) -> Result<bool> {
        Ok(self.granted)
    }

    fn schedule(&mut self, id: &str, title: &str, body: &str, at: NaiveDateTime) -> Result<()> {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|s| s.id != id);
            pending.push(Scheduled {
                id: id.to_string(),
                title: title.to_string(),
                body: body.to_string(),
                at,
            });
        }
        Ok(())
    }

    fn cancel(&mut self, id: &str) -> Result<()> {
        if let Ok(mut pending) = self.pending.lock() {
            pending.retain(|s| s.id != id);
        }
        Ok(())
    }

    fn dispatch_due(&mut self, now: NaiveDateTime) -> Result<Vec<String>> {
        let Ok(mut pending) = self.pending.lock() else {
            return Ok(Vec::new());
        };
        let (mut due, later): (Vec<_>, Vec<_>) = pending.drain(..).partition(|s| s.at <= now);
        *pending = later;
        due.sort_by_key(|s| s.at);

        let ids = due.iter().map(|s| s.id.clone()).collect();
        if let Ok(mut delivered) = self.delivered.lock() {
            delivered.extend(due);
        }
        Ok(ids)
    }

    fn next_due(&self) -> Option<NaiveDateTime> {
        self.pending().iter().map(|s| s.at).min()
    }
}
