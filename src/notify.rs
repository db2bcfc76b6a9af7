//! Transient notifications shown above the input line.
//!
//! Every notification carries its own expiry and disappears once it passes.

use std::time::{Duration, Instant};

pub const UNKNOWN_ERROR: &str = "An unknown error occurred";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: Level,
    pub text: String,
    expires_at: Instant,
}

#[derive(Debug)]
pub struct Notifications {
    ttl: Duration,
    entries: Vec<Notification>,
}

impl Notifications {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, level: Level, text: impl Into<String>, now: Instant) {
        self.entries.push(Notification {
            level,
            text: text.into(),
            expires_at: now + self.ttl,
        });
    }

    /// Pushes an error, substituting a generic text when the description is blank.
    pub fn error(&mut self, description: &str, now: Instant) {
        let text = if description.trim().is_empty() {
            UNKNOWN_ERROR
        } else {
            description
        };
        self.push(Level::Error, text, now);
    }

    /// Drops expired entries and returns what is still visible.
    pub fn active(&mut self, now: Instant) -> &[Notification] {
        self.entries.retain(|n| n.expires_at > now);
        &self.entries
    }

    pub fn next_expiry(&self) -> Option<Instant> {
        self.entries.iter().map(|n| n.expires_at).min()
    }

    /// Removes and returns every entry regardless of expiry.
    pub fn take_all(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.entries)
    }
}
