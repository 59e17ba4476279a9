//! User-facing notifications.

use std::fmt;

/// How serious a notification is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Error,
}

/// A message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub severity: Severity,
    pub message: String,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Queue of notifications waiting to be shown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Notifications {
    entries: Vec<Notice>,
}

impl Notifications {
    pub fn info(&mut self, message: impl Into<String>) {
        self.push(Severity::Info, message.into());
    }

    /// Record an error and log it.
    pub fn error(&mut self, error: &impl fmt::Display) {
        let message = error.to_string();
        tracing::warn!("{message}");
        self.push(Severity::Error, message);
    }

    fn push(&mut self, severity: Severity, message: String) {
        self.entries.push(Notice { severity, message });
    }

    pub fn entries(&self) -> &[Notice] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Remove the notice at `index`, if present.
    pub fn dismiss(&mut self, index: usize) {
        if index < self.entries.len() {
            self.entries.remove(index);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
