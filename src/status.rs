//! User-visible conversion status.
//!
//! A [`StatusBoard`] overwrites a single status display (a [`StatusSink`])
//! and clears it again after a delay. At most one clear is pending at a
//! time: showing a new status cancels it, so a stale timer never wipes a
//! newer message.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::task::JoinHandle;

/// Delay before a success status is cleared.
pub const SUCCESS_CLEAR_DELAY: Duration = Duration::from_secs(3);
/// Delay before an error status is cleared.
pub const ERROR_CLEAR_DELAY: Duration = Duration::from_secs(5);

const BASE_CLASS: &str = "download-status";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Loading,
    Success,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Info => "info",
            Severity::Loading => "loading",
            Severity::Success => "success",
            Severity::Error => "error",
        })
    }
}

/// What the status display shows. A cleared status has no severity and an
/// empty message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub message: String,
    pub severity: Option<Severity>,
}

impl Status {
    pub fn new(message: impl Into<String>, severity: Severity) -> Self {
        Self {
            message: message.into(),
            severity: Some(severity),
        }
    }

    pub fn cleared() -> Self {
        Self {
            message: String::new(),
            severity: None,
        }
    }

    pub fn is_cleared(&self) -> bool {
        self.severity.is_none() && self.message.is_empty()
    }

    /// Class list for the display, e.g. `download-status loading`.
    pub fn css_class(&self) -> String {
        match self.severity {
            Some(s) => format!("{BASE_CLASS} {s}"),
            None => BASE_CLASS.to_string(),
        }
    }
}

/// A display that shows one status at a time.
pub trait StatusSink: Send + Sync {
    fn display(&self, status: &Status);
}

/// Records every status it is given.
#[derive(Debug, Default)]
pub struct MemorySink {
    history: Mutex<Vec<Status>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<Status> {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// What the display currently shows.
    pub fn current(&self) -> Status {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last()
            .cloned()
            .unwrap_or_else(Status::cleared)
    }
}

impl StatusSink for MemorySink {
    fn display(&self, status: &Status) {
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(status.clone());
    }
}

/// Prints statuses to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleSink;

impl StatusSink for ConsoleSink {
    fn display(&self, status: &Status) {
        if !status.is_cleared() {
            eprintln!("[{}] {}", status.css_class(), status.message);
        }
    }
}

/// Shared handle to the status display and its pending clear.
#[derive(Clone, Default)]
pub struct StatusBoard {
    sink: Option<Arc<dyn StatusSink>>,
    pending_clear: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl StatusBoard {
    pub fn new(sink: Arc<dyn StatusSink>) -> Self {
        Self {
            sink: Some(sink),
            pending_clear: Arc::default(),
        }
    }

    /// A board with no display. Statuses are still logged.
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn has_sink(&self) -> bool {
        self.sink.is_some()
    }

    /// Show `message`, cancelling any pending clear.
    pub fn show(&self, message: &str, severity: Severity) {
        self.cancel_pending();
        match severity {
            Severity::Error => log::error!("[PDF] {message}"),
            _ => log::info!("[PDF] {message}"),
        }
        if let Some(sink) = &self.sink {
            sink.display(&Status::new(message, severity));
        }
    }

    /// Clear the display after `delay`, replacing any pending clear.
    pub fn schedule_clear(&self, delay: Duration) {
        self.cancel_pending();
        let Some(sink) = self.sink.clone() else {
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            log::warn!("No async runtime; status will not be cleared");
            return;
        };
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            log::debug!("[PDF] status cleared");
            sink.display(&Status::cleared());
        });
        *self
            .pending_clear
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Whether a clear is scheduled and has not run yet.
    pub fn clear_pending(&self) -> bool {
        self.pending_clear
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .is_some_and(|h| !h.is_finished())
    }

    fn cancel_pending(&self) {
        let pending = self
            .pending_clear
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = pending {
            handle.abort();
        }
    }
}
