//! User-facing notifications
//!
//! Coarse lifecycle milestones ("waiting for SSH", "elastic IP deallocated")
//! go to a [`Notifier`] supplied by the caller; structured diagnostics go to
//! `tracing`. Passing the sink explicitly keeps the pipeline testable without
//! environment fixtures.

use std::sync::Mutex;

/// Sink for user-facing progress notifications
pub trait Notifier: Send + Sync {
    /// Report a milestone to the user
    fn info(&self, message: &str);
}

/// Notifier that forwards messages to the tracing pipeline
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl Notifier for TracingNotifier {
    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// Notifier that buffers messages in memory
///
/// Useful for assertions in tests and for callers that render progress
/// themselves.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    /// Create an empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// The messages received so far, in order
    pub fn messages(&self) -> Vec<String> {
        self.messages
            .lock()
            .expect("notifier buffer poisoned")
            .clone()
    }
}

impl Notifier for RecordingNotifier {
    fn info(&self, message: &str) {
        self.messages
            .lock()
            .expect("notifier buffer poisoned")
            .push(message.to_string());
    }
}
