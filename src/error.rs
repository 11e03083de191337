//! Error types for the feedback bus.
//!
//! One enum, [`BusError`], covers the whole taxonomy:
//!
//! - [`BusError::AlreadyInitialized`] / [`BusError::NotStarted`] — lifecycle
//!   precondition violations; programmer errors, raised synchronously to the
//!   caller and never retried.
//! - [`BusError::StreamClosed`] — a publish raced a concurrent close; only
//!   ever observed inside the spawned publish task, since reporting is
//!   fire-and-forget.
//! - [`BusError::StillActive`] — diagnostic from
//!   [`FeedbackBus::ensure_stopped`](crate::FeedbackBus::ensure_stopped),
//!   naming every piece of the bus that has not shut down yet.

use thiserror::Error;

/// Errors produced by the feedback bus and its streams.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum BusError {
    /// `start()` was called more than once over the bus lifetime.
    #[error("feedback bus already started")]
    AlreadyInitialized,

    /// A reporting or lifecycle operation ran before `start()`.
    #[error("feedback bus not started")]
    NotStarted,

    /// A send hit a stream that was already closed.
    #[error("stream is closed for send")]
    StreamClosed,

    /// Shutdown is incomplete; lists every part still live.
    #[error("feedback bus still active: {}", reasons.join(", "))]
    StillActive {
        /// Which of {metrics stream, actions stream, scope, reporting tasks}
        /// has not shut down.
        reasons: Vec<&'static str>,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use feedbus::BusError;
    ///
    /// assert_eq!(BusError::NotStarted.as_label(), "bus_not_started");
    /// assert_eq!(BusError::StreamClosed.as_label(), "stream_closed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::AlreadyInitialized => "bus_already_initialized",
            BusError::NotStarted => "bus_not_started",
            BusError::StreamClosed => "stream_closed",
            BusError::StillActive { .. } => "bus_still_active",
        }
    }
}
