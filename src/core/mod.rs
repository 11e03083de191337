//! Bus core: lifecycle orchestration and publish tracking.
//!
//! The only public API from this module is [`FeedbackBus`] and the
//! [`TaskTracker`] it owns. The bus wires the pieces together:
//!
//! ```text
//! producers                 FeedbackBus                     consumers
//! ─────────                 ───────────                     ─────────
//! report_metric(m) ──┐
//! report_action(a) ──┼─► spawn tracked publish ──► MulticastStream ──► Subscription
//! measure(d, f)    ──┘        │                        ▲
//!                             ▼                        │ close (exactly once)
//!                        TaskTracker                   │
//!                             ▲                  completion hook
//!                             │ wait()                 ▲
//! stop() ───► wait tracker ───┴──► cancel scope ───────┘
//! ```
//!
//! Internal modules:
//! - [`bus`]: the `Uninitialized → Running → Stopped` state machine, the
//!   cancellation scope, and the reporting operations;
//! - [`tracker`]: concurrency-safe registry of in-flight publish tasks.

mod bus;
mod tracker;

pub use bus::FeedbackBus;
pub use tracker::TaskTracker;
