//! # feedbus
//!
//! **feedbus** is a lifecycle-managed telemetry bus: one object that accepts
//! two independent families of reportable events — measurements and discrete
//! actions — multicasts them to subscribers, and guarantees an orderly,
//! leak-free shutdown: no dropped in-flight publishes on a clean stop, no
//! dangling background work, no stream left open after teardown.
//!
//! ## Architecture
//! ```text
//!   producer A   producer B   producer C        (any number, no locking)
//!       │            │            │
//!       └──── report_metric / report_action / measure ────┐
//!                                                         ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  FeedbackBus (Uninitialized → Running → Stopped)                  │
//! │  - scope: child CancellationToken of the caller's context         │
//! │  - TaskTracker (registry of in-flight publish tasks)              │
//! │  - completion hook (closes both streams when the scope dies)      │
//! └──────────────┬───────────────────────────────┬────────────────────┘
//!                ▼                               ▼
//!     ┌─────────────────────┐         ┌─────────────────────┐
//!     │ MulticastStream     │         │ MulticastStream     │
//!     │ <Metric>            │         │ <Action>            │
//!     └──┬───────────┬──────┘         └──────────┬──────────┘
//!        ▼           ▼                           ▼
//!   Subscription  Subscription              Subscription
//!   (consumer 1)  (consumer 2)              (consumer N)
//! ```
//!
//! ## Lifecycle
//! ```text
//! FeedbackBus::new(cfg)          // Uninitialized; streams already exist
//!   ├─► on_start(cb)             // single slot, fires at start
//!   ├─► start(&parent_token)     // Running; scope = parent.child_token()
//!   │     ├─► report_metric / report_action   (one tracked task each)
//!   │     ├─► measure(desc, block)            (timestamps around block)
//!   │     └─► wait()                          (join in-flight publishes)
//!   └─► stop()                   // Stopped: wait → cancel → streams close
//! ```
//!
//! ## Guarantees
//! | Concern            | Contract                                                               |
//! |--------------------|------------------------------------------------------------------------|
//! | **Multicast**      | Every subscriber gets every event sent after it subscribed; no replay. |
//! | **Backpressure**   | A full subscriber queue suspends the publish task, never the reporter. |
//! | **Shutdown**       | `stop()` drains the tracker before cancelling the scope.               |
//! | **Cancellation**   | The scope is a child of the caller's token; parent death tears down.   |
//! | **Preconditions**  | Misuse fails fast: `AlreadyInitialized`, `NotStarted`.                 |
//!
//! ## Example
//! ```rust
//! use feedbus::{Action, BusConfig, FeedbackBus, Metric};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), feedbus::BusError> {
//!     let bus = FeedbackBus::new(BusConfig::default());
//!
//!     // Subscribe before start so no emission is missed.
//!     let mut metrics = bus.metrics().await;
//!     let mut actions = bus.actions().await;
//!
//!     bus.start(&CancellationToken::new())?;
//!
//!     bus.report_action(Action::new("session-opened"))?;
//!     let answer = bus.measure("compute", || 6 * 7)?;
//!     assert_eq!(answer, 42);
//!
//!     bus.wait().await;
//!     assert_eq!(actions.recv().await.unwrap().name.as_ref(), "session-opened");
//!     assert!(matches!(metrics.recv().await, Some(Metric::Time(_))));
//!
//!     bus.stop().await?;
//!     bus.ensure_stopped()?;
//!     Ok(())
//! }
//! ```

mod config;
mod core;
mod error;
mod events;

// ---- Public re-exports ----

pub use config::BusConfig;
pub use core::{FeedbackBus, TaskTracker};
pub use error::BusError;
pub use events::{Action, CountMetric, Metric, MulticastStream, Subscription, TimeMetric};
