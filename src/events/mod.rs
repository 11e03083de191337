//! Reportable events: payload types and the multicast stream.
//!
//! This module groups the event **data model** and the **stream** used to
//! fan events out to subscribers:
//! - [`Metric`], [`TimeMetric`], [`CountMetric`] — measurement payloads
//! - [`Action`] — discrete action payloads
//! - [`MulticastStream`], [`Subscription`] — bounded, closable fan-out channel
//!
//! ## Quick reference
//! - **Publishers**: tracked tasks spawned by
//!   [`FeedbackBus::report_metric`](crate::FeedbackBus::report_metric) /
//!   [`FeedbackBus::report_action`](crate::FeedbackBus::report_action).
//! - **Consumers**: whoever holds a [`Subscription`] obtained from
//!   [`FeedbackBus::metrics`](crate::FeedbackBus::metrics) /
//!   [`FeedbackBus::actions`](crate::FeedbackBus::actions).
//!
//! See `core/mod.rs` for the system-level wiring diagram.

mod action;
mod metric;
mod stream;

pub use action::Action;
pub use metric::{CountMetric, Metric, TimeMetric};
pub use stream::{MulticastStream, Subscription};

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

/// Global sequence counter shared by both payload families.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Returns the next globally unique, monotonically increasing sequence number.
///
/// Consumers can use `seq` to restore per-producer submission order when
/// events from several producers interleave on one stream.
pub(crate) fn next_seq() -> u64 {
    EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed)
}
