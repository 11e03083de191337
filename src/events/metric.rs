//! # Measurement payloads reported on the metrics stream.
//!
//! [`Metric`] is one of the two disjoint event families the bus multiplexes
//! (the other is [`Action`](crate::events::Action)). The bus treats metrics as
//! opaque beyond construction; all fields exist for consumers.
//!
//! ## Variants
//! - [`Metric::Time`] — a described start/end timestamp pair, normally built
//!   by [`FeedbackBus::measure`](crate::FeedbackBus::measure) around a
//!   synchronous block.
//! - [`Metric::Count`] — a named counter sample.
//!
//! ## Example
//! ```rust
//! use std::time::{Duration, SystemTime};
//! use feedbus::{Metric, TimeMetric};
//!
//! let started = SystemTime::now();
//! let ended = started + Duration::from_millis(25);
//! let m = Metric::time("load-config", started, ended);
//!
//! if let Metric::Time(tm) = &m {
//!     assert_eq!(tm.description.as_ref(), "load-config");
//!     assert_eq!(tm.elapsed(), Duration::from_millis(25));
//! }
//! ```

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use super::next_seq;

/// A measurement event.
///
/// Cheap to clone: string payloads are `Arc<str>`.
#[non_exhaustive]
#[derive(Clone, Debug)]
pub enum Metric {
    /// Elapsed time around a described synchronous block.
    Time(TimeMetric),
    /// A named counter sample.
    Count(CountMetric),
}

impl Metric {
    /// Builds a [`Metric::Time`] from a description and a timestamp pair.
    pub fn time(
        description: impl Into<Arc<str>>,
        started_at: SystemTime,
        ended_at: SystemTime,
    ) -> Self {
        Metric::Time(TimeMetric::new(description, started_at, ended_at))
    }

    /// Builds a [`Metric::Count`] from a name and a sampled value.
    pub fn count(name: impl Into<Arc<str>>, value: i64) -> Self {
        Metric::Count(CountMetric::new(name, value))
    }

    /// Global sequence number assigned at construction.
    pub fn seq(&self) -> u64 {
        match self {
            Metric::Time(m) => m.seq,
            Metric::Count(m) => m.seq,
        }
    }
}

/// A start/end timestamp pair around a described synchronous block.
#[derive(Clone, Debug)]
pub struct TimeMetric {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// What was measured.
    pub description: Arc<str>,
    /// Wall-clock timestamp taken before the block ran.
    pub started_at: SystemTime,
    /// Wall-clock timestamp taken after the block returned.
    pub ended_at: SystemTime,
}

impl TimeMetric {
    /// Creates a new time metric with the next global sequence number.
    pub fn new(
        description: impl Into<Arc<str>>,
        started_at: SystemTime,
        ended_at: SystemTime,
    ) -> Self {
        Self {
            seq: next_seq(),
            description: description.into(),
            started_at,
            ended_at,
        }
    }

    /// Elapsed wall-clock time between the two timestamps.
    ///
    /// Saturates to zero if the clock moved backwards between them.
    pub fn elapsed(&self) -> Duration {
        self.ended_at
            .duration_since(self.started_at)
            .unwrap_or(Duration::ZERO)
    }
}

/// A named counter sample.
#[derive(Clone, Debug)]
pub struct CountMetric {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp taken at construction.
    pub at: SystemTime,
    /// Counter name.
    pub name: Arc<str>,
    /// Sampled value.
    pub value: i64,
}

impl CountMetric {
    /// Creates a new counter sample with the next global sequence number.
    pub fn new(name: impl Into<Arc<str>>, value: i64) -> Self {
        Self {
            seq: next_seq(),
            at: SystemTime::now(),
            name: name.into(),
            value,
        }
    }
}
