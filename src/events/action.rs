//! # Discrete action payloads reported on the actions stream.
//!
//! [`Action`] records that something happened, as opposed to
//! [`Metric`](crate::events::Metric) which records how long or how much.
//! The bus never inspects actions; all fields exist for consumers.
//!
//! ## Example
//! ```rust
//! use feedbus::Action;
//!
//! let a = Action::new("button-clicked").with_detail("settings/save");
//! assert_eq!(a.name.as_ref(), "button-clicked");
//! assert_eq!(a.detail.as_deref(), Some("settings/save"));
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use super::next_seq;

/// A discrete action event with optional detail.
///
/// Cheap to clone: string payloads are `Arc<str>`.
#[derive(Clone, Debug)]
pub struct Action {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp taken at construction.
    pub at: SystemTime,
    /// What happened.
    pub name: Arc<str>,
    /// Optional free-form detail.
    pub detail: Option<Arc<str>>,
}

impl Action {
    /// Creates a new action with the next global sequence number.
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self {
            seq: next_seq(),
            at: SystemTime::now(),
            name: name.into(),
            detail: None,
        }
    }

    /// Attaches a free-form detail string.
    #[inline]
    pub fn with_detail(mut self, detail: impl Into<Arc<str>>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}
