//! # Bus configuration.
//!
//! [`BusConfig`] fixes the per-subscriber stream capacity at construction.
//! The capacity bounds how many undelivered events one subscriber may buffer
//! before publish tasks start suspending on it.
//!
//! # Example
//! ```
//! use feedbus::BusConfig;
//!
//! let mut cfg = BusConfig::default();
//! cfg.capacity = 256;
//! assert_eq!(cfg.capacity, 256);
//! ```

/// Construction-time configuration for a [`FeedbackBus`](crate::FeedbackBus).
#[derive(Clone, Copy, Debug)]
pub struct BusConfig {
    /// Capacity of each stream's per-subscriber buffer (clamped to >= 1).
    pub capacity: usize,
}

impl Default for BusConfig {
    /// Provides a default configuration:
    /// - `capacity = 1024`
    fn default() -> Self {
        Self { capacity: 1024 }
    }
}
