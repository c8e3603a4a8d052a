// ============================================
// File: crates/swgp-common/src/time.rs
// ============================================
//! # Time Utilities
//!
//! ## Creation Reason
//! Sessions are touched by the inbound loop and by their own reader task,
//! and read by the idle sweep. An atomic timestamp lets all three do that
//! without a lock.
//!
//! ## Main Functionality
//! - `AtomicInstant`: Thread-safe wrapper around `Instant`
//!
//! ## ⚠️ Important Note for Next Developer
//! - `AtomicInstant` stores nanoseconds since a process-wide reference instant
//! - Overflow happens after ~584 years of uptime
//!
//! ## Last Modified
//! v0.1.0 - Initial time utilities

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

// ============================================
// AtomicInstant
// ============================================

/// Thread-safe wrapper around [`Instant`] for concurrent access.
///
/// # Example
/// ```
/// use swgp_common::time::AtomicInstant;
/// use std::time::{Duration, Instant};
///
/// let atomic = AtomicInstant::now();
/// atomic.store(Instant::now());
/// assert!(!atomic.has_elapsed(Duration::from_secs(60)));
/// ```
#[derive(Debug)]
pub struct AtomicInstant {
    /// Nanoseconds since the reference instant
    nanos: AtomicU64,
}

impl AtomicInstant {
    /// Reference instant (lazily initialized on first use).
    fn reference() -> Instant {
        static REFERENCE: OnceLock<Instant> = OnceLock::new();
        *REFERENCE.get_or_init(Instant::now)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn nanos_since_reference(instant: Instant) -> u64 {
        instant
            .checked_duration_since(Self::reference())
            .map_or(0, |d| d.as_nanos() as u64)
    }

    /// Creates a new `AtomicInstant` set to the current time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_instant(Instant::now())
    }

    /// Creates a new `AtomicInstant` from an `Instant`.
    #[must_use]
    pub fn from_instant(instant: Instant) -> Self {
        Self {
            nanos: AtomicU64::new(Self::nanos_since_reference(instant)),
        }
    }

    /// Loads the stored instant.
    #[must_use]
    pub fn load(&self) -> Instant {
        let nanos = self.nanos.load(Ordering::Relaxed);
        Self::reference() + Duration::from_nanos(nanos)
    }

    /// Stores a new instant.
    pub fn store(&self, instant: Instant) {
        self.nanos
            .store(Self::nanos_since_reference(instant), Ordering::Relaxed);
    }

    /// Updates to the current time and returns the previous value.
    pub fn touch(&self) -> Instant {
        let old = self.load();
        self.store(Instant::now());
        old
    }

    /// Returns the elapsed time since the stored instant.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.load().elapsed()
    }

    /// Checks if more than `duration` has elapsed since the stored instant.
    #[must_use]
    pub fn has_elapsed(&self, duration: Duration) -> bool {
        self.elapsed() > duration
    }
}

impl Default for AtomicInstant {
    fn default() -> Self {
        Self::now()
    }
}

impl Clone for AtomicInstant {
    fn clone(&self) -> Self {
        Self {
            nanos: AtomicU64::new(self.nanos.load(Ordering::Relaxed)),
        }
    }
}

// ============================================
// Tests
// ============================================
