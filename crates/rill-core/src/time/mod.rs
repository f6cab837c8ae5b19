//! # Time Module
//!
//! Event time processing and watermarks.
//!
//! ## Concepts
//!
//! - **Event Time**: Timestamp carried by the event itself, independent of
//!   wall clock
//! - **Watermark**: Assertion that no events with timestamp < watermark will
//!   arrive
//!
//! Watermarks arrive as explicit items in the input stream; operators keep
//! the highest value seen and classify events against it.
//!
//! ```rust
//! use rill_core::time::Watermark;
//!
//! let mut watermark = Watermark::default();
//! assert!(watermark.advance_to(1000));
//!
//! // A regressing value is ignored, not an error
//! assert!(!watermark.advance_to(400));
//! assert_eq!(watermark.timestamp(), 1000);
//! ```

/// A watermark indicating event time progress.
///
/// Watermarks are monotonically non-decreasing assertions that no events with
/// timestamps earlier than the watermark will arrive. They are used to:
///
/// - Trigger window emissions
/// - Detect late events
///
/// # Example
///
/// ```rust
/// use rill_core::time::Watermark;
///
/// let watermark = Watermark::new(1000);
///
/// // Check if an event is late
/// assert!(watermark.is_late(999));  // Before watermark
/// assert!(!watermark.is_late(1000)); // At watermark
/// assert!(!watermark.is_late(1001)); // After watermark
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(pub i64);

impl Watermark {
    /// Creates a new watermark with the given timestamp.
    #[inline]
    #[must_use]
    pub fn new(timestamp: i64) -> Self {
        Self(timestamp)
    }

    /// Returns the watermark timestamp.
    #[inline]
    #[must_use]
    pub fn timestamp(&self) -> i64 {
        self.0
    }

    /// Checks if an event is late relative to this watermark.
    ///
    /// An event is considered late if its timestamp is strictly less than
    /// the watermark timestamp.
    #[inline]
    #[must_use]
    pub fn is_late(&self, event_time: i64) -> bool {
        event_time < self.0
    }

    /// Advances the watermark to the given timestamp.
    ///
    /// Returns `true` if the watermark advanced. A lower or equal timestamp
    /// leaves the watermark unchanged and returns `false`; regressions are
    /// ignored rather than treated as errors.
    #[inline]
    pub fn advance_to(&mut self, timestamp: i64) -> bool {
        if timestamp > self.0 {
            self.0 = timestamp;
            true
        } else {
            false
        }
    }
}

impl Default for Watermark {
    fn default() -> Self {
        Self(i64::MIN)
    }
}
