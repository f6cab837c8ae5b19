//! # Rill Core
//!
//! The core of `Rill`, an embeddable event-time stream-processing engine.
//!
//! This crate provides:
//! - **Operators**: stateful single-input/single-output processing elements,
//!   centred on session-window aggregation
//! - **Aggregation**: a merge-compatible accumulator contract with built-in
//!   count/sum aggregators
//! - **Time**: event-time watermarks and late-event classification
//!
//! ## Design Principles
//!
//! 1. **Single-threaded cooperative** - one operator instance per input
//!    partition, driven synchronously by the host; no internal locking
//! 2. **Bounded memory** - state proportional to open windows; empty
//!    per-key state is reclaimed eagerly
//! 3. **Lazy emission** - completed windows are pulled by the host, so
//!    downstream backpressure never blocks ingestion state
//!
//! ## Example
//!
//! ```rust
//! use rill_core::operator::session_window::{SessionConfig, SessionWindowOperator};
//! use rill_core::operator::window::CountAggregator;
//!
//! let mut operator = SessionWindowOperator::new(SessionConfig {
//!     max_gap: 10,
//!     event_time: |e: &(&str, i64)| e.1,
//!     key: |e: &(&str, i64)| e.0.to_string(),
//!     aggregator: CountAggregator::new(),
//! })?;
//!
//! operator.on_event(&("a", 1));
//! operator.on_event(&("a", 5));
//! let sessions: Vec<_> = operator.on_watermark(1000).collect();
//! assert_eq!(sessions.len(), 1);
//! # Ok::<(), rill_core::Error>(())
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod operator;
pub mod time;

pub use operator::session_window::{SessionConfig, SessionWindowOperator};
pub use operator::window::Session;
pub use time::Watermark;

/// Result type for rill-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for rill-core
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Operator errors
    #[error("Operator error: {0}")]
    Operator(#[from] operator::OperatorError),
}
