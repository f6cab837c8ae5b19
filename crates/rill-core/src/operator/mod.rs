//! # Operator Module
//!
//! Streaming operators for transforming and processing events.
//!
//! Operators are stateful single-input/single-output processing elements.
//! The host runtime drives an operator strictly sequentially on one input
//! partition: it pushes items one at a time and pulls any resulting
//! emissions. Parallelism is achieved upstream by partitioning the stream
//! by key and instantiating independent operator copies per partition.

use crate::time::Watermark;

pub mod session_window;
pub mod window;

/// An item delivered by the upstream channel.
///
/// The input stream interleaves two item kinds: event payloads and
/// watermark markers asserting event-time progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem<T> {
    /// An event payload.
    Event(T),
    /// A watermark marker. Values are monotone non-decreasing; the host
    /// guarantees single-threaded delivery.
    Watermark(Watermark),
}

/// Errors that can occur in operators
#[derive(Debug, thiserror::Error)]
pub enum OperatorError {
    /// Session gap configuration outside the permitted range
    #[error("invalid session gap: {0} (must be non-negative)")]
    InvalidGap(i64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_item_kinds() {
        let event: StreamItem<i64> = StreamItem::Event(42);
        let mark: StreamItem<i64> = StreamItem::Watermark(Watermark::new(100));

        assert!(matches!(event, StreamItem::Event(42)));
        assert!(matches!(mark, StreamItem::Watermark(w) if w.timestamp() == 100));
    }

    #[test]
    fn test_invalid_gap_message() {
        let err = OperatorError::InvalidGap(-5);
        assert!(err.to_string().contains("-5"));
    }
}
