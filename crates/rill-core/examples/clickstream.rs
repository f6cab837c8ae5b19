//! Clickstream session demo.
//!
//! Feeds a small out-of-order click stream through a session window
//! operator and prints one line per completed visit.
//!
//! Run with: cargo run --example clickstream

use rill_core::operator::session_window::{SessionConfig, SessionWindowOperator};
use rill_core::operator::window::CountAggregator;
use rill_core::operator::StreamItem;
use rill_core::time::Watermark;

/// A click: (user, event-time in ms).
type Click = (&'static str, i64);

fn main() -> rill_core::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let mut operator = SessionWindowOperator::new(SessionConfig {
        max_gap: 30_000, // a visit ends after 30s of inactivity
        event_time: |c: &Click| c.1,
        key: |c: &Click| c.0,
        aggregator: CountAggregator::new(),
    })?;

    let stream = vec![
        StreamItem::Event(("alice", 1_000)),
        StreamItem::Event(("bob", 4_000)),
        StreamItem::Event(("alice", 12_000)),
        // Out of order, but above the watermark: still accepted
        StreamItem::Event(("alice", 8_000)),
        StreamItem::Watermark(Watermark::new(30_000)),
        // Below the watermark: dropped as late
        StreamItem::Event(("carol", 5_000)),
        StreamItem::Event(("bob", 90_000)),
        StreamItem::Event(("alice", 95_000)),
        StreamItem::Watermark(Watermark::new(200_000)),
    ];

    for item in stream {
        for session in operator.on_item(item) {
            println!(
                "user {:<6} clicked {} time(s) in [{}ms .. {}ms]",
                session.key, session.result, session.start, session.end
            );
        }
    }

    println!(
        "dropped {} late event(s), emitted {} session(s)",
        operator.metrics().late_events_dropped(),
        operator.metrics().sessions_emitted()
    );
    Ok(())
}
