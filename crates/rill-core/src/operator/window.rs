//! # Window Types and Aggregation Contract
//!
//! Shared building blocks for windowed operators:
//!
//! - [`Interval`]: a closed interval of event time, the identity of a
//!   session window
//! - [`Session`]: the emission unit produced when a window completes
//! - [`SessionAggregator`]: the four-operation aggregation contract
//!   (create / accumulate / combine / finish)
//!
//! ## Aggregation Contract
//!
//! An aggregator supplies a fresh accumulator per window, folds events into
//! it, merges two accumulators when an event bridges two windows, and
//! projects the final result at emission. `combine` must be associative and
//! consistent with `accumulate`: folding a multiset in any partition order
//! yields the same result.
//!
//! ```rust
//! use rill_core::operator::window::{CountAggregator, SessionAggregator};
//!
//! let agg = CountAggregator::new();
//! let mut acc = SessionAggregator::<&str>::create_accumulator(&agg);
//! agg.accumulate(&mut acc, &"click");
//! agg.accumulate(&mut acc, &"click");
//! assert_eq!(SessionAggregator::<&str>::finish(&agg, acc), 2);
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// A closed interval on the event-time line.
///
/// Session windows are identified by the interval they cover. Two intervals
/// overlap iff neither ends before the other starts; an interval whose end
/// exactly touches another's start counts as overlapping (closed bounds).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Interval {
    start: i64,
    end: i64,
}

impl Interval {
    /// Creates a new interval.
    ///
    /// # Panics
    ///
    /// Panics if `end < start`.
    #[must_use]
    pub fn new(start: i64, end: i64) -> Self {
        assert!(end >= start, "invalid interval [{start}..{end}]");
        Self { start, end }
    }

    /// Returns the inclusive lower bound.
    #[inline]
    #[must_use]
    pub fn start(&self) -> i64 {
        self.start
    }

    /// Returns the inclusive upper bound.
    #[inline]
    #[must_use]
    pub fn end(&self) -> i64 {
        self.end
    }

    /// Checks whether two intervals overlap.
    ///
    /// Bounds are closed: `[0, 5]` and `[5, 9]` overlap.
    #[inline]
    #[must_use]
    pub fn overlaps(&self, other: Self) -> bool {
        self.end >= other.start && other.end >= self.start
    }

    /// Checks whether this interval fully contains `inner`.
    #[inline]
    #[must_use]
    pub fn covers(&self, inner: Self) -> bool {
        self.start <= inner.start && self.end >= inner.end
    }

    /// Returns the smallest interval containing both inputs.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}..{}]", self.start, self.end)
    }
}

/// An aggregated session window, emitted once the window is complete.
///
/// `start` and `end` are the closed event-time bounds of the window;
/// `result` is the finished aggregation value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session<K, R> {
    /// Grouping key the session belongs to.
    pub key: K,
    /// Event-time lower bound (inclusive).
    pub start: i64,
    /// Event-time upper bound (inclusive, last event time + gap).
    pub end: i64,
    /// Finished aggregation result.
    pub result: R,
}

impl<K, R> Session<K, R> {
    /// Creates a new session record.
    #[must_use]
    pub fn new(key: K, start: i64, end: i64, result: R) -> Self {
        Self {
            key,
            start,
            end,
            result,
        }
    }
}

/// The aggregation contract applied within session windows.
///
/// Four operations over an accumulator type `Acc`:
///
/// - [`create_accumulator`](Self::create_accumulator) supplies a fresh,
///   independent accumulator per window
/// - [`accumulate`](Self::accumulate) folds one event into an accumulator
///   (called exactly once per accepted event)
/// - [`combine`](Self::combine) merges two accumulators when an event
///   bridges two previously disjoint windows; it consumes both inputs so
///   neither can be aliased after the merge
/// - [`finish`](Self::finish) projects an accumulator to the emitted result
///
/// `combine` must be associative, and for any partition of an event multiset
/// into `S1` and `S2`, `combine(fold(S1), fold(S2))` must equal
/// `fold(S1 ∪ S2)` up to the equivalence the caller cares about. The
/// operator relies on this only when merging windows; it never combines
/// speculatively.
pub trait SessionAggregator<T> {
    /// Mutable per-window state that absorbs events.
    type Acc;
    /// Result type emitted for a completed window.
    type Output;

    /// Creates a new empty accumulator.
    fn create_accumulator(&self) -> Self::Acc;

    /// Folds one event into the accumulator.
    fn accumulate(&self, acc: &mut Self::Acc, event: &T);

    /// Merges two accumulators into one, consuming both.
    fn combine(&self, lower: Self::Acc, upper: Self::Acc) -> Self::Acc;

    /// Projects the accumulator to its final result.
    fn finish(&self, acc: Self::Acc) -> Self::Output;
}

/// Count aggregator - counts the number of events in a session.
#[derive(Debug, Clone, Copy, Default)]
pub struct CountAggregator;

impl CountAggregator {
    /// Creates a new count aggregator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl<T> SessionAggregator<T> for CountAggregator {
    type Acc = u64;
    type Output = u64;

    fn create_accumulator(&self) -> u64 {
        0
    }

    fn accumulate(&self, acc: &mut u64, _event: &T) {
        *acc += 1;
    }

    fn combine(&self, lower: u64, upper: u64) -> u64 {
        lower + upper
    }

    fn finish(&self, acc: u64) -> u64 {
        acc
    }
}

/// Sum aggregator - sums an `i64` value projected from each event.
#[derive(Debug, Clone)]
pub struct SumAggregator<F> {
    extract: F,
}

impl<F> SumAggregator<F> {
    /// Creates a sum aggregator over the given value projection.
    #[must_use]
    pub fn new(extract: F) -> Self {
        Self { extract }
    }
}

impl<T, F> SessionAggregator<T> for SumAggregator<F>
where
    F: Fn(&T) -> i64,
{
    type Acc = i64;
    type Output = i64;

    fn create_accumulator(&self) -> i64 {
        0
    }

    fn accumulate(&self, acc: &mut i64, event: &T) {
        *acc += (self.extract)(event);
    }

    fn combine(&self, lower: i64, upper: i64) -> i64 {
        lower + upper
    }

    fn finish(&self, acc: i64) -> i64 {
        acc
    }
}

/// Aggregator assembled from four closures.
///
/// Mirrors the collector shape used by fluent aggregation APIs: a supplier,
/// an accumulator function, a combiner, and a finisher. Useful when a
/// one-off aggregation does not warrant a named type.
///
/// ```rust
/// use rill_core::operator::window::{FnAggregator, SessionAggregator};
///
/// // Track the maximum value seen per session
/// let agg = FnAggregator::new(
///     || i64::MIN,
///     |acc: &mut i64, event: &i64| *acc = (*acc).max(*event),
///     |a: i64, b: i64| a.max(b),
///     |acc: i64| acc,
/// );
///
/// let mut acc = agg.create_accumulator();
/// agg.accumulate(&mut acc, &3);
/// agg.accumulate(&mut acc, &7);
/// assert_eq!(agg.finish(acc), 7);
/// ```
#[derive(Debug, Clone)]
pub struct FnAggregator<S, AF, CF, FF> {
    supplier: S,
    accumulate: AF,
    combine: CF,
    finish: FF,
}

impl<S, AF, CF, FF> FnAggregator<S, AF, CF, FF> {
    /// Creates an aggregator from supplier, accumulator, combiner and
    /// finisher closures.
    #[must_use]
    pub fn new(supplier: S, accumulate: AF, combine: CF, finish: FF) -> Self {
        Self {
            supplier,
            accumulate,
            combine,
            finish,
        }
    }
}

impl<T, A, R, S, AF, CF, FF> SessionAggregator<T> for FnAggregator<S, AF, CF, FF>
where
    S: Fn() -> A,
    AF: Fn(&mut A, &T),
    CF: Fn(A, A) -> A,
    FF: Fn(A) -> R,
{
    type Acc = A;
    type Output = R;

    fn create_accumulator(&self) -> A {
        (self.supplier)()
    }

    fn accumulate(&self, acc: &mut A, event: &T) {
        (self.accumulate)(acc, event);
    }

    fn combine(&self, lower: A, upper: A) -> A {
        (self.combine)(lower, upper)
    }

    fn finish(&self, acc: A) -> R {
        (self.finish)(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interval_bounds() {
        let iv = Interval::new(5, 15);
        assert_eq!(iv.start(), 5);
        assert_eq!(iv.end(), 15);
    }

    #[test]
    fn test_interval_zero_length() {
        let iv = Interval::new(7, 7);
        assert!(iv.overlaps(iv));
        assert_eq!(iv.to_string(), "[7..7]");
    }

    #[test]
    #[should_panic(expected = "invalid interval")]
    fn test_interval_inverted_bounds() {
        let _ = Interval::new(10, 9);
    }

    #[test]
    fn test_interval_overlap() {
        let a = Interval::new(0, 5);
        let b = Interval::new(4, 9);
        let c = Interval::new(8, 12);

        assert!(a.overlaps(b));
        assert!(b.overlaps(a));
        assert!(b.overlaps(c));
        // Overlap is not transitive
        assert!(!a.overlaps(c));
    }

    #[test]
    fn test_interval_touching_bounds_overlap() {
        // Closed intervals: an exact touch is an overlap
        let a = Interval::new(0, 5);
        let b = Interval::new(5, 10);
        assert!(a.overlaps(b));

        let c = Interval::new(6, 10);
        assert!(!a.overlaps(c));
    }

    #[test]
    fn test_interval_covers() {
        let outer = Interval::new(0, 10);
        assert!(outer.covers(Interval::new(2, 8)));
        assert!(outer.covers(outer));
        assert!(!outer.covers(Interval::new(2, 11)));
        assert!(!Interval::new(2, 8).covers(outer));
    }

    #[test]
    fn test_interval_union() {
        let a = Interval::new(0, 5);
        let b = Interval::new(3, 9);
        assert_eq!(a.union(b), Interval::new(0, 9));
        assert_eq!(b.union(a), Interval::new(0, 9));

        // Union of disjoint intervals spans the gap
        let c = Interval::new(20, 25);
        assert_eq!(a.union(c), Interval::new(0, 25));
    }

    #[test]
    fn test_interval_display() {
        assert_eq!(Interval::new(1, 11).to_string(), "[1..11]");
    }

    #[test]
    fn test_session_record() {
        let session = Session::new("a", 1, 18, 3u64);
        assert_eq!(session.key, "a");
        assert_eq!(session.start, 1);
        assert_eq!(session.end, 18);
        assert_eq!(session.result, 3);
    }

    #[test]
    fn test_count_aggregator() {
        let agg = CountAggregator::new();
        let mut acc = SessionAggregator::<&str>::create_accumulator(&agg);
        agg.accumulate(&mut acc, &"x");
        agg.accumulate(&mut acc, &"y");

        let other = {
            let mut acc = SessionAggregator::<&str>::create_accumulator(&agg);
            agg.accumulate(&mut acc, &"z");
            acc
        };

        assert_eq!(
            SessionAggregator::<&str>::finish(&agg, SessionAggregator::<&str>::combine(&agg, acc, other)),
            3
        );
    }

    #[test]
    fn test_sum_aggregator() {
        let agg = SumAggregator::new(|e: &(i64, i64)| e.1);
        let mut acc = agg.create_accumulator();
        agg.accumulate(&mut acc, &(0, 10));
        agg.accumulate(&mut acc, &(0, 20));
        assert_eq!(agg.finish(acc), 30);
    }

    #[test]
    #[allow(clippy::cast_precision_loss)]
    fn test_fn_aggregator_mean() {
        let agg = FnAggregator::new(
            || (0i64, 0u64),
            |acc: &mut (i64, u64), event: &i64| {
                acc.0 += *event;
                acc.1 += 1;
            },
            |a: (i64, u64), b: (i64, u64)| (a.0 + b.0, a.1 + b.1),
            |acc: (i64, u64)| {
                if acc.1 == 0 {
                    0.0
                } else {
                    acc.0 as f64 / acc.1 as f64
                }
            },
        );

        let mut left = agg.create_accumulator();
        agg.accumulate(&mut left, &10);
        let mut right = agg.create_accumulator();
        agg.accumulate(&mut right, &20);
        agg.accumulate(&mut right, &30);

        let merged = agg.combine(left, right);
        assert!((agg.finish(merged) - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_fresh_accumulators_are_independent() {
        let agg = CountAggregator::new();
        let mut a = SessionAggregator::<()>::create_accumulator(&agg);
        let b = SessionAggregator::<()>::create_accumulator(&agg);
        agg.accumulate(&mut a, &());
        assert_eq!(SessionAggregator::<()>::finish(&agg, a), 1);
        assert_eq!(SessionAggregator::<()>::finish(&agg, b), 0);
    }
}
