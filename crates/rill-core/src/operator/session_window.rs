//! # Session Window Operator
//!
//! Aggregates events into session windows: dynamic intervals of event time
//! within which consecutive events for one key arrive no further apart than
//! a configured gap. Events and windows under different keys are completely
//! independent.
//!
//! The operator is easiest to explain in terms of the *event interval*
//! `[t, t + max_gap]`. An event initially opens a window covering exactly
//! its interval. A following event for the same key belongs to that window
//! iff its interval overlaps it, and the window is extended to cover the
//! entire new interval. An event whose interval bridges the gap between two
//! existing windows causes them to be combined into one.
//!
//! ```text
//! max_gap: 10
//!
//! Events: [t=1] [t=5] [t=8]   ...gap...   [t=100]
//!         |<-- session [1..18] -->|       |<- session [100..110] ->|
//! ```
//!
//! ## Completion and Emission
//!
//! A window is complete once the watermark passes its end. Watermarks are
//! delivered as explicit input items; [`SessionWindowOperator::on_watermark`]
//! advances the threshold and returns a [`SessionDrain`], a lazy iterator
//! over the completed sessions. The drain removes windows as it yields, so
//! the host can stop pulling under backpressure and resume later from the
//! same position via [`SessionWindowOperator::expired_sessions`].
//!
//! ## Usage
//!
//! ```rust
//! use rill_core::operator::session_window::{SessionConfig, SessionWindowOperator};
//! use rill_core::operator::window::CountAggregator;
//!
//! let mut operator = SessionWindowOperator::new(SessionConfig {
//!     max_gap: 30,
//!     event_time: |e: &(u64, i64)| e.1,
//!     key: |e: &(u64, i64)| e.0,
//!     aggregator: CountAggregator::new(),
//! })?;
//!
//! operator.on_event(&(7, 100));
//! operator.on_event(&(7, 120));
//! for session in operator.on_watermark(1_000) {
//!     println!("user {} active in [{}..{}]", session.key, session.start, session.end);
//! }
//! # Ok::<(), rill_core::operator::OperatorError>(())
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;

use fxhash::{FxHashMap, FxHashSet};
use serde::Serialize;
use smallvec::SmallVec;
use tracing::{debug, trace};

use super::window::{Interval, Session, SessionAggregator};
use super::{OperatorError, StreamItem};
use crate::time::Watermark;

/// At most two stored windows can overlap one event interval: stored
/// intervals are at least as long as the event interval and pairwise
/// disjoint.
type OverlapVec = SmallVec<[Interval; 2]>;

/// Configuration for a [`SessionWindowOperator`], fixed at construction.
#[derive(Debug, Clone)]
pub struct SessionConfig<TF, KF, A> {
    /// Maximum permissible gap between consecutive event times in the same
    /// session. `0` is allowed and produces single-instant windows.
    pub max_gap: i64,
    /// Projection from an event to its event-time coordinate.
    pub event_time: TF,
    /// Projection from an event to its grouping key.
    pub key: KF,
    /// Aggregation contract applied within each window.
    pub aggregator: A,
}

/// Counters describing operator activity.
///
/// Late-event drops are policy, not errors; the counter gives hosts
/// visibility without a side channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_field_names)]
pub struct SessionMetrics {
    sessions_started: u64,
    sessions_extended: u64,
    sessions_merged: u64,
    sessions_emitted: u64,
    late_events_dropped: u64,
}

impl SessionMetrics {
    /// Total windows opened by an event with no overlapping window.
    #[must_use]
    pub fn sessions_started(&self) -> u64 {
        self.sessions_started
    }

    /// Total windows enlarged by an event overlapping a single window.
    #[must_use]
    pub fn sessions_extended(&self) -> u64 {
        self.sessions_extended
    }

    /// Total merges of two windows bridged by one event.
    #[must_use]
    pub fn sessions_merged(&self) -> u64 {
        self.sessions_merged
    }

    /// Total completed sessions emitted.
    #[must_use]
    pub fn sessions_emitted(&self) -> u64 {
        self.sessions_emitted
    }

    /// Total events dropped for arriving below the watermark.
    #[must_use]
    pub fn late_events_dropped(&self) -> u64 {
        self.late_events_dropped
    }

    /// Resets all counters to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

/// A window that is still accumulating events.
#[derive(Debug)]
struct OpenWindow<A> {
    start: i64,
    acc: A,
}

/// Ordered set of pairwise non-overlapping session windows for one key.
///
/// Keyed by window *end*, so both the overlap probe and the expiry scan are
/// range operations: candidates overlapping `[t, t + gap]` are the first
/// entries at or after `t`, and expired windows form the prefix below the
/// watermark.
#[derive(Debug)]
struct WindowMap<A> {
    windows: BTreeMap<i64, OpenWindow<A>>,
}

impl<A> WindowMap<A> {
    fn new() -> Self {
        Self {
            windows: BTreeMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.windows.len()
    }

    fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Returns up to two stored intervals overlapping `probe`, in ascending
    /// end order.
    fn overlapping(&self, probe: Interval) -> OverlapVec {
        let mut found = OverlapVec::new();
        for (&end, win) in self.windows.range(probe.start()..) {
            let iv = Interval::new(win.start, end);
            // Disjoint windows sorted by end are sorted by start too, so
            // the first non-overlapping candidate ends the scan.
            if !iv.overlaps(probe) {
                break;
            }
            found.push(iv);
            if found.len() == 2 {
                break;
            }
        }
        found
    }

    fn get_mut(&mut self, end: i64) -> Option<&mut OpenWindow<A>> {
        self.windows.get_mut(&end)
    }

    /// Removes the window covering exactly `iv`.
    ///
    /// # Panics
    ///
    /// Panics if no such window is stored; callers only remove intervals
    /// they just probed, so a miss means the map is corrupted.
    fn remove(&mut self, iv: Interval) -> OpenWindow<A> {
        self.windows
            .remove(&iv.end())
            .unwrap_or_else(|| panic!("window map corrupted: no window at {iv}"))
    }

    /// Inserts a window into a slot that must be vacant.
    ///
    /// # Panics
    ///
    /// Panics if a window with the same end is already stored.
    fn insert_absent(&mut self, iv: Interval, acc: A) {
        debug_assert!(
            self.overlapping(iv).is_empty(),
            "window map corrupted: {iv} overlaps a stored window"
        );
        let prev = self.windows.insert(
            iv.end(),
            OpenWindow {
                start: iv.start(),
                acc,
            },
        );
        assert!(
            prev.is_none(),
            "window map corrupted: slot for {iv} already occupied"
        );
    }

    /// Removes and returns the earliest window ending strictly before
    /// `before`, if any.
    fn pop_expired(&mut self, before: i64) -> Option<(Interval, A)> {
        let (&end, _) = self.windows.range(..before).next()?;
        let win = self
            .windows
            .remove(&end)
            .expect("entry was just found by the range scan");
        Some((Interval::new(win.start, end), win.acc))
    }
}

/// Ordered index from session end-time to the keys owning a window ending
/// at that time.
///
/// Denormalized state derived from the per-key window maps, maintained at
/// every window mutation site. A watermark locates candidate keys by
/// scanning the prefix below it instead of touching every key.
#[derive(Debug)]
struct DeadlineIndex<K> {
    deadlines: BTreeMap<i64, FxHashSet<K>>,
}

impl<K> DeadlineIndex<K>
where
    K: Eq + Hash + Clone + fmt::Debug,
{
    fn new() -> Self {
        Self {
            deadlines: BTreeMap::new(),
        }
    }

    fn len(&self) -> usize {
        self.deadlines.len()
    }

    fn register(&mut self, end: i64, key: &K) {
        self.deadlines.entry(end).or_default().insert(key.clone());
    }

    /// Removes the registration of `key` at `end`.
    ///
    /// # Panics
    ///
    /// Panics if the registration is missing: the index and the per-key
    /// maps disagree, which is a fatal programming error.
    fn unregister(&mut self, end: i64, key: &K) {
        let Some(keys) = self.deadlines.get_mut(&end) else {
            panic!("deadline index out of sync: no deadline {end} for key {key:?}");
        };
        assert!(
            keys.remove(key),
            "deadline index out of sync: key {key:?} not registered at {end}"
        );
        if keys.is_empty() {
            self.deadlines.remove(&end);
        }
    }

    /// Removes and returns every entry with end-time strictly below
    /// `before`.
    fn take_expired(&mut self, before: i64) -> BTreeMap<i64, FxHashSet<K>> {
        let retained = self.deadlines.split_off(&before);
        std::mem::replace(&mut self.deadlines, retained)
    }
}

/// Session window operator.
///
/// For each grouping key it maintains a dynamic set of non-overlapping
/// session windows and emits one aggregated [`Session`] per window once the
/// watermark passes the window's end.
///
/// # Window Lifecycle
///
/// 1. **Open**: an event with no overlapping window opens one covering its
///    event interval
/// 2. **Extend**: an event overlapping a single window enlarges it to the
///    union of both intervals
/// 3. **Merge**: an event overlapping two windows replaces them with one
///    spanning both, combining their accumulators
/// 4. **Emit**: a watermark above the window end removes it and emits the
///    finished result
///
/// # Ordering
///
/// Events below the current watermark are dropped silently. Watermarks are
/// monotone; regressions are ignored. For a fixed key, sessions are emitted
/// in ascending end-time order; cross-key order within one flush is
/// unspecified but stable.
///
/// # Threading
///
/// Single-threaded cooperative: the host invokes `on_event` / `on_watermark`
/// strictly sequentially on one input partition. Per-key parallelism is
/// achieved upstream by partitioning the stream and running independent
/// operator instances.
pub struct SessionWindowOperator<T, K, A, TF, KF>
where
    K: Eq + Hash + Clone + fmt::Debug,
    A: SessionAggregator<T>,
    TF: Fn(&T) -> i64,
    KF: Fn(&T) -> K,
{
    /// Maximum gap between consecutive event times in one session
    max_gap: i64,
    /// Event-time projection
    event_time: TF,
    /// Key projection
    key_of: KF,
    /// Aggregation contract
    aggregator: A,
    /// Open windows per key
    keyed_windows: FxHashMap<K, WindowMap<A::Acc>>,
    /// End-time index over all keys' windows
    deadlines: DeadlineIndex<K>,
    /// Highest watermark observed
    watermark: Watermark,
    /// Emission cursor: keys whose windows may have expired, in flush order
    flush_queue: VecDeque<K>,
    /// Members of `flush_queue`, for duplicate suppression
    queued: FxHashSet<K>,
    /// Activity counters
    metrics: SessionMetrics,
    _event: PhantomData<fn(&T)>,
}

impl<T, K, A, TF, KF> SessionWindowOperator<T, K, A, TF, KF>
where
    K: Eq + Hash + Clone + fmt::Debug,
    A: SessionAggregator<T>,
    TF: Fn(&T) -> i64,
    KF: Fn(&T) -> K,
{
    /// Creates a new session window operator.
    ///
    /// # Errors
    ///
    /// Returns [`OperatorError::InvalidGap`] if `config.max_gap` is
    /// negative.
    pub fn new(config: SessionConfig<TF, KF, A>) -> Result<Self, OperatorError> {
        if config.max_gap < 0 {
            return Err(OperatorError::InvalidGap(config.max_gap));
        }
        Ok(Self {
            max_gap: config.max_gap,
            event_time: config.event_time,
            key_of: config.key,
            aggregator: config.aggregator,
            keyed_windows: FxHashMap::default(),
            deadlines: DeadlineIndex::new(),
            watermark: Watermark::default(),
            flush_queue: VecDeque::new(),
            queued: FxHashSet::default(),
            metrics: SessionMetrics::default(),
            _event: PhantomData,
        })
    }

    /// Returns the configured maximum session gap.
    #[must_use]
    pub fn max_gap(&self) -> i64 {
        self.max_gap
    }

    /// Returns the highest watermark observed so far.
    #[must_use]
    pub fn watermark(&self) -> Watermark {
        self.watermark
    }

    /// Returns the activity counters.
    #[must_use]
    pub fn metrics(&self) -> SessionMetrics {
        self.metrics
    }

    /// Resets the activity counters.
    pub fn reset_metrics(&mut self) {
        self.metrics.reset();
    }

    /// Returns the number of keys with at least one open window.
    #[must_use]
    pub fn open_key_count(&self) -> usize {
        self.keyed_windows.len()
    }

    /// Returns the total number of open windows across all keys.
    #[must_use]
    pub fn open_window_count(&self) -> usize {
        self.keyed_windows.values().map(WindowMap::len).sum()
    }

    /// Returns the number of distinct end-times in the deadline index.
    #[must_use]
    pub fn deadline_count(&self) -> usize {
        self.deadlines.len()
    }

    /// Returns the number of keys waiting in the emission cursor.
    #[must_use]
    pub fn pending_flush_keys(&self) -> usize {
        self.flush_queue.len()
    }

    /// Ingests one event.
    ///
    /// Routes the event into the correct window for its key: opening a new
    /// window, enlarging an overlapping one, or merging the two windows its
    /// interval bridges. The aggregator's `accumulate` is invoked exactly
    /// once. Events whose time is below the current watermark are dropped
    /// silently.
    ///
    /// # Panics
    ///
    /// Panics if internal window state is inconsistent (two overlapping
    /// windows for one key, or the deadline index disagreeing with the
    /// per-key maps). Such a violation is a programming error; the host
    /// should treat it as job-fatal.
    pub fn on_event(&mut self, event: &T) {
        let t = (self.event_time)(event);
        if self.watermark.is_late(t) {
            self.metrics.late_events_dropped += 1;
            trace!(
                event_time = t,
                watermark = self.watermark.timestamp(),
                "dropping late event"
            );
            return;
        }
        let key = (self.key_of)(event);
        let ev = Interval::new(t, t.saturating_add(self.max_gap));
        let windows = self
            .keyed_windows
            .entry(key.clone())
            .or_insert_with(WindowMap::new);

        let overlaps = windows.overlapping(ev);
        let target = match (overlaps.first().copied(), overlaps.get(1).copied()) {
            (None, _) => {
                windows.insert_absent(ev, self.aggregator.create_accumulator());
                self.deadlines.register(ev.end(), &key);
                self.metrics.sessions_started += 1;
                trace!(key = ?key, window = %ev, "opened session window");
                ev
            }
            (Some(lower), None) if lower.covers(ev) => lower,
            (Some(lower), None) => {
                let win = windows.remove(lower);
                self.deadlines.unregister(lower.end(), &key);
                let extended = lower.union(ev);
                windows.insert_absent(extended, win.acc);
                self.deadlines.register(extended.end(), &key);
                self.metrics.sessions_extended += 1;
                trace!(key = ?key, from = %lower, to = %extended, "extended session window");
                extended
            }
            (Some(lower), Some(upper)) => {
                let lo = windows.remove(lower);
                self.deadlines.unregister(lower.end(), &key);
                let hi = windows.remove(upper);
                self.deadlines.unregister(upper.end(), &key);
                let bridged = Interval::new(lower.start(), upper.end());
                windows.insert_absent(bridged, self.aggregator.combine(lo.acc, hi.acc));
                self.deadlines.register(bridged.end(), &key);
                self.metrics.sessions_merged += 1;
                trace!(key = ?key, lower = %lower, upper = %upper, merged = %bridged,
                    "merged session windows");
                bridged
            }
        };

        let win = windows
            .get_mut(target.end())
            .expect("resolved window is present by construction");
        self.aggregator.accumulate(&mut win.acc, event);
    }

    /// Advances the watermark and returns the drain of completed sessions.
    ///
    /// Every window whose end is strictly below the watermark is complete.
    /// The affected keys are taken from the deadline index and appended to
    /// the emission cursor; the returned [`SessionDrain`] yields their
    /// finished sessions lazily, in ascending end order per key. A
    /// non-advancing watermark changes no state; the returned drain then
    /// only resumes whatever a previous flush left behind.
    #[must_use]
    pub fn on_watermark(&mut self, watermark: i64) -> SessionDrain<'_, T, K, A, TF, KF> {
        if self.watermark.advance_to(watermark) {
            let mut scheduled = 0usize;
            for keys in self.deadlines.take_expired(watermark).into_values() {
                for key in keys {
                    if self.queued.insert(key.clone()) {
                        self.flush_queue.push_back(key);
                        scheduled += 1;
                    }
                }
            }
            debug!(watermark, keys = scheduled, "watermark advanced");
        } else {
            trace!(
                watermark,
                current = self.watermark.timestamp(),
                "ignoring non-advancing watermark"
            );
        }
        self.expired_sessions()
    }

    /// Returns a drain over sessions already scheduled for emission.
    ///
    /// The emission cursor survives an abandoned drain: if the host stops
    /// pulling under backpressure, calling this again continues from the
    /// exact position where the previous drain stopped.
    #[must_use]
    pub fn expired_sessions(&mut self) -> SessionDrain<'_, T, K, A, TF, KF> {
        SessionDrain { operator: self }
    }

    /// Feeds one upstream item, event or watermark.
    ///
    /// Convenience entry point for hosts that drive the operator off a
    /// mixed [`StreamItem`] channel. The returned drain is empty for events
    /// unless a previous flush still has sessions pending.
    #[must_use]
    pub fn on_item(&mut self, item: StreamItem<T>) -> SessionDrain<'_, T, K, A, TF, KF> {
        match item {
            StreamItem::Event(event) => {
                self.on_event(&event);
                self.expired_sessions()
            }
            StreamItem::Watermark(mark) => self.on_watermark(mark.timestamp()),
        }
    }
}

/// Lazy iterator over completed sessions, borrowed from the operator.
///
/// Windows are removed as they are yielded, so every session is emitted
/// exactly once even across backpressure pauses: dropping the drain and
/// re-entering via [`SessionWindowOperator::expired_sessions`] resumes from
/// the current position.
pub struct SessionDrain<'a, T, K, A, TF, KF>
where
    K: Eq + Hash + Clone + fmt::Debug,
    A: SessionAggregator<T>,
    TF: Fn(&T) -> i64,
    KF: Fn(&T) -> K,
{
    operator: &'a mut SessionWindowOperator<T, K, A, TF, KF>,
}

impl<T, K, A, TF, KF> Iterator for SessionDrain<'_, T, K, A, TF, KF>
where
    K: Eq + Hash + Clone + fmt::Debug,
    A: SessionAggregator<T>,
    TF: Fn(&T) -> i64,
    KF: Fn(&T) -> K,
{
    type Item = Session<K, A::Output>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let key = self.operator.flush_queue.front()?.clone();
            let deadline = self.operator.watermark.timestamp();
            let Some(windows) = self.operator.keyed_windows.get_mut(&key) else {
                panic!("deadline index out of sync: no window state for key {key:?}");
            };
            match windows.pop_expired(deadline) {
                Some((iv, acc)) => {
                    let result = self.operator.aggregator.finish(acc);
                    self.operator.metrics.sessions_emitted += 1;
                    trace!(key = ?key, window = %iv, "emitting completed session");
                    return Some(Session::new(key, iv.start(), iv.end(), result));
                }
                None => {
                    // Key fully drained under the current watermark.
                    if windows.is_empty() {
                        self.operator.keyed_windows.remove(&key);
                    }
                    self.operator.flush_queue.pop_front();
                    self.operator.queued.remove(&key);
                }
            }
        }
    }
}
