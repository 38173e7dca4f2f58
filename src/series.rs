use tracing::{debug, error};

use crate::error::FeedError;
use crate::model::candle::Candle;
use crate::model::interval::Interval;

/// Outcome of applying one candle to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    /// A new candle was appended. `closed_from` is the first closed index
    /// whose value this upsert produced: the candle's own index when it
    /// arrived closed, the promoted predecessor's index when the previous
    /// bucket never received its final revision, `None` when only an
    /// in-progress candle was added.
    Appended { closed_from: Option<usize> },
    /// The in-progress candle was replaced with a newer revision.
    RevisedOpen,
    /// The in-progress candle received its final revision.
    Closed(usize),
    /// Stale or duplicate event; nothing changed.
    Stale,
    /// Conflicting final revision of an already-closed bucket; the revision
    /// was discarded and the stored value kept.
    CorruptRevision,
    /// The candle is more than one step ahead; nothing was applied and the
    /// missing span must be backfilled.
    Gap { expected: u64 },
}

/// Result of merging a backfill batch into the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackfillMerge {
    /// Candles actually inserted or closed by the merge.
    pub applied: usize,
    /// Highest `open_time` the batch covered, applied or not. Buffered live
    /// updates at or before this point are superseded by the batch.
    pub covered_through: Option<u64>,
    /// First closed index changed by the merge, for indicator recompute.
    pub first_closed_change: Option<usize>,
    /// Set when the batch did not reach back to the hole: the series still
    /// misses the bucket at this `open_time`.
    pub remaining_gap: Option<u64>,
}

/// Ordered, deduplicated store of closed and in-progress candles for one
/// (symbol, interval) selection. At most one non-closed candle exists and
/// it is always the last element.
#[derive(Debug)]
pub struct CandleSeries {
    interval: Interval,
    candles: Vec<Candle>,
}

impl CandleSeries {
    pub fn new(interval: Interval) -> Self {
        Self {
            interval,
            candles: Vec::new(),
        }
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    /// Replace all state with a historical batch. The batch must be closed
    /// candles advancing by exactly one interval step.
    pub fn seed(&mut self, candles: Vec<Candle>) -> Result<(), FeedError> {
        if candles.is_empty() {
            return Err(FeedError::InvalidSeed("empty candle batch"));
        }
        if candles.iter().any(|c| !c.closed) {
            return Err(FeedError::InvalidSeed(
                "seed batch may only contain closed candles",
            ));
        }
        let step = self.interval.step_ms();
        for pair in candles.windows(2) {
            if pair[1].open_time != pair[0].open_time + step {
                return Err(FeedError::InvalidSeed(
                    "open times must advance by exactly one interval step",
                ));
            }
        }
        self.candles = candles;
        Ok(())
    }

    /// Apply one streamed candle under the merge rules. Never leaves the
    /// series violating its ordering invariant; stale and corrupt inputs
    /// are reported, not applied.
    pub fn upsert(&mut self, candle: Candle) -> Upsert {
        let Some(last) = self.candles.last() else {
            let closed = candle.closed;
            self.candles.push(candle);
            return Upsert::Appended {
                closed_from: closed.then_some(0),
            };
        };

        let expected = last.open_time + self.interval.step_ms();

        if candle.open_time == last.open_time {
            let idx = self.candles.len() - 1;
            if last.closed {
                return self.revise_closed(idx, candle);
            }
            let closing = candle.closed;
            self.candles[idx] = candle;
            return if closing {
                Upsert::Closed(idx)
            } else {
                Upsert::RevisedOpen
            };
        }

        if candle.open_time < last.open_time {
            return match self.index_of(candle.open_time) {
                Some(idx) if self.candles[idx].closed => self.revise_closed(idx, candle),
                _ => {
                    debug!(open_time = candle.open_time, "stale update ignored");
                    Upsert::Stale
                }
            };
        }

        if candle.open_time > expected {
            return Upsert::Gap { expected };
        }

        // Exactly one step ahead. A still-open predecessor implies its
        // final revision was lost; its last revision stands as closed.
        let prev_idx = self.candles.len() - 1;
        let promoted = if !self.candles[prev_idx].closed {
            self.candles[prev_idx].closed = true;
            debug!(
                open_time = self.candles[prev_idx].open_time,
                "open candle promoted to closed by successor"
            );
            true
        } else {
            false
        };
        let closed = candle.closed;
        self.candles.push(candle);
        let closed_from = if promoted {
            Some(prev_idx)
        } else {
            closed.then_some(prev_idx + 1)
        };
        Upsert::Appended { closed_from }
    }

    /// Merge a fetched closed-candle batch, oldest first, through the same
    /// upsert rules. Overlap with already-stored candles is absorbed as
    /// duplicates; a batch that does not reach back to the hole reports the
    /// still-missing bucket.
    pub fn merge_backfill(&mut self, batch: Vec<Candle>) -> BackfillMerge {
        let covered_through = batch.last().map(|c| c.open_time);
        let mut merge = BackfillMerge {
            applied: 0,
            covered_through,
            first_closed_change: None,
            remaining_gap: None,
        };
        for candle in batch {
            match self.upsert(candle) {
                Upsert::Appended { closed_from } => {
                    merge.applied += 1;
                    if let Some(idx) = closed_from {
                        merge.first_closed_change.get_or_insert(idx);
                    }
                }
                Upsert::Closed(idx) => {
                    merge.applied += 1;
                    merge.first_closed_change.get_or_insert(idx);
                }
                Upsert::Gap { expected } => {
                    // Every later batch entry would gap as well.
                    merge.remaining_gap = Some(expected);
                    break;
                }
                Upsert::RevisedOpen | Upsert::Stale | Upsert::CorruptRevision => {}
            }
        }
        merge
    }

    /// Index of the most recent closed candle.
    pub fn last_closed_index(&self) -> Option<usize> {
        match self.candles.last() {
            Some(c) if c.closed => Some(self.candles.len() - 1),
            Some(_) if self.candles.len() > 1 => Some(self.candles.len() - 2),
            _ => None,
        }
    }

    /// The closed-candle prefix of the series.
    pub fn closed(&self) -> &[Candle] {
        match self.last_closed_index() {
            Some(idx) => &self.candles[..=idx],
            None => &[],
        }
    }

    pub fn open_candle(&self) -> Option<&Candle> {
        self.candles.last().filter(|c| !c.closed)
    }

    /// Close of the in-progress candle if present, else of the last closed.
    pub fn last_price(&self) -> Option<f64> {
        self.candles.last().map(|c| c.close)
    }

    fn index_of(&self, open_time: u64) -> Option<usize> {
        self.candles
            .binary_search_by_key(&open_time, |c| c.open_time)
            .ok()
    }

    fn revise_closed(&mut self, idx: usize, candle: Candle) -> Upsert {
        if self.candles[idx].same_values(&candle) {
            debug!(open_time = candle.open_time, "duplicate update ignored");
            return Upsert::Stale;
        }
        if !candle.closed {
            // A late partial revision of a finished bucket carries no new
            // information; only a conflicting final revision is corrupt.
            debug!(
                open_time = candle.open_time,
                "late partial update for closed candle ignored"
            );
            return Upsert::Stale;
        }
        error!(
            open_time = candle.open_time,
            stored_close = self.candles[idx].close,
            revised_close = candle.close,
            "conflicting revision of closed candle discarded"
        );
        Upsert::CorruptRevision
    }
}
