use tracing::{error, info, warn};

use crate::error::FeedError;
use crate::event::{CandleUpdate, ConnectionState, TransportStatus};
use crate::indicator::engine::IndicatorEngine;
use crate::model::candle::Candle;
use crate::series::{CandleSeries, Upsert};

const BACKFILL_MARGIN: usize = 5;
const BACKFILL_MAX: usize = 1000;

/// Follow-up work the owning event loop must perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Fetch the most recent `limit` closed candles and feed the result
    /// back through `on_backfill`.
    Backfill { limit: usize },
}

/// State machine that applies normalized live-feed events to a series
/// under the merge rules, bridging transport gaps with backfills.
///
/// Purely synchronous: all I/O happens in the caller, driven by the
/// returned [`Action`]s. Updates arriving while a backfill is outstanding
/// are buffered and replayed in arrival order once it resolves.
#[derive(Debug)]
pub struct LiveFeedReconciler {
    connection: ConnectionState,
    backfill_pending: bool,
    backfill_limit: usize,
    buffered: Vec<CandleUpdate>,
}

impl LiveFeedReconciler {
    pub fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            backfill_pending: false,
            backfill_limit: 0,
            buffered: Vec::new(),
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn backfill_in_flight(&self) -> bool {
        self.backfill_pending
    }

    /// Track transport lifecycle. Reconnects need no eager fetch: any
    /// candle boundary missed during the outage makes the next update
    /// gap-detect and trigger the backfill.
    pub fn on_status(&mut self, status: &TransportStatus) {
        self.connection = match status {
            TransportStatus::Connecting => ConnectionState::Connecting,
            TransportStatus::Connected => ConnectionState::Live,
            TransportStatus::Reconnecting { attempt, delay_ms } => {
                info!(attempt, delay_ms, "transport reconnecting");
                ConnectionState::Reconnecting
            }
            TransportStatus::Disconnected => ConnectionState::Disconnected,
        };
    }

    /// Apply one streamed update, or buffer it while a backfill is
    /// outstanding.
    pub fn on_update(
        &mut self,
        series: &mut CandleSeries,
        engine: &mut IndicatorEngine,
        update: CandleUpdate,
    ) -> Option<Action> {
        if self.backfill_pending {
            self.buffered.push(update);
            return None;
        }
        self.apply(series, engine, update)
    }

    /// Fold a resolved backfill into the series, then replay the buffer in
    /// arrival order, discarding updates the batch already covered.
    pub fn on_backfill(
        &mut self,
        series: &mut CandleSeries,
        engine: &mut IndicatorEngine,
        result: Result<Vec<Candle>, FeedError>,
    ) -> Option<Action> {
        self.backfill_pending = false;
        let covered_through = match result {
            Ok(batch) => {
                let merge = series.merge_backfill(batch);
                if let Some(idx) = merge.first_closed_change {
                    engine.on_closed(series, idx);
                }
                info!(
                    applied = merge.applied,
                    covered_through = merge.covered_through,
                    "backfill merged"
                );
                if let Some(expected) = merge.remaining_gap {
                    return self.widen_backfill(expected);
                }
                merge.covered_through
            }
            Err(e) => {
                // The gap persists; the next live update will detect it
                // again and request a fresh backfill.
                warn!(error = %e, "backfill fetch failed, replaying buffer");
                None
            }
        };

        let mut action = None;
        for update in std::mem::take(&mut self.buffered) {
            if covered_through.is_some_and(|t| update.open_time <= t) {
                continue;
            }
            if self.backfill_pending {
                self.buffered.push(update);
            } else if let Some(a) = self.apply(series, engine, update) {
                action = Some(a);
            }
        }
        action
    }

    fn apply(
        &mut self,
        series: &mut CandleSeries,
        engine: &mut IndicatorEngine,
        update: CandleUpdate,
    ) -> Option<Action> {
        let open_time = update.open_time;
        match series.upsert(Candle::from(update.clone())) {
            Upsert::Appended {
                closed_from: Some(idx),
            }
            | Upsert::Closed(idx) => {
                engine.on_closed(series, idx);
                None
            }
            Upsert::Appended { closed_from: None }
            | Upsert::RevisedOpen
            | Upsert::Stale
            | Upsert::CorruptRevision => None,
            Upsert::Gap { expected } => {
                let step = series.interval().step_ms();
                let span = ((open_time - expected) / step + 1) as usize;
                let limit = (span + BACKFILL_MARGIN).min(BACKFILL_MAX);
                warn!(expected, got = open_time, limit, "gap detected, backfilling");
                self.backfill_pending = true;
                self.backfill_limit = limit;
                self.buffered.push(update);
                Some(Action::Backfill { limit })
            }
        }
    }

    fn widen_backfill(&mut self, missing: u64) -> Option<Action> {
        if self.backfill_limit >= BACKFILL_MAX {
            // The hole is deeper than the largest fetchable window; the
            // buffered span can no longer be bridged.
            error!(
                missing,
                "gap exceeds maximum backfill window, dropping buffered updates"
            );
            self.buffered.clear();
            return None;
        }
        let limit = (self.backfill_limit * 2).min(BACKFILL_MAX);
        warn!(missing, limit, "backfill fell short of the hole, widening");
        self.backfill_pending = true;
        self.backfill_limit = limit;
        Some(Action::Backfill { limit })
    }
}

impl Default for LiveFeedReconciler {
    fn default() -> Self {
        Self::new()
    }
}
