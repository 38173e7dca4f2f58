use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::error::FeedError;
use crate::event::{ConnectionState, FeedMessage};
use crate::feed::{Action, HistoryProvider, LiveFeed, LiveFeedReconciler};
use crate::indicator::engine::{IndicatorEngine, IndicatorSeries};
use crate::model::candle::Candle;
use crate::model::interval::Interval;
use crate::series::CandleSeries;

const FETCH_RETRY_ATTEMPTS: u32 = 3;
const FETCH_RETRY_DELAY: Duration = Duration::from_millis(500);
const UPDATE_QUEUE_DEPTH: usize = 1024;

/// Derived series of the active selection, aligned by timestamp.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSnapshot {
    pub sma_fast: Arc<IndicatorSeries>,
    pub sma_slow: Arc<IndicatorSeries>,
    pub rsi: Arc<IndicatorSeries>,
}

/// Immutable view published to presentation consumers. Cheap to clone;
/// shared payloads sit behind `Arc`.
#[derive(Debug, Clone)]
pub struct MarketSnapshot {
    pub candles: Arc<Vec<Candle>>,
    pub indicators: IndicatorSnapshot,
    pub connection: ConnectionState,
    pub last_price: Option<f64>,
    pub last_updated_ms: u64,
}

impl Default for MarketSnapshot {
    fn default() -> Self {
        Self {
            candles: Arc::new(Vec::new()),
            indicators: IndicatorSnapshot::default(),
            connection: ConnectionState::Disconnected,
            last_price: None,
            last_updated_ms: 0,
        }
    }
}

struct ActiveSelection {
    shutdown_tx: watch::Sender<bool>,
    feed_task: JoinHandle<()>,
    loop_task: JoinHandle<()>,
}

/// Owns the combined state for one (symbol, interval) selection: fetches
/// history, seeds the series, runs the live feed, and publishes atomic
/// snapshots. Selection changes tear the previous state down completely
/// before any new state exists.
pub struct MarketDataCoordinator<H, F> {
    provider: Arc<H>,
    feed: Arc<F>,
    history_limit: usize,
    retry_attempts: u32,
    retry_delay: Duration,
    snapshot_tx: watch::Sender<MarketSnapshot>,
    active: Option<ActiveSelection>,
}

impl<H: HistoryProvider, F: LiveFeed> MarketDataCoordinator<H, F> {
    pub fn new(provider: Arc<H>, feed: Arc<F>, history_limit: usize) -> Self {
        let (snapshot_tx, _) = watch::channel(MarketSnapshot::default());
        Self {
            provider,
            feed,
            history_limit,
            retry_attempts: FETCH_RETRY_ATTEMPTS,
            retry_delay: FETCH_RETRY_DELAY,
            snapshot_tx,
            active: None,
        }
    }

    pub fn with_retry(mut self, attempts: u32, delay: Duration) -> Self {
        self.retry_attempts = attempts.max(1);
        self.retry_delay = delay;
        self
    }

    /// Activate a new (symbol, interval) selection. The previous selection
    /// is fully torn down first; a failed fetch leaves no partial state.
    pub async fn select(&mut self, symbol: &str, interval: Interval) -> Result<(), FeedError> {
        self.teardown().await;

        let seed = self.fetch_with_retry(symbol, interval).await?;
        let mut series = CandleSeries::new(interval);
        series.seed(seed)?;
        let mut engine = IndicatorEngine::new();
        engine.rebuild(&series);

        let reconciler = LiveFeedReconciler::new();
        publish(&self.snapshot_tx, &series, &engine, &reconciler);

        let (tx, rx) = mpsc::channel(UPDATE_QUEUE_DEPTH);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let feed = self.feed.clone();
        let feed_symbol = symbol.to_string();
        let feed_task = tokio::spawn(async move {
            feed.run(feed_symbol, interval, tx, shutdown_rx).await;
        });

        let loop_task = tokio::spawn(run_loop(
            series,
            engine,
            reconciler,
            rx,
            self.provider.clone(),
            symbol.to_string(),
            interval,
            self.snapshot_tx.clone(),
        ));

        self.active = Some(ActiveSelection {
            shutdown_tx,
            feed_task,
            loop_task,
        });
        Ok(())
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> MarketSnapshot {
        self.snapshot_tx.borrow().clone()
    }

    /// Receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<MarketSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// Tear down the active selection, if any.
    pub async fn shutdown(&mut self) {
        self.teardown().await;
    }

    async fn teardown(&mut self) {
        let Some(active) = self.active.take() else {
            return;
        };
        let _ = active.shutdown_tx.send(true);
        // The feed must be gone before any successor state is created, and
        // pending backoff timers must die with it.
        active.feed_task.abort();
        active.loop_task.abort();
        let _ = active.feed_task.await;
        let _ = active.loop_task.await;
        self.snapshot_tx.send_replace(MarketSnapshot::default());
    }

    async fn fetch_with_retry(
        &self,
        symbol: &str,
        interval: Interval,
    ) -> Result<Vec<Candle>, FeedError> {
        let mut last_err = None;
        for attempt in 1..=self.retry_attempts {
            match self
                .provider
                .fetch_klines(symbol, interval, self.history_limit)
                .await
            {
                Ok(candles) if !candles.is_empty() => return Ok(candles),
                Ok(_) => {
                    warn!(symbol, %interval, attempt, "historical fetch returned empty payload");
                    last_err = Some(FeedError::DataUnavailable("empty payload".to_string()));
                }
                Err(e) => {
                    warn!(symbol, %interval, attempt, error = %e, "historical fetch failed");
                    last_err = Some(e);
                }
            }
            if attempt < self.retry_attempts {
                tokio::time::sleep(self.retry_delay).await;
            }
        }
        Err(last_err
            .unwrap_or_else(|| FeedError::DataUnavailable("retries exhausted".to_string())))
    }
}

/// The single serialized update path for one selection: every mutation of
/// the series and indicators happens here, in queue order, and each fully
/// applied message yields exactly one published snapshot.
#[allow(clippy::too_many_arguments)]
async fn run_loop<H: HistoryProvider>(
    mut series: CandleSeries,
    mut engine: IndicatorEngine,
    mut reconciler: LiveFeedReconciler,
    mut rx: mpsc::Receiver<FeedMessage>,
    provider: Arc<H>,
    symbol: String,
    interval: Interval,
    snapshot_tx: watch::Sender<MarketSnapshot>,
) {
    let (backfill_tx, mut backfill_rx) = mpsc::channel::<FeedMessage>(4);
    loop {
        let msg = tokio::select! {
            biased;
            Some(msg) = backfill_rx.recv() => msg,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        let action = match msg {
            FeedMessage::Update(update) => reconciler.on_update(&mut series, &mut engine, update),
            FeedMessage::Status(status) => {
                reconciler.on_status(&status);
                None
            }
            FeedMessage::Backfill(result) => {
                reconciler.on_backfill(&mut series, &mut engine, result)
            }
        };
        if let Some(Action::Backfill { limit }) = action {
            let provider = provider.clone();
            let tx = backfill_tx.clone();
            let symbol = symbol.clone();
            tokio::spawn(async move {
                let result = provider.fetch_klines(&symbol, interval, limit).await;
                let _ = tx.send(FeedMessage::Backfill(result)).await;
            });
        }
        publish(&snapshot_tx, &series, &engine, &reconciler);
    }
}

fn publish(
    snapshot_tx: &watch::Sender<MarketSnapshot>,
    series: &CandleSeries,
    engine: &IndicatorEngine,
    reconciler: &LiveFeedReconciler,
) {
    let snapshot = MarketSnapshot {
        candles: Arc::new(series.candles().to_vec()),
        indicators: IndicatorSnapshot {
            sma_fast: Arc::new(engine.sma_fast().to_vec()),
            sma_slow: Arc::new(engine.sma_slow().to_vec()),
            rsi: Arc::new(engine.rsi().to_vec()),
        },
        connection: reconciler.connection(),
        last_price: series.last_price(),
        last_updated_ms: chrono::Utc::now().timestamp_millis() as u64,
    };
    // send_replace: the latest state must be observable through `borrow`
    // even while no receiver is subscribed.
    snapshot_tx.send_replace(snapshot);
}
