use std::future::Future;

use tokio::sync::{mpsc, watch};

use crate::error::FeedError;
use crate::event::FeedMessage;
use crate::model::candle::Candle;
use crate::model::interval::Interval;

pub mod reconciler;

pub use reconciler::{Action, LiveFeedReconciler};

/// Request/response source of historical closed candles, oldest first.
///
/// A non-success response or an empty payload means the data is
/// unavailable, never "zero candles".
pub trait HistoryProvider: Send + Sync + 'static {
    fn fetch_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Candle>, FeedError>> + Send;
}

/// Push source of normalized candle updates and transport status for one
/// (symbol, interval) selection. Delivery is at-least-once: duplicates are
/// possible, drops are possible across reconnects.
///
/// Implementations own the transport lifecycle (reconnection, backoff) and
/// must terminate promptly when the shutdown signal flips.
pub trait LiveFeed: Send + Sync + 'static {
    fn run(
        &self,
        symbol: String,
        interval: Interval,
        tx: mpsc::Sender<FeedMessage>,
        shutdown: watch::Receiver<bool>,
    ) -> impl Future<Output = ()> + Send;
}
