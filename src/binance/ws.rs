use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::tungstenite;

use super::types::BinanceKlineEvent;
use crate::event::{CandleUpdate, FeedMessage, TransportStatus};
use crate::feed::LiveFeed;
use crate::model::interval::Interval;

/// Exponential backoff for reconnection.
struct ExponentialBackoff {
    current: Duration,
    initial: Duration,
    max: Duration,
    factor: f64,
}

impl ExponentialBackoff {
    fn new(initial: Duration, max: Duration, factor: f64) -> Self {
        Self {
            current: initial,
            initial,
            max,
            factor,
        }
    }

    fn next_delay(&mut self) -> Duration {
        let delay = self.current;
        self.current = Duration::from_secs_f64(
            (self.current.as_secs_f64() * self.factor).min(self.max.as_secs_f64()),
        );
        delay
    }

    fn reset(&mut self) {
        self.current = self.initial;
    }
}

pub struct BinanceWsClient {
    base_url: String,
}

impl BinanceWsClient {
    pub fn new(ws_base_url: &str) -> Self {
        Self {
            base_url: ws_base_url.trim_end_matches('/').to_string(),
        }
    }

    fn stream_url(&self, symbol: &str, interval: Interval) -> String {
        format!(
            "{}/{}@kline_{}",
            self.base_url,
            symbol.to_ascii_lowercase(),
            interval.as_str()
        )
    }

    /// Connect and run the kline stream with automatic reconnection,
    /// forwarding normalized updates and transport status through `tx`.
    /// Returns when shutdown is signalled or the receiving side is gone.
    async fn connect_and_run(
        url: String,
        tx: mpsc::Sender<FeedMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut backoff =
            ExponentialBackoff::new(Duration::from_secs(1), Duration::from_secs(60), 2.0);
        let mut attempt: u32 = 0;

        loop {
            attempt += 1;
            match Self::connect_once(&url, &tx, &mut shutdown, &mut backoff).await {
                Ok(()) => {
                    let _ = tx.send(FeedMessage::Status(TransportStatus::Disconnected)).await;
                    return;
                }
                Err(e) => {
                    tracing::warn!(error = %e, attempt, "kline stream lost");
                    let delay = backoff.next_delay();
                    if tx
                        .send(FeedMessage::Status(TransportStatus::Reconnecting {
                            attempt,
                            delay_ms: delay.as_millis() as u64,
                        }))
                        .await
                        .is_err()
                    {
                        return;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(delay) => continue,
                        _ = shutdown.changed() => {
                            tracing::debug!("shutdown during reconnect backoff");
                            return;
                        }
                    }
                }
            }
        }
    }

    async fn connect_once(
        url: &str,
        tx: &mpsc::Sender<FeedMessage>,
        shutdown: &mut watch::Receiver<bool>,
        backoff: &mut ExponentialBackoff,
    ) -> Result<()> {
        if tx
            .send(FeedMessage::Status(TransportStatus::Connecting))
            .await
            .is_err()
        {
            return Ok(());
        }

        let (ws_stream, _resp) = tokio_tungstenite::connect_async(url)
            .await
            .context("WebSocket connect failed")?;
        backoff.reset();

        if tx
            .send(FeedMessage::Status(TransportStatus::Connected))
            .await
            .is_err()
        {
            return Ok(());
        }
        tracing::info!(url, "kline stream connected");

        let (_write, mut read) = ws_stream.split();

        loop {
            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(tungstenite::Message::Text(text))) => {
                            match serde_json::from_str::<BinanceKlineEvent>(&text) {
                                Ok(event) => {
                                    let update = CandleUpdate::from(event.kline);
                                    if tx.send(FeedMessage::Update(update)).await.is_err() {
                                        // Receiver gone: the selection was torn down.
                                        return Ok(());
                                    }
                                }
                                Err(e) => {
                                    tracing::debug!(error = %e, "unparseable stream message");
                                }
                            }
                        }
                        Some(Ok(tungstenite::Message::Ping(_))) => {
                            // tokio-tungstenite answers pongs automatically
                        }
                        Some(Ok(tungstenite::Message::Close(_))) => {
                            return Err(anyhow::anyhow!("server closed the stream"));
                        }
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            return Err(anyhow::anyhow!("WebSocket read error: {}", e));
                        }
                        None => {
                            return Err(anyhow::anyhow!("WebSocket stream ended"));
                        }
                    }
                }
                _ = shutdown.changed() => {
                    return Ok(());
                }
            }
        }
    }
}

impl LiveFeed for BinanceWsClient {
    fn run(
        &self,
        symbol: String,
        interval: Interval,
        tx: mpsc::Sender<FeedMessage>,
        shutdown: watch::Receiver<bool>,
    ) -> impl std::future::Future<Output = ()> + Send {
        let url = self.stream_url(&symbol, interval);
        Self::connect_and_run(url, tx, shutdown)
    }
}
