use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use chartfeed::binance::rest::BinanceRestClient;
use chartfeed::binance::ws::BinanceWsClient;
use chartfeed::config::Config;
use chartfeed::coordinator::MarketDataCoordinator;

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .expect("Failed to install rustls crypto provider");

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                config
                    .logging
                    .level
                    .parse()
                    .unwrap_or_else(|_| "info".parse().unwrap())
            }),
        )
        .init();

    let interval = config.binance.interval()?;
    tracing::info!(
        symbol = %config.binance.symbol,
        %interval,
        rest_url = %config.binance.rest_base_url,
        ws_url = %config.binance.ws_base_url,
        "starting chartfeed"
    );

    let rest = Arc::new(BinanceRestClient::new(&config.binance.rest_base_url));
    let ws = Arc::new(BinanceWsClient::new(&config.binance.ws_base_url));
    let mut coordinator = MarketDataCoordinator::new(rest, ws, config.feed.history_limit)
        .with_retry(
            config.feed.fetch_retry_attempts,
            Duration::from_millis(config.feed.fetch_retry_delay_ms),
        );

    coordinator
        .select(&config.binance.symbol, interval)
        .await
        .context("initial selection failed")?;

    let mut snapshots = coordinator.subscribe();
    loop {
        tokio::select! {
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let snap = snapshots.borrow_and_update().clone();
                tracing::info!(
                    candles = snap.candles.len(),
                    connection = ?snap.connection,
                    last_price = ?snap.last_price,
                    sma_fast = ?snap.indicators.sma_fast.last().and_then(|p| p.value),
                    sma_slow = ?snap.indicators.sma_slow.last().and_then(|p| p.value),
                    rsi = ?snap.indicators.rsi.last().and_then(|p| p.value),
                    "snapshot"
                );
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("shutting down");
                break;
            }
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
