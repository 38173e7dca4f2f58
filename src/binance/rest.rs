use anyhow::{Context, Result};
use serde_json::Value;

use crate::error::FeedError;
use crate::feed::HistoryProvider;
use crate::model::candle::Candle;
use crate::model::interval::Interval;

pub struct BinanceRestClient {
    http: reqwest::Client,
    base_url: String,
}

impl BinanceRestClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch the most recent `limit` klines, oldest first. The exchange
    /// includes the in-progress bucket as the last row; it is dropped so
    /// the result honors the closed-candles-only contract.
    pub async fn get_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>> {
        let limit = limit.clamp(1, 1000);
        let url = format!("{}/api/v3/klines", self.base_url);
        let limit_s = limit.to_string();

        let resp = self
            .http
            .get(&url)
            .query(&[
                ("symbol", symbol),
                ("interval", interval.as_str()),
                ("limit", limit_s.as_str()),
            ])
            .send()
            .await
            .context("klines HTTP failed")?;

        if !resp.status().is_success() {
            let body = resp.text().await.unwrap_or_default();
            if let Ok(err) =
                serde_json::from_str::<super::types::BinanceApiErrorResponse>(&body)
            {
                anyhow::bail!("klines API error (code {}): {}", err.code, err.msg);
            }
            anyhow::bail!("klines request failed: {}", body);
        }

        let rows: Vec<Value> = resp.json().await.context("klines JSON parse failed")?;

        let now_ms = chrono::Utc::now().timestamp_millis() as u64;
        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            let (candle, close_time) = parse_kline_row(row)?;
            if close_time >= now_ms {
                // Still-forming bucket.
                continue;
            }
            candles.push(candle);
        }
        candles.sort_by_key(|c| c.open_time);

        tracing::debug!(
            symbol,
            interval = %interval,
            count = candles.len(),
            "fetched historical klines"
        );
        Ok(candles)
    }
}

/// Kline REST rows are positional arrays:
/// `[openTime, open, high, low, close, volume, closeTime, ...]`.
fn parse_kline_row(row: &Value) -> Result<(Candle, u64)> {
    let cols = row.as_array().context("kline row is not an array")?;
    let open_time = cols
        .first()
        .and_then(Value::as_u64)
        .context("kline open time missing")?;
    let close_time = cols
        .get(6)
        .and_then(Value::as_u64)
        .context("kline close time missing")?;
    let num = |i: usize, name: &str| -> Result<f64> {
        cols.get(i)
            .and_then(Value::as_str)
            .with_context(|| format!("kline {name} missing"))?
            .parse::<f64>()
            .with_context(|| format!("kline {name} is not a number"))
    };
    let candle = Candle {
        open_time,
        open: num(1, "open")?,
        high: num(2, "high")?,
        low: num(3, "low")?,
        close: num(4, "close")?,
        volume: num(5, "volume")?,
        closed: true,
    };
    Ok((candle, close_time))
}

impl HistoryProvider for BinanceRestClient {
    async fn fetch_klines(
        &self,
        symbol: &str,
        interval: Interval,
        limit: usize,
    ) -> Result<Vec<Candle>, FeedError> {
        self.get_klines(symbol, interval, limit)
            .await
            .map_err(|e| FeedError::DataUnavailable(format!("{e:#}")))
    }
}
