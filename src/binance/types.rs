use serde::Deserialize;

use crate::event::CandleUpdate;

/// Deserialize Binance string-encoded numbers to f64.
pub fn string_to_f64<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.parse::<f64>().map_err(serde::de::Error::custom)
}

/// Binance kline stream event (symbol@kline_interval).
#[derive(Debug, Deserialize)]
pub struct BinanceKlineEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: u64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "k")]
    pub kline: BinanceKline,
}

/// The kline payload inside a stream event.
#[derive(Debug, Deserialize)]
pub struct BinanceKline {
    #[serde(rename = "t")]
    pub open_time: u64,
    #[serde(rename = "T")]
    pub close_time: u64,
    #[serde(rename = "i")]
    pub interval: String,
    #[serde(rename = "o", deserialize_with = "string_to_f64")]
    pub open: f64,
    #[serde(rename = "h", deserialize_with = "string_to_f64")]
    pub high: f64,
    #[serde(rename = "l", deserialize_with = "string_to_f64")]
    pub low: f64,
    #[serde(rename = "c", deserialize_with = "string_to_f64")]
    pub close: f64,
    #[serde(rename = "v", deserialize_with = "string_to_f64")]
    pub volume: f64,
    #[serde(rename = "x")]
    pub is_final: bool,
}

impl From<BinanceKline> for CandleUpdate {
    fn from(k: BinanceKline) -> Self {
        CandleUpdate {
            open_time: k.open_time,
            open: k.open,
            high: k.high,
            low: k.low,
            close: k.close,
            volume: k.volume,
            is_final: k.is_final,
        }
    }
}

/// Binance API error response.
#[derive(Debug, Deserialize)]
pub struct BinanceApiErrorResponse {
    pub code: i64,
    pub msg: String,
}
