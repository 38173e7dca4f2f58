use thiserror::Error;

#[derive(Error, Debug)]
pub enum FeedError {
    #[error("historical data unavailable: {0}")]
    DataUnavailable(String),

    #[error("invalid seed: {0}")]
    InvalidSeed(&'static str),

    #[error("invalid interval '{0}': expected one of 1m/5m/15m/1h/4h/1d")]
    InvalidInterval(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}
