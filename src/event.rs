use crate::error::FeedError;
use crate::model::candle::Candle;

/// Normalized push update for one candle bucket, already stripped of any
/// transport-specific envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct CandleUpdate {
    pub open_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub is_final: bool,
}

impl From<CandleUpdate> for Candle {
    fn from(u: CandleUpdate) -> Self {
        Candle {
            open_time: u.open_time,
            open: u.open,
            high: u.high,
            low: u.low,
            close: u.close,
            volume: u.volume,
            closed: u.is_final,
        }
    }
}

/// Transport lifecycle events emitted by the live feed client.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportStatus {
    Connecting,
    Connected,
    Reconnecting { attempt: u32, delay_ms: u64 },
    Disconnected,
}

/// Externally observable connectivity of a selection's live feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Live,
    Reconnecting,
}

/// Message on a selection's serialized update queue. Streaming updates,
/// transport status changes and backfill results all arrive here so that a
/// single task applies every mutation in order.
#[derive(Debug)]
pub enum FeedMessage {
    Update(CandleUpdate),
    Status(TransportStatus),
    Backfill(Result<Vec<Candle>, FeedError>),
}
