/// One OHLCV bucket of an instrument's price history.
///
/// `open_time` is the millisecond epoch of the bucket start and the unique
/// key within a series. `closed` is true once the exchange will send no
/// further revision for this bucket.
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time: u64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub closed: bool,
}

impl Candle {
    pub fn is_bullish(&self) -> bool {
        self.close >= self.open
    }

    /// Same bucket and same OHLCV values, ignoring the closed flag.
    pub fn same_values(&self, other: &Candle) -> bool {
        self.open_time == other.open_time
            && self.open == other.open
            && self.high == other.high
            && self.low == other.low
            && self.close == other.close
            && self.volume == other.volume
    }
}
