use crate::indicator::rsi::Rsi;
use crate::indicator::sma::Sma;
use crate::series::CandleSeries;

pub const SMA_FAST_PERIOD: usize = 20;
pub const SMA_SLOW_PERIOD: usize = 50;
pub const RSI_PERIOD: usize = 14;

/// One point of a derived series, aligned to a closed candle. `value` is
/// `None` until the indicator's window is satisfied; a point never carries
/// a placeholder number pretending to be data.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndicatorPoint {
    pub open_time: u64,
    pub value: Option<f64>,
}

pub type IndicatorSeries = Vec<IndicatorPoint>;

/// Maintains SMA fast/slow and RSI over the closed-candle prefix of a
/// series, incrementally. The in-progress candle never contributes.
#[derive(Debug)]
pub struct IndicatorEngine {
    sma_fast: Sma,
    sma_slow: Sma,
    rsi: Rsi,
    consumed: usize,
    sma_fast_series: IndicatorSeries,
    sma_slow_series: IndicatorSeries,
    rsi_series: IndicatorSeries,
}

impl IndicatorEngine {
    pub fn new() -> Self {
        Self::with_periods(SMA_FAST_PERIOD, SMA_SLOW_PERIOD, RSI_PERIOD)
    }

    pub fn with_periods(fast: usize, slow: usize, rsi: usize) -> Self {
        assert!(fast < slow, "fast period must be less than slow period");
        Self {
            sma_fast: Sma::new(fast),
            sma_slow: Sma::new(slow),
            rsi: Rsi::new(rsi),
            consumed: 0,
            sma_fast_series: Vec::new(),
            sma_slow_series: Vec::new(),
            rsi_series: Vec::new(),
        }
    }

    /// Discard all derived state and replay every closed candle.
    pub fn rebuild(&mut self, series: &CandleSeries) {
        *self = Self::with_periods(
            self.sma_fast.period(),
            self.sma_slow.period(),
            self.rsi.period(),
        );
        self.extend(series);
    }

    /// Fold in closed candles not seen yet. `from_index` is the first
    /// closed index the triggering mutation touched; anything behind the
    /// consumed watermark means history changed under us and forces a full
    /// replay.
    pub fn on_closed(&mut self, series: &CandleSeries, from_index: usize) {
        if from_index < self.consumed {
            self.rebuild(series);
        } else {
            self.extend(series);
        }
    }

    pub fn sma_fast(&self) -> &[IndicatorPoint] {
        &self.sma_fast_series
    }

    pub fn sma_slow(&self) -> &[IndicatorPoint] {
        &self.sma_slow_series
    }

    pub fn rsi(&self) -> &[IndicatorPoint] {
        &self.rsi_series
    }

    /// Closed candles folded in so far.
    pub fn consumed(&self) -> usize {
        self.consumed
    }

    fn extend(&mut self, series: &CandleSeries) {
        let closed = series.closed();
        for candle in &closed[self.consumed..] {
            self.sma_fast_series.push(IndicatorPoint {
                open_time: candle.open_time,
                value: self.sma_fast.push(candle.close),
            });
            self.sma_slow_series.push(IndicatorPoint {
                open_time: candle.open_time,
                value: self.sma_slow.push(candle.close),
            });
            self.rsi_series.push(IndicatorPoint {
                open_time: candle.open_time,
                value: self.rsi.push(candle.close),
            });
        }
        self.consumed = closed.len();
    }
}

impl Default for IndicatorEngine {
    fn default() -> Self {
        Self::new()
    }
}
