/// Substituted for a zero average loss so the gain/loss ratio stays
/// finite and RSI saturates toward 100 instead of going undefined. Small
/// enough not to perturb any value below ~99.9.
const ZERO_LOSS_EPSILON: f64 = 1e-10;

/// Relative Strength Index over closed-candle closes, maintained
/// incrementally with Wilder's smoothing.
///
/// The first `period` price changes seed the average gain and loss as
/// plain means; from then on each change folds in as
/// `avg = (avg * (period - 1) + x) / period`. Every produced value lies
/// in [0, 100].
#[derive(Debug, Clone)]
pub struct Rsi {
    period: usize,
    prev_close: Option<f64>,
    deltas_seen: usize,
    gain_sum: f64,
    loss_sum: f64,
    avg_gain: f64,
    avg_loss: f64,
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "RSI period must be > 0");
        Self {
            period,
            prev_close: None,
            deltas_seen: 0,
            gain_sum: 0.0,
            loss_sum: 0.0,
            avg_gain: 0.0,
            avg_loss: 0.0,
        }
    }

    /// Push the close of a newly closed candle. Returns a value once
    /// `period` price changes have been observed.
    pub fn push(&mut self, close: f64) -> Option<f64> {
        let Some(prev) = self.prev_close.replace(close) else {
            return None;
        };
        let delta = close - prev;
        let gain = delta.max(0.0);
        let loss = (-delta).max(0.0);
        self.deltas_seen += 1;

        let period = self.period as f64;
        if self.deltas_seen <= self.period {
            self.gain_sum += gain;
            self.loss_sum += loss;
            if self.deltas_seen < self.period {
                return None;
            }
            self.avg_gain = self.gain_sum / period;
            self.avg_loss = self.loss_sum / period;
        } else {
            self.avg_gain = (self.avg_gain * (period - 1.0) + gain) / period;
            self.avg_loss = (self.avg_loss * (period - 1.0) + loss) / period;
        }
        Some(Self::from_averages(self.avg_gain, self.avg_loss))
    }

    pub fn value(&self) -> Option<f64> {
        if self.deltas_seen >= self.period {
            Some(Self::from_averages(self.avg_gain, self.avg_loss))
        } else {
            None
        }
    }

    pub fn is_ready(&self) -> bool {
        self.deltas_seen >= self.period
    }

    pub fn period(&self) -> usize {
        self.period
    }

    fn from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
        let denom = if avg_loss == 0.0 {
            ZERO_LOSS_EPSILON
        } else {
            avg_loss
        };
        let rs = avg_gain / denom;
        100.0 - 100.0 / (1.0 + rs)
    }
}
