pub mod engine;
pub mod rsi;
pub mod sma;

pub use engine::{IndicatorEngine, IndicatorPoint, IndicatorSeries};
pub use rsi::Rsi;
pub use sma::Sma;
