use chartfeed::indicator::engine::{
    IndicatorEngine, RSI_PERIOD, SMA_FAST_PERIOD, SMA_SLOW_PERIOD,
};
use chartfeed::model::{Candle, Interval};
use chartfeed::series::CandleSeries;

fn closed_candle(i: u64, close: f64) -> Candle {
    Candle {
        open_time: i * 60_000,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
        closed: true,
    }
}

fn open_candle(i: u64, close: f64) -> Candle {
    Candle {
        closed: false,
        ..closed_candle(i, close)
    }
}

fn seeded(closes: &[f64]) -> CandleSeries {
    let mut series = CandleSeries::new(Interval::M1);
    series
        .seed(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| closed_candle(i as u64, c))
                .collect(),
        )
        .unwrap();
    series
}

#[test]
fn sma20_of_ascending_closes_is_trailing_mean() {
    // Closes 10..=29: SMA(20) at the 20th closed candle is mean(10..29) = 19.5.
    let closes: Vec<f64> = (10..30).map(|i| i as f64).collect();
    let series = seeded(&closes);
    let mut engine = IndicatorEngine::new();
    engine.rebuild(&series);

    let last = engine.sma_fast().last().unwrap();
    assert_eq!(last.open_time, 19 * 60_000);
    assert!((last.value.unwrap() - 19.5).abs() < f64::EPSILON);
}

#[test]
fn open_candle_contributes_no_point() {
    let closes: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
    let mut series = seeded(&closes);
    let mut engine = IndicatorEngine::new();
    engine.rebuild(&series);
    let before_fast = engine.sma_fast().to_vec();
    let before_rsi = engine.rsi().to_vec();

    // Revisions of the in-progress candle must not move any indicator.
    series.upsert(open_candle(60, 500.0));
    series.upsert(open_candle(60, 1.0));
    assert_eq!(engine.sma_fast(), before_fast.as_slice());
    assert_eq!(engine.rsi(), before_rsi.as_slice());

    // Its final revision contributes exactly one point per indicator.
    series.upsert(closed_candle(60, 160.0));
    engine.on_closed(&series, 60);
    assert_eq!(engine.sma_fast().len(), 61);
    assert_eq!(engine.rsi().len(), 61);
}

#[test]
fn undefined_prefix_lengths_follow_windows() {
    let closes: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.7).sin()).collect();
    let series = seeded(&closes);
    let mut engine = IndicatorEngine::new();
    engine.rebuild(&series);

    let defined_from = |points: &[chartfeed::indicator::IndicatorPoint]| {
        points.iter().position(|p| p.value.is_some()).unwrap()
    };
    assert_eq!(defined_from(engine.sma_fast()), SMA_FAST_PERIOD - 1);
    assert_eq!(defined_from(engine.sma_slow()), SMA_SLOW_PERIOD - 1);
    assert_eq!(defined_from(engine.rsi()), RSI_PERIOD);

    // Once defined, always defined.
    for points in [engine.sma_fast(), engine.sma_slow(), engine.rsi()] {
        let from = defined_from(points);
        assert!(points[from..].iter().all(|p| p.value.is_some()));
    }
}

#[test]
fn streaming_candles_match_batch_rebuild() {
    let closes: Vec<f64> = (0..120)
        .map(|i| 100.0 + 8.0 * (i as f64 * 0.21).sin() + (i % 7) as f64 * 0.3)
        .collect();

    let mut series = seeded(&closes[..70]);
    let mut engine = IndicatorEngine::new();
    engine.rebuild(&series);

    // Stream the rest through open/close cycles.
    for (i, &c) in closes.iter().enumerate().skip(70) {
        series.upsert(open_candle(i as u64, c - 0.1));
        series.upsert(closed_candle(i as u64, c));
        engine.on_closed(&series, i);
    }

    let full = seeded(&closes);
    let mut reference = IndicatorEngine::new();
    reference.rebuild(&full);

    assert_eq!(engine.sma_fast(), reference.sma_fast());
    assert_eq!(engine.sma_slow(), reference.sma_slow());
    assert_eq!(engine.rsi(), reference.rsi());
}
