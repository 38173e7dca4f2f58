use chartfeed::error::FeedError;
use chartfeed::event::{CandleUpdate, ConnectionState, TransportStatus};
use chartfeed::feed::{Action, LiveFeedReconciler};
use chartfeed::indicator::IndicatorEngine;
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

fn update(i: u64, close: f64, is_final: bool) -> CandleUpdate {
    CandleUpdate {
        open_time: i * 60_000,
        open: close,
        high: close,
        low: close,
        close,
        volume: 1.0,
        is_final,
    }
}

fn fixture(n: u64) -> (CandleSeries, IndicatorEngine, LiveFeedReconciler) {
    let mut series = CandleSeries::new(Interval::M1);
    series
        .seed((0..n).map(|i| closed_candle(i, 100.0 + i as f64)).collect())
        .unwrap();
    let mut engine = IndicatorEngine::with_periods(3, 5, 3);
    engine.rebuild(&series);
    (series, engine, LiveFeedReconciler::new())
}

#[test]
fn reconnect_cycle_is_observable() {
    let mut rec = LiveFeedReconciler::new();
    let transitions = [
        (TransportStatus::Connecting, ConnectionState::Connecting),
        (TransportStatus::Connected, ConnectionState::Live),
        (
            TransportStatus::Reconnecting {
                attempt: 2,
                delay_ms: 2000,
            },
            ConnectionState::Reconnecting,
        ),
        (TransportStatus::Connecting, ConnectionState::Connecting),
        (TransportStatus::Connected, ConnectionState::Live),
        (TransportStatus::Disconnected, ConnectionState::Disconnected),
    ];
    for (status, expected) in transitions {
        rec.on_status(&status);
        assert_eq!(rec.connection(), expected);
    }
}

#[test]
fn live_updates_drive_indicators() {
    let (mut series, mut engine, mut rec) = fixture(10);
    assert_eq!(engine.consumed(), 10);

    rec.on_update(&mut series, &mut engine, update(10, 110.0, false));
    assert_eq!(engine.consumed(), 10);

    rec.on_update(&mut series, &mut engine, update(10, 110.5, true));
    assert_eq!(engine.consumed(), 11);
    assert_eq!(engine.rsi().len(), 11);
}

#[test]
fn backfill_round_trip_preserves_buffered_tail() {
    let (mut series, mut engine, mut rec) = fixture(10);

    // Connection drop swallowed buckets 10..12; bucket 13 arrives live.
    let action = rec.on_update(&mut series, &mut engine, update(13, 113.0, false));
    let Some(Action::Backfill { limit }) = action else {
        panic!("expected a backfill request, got {action:?}");
    };
    assert!(limit >= 4);

    // More live traffic lands while the fetch is out.
    rec.on_update(&mut series, &mut engine, update(13, 113.2, false));
    rec.on_update(&mut series, &mut engine, update(13, 113.4, true));
    rec.on_update(&mut series, &mut engine, update(14, 113.6, false));

    let batch: Vec<Candle> = (10..14).map(|i| closed_candle(i, 110.0 + i as f64)).collect();
    assert_eq!(rec.on_backfill(&mut series, &mut engine, Ok(batch)), None);
    assert!(!rec.backfill_in_flight());

    // Backfill owns buckets 10..=13; the live open 14 survives the replay.
    assert_eq!(series.len(), 15);
    assert_eq!(series.last_closed_index(), Some(13));
    assert_eq!(series.open_candle().unwrap().open_time, 14 * 60_000);
    assert_eq!(engine.consumed(), 14);
    // The buffered revisions of bucket 13 were superseded by the batch.
    assert!((series.candles()[13].close - 123.0).abs() < f64::EPSILON);
}

#[test]
fn events_never_reorder_across_backfill() {
    let (mut series, mut engine, mut rec) = fixture(10);

    rec.on_update(&mut series, &mut engine, update(12, 112.0, true));
    // Buffered in arrival order: close 13, open 14.
    rec.on_update(&mut series, &mut engine, update(13, 113.0, true));
    rec.on_update(&mut series, &mut engine, update(14, 114.0, false));

    let batch: Vec<Candle> = (10..12).map(|i| closed_candle(i, 110.0 + i as f64)).collect();
    rec.on_backfill(&mut series, &mut engine, Ok(batch));

    let times: Vec<u64> = series.candles().iter().map(|c| c.open_time).collect();
    let expected: Vec<u64> = (0..15).map(|i| i * 60_000).collect();
    assert_eq!(times, expected);
    assert_eq!(series.open_candle().unwrap().open_time, 14 * 60_000);
}

#[test]
fn failed_backfill_leaves_series_consistent() {
    let (mut series, mut engine, mut rec) = fixture(10);

    rec.on_update(&mut series, &mut engine, update(13, 113.0, true));
    let action = rec.on_backfill(
        &mut series,
        &mut engine,
        Err(FeedError::DataUnavailable("upstream 500".into())),
    );

    // The replayed trigger hits the gap again and re-requests.
    assert!(matches!(action, Some(Action::Backfill { .. })));
    assert_eq!(series.len(), 10);
    let times: Vec<u64> = series.candles().iter().map(|c| c.open_time).collect();
    assert!(times.windows(2).all(|w| w[1] == w[0] + 60_000));
}
