use chartfeed::indicator::Rsi;

fn run(closes: impl IntoIterator<Item = f64>, period: usize) -> Vec<f64> {
    let mut rsi = Rsi::new(period);
    closes.into_iter().filter_map(|c| rsi.push(c)).collect()
}

#[test]
fn bounded_for_arbitrary_walks() {
    // A few deterministic pseudo-random walks must never leave [0, 100].
    for phase in 0..5 {
        let closes = (0..300).map(|i| {
            let x = i as f64 * 0.37 + phase as f64;
            100.0 + 15.0 * x.sin() + 4.0 * (x * 2.3).cos()
        });
        for v in run(closes, 14) {
            assert!(v.is_finite());
            assert!((0.0..=100.0).contains(&v), "RSI {v} out of range");
        }
    }
}

#[test]
fn equal_positive_steps_saturate_toward_100() {
    // 15 consecutive gains of equal magnitude: the average loss sits on
    // the epsilon floor, so RSI approaches 100 without going undefined.
    let delta = 0.75;
    let closes = (0..16).map(|i| 50.0 + i as f64 * delta);
    let values = run(closes, 14);
    assert!(!values.is_empty());
    for v in values {
        assert!(v.is_finite(), "RSI must not be NaN/inf");
        assert!(v > 99.9 && v <= 100.0, "expected near-100 saturation, got {v}");
    }
}

#[test]
fn losses_after_gains_pull_value_down() {
    let mut closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
    closes.extend((0..10).map(|i| 119.0 - 2.0 * i as f64));

    let values = run(closes, 14);
    let peak = values[..6].iter().cloned().fold(f64::MIN, f64::max);
    let last = *values.last().unwrap();
    assert!(last < peak, "RSI should fall once losses dominate");
    assert!((0.0..=100.0).contains(&last));
}

#[test]
fn no_value_before_minimum_window() {
    let mut rsi = Rsi::new(14);
    for i in 0..14 {
        assert_eq!(rsi.push(100.0 + (i % 3) as f64), None);
        assert_eq!(rsi.value(), None);
    }
    assert!(rsi.push(101.0).is_some());
    assert!(rsi.value().is_some());
}
