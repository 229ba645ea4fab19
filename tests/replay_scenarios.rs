use chrono::{DateTime, Duration, FixedOffset, TimeZone, Utc};
use replay_backtest::prelude::*;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Write;
use std::sync::Mutex;

fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn candles(closes: &[f64], step: Duration) -> Vec<Candle> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Candle::new(start() + step * i as i32, c, c, c, c, 10.0).unwrap())
        .collect()
}

fn config(fee_rate: Decimal) -> BacktestConfig {
    BacktestConfig {
        warmup_bars: 0,
        fee_rate,
        fixed_notional: dec!(100),
        display_offset: FixedOffset::east_opt(0).unwrap(),
        ..Default::default()
    }
}

//replays a fixed script, `None` entries fail
struct Scripted {
    script: Vec<Option<SignalKind>>,
    lookback: usize,
}

impl Scripted {
    fn new(script: Vec<Option<SignalKind>>) -> Self {
        Scripted {
            script,
            lookback: 0,
        }
    }
}

impl SignalStrategy for Scripted {
    fn decide(
        &self,
        history: &[Candle],
        _signal_history: &SignalHistory,
        _max_retries: u32,
    ) -> Result<Signal, StrategyError> {
        match self.script.get(history.len() - 1).copied().flatten() {
            Some(kind) => Ok(Signal::new(kind, Confidence::High, format!("scripted {}", kind))),
            None => Err(StrategyError::Inference("scripted failure".to_string())),
        }
    }

    fn min_lookback(&self) -> usize {
        self.lookback
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

//records what it was shown and always holds
struct Recorder {
    lookback: usize,
    calls: Mutex<Vec<(usize, DateTime<Utc>, usize)>>,
}

impl SignalStrategy for Recorder {
    fn decide(
        &self,
        history: &[Candle],
        signal_history: &SignalHistory,
        _max_retries: u32,
    ) -> Result<Signal, StrategyError> {
        let last = history.last().map(|c| c.timestamp).unwrap_or_else(start);
        self.calls
            .lock()
            .unwrap()
            .push((history.len(), last, signal_history.len()));
        Ok(Signal::hold(Confidence::Low, "recording"))
    }

    fn min_lookback(&self) -> usize {
        self.lookback
    }

    fn name(&self) -> &str {
        "recorder"
    }
}

use SignalKind::{Buy, Hold, Sell};

#[test]
fn long_round_trip_then_reversal_is_forced_flat() {
    let bars = candles(&[100.0, 101.0, 99.0, 102.0, 100.0], Duration::minutes(3));
    let engine = BacktestEngine::new(config(Decimal::ZERO), bars);
    let strategy = Scripted::new(vec![Some(Buy), Some(Hold), Some(Hold), Some(Sell), Some(Hold)]);

    let result = engine.run(&strategy).unwrap();
    let trades = &result.trades_full;

    assert_eq!(trades[0].action, TradeAction::OpenLong);
    assert_eq!(trades[0].bar_index, 0);
    assert_eq!(trades[0].entry_price, dec!(100));

    assert_eq!(trades[1].action, TradeAction::CloseLong);
    assert_eq!(trades[1].bar_index, 3);
    assert_eq!(trades[1].close_price, Some(dec!(102)));
    assert_eq!(trades[1].pnl, Some(dec!(2)));

    //the sell while long reverses into a short that the final bar closes at 100
    assert_eq!(trades[2].action, TradeAction::OpenShort);
    assert_eq!(trades[3].action, TradeAction::CloseShort);
    assert_eq!(trades[3].reason, FINAL_CLOSE_REASON);
    assert_eq!(trades[3].pnl, Some(dec!(2)));

    assert_eq!(result.display.decisions, vec![1, 0, 0, -1, 0]);
    assert_eq!(
        result.display.equity_curve,
        vec![dec!(0), dec!(0), dec!(0), dec!(2), dec!(4)]
    );
    assert_eq!(result.summary.closed_trades, 2);
    assert_eq!(result.summary.win_rate, 100.0);
    assert_eq!(result.summary.net_pnl_total, dec!(4));
}

#[test]
fn long_round_trip_nets_price_move() {
    let bars = candles(&[100.0, 101.0, 99.0, 102.0], Duration::minutes(3));
    let engine = BacktestEngine::new(config(Decimal::ZERO), bars);
    let strategy = Scripted::new(vec![Some(Buy), Some(Hold), Some(Hold), Some(Hold)]);

    let result = engine.run(&strategy).unwrap();
    assert_eq!(result.trades_full.len(), 2);
    assert_eq!(result.display.equity_curve, vec![dec!(0), dec!(0), dec!(0), dec!(2)]);
    assert_eq!(result.summary.closed_trades, 1);
    assert_eq!(result.summary.win_rate, 100.0);
}

#[test]
fn reversal_pays_fees_on_every_leg() {
    let bars = candles(&[100.0, 100.0, 100.0], Duration::minutes(3));
    let engine = BacktestEngine::new(config(dec!(0.0005)), bars);
    let strategy = Scripted::new(vec![Some(Buy), Some(Sell), Some(Hold)]);

    let result = engine.run(&strategy).unwrap();
    let actions: Vec<_> = result.trades_full.iter().map(|t| t.action).collect();
    assert_eq!(
        actions,
        vec![
            TradeAction::OpenLong,
            TradeAction::CloseLong,
            TradeAction::OpenShort,
            TradeAction::CloseShort,
        ]
    );

    assert_eq!(result.trades_full[1].pnl, Some(dec!(-0.10)));
    assert_eq!(result.trades_full[2].entry_fee, dec!(0.05));
    assert_eq!(result.trades_full[2].pnl, None);
    assert_eq!(result.trades_full[3].bar_index, 2);
    assert_eq!(result.trades_full[3].pnl, Some(dec!(-0.10)));

    assert_eq!(result.summary.net_pnl_total, dec!(-0.20));
    assert_eq!(result.summary.fees_total, dec!(0.20));
    assert_eq!(result.summary.win_rate, 0.0);
    assert_eq!(result.display.equity_curve.last(), Some(&dec!(-0.20)));
}

#[test]
fn strategy_failure_becomes_hold() {
    let bars = candles(&[100.0, 101.0, 102.0, 103.0, 104.0], Duration::minutes(3));
    let engine = BacktestEngine::new(config(Decimal::ZERO), bars);
    let strategy = Scripted::new(vec![Some(Hold), Some(Hold), None, Some(Buy), Some(Hold)]);

    let result = engine.run(&strategy).unwrap();
    assert_eq!(result.display.decisions, vec![0, 0, 0, 1, 0]);
    assert_eq!(result.trades_full[0].bar_index, 3);
    assert_eq!(result.summary.net_pnl_total, dec!(1));
}

#[test]
fn strategy_never_sees_future_bars() {
    let bars = candles(&[10.0, 11.0, 12.0, 13.0, 14.0, 15.0], Duration::minutes(3));
    let engine = BacktestEngine::new(config(Decimal::ZERO), bars.clone());
    let recorder = Recorder {
        lookback: 0,
        calls: Mutex::new(Vec::new()),
    };

    engine.run(&recorder).unwrap();

    let calls = recorder.calls.lock().unwrap();
    assert_eq!(calls.len(), bars.len());
    for (i, (len, last, _)) in calls.iter().enumerate() {
        assert_eq!(*len, i + 1);
        assert_eq!(*last, bars[i].timestamp);
    }
}

#[test]
fn warmup_and_lookback_both_gate_trading() {
    let bars = candles(&[10.0; 8], Duration::minutes(3));

    for (warmup, lookback, first) in [(2, 5, 5), (5, 2, 5), (0, 0, 0), (3, 3, 3)] {
        let engine = BacktestEngine::new(
            BacktestConfig {
                warmup_bars: warmup,
                ..config(Decimal::ZERO)
            },
            bars.clone(),
        );
        let recorder = Recorder {
            lookback,
            calls: Mutex::new(Vec::new()),
        };

        let result = engine.run(&recorder).unwrap();
        let calls = recorder.calls.lock().unwrap();
        assert_eq!(calls.first().map(|c| c.0), Some(first + 1));
        assert_eq!(calls.len(), bars.len() - first);
        assert!(result.display.decisions.iter().all(|&d| d == 0));
    }
}

#[test]
fn warmup_suppresses_early_signals() {
    let bars = candles(&[100.0, 50.0, 100.0, 101.0], Duration::minutes(3));
    let engine = BacktestEngine::new(
        BacktestConfig {
            warmup_bars: 2,
            ..config(Decimal::ZERO)
        },
        bars,
    );
    let strategy = Scripted::new(vec![Some(Buy), Some(Sell), Some(Buy), Some(Hold)]);

    let result = engine.run(&strategy).unwrap();
    assert_eq!(result.display.decisions, vec![0, 0, 1, 0]);
    assert_eq!(result.trades_full[0].bar_index, 2);
}

#[test]
fn signal_history_is_bounded_and_grows_per_decision() {
    let bars = candles(&[10.0; 6], Duration::minutes(3));
    let engine = BacktestEngine::new(
        BacktestConfig {
            signal_history_len: 3,
            ..config(Decimal::ZERO)
        },
        bars,
    );
    let recorder = Recorder {
        lookback: 0,
        calls: Mutex::new(Vec::new()),
    };

    engine.run(&recorder).unwrap();
    let seen: Vec<_> = recorder.calls.lock().unwrap().iter().map(|c| c.2).collect();
    assert_eq!(seen, vec![0, 1, 2, 3, 3, 3]);
}

#[test]
fn reruns_are_identical() {
    let closes: Vec<f64> = (0..40).map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0).collect();
    let bars = candles(&closes, Duration::minutes(3));
    let script = (0..40)
        .map(|i| Some(match i % 7 {
            0 => Buy,
            3 => Sell,
            _ => Hold,
        }))
        .collect();
    let strategy = Scripted::new(script);
    let engine = BacktestEngine::new(config(dec!(0.0005)), bars);

    let first = engine.run(&strategy).unwrap();
    let second = engine.run(&strategy).unwrap();
    assert_eq!(first, second);
}

#[test]
fn summary_ignores_display_window() {
    let closes: Vec<f64> = (0..72).map(|i| 100.0 + (i % 5) as f64).collect();
    let bars = candles(&closes, Duration::hours(1));
    let script: Vec<_> = (0..72)
        .map(|i| Some(if i % 4 == 0 { Buy } else if i % 4 == 2 { Sell } else { Hold }))
        .collect();
    let strategy = Scripted::new(script);

    let run_with_window = |window| {
        BacktestEngine::new(
            BacktestConfig {
                days: 3,
                display_window_days: window,
                ..config(dec!(0.0005))
            },
            bars.clone(),
        )
        .run(&strategy)
        .unwrap()
    };

    let full = run_with_window(20);
    let windowed = run_with_window(1);

    assert!(!full.display.windowed);
    assert!(windowed.display.windowed);
    assert_eq!(full.summary, windowed.summary);
    assert_eq!(full.trades_full, windowed.trades_full);
    assert_eq!(full.daily_pnl, windowed.daily_pnl);

    assert_eq!(full.display.labels.len(), 72);
    assert_eq!(windowed.display.labels.len(), 24);
    assert!(windowed.display.trades.len() < full.display.trades.len());
    assert_eq!(
        windowed.display.equity_curve.last(),
        full.display.equity_curve.last()
    );
}

#[test]
fn every_run_ends_flat_and_reconciles() {
    let closes: Vec<f64> = (0..30).map(|i| 50.0 + i as f64).collect();
    let bars = candles(&closes, Duration::minutes(3));

    for open in [Buy, Sell] {
        let mut script = vec![Some(Hold); 30];
        script[4] = Some(open);
        let result = BacktestEngine::new(config(dec!(0.001)), bars.clone())
            .run(&Scripted::new(script))
            .unwrap();

        let last = result.trades_full.last().unwrap();
        assert!(last.action.is_close());
        assert_eq!(last.bar_index, 29);
        assert_eq!(
            result.display.equity_curve.last(),
            Some(&result.summary.net_pnl_total)
        );
    }
}

#[test]
fn empty_series_is_an_error() {
    let engine = BacktestEngine::new(config(Decimal::ZERO), Vec::new());
    let err = engine.run(&Scripted::new(Vec::new())).unwrap_err();
    assert_eq!(err, BacktestError::InsufficientData);
}

#[test]
fn daily_pnl_sums_to_net_pnl() {
    let closes: Vec<f64> = (0..96).map(|i| 100.0 + ((i * 7) % 11) as f64).collect();
    let bars = candles(&closes, Duration::hours(1));
    let script: Vec<_> = (0..96)
        .map(|i| Some(if i % 6 == 1 { Buy } else if i % 6 == 4 { Sell } else { Hold }))
        .collect();

    let result = BacktestEngine::new(config(dec!(0.0005)), bars)
        .run(&Scripted::new(script))
        .unwrap();

    let total: Decimal = result.daily_pnl.iter().map(|d| d.pnl).sum();
    assert_eq!(total, result.summary.net_pnl_total);
    assert!(result
        .daily_pnl
        .windows(2)
        .all(|pair| pair[0].date > pair[1].date));
}

fn indicator_bars(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| {
            let x = i as f64 * 0.4;
            let close = 100.0 + x.sin() * 3.0;
            Candle::new(start() + Duration::minutes(3 * i as i64), close, close, close, close, 1.0)
                .unwrap()
                .with_indicator("macd_histogram", x.sin())
                .with_indicator("macd_signal", (x - 0.3).sin())
                .with_indicator("bb_lower", close - 2.0 + (x * 1.3).cos() * 2.5)
                .with_indicator("bb_middle", 100.0)
                .with_indicator("bb_upper", 104.0)
                .with_indicator("bb_position", 0.5 + x.cos() * 0.4)
        })
        .collect()
}

#[test]
fn parallel_runs_match_sequential_runs() {
    let engine = BacktestEngine::new(config(dec!(0.0005)), indicator_bars(120));
    let versions = StrategyVersion::all();

    let parallel = engine.run_many(&versions);
    assert_eq!(parallel.len(), versions.len());

    for (version, outcome) in parallel {
        let strategy = version.build();
        let sequential = engine.run(strategy.as_ref()).unwrap();
        let parallel = outcome.unwrap();
        assert_eq!(parallel, sequential);
        assert_eq!(parallel.summary.strategy, version.tag());
    }
}

#[test]
fn missing_indicator_columns_only_hold() {
    //plain candles carry no indicators, every decide call fails
    let bars = candles(&[100.0; 10], Duration::minutes(3));
    let engine = BacktestEngine::new(config(Decimal::ZERO), bars);

    for (_, outcome) in engine.run_many(&StrategyVersion::all()) {
        let result = outcome.unwrap();
        assert!(result.trades_full.is_empty());
        assert!(result.display.decisions.iter().all(|&d| d == 0));
    }
}

#[test]
fn csv_file_replays_end_to_end() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "timestamp,open,high,low,close,volume,macd_histogram").unwrap();
    let rows = [
        ("2025-01-01 00:00:00", 100.0, 0.3),
        ("2025-01-01 00:03:00", 99.0, -0.2),
        ("2025-01-01 00:06:00", 98.0, -0.5),
        ("2025-01-01 00:09:00", 97.0, -0.1),
        ("2025-01-01 00:12:00", 101.0, 0.4),
        ("2025-01-01 00:15:00", 103.0, 0.2),
    ];
    for (ts, close, hist) in rows {
        writeln!(file, "{},{c},{c},{c},{c},5,{}", ts, hist, c = close).unwrap();
    }

    let bars = load_csv(file.path()).unwrap();
    let bars = slice_horizon(&bars, 2, None);
    assert_eq!(bars.len(), 6);

    let engine = BacktestEngine::new(config(Decimal::ZERO), bars);
    let result = engine.run(&MacdTurnStrategy::new()).unwrap();

    //trough at bar 2 confirmed on bar 3, peak at bar 4 confirmed on bar 5
    assert_eq!(result.display.decisions, vec![0, 0, 0, 1, 0, -1]);
    assert_eq!(result.trades_full[1].pnl, Some(dec!(6)));
    assert_eq!(result.display.indicators["macd_histogram"].len(), 6);
    assert_eq!(result.display.labels[0], "2025-01-01 00:00");
}
