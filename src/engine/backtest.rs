use crate::data::Candle;
use crate::engine::execution::{Fill, TradeRecord};
use crate::metrics::{calculate_equity_curve, daily_pnl, summarize, DailyPnl, DisplayView, EquityPoint, Summary};
use crate::portfolio::{fixed_quantity, ledger_bound, Account};
use crate::strategy::{Confidence, Signal, SignalHistory, SignalStrategy, StrategyVersion, DEFAULT_SIGNAL_HISTORY_LEN};
use chrono::{FixedOffset, Offset, Utc};
use rayon::prelude::*;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

pub const FINAL_CLOSE_REASON: &str = "final forced close";

#[derive(Error, Debug, PartialEq)]
pub enum BacktestError {
    #[error("no candles to replay")]
    InsufficientData,
    #[error("bar {index} has an unusable close price {close}")]
    InvalidPrice { index: usize, close: f64 },
    #[error("bar {index} is earlier than the bar before it")]
    UnorderedCandles { index: usize },
    #[error("ledger values overflow at bar {index}")]
    Overflow { index: usize },
}

//runtime settings for a single replay
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub days: u32,
    pub interval: String,
    pub fee_rate: Decimal,
    pub fixed_notional: Decimal,
    //leading bars that are always forced to HOLD
    pub warmup_bars: usize,
    pub display_window_days: u32,
    pub display_offset: FixedOffset,
    pub max_retries: u32,
    pub signal_history_len: usize,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            days: 2,
            interval: "3m".to_string(),
            fee_rate: dec!(0.0005),
            fixed_notional: dec!(100),
            warmup_bars: 480,
            display_window_days: 20,
            display_offset: FixedOffset::east_opt(8 * 3600).unwrap_or_else(|| Utc.fix()),
            max_retries: 1,
            signal_history_len: DEFAULT_SIGNAL_HISTORY_LEN,
        }
    }
}

//result of a backtest
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BacktestResult {
    pub summary: Summary,
    //chart series, truncated to the display window on long runs
    #[serde(flatten)]
    pub display: DisplayView,
    pub trades_full: Vec<TradeRecord>,
    pub equity_full: Vec<EquityPoint>,
    pub daily_pnl: Vec<DailyPnl>,
}

//replays a candle series through a strategy
pub struct BacktestEngine {
    config: BacktestConfig,
    candles: Vec<Candle>,
}

impl BacktestEngine {
    //creates a new backtest engine
    pub fn new(config: BacktestConfig, candles: Vec<Candle>) -> Self {
        BacktestEngine { config, candles }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    pub fn candles(&self) -> &[Candle] {
        &self.candles
    }

    //runs the backtest with the given strategy
    //
    //every run starts from a fresh flat account, so the engine can be reused.
    pub fn run(&self, strategy: &dyn SignalStrategy) -> Result<BacktestResult, BacktestError> {
        let prices = self.ledger_prices()?;
        let n = self.candles.len();

        let quantity = fixed_quantity(self.config.fixed_notional, prices[0])
            .ok_or(BacktestError::Overflow { index: 0 })?;
        for (index, &price) in prices.iter().enumerate() {
            ledger_bound(price, quantity, self.config.fee_rate, n)
                .ok_or(BacktestError::Overflow { index })?;
        }
        let mut account = Account::new(quantity, self.config.fee_rate);
        let mut signal_history = SignalHistory::new(self.config.signal_history_len);
        let mut decisions = Vec::with_capacity(n);
        let mut equity = Vec::with_capacity(n);
        let mut failures = 0usize;

        let lookback = strategy.min_lookback();
        info!(
            strategy = strategy.name(),
            bars = n,
            warmup = self.config.warmup_bars,
            lookback,
            %quantity,
            "starting replay"
        );

        //main replay loop
        for (index, candle) in self.candles.iter().enumerate() {
            let decision = if index < self.config.warmup_bars || index < lookback {
                0
            } else {
                //the strategy only ever sees bars up to and including this one
                let history = &self.candles[..=index];
                let signal = match strategy.decide(history, &signal_history, self.config.max_retries) {
                    Ok(signal) => {
                        signal_history.push(signal.clone());
                        signal
                    }
                    Err(err) => {
                        failures += 1;
                        warn!(bar = index, error = %err, "strategy failed, holding");
                        Signal::hold(Confidence::Low, format!("strategy error: {}", err))
                    }
                };

                let fill = Fill::new(index, candle.timestamp, prices[index], signal.reason);
                account.apply_signal(signal.kind, &fill)
            };

            decisions.push(decision);
            equity.push(account.equity());
        }

        //flatten whatever is still open at the last close
        let last = n - 1;
        let fill = Fill::new(last, self.candles[last].timestamp, prices[last], FINAL_CLOSE_REASON);
        if let Some(record) = account.force_close(&fill) {
            debug!(action = ?record.action, pnl = ?record.pnl, "closed final position");
            if let Some(sample) = equity.last_mut() {
                *sample = account.equity();
            }
        }

        assert!(account.position.is_flat(), "position left open after replay");

        info!(
            strategy = strategy.name(),
            trades = account.trade_log.len(),
            net_pnl = %account.realized_pnl,
            failures,
            "replay finished"
        );

        Ok(self.build_result(strategy.name(), account.trade_log, decisions, equity))
    }

    //runs independent strategy versions over the same candles in parallel
    pub fn run_many(
        &self,
        versions: &[StrategyVersion],
    ) -> Vec<(StrategyVersion, Result<BacktestResult, BacktestError>)> {
        versions
            .par_iter()
            .map(|version| {
                let strategy = version.build();
                (*version, self.run(strategy.as_ref()))
            })
            .collect()
    }

    //closes converted for the ledger, rejecting series a run cannot price or order
    fn ledger_prices(&self) -> Result<Vec<Decimal>, BacktestError> {
        if self.candles.is_empty() {
            return Err(BacktestError::InsufficientData);
        }

        if let Some(index) = self
            .candles
            .windows(2)
            .position(|pair| pair[1].timestamp < pair[0].timestamp)
        {
            return Err(BacktestError::UnorderedCandles { index: index + 1 });
        }

        self.candles
            .iter()
            .enumerate()
            .map(|(index, candle)| {
                let close = candle.close;
                //tiny closes can round to zero once converted
                match Decimal::from_f64(close) {
                    Some(price) if close.is_finite() && price > Decimal::ZERO => Ok(price),
                    _ => Err(BacktestError::InvalidPrice { index, close }),
                }
            })
            .collect()
    }

    fn build_result(
        &self,
        strategy: &str,
        trades: Vec<TradeRecord>,
        decisions: Vec<i8>,
        equity: Vec<Decimal>,
    ) -> BacktestResult {
        let (summary, display) = summarize(
            strategy,
            &trades,
            &decisions,
            &equity,
            &self.candles,
            &self.config,
        );

        let timestamps: Vec<_> = self.candles.iter().map(|c| c.timestamp).collect();
        let equity_full = calculate_equity_curve(&timestamps, &equity);
        let daily_pnl = daily_pnl(&trades, self.config.display_offset);

        BacktestResult {
            summary,
            display,
            trades_full: trades,
            equity_full,
            daily_pnl,
        }
    }
}
