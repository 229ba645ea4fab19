use crate::data::Candle;
use crate::strategy::{
    indicator_back, require_bars, Confidence, Signal, SignalHistory, SignalStrategy,
    StrategyError,
};

const HISTOGRAM: &str = "macd_histogram";

//macd histogram turning-point strategy
//buys when the histogram forms a trough below zero
//sells when the histogram forms a peak above zero
#[derive(Debug, Clone, Default)]
pub struct MacdTurnStrategy;

impl MacdTurnStrategy {
    pub fn new() -> Self {
        MacdTurnStrategy
    }
}

impl SignalStrategy for MacdTurnStrategy {
    fn decide(
        &self,
        history: &[Candle],
        _signal_history: &SignalHistory,
        _max_retries: u32,
    ) -> Result<Signal, StrategyError> {
        require_bars(history, 3)?;

        let current = indicator_back(history, 1, HISTOGRAM)?;
        let prev = indicator_back(history, 2, HISTOGRAM)?;
        let prev_2 = indicator_back(history, 3, HISTOGRAM)?;

        let mut reason = format!(
            "MACD histogram: P-2={:.4}, P-1={:.4}, P-0={:.4}.",
            prev_2, prev, current
        );

        let signal = if prev_2 > prev && prev < current && prev < 0.0 {
            reason.push_str(" Trough below zero, bullish turn.");
            Signal::buy(Confidence::High, reason)
        } else if prev_2 < prev && prev > current && prev > 0.0 {
            reason.push_str(" Peak above zero, bearish turn.");
            Signal::sell(Confidence::High, reason)
        } else {
            reason.push_str(" No turning point.");
            Signal::hold(Confidence::Medium, reason)
        };

        Ok(signal.with_version(self.name()))
    }

    fn min_lookback(&self) -> usize {
        3
    }

    fn name(&self) -> &str {
        "v2_macd_turn"
    }
}
