use crate::data::Candle;
use crate::strategy::{
    indicator_back, require_bars, Confidence, Signal, SignalHistory, SignalStrategy,
    StrategyError,
};

const SIGNAL_LINE: &str = "macd_signal";
const BB_LOWER: &str = "bb_lower";
const BB_MIDDLE: &str = "bb_middle";

//floor and relative size of a "fast" signal-line decline
const MIN_DECLINE: f64 = 0.005;
const RELATIVE_DECLINE: f64 = 0.10;

//how the strategy treats band position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SellFilter {
    //sell on every peak, additionally buy on lower-band capitulation
    None,
    //only sell while price sits above the middle band
    AboveMiddleBand,
}

//macd signal-line turning-point strategy with bollinger band conditions
//
//the trough/peak is confirmed on the bar after it, so a turn at P-2 triggers at P-0.
#[derive(Debug, Clone)]
pub struct MacdBollingerStrategy {
    filter: SellFilter,
}

impl MacdBollingerStrategy {
    pub fn new(filter: SellFilter) -> Self {
        MacdBollingerStrategy { filter }
    }
}

impl SignalStrategy for MacdBollingerStrategy {
    fn decide(
        &self,
        history: &[Candle],
        _signal_history: &SignalHistory,
        _max_retries: u32,
    ) -> Result<Signal, StrategyError> {
        require_bars(history, 4)?;

        let s3 = indicator_back(history, 4, SIGNAL_LINE)?;
        let s2 = indicator_back(history, 3, SIGNAL_LINE)?;
        let s1 = indicator_back(history, 2, SIGNAL_LINE)?;
        let s0 = indicator_back(history, 1, SIGNAL_LINE)?;
        let close = history[history.len() - 1].close;

        let mut reason = format!(
            "MACD signal line: P-3={:.4}, P-2={:.4}, P-1={:.4}, P-0={:.4}.",
            s3, s2, s1, s0
        );

        let trough = s3 > s2 && s2 < s1 && s2 < 0.0;
        let peak = s3 < s2 && s2 > s1 && s2 > 0.0;

        let signal = match self.filter {
            SellFilter::None => {
                let bb_lower = indicator_back(history, 1, BB_LOWER)?;
                let threshold = MIN_DECLINE.max(s0.abs() * RELATIVE_DECLINE);
                let decline_1 = s2 - s1;
                let decline_2 = s1 - s0;
                let capitulation = close <= bb_lower
                    && s2 > s1
                    && s1 > s0
                    && decline_1 >= threshold
                    && decline_2 >= threshold;

                if trough {
                    reason.push_str(" Trough below zero, bullish.");
                    Signal::buy(Confidence::High, reason)
                } else if capitulation {
                    reason.push_str(&format!(
                        " Close {:.2} <= lower band {:.2} with fast declines {:.5}/{:.5} >= {:.5}, \
                         expecting technical rebound.",
                        close, bb_lower, decline_1, decline_2, threshold
                    ));
                    Signal::buy(Confidence::Medium, reason)
                } else if peak {
                    reason.push_str(" Peak above zero, bearish.");
                    Signal::sell(Confidence::High, reason)
                } else {
                    reason.push_str(" No turn or breakout.");
                    Signal::hold(Confidence::Medium, reason)
                }
            }
            SellFilter::AboveMiddleBand => {
                let bb_middle = indicator_back(history, 1, BB_MIDDLE)?;
                reason.push_str(&format!(" Close={:.2}, middle band={:.2}.", close, bb_middle));

                if trough {
                    reason.push_str(" Trough below zero, bullish.");
                    Signal::buy(Confidence::High, reason)
                } else if peak && close > bb_middle {
                    reason.push_str(" Peak above zero in upper half of bands, bearish.");
                    Signal::sell(Confidence::High, reason)
                } else if peak {
                    reason.push_str(" Peak above zero but price below middle band, sell filtered.");
                    Signal::hold(Confidence::Medium, reason)
                } else {
                    reason.push_str(" No turn.");
                    Signal::hold(Confidence::Medium, reason)
                }
            }
        };

        Ok(signal.with_version(self.name()))
    }

    fn min_lookback(&self) -> usize {
        3
    }

    fn name(&self) -> &str {
        match self.filter {
            SellFilter::None => "v4_macd_bollinger",
            SellFilter::AboveMiddleBand => "v5_macd_turn_sell_bb_upper",
        }
    }
}
