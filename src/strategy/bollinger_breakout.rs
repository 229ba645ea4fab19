use crate::data::Candle;
use crate::strategy::{
    indicator_back, require_bars, Confidence, Signal, SignalHistory, SignalStrategy,
    StrategyError,
};
use statrs::statistics::Statistics;

const HISTOGRAM: &str = "macd_histogram";
const BB_LOWER: &str = "bb_lower";
const BB_POSITION: &str = "bb_position";

//bars whose band position is averaged for the sell filter, excluding the current bar
const POSITION_WINDOW: usize = 10;
const UPPER_ZONE: f64 = 0.6;

//lower-band breakout strategy
//buys when price breaks below the lower band while the histogram keeps falling
//sells on a histogram peak while price has been riding the upper part of the bands
//
//histogram checks use the three completed bars before the current one.
#[derive(Debug, Clone, Default)]
pub struct BollingerBreakoutStrategy;

impl BollingerBreakoutStrategy {
    pub fn new() -> Self {
        BollingerBreakoutStrategy
    }
}

impl SignalStrategy for BollingerBreakoutStrategy {
    fn decide(
        &self,
        history: &[Candle],
        _signal_history: &SignalHistory,
        _max_retries: u32,
    ) -> Result<Signal, StrategyError> {
        require_bars(history, POSITION_WINDOW + 3)?;

        let current = &history[history.len() - 1];
        let previous = &history[history.len() - 2];

        let bb_lower = indicator_back(history, 1, BB_LOWER)?;
        let bb_lower_prev = indicator_back(history, 2, BB_LOWER)?;

        let hist_3 = indicator_back(history, 4, HISTOGRAM)?;
        let hist_2 = indicator_back(history, 3, HISTOGRAM)?;
        let hist_1 = indicator_back(history, 2, HISTOGRAM)?;

        let positions = (2..=POSITION_WINDOW + 1)
            .map(|offset| indicator_back(history, offset, BB_POSITION))
            .collect::<Result<Vec<f64>, _>>()?;
        let avg_position = positions.iter().mean();

        let breaks_lower = previous.close >= bb_lower_prev && current.close < bb_lower;
        let histogram_falling = hist_3 > hist_2 && hist_2 > hist_1;
        let histogram_peak = hist_3 < hist_2 && hist_2 > hist_1;

        let signal = if breaks_lower && histogram_falling {
            Signal::buy(
                Confidence::High,
                format!(
                    "Close {:.2} broke below lower band {:.2} (prev {:.2} >= {:.2}); \
                     MACD histogram falling {:.4} > {:.4} > {:.4}. Expecting rebound.",
                    current.close, bb_lower, previous.close, bb_lower_prev, hist_3, hist_2, hist_1
                ),
            )
        } else if histogram_peak && avg_position > UPPER_ZONE {
            Signal::sell(
                Confidence::High,
                format!(
                    "MACD histogram peak {:.4} < {:.4} > {:.4}; average band position {:.3} over \
                     last {} bars. Momentum fading near upper band.",
                    hist_3, hist_2, hist_1, avg_position, POSITION_WINDOW
                ),
            )
        } else {
            Signal::hold(
                Confidence::Medium,
                format!(
                    "Close {:.2}, lower band {:.2}; MACD {:.4}/{:.4}/{:.4}; band position {:.3}.",
                    current.close, bb_lower, hist_3, hist_2, hist_1, avg_position
                ),
            )
        };

        Ok(signal.with_version(self.name()))
    }

    fn min_lookback(&self) -> usize {
        POSITION_WINDOW + 2
    }

    fn name(&self) -> &str {
        "v3_bb_lower_macd_sell"
    }
}
