use crate::data::Candle;
use crate::engine::execution::TradeRecord;
use chrono::{DateTime, Duration, FixedOffset, Utc};
use indexmap::IndexMap;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const LABEL_FORMAT: &str = "%Y-%m-%d %H:%M";

//per-bar series ready for charting, possibly truncated to the most recent window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayView {
    pub labels: Vec<String>,
    pub prices: Vec<f64>,
    pub decisions: Vec<i8>,
    pub equity_curve: Vec<Decimal>,
    //one column per indicator name seen in the window, aligned to `labels`
    pub indicators: IndexMap<String, Vec<Option<f64>>>,
    pub trades: Vec<TradeRecord>,
    pub windowed: bool,
}

impl DisplayView {
    //builds the view over `candles`, keeping only bars within `window_days` of the last bar
    //when the run horizon exceeds the window
    //
    //`decisions` and `equity` must be aligned with `candles`.
    pub fn build(
        candles: &[Candle],
        decisions: &[i8],
        equity: &[Decimal],
        trades: &[TradeRecord],
        days: u32,
        window_days: u32,
        offset: FixedOffset,
    ) -> Self {
        assert_eq!(candles.len(), decisions.len(), "decisions must align with bars");
        assert_eq!(candles.len(), equity.len(), "equity must align with bars");

        let cutoff = match candles.last() {
            Some(last) if days > window_days => {
                Some(last.timestamp - Duration::days(i64::from(window_days)))
            }
            _ => None,
        };

        let start = match cutoff {
            Some(cutoff) => candles.partition_point(|c| c.timestamp <= cutoff),
            None => 0,
        };

        let shown = &candles[start..];
        let trades = match cutoff {
            Some(cutoff) => trades
                .iter()
                .filter(|t| t.timestamp > cutoff)
                .cloned()
                .collect(),
            None => trades.to_vec(),
        };

        DisplayView {
            labels: shown
                .iter()
                .map(|c| format_label(c.timestamp, offset))
                .collect(),
            prices: shown.iter().map(|c| c.close).collect(),
            decisions: decisions[start..].to_vec(),
            equity_curve: equity[start..].to_vec(),
            indicators: indicator_columns(shown),
            trades,
            windowed: cutoff.is_some(),
        }
    }
}

//bar label in the display timezone
pub fn format_label(timestamp: DateTime<Utc>, offset: FixedOffset) -> String {
    timestamp.with_timezone(&offset).format(LABEL_FORMAT).to_string()
}

fn indicator_columns(candles: &[Candle]) -> IndexMap<String, Vec<Option<f64>>> {
    let mut columns: IndexMap<String, Vec<Option<f64>>> = IndexMap::new();
    for candle in candles {
        for name in candle.indicators.keys() {
            if !columns.contains_key(name) {
                columns.insert(name.clone(), Vec::with_capacity(candles.len()));
            }
        }
    }

    for (name, column) in columns.iter_mut() {
        column.extend(candles.iter().map(|c| c.indicator(name)));
    }

    columns
}
