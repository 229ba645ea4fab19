pub mod daily;
pub mod summary;
pub mod timeseries;
pub mod window;

pub use daily::{daily_pnl, DailyPnl};
pub use summary::Summary;
pub use timeseries::{calculate_equity_curve, max_drawdown, EquityPoint};
pub use window::{format_label, DisplayView};

use crate::data::Candle;
use crate::engine::{BacktestConfig, TradeRecord};
use rust_decimal::Decimal;

//summary over the full run plus the (possibly windowed) display view
pub fn summarize(
    strategy: &str,
    trades: &[TradeRecord],
    decisions: &[i8],
    equity: &[Decimal],
    candles: &[Candle],
    config: &BacktestConfig,
) -> (Summary, DisplayView) {
    let summary = Summary::from_backtest(strategy, trades, equity, config.days, &config.interval);
    let view = DisplayView::build(
        candles,
        decisions,
        equity,
        trades,
        config.days,
        config.display_window_days,
        config.display_offset,
    );
    (summary, view)
}
