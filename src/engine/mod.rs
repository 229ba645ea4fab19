pub mod backtest;
pub mod execution;

pub use backtest::{BacktestConfig, BacktestEngine, BacktestError, BacktestResult, FINAL_CLOSE_REASON};
pub use execution::{Fill, TradeAction, TradeRecord};
