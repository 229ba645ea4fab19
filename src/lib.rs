//a bar-replay backtest engine for single-instrument signal strategies

pub mod config;
pub mod data;
pub mod engine;
pub mod metrics;
pub mod portfolio;
pub mod strategy;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{BacktestConfiguration, ConfigError, Interval, MAX_BACKTEST_DAYS};
    pub use crate::data::{load_csv, slice_horizon, Candle, CandleError};
    pub use crate::engine::{
        BacktestConfig, BacktestEngine, BacktestError, BacktestResult, Fill, TradeAction,
        TradeRecord, FINAL_CLOSE_REASON,
    };
    pub use crate::metrics::{summarize, DailyPnl, DisplayView, EquityPoint, Summary};
    pub use crate::portfolio::{Account, Position, PositionSide};
    pub use crate::strategy::{
        BollingerBreakoutStrategy, Confidence, MacdBollingerStrategy, MacdTurnStrategy, SellFilter,
        Signal, SignalHistory, SignalKind, SignalStrategy, StrategyError, StrategyVersion,
    };
}
