pub mod bollinger_breakout;
pub mod macd_bollinger;
pub mod macd_turn;

use crate::data::Candle;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

pub use bollinger_breakout::BollingerBreakoutStrategy;
pub use macd_bollinger::{MacdBollingerStrategy, SellFilter};
pub use macd_turn::MacdTurnStrategy;

//default capacity of the rolling signal history
pub const DEFAULT_SIGNAL_HISTORY_LEN: usize = 50;

//trading direction requested by a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
    Hold,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SignalKind::Buy => "BUY",
            SignalKind::Sell => "SELL",
            SignalKind::Hold => "HOLD",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

//a decision produced fresh for one bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub confidence: Confidence,
    pub reason: String,
    pub strategy_version: Option<String>,
    //risk levels are left to the caller when absent
    pub stop_loss: Option<f64>,
    pub take_profit: Option<f64>,
}

impl Signal {
    pub fn new(kind: SignalKind, confidence: Confidence, reason: impl Into<String>) -> Self {
        Signal {
            kind,
            confidence,
            reason: reason.into(),
            strategy_version: None,
            stop_loss: None,
            take_profit: None,
        }
    }

    pub fn buy(confidence: Confidence, reason: impl Into<String>) -> Self {
        Self::new(SignalKind::Buy, confidence, reason)
    }

    pub fn sell(confidence: Confidence, reason: impl Into<String>) -> Self {
        Self::new(SignalKind::Sell, confidence, reason)
    }

    pub fn hold(confidence: Confidence, reason: impl Into<String>) -> Self {
        Self::new(SignalKind::Hold, confidence, reason)
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.strategy_version = Some(version.into());
        self
    }
}

//per-bar strategy failure, absorbed by the simulator as HOLD
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StrategyError {
    #[error("indicator '{name}' missing at bar offset -{offset}")]
    MissingIndicator { name: String, offset: usize },
    #[error("need at least {required} bars, got {available}")]
    InsufficientHistory { required: usize, available: usize },
    #[error("inference failed: {0}")]
    Inference(String),
}

//caller-owned bounded buffer of recently produced signals
#[derive(Debug, Clone)]
pub struct SignalHistory {
    signals: VecDeque<Signal>,
    capacity: usize,
}

impl SignalHistory {
    pub fn new(capacity: usize) -> Self {
        SignalHistory {
            signals: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    //appends a signal, evicting the oldest once full
    pub fn push(&mut self, signal: Signal) {
        if self.capacity == 0 {
            return;
        }
        if self.signals.len() >= self.capacity {
            self.signals.pop_front();
        }
        self.signals.push_back(signal);
    }

    pub fn len(&self) -> usize {
        self.signals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signals.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    //oldest first
    pub fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    pub fn last(&self) -> Option<&Signal> {
        self.signals.back()
    }
}

impl Default for SignalHistory {
    fn default() -> Self {
        Self::new(DEFAULT_SIGNAL_HISTORY_LEN)
    }
}

//decision capability the simulator drives once per tradeable bar
//
//`history` always ends at the bar being decided; implementations never see later bars.
pub trait SignalStrategy: Send + Sync {
    fn decide(
        &self,
        history: &[Candle],
        signal_history: &SignalHistory,
        max_retries: u32,
    ) -> Result<Signal, StrategyError>;

    //number of prior bars required before the strategy may act
    fn min_lookback(&self) -> usize {
        0
    }

    fn name(&self) -> &str;
}

//selectable built-in strategy implementations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyVersion {
    #[default]
    MacdTurn,
    BollingerLowerMacdSell,
    MacdBollinger,
    MacdTurnSellBbUpper,
}

impl StrategyVersion {
    //parse strategy version from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "v2" | "v2_macd_turn" | "macd_turn" => Some(StrategyVersion::MacdTurn),
            "v3" | "v3_bb_lower_macd_sell" | "bollinger_lower_macd_sell" => {
                Some(StrategyVersion::BollingerLowerMacdSell)
            }
            "v4" | "v4_macd_bollinger" | "macd_bollinger" => Some(StrategyVersion::MacdBollinger),
            "v5" | "v5_macd_turn_sell_bb_upper" | "macd_turn_sell_bb_upper" => {
                Some(StrategyVersion::MacdTurnSellBbUpper)
            }
            _ => None,
        }
    }

    pub fn all() -> [StrategyVersion; 4] {
        [
            StrategyVersion::MacdTurn,
            StrategyVersion::BollingerLowerMacdSell,
            StrategyVersion::MacdBollinger,
            StrategyVersion::MacdTurnSellBbUpper,
        ]
    }

    //version tag stamped on every signal
    pub fn tag(&self) -> &'static str {
        match self {
            StrategyVersion::MacdTurn => "v2_macd_turn",
            StrategyVersion::BollingerLowerMacdSell => "v3_bb_lower_macd_sell",
            StrategyVersion::MacdBollinger => "v4_macd_bollinger",
            StrategyVersion::MacdTurnSellBbUpper => "v5_macd_turn_sell_bb_upper",
        }
    }

    pub fn build(&self) -> Box<dyn SignalStrategy> {
        match self {
            StrategyVersion::MacdTurn => Box::new(MacdTurnStrategy::new()),
            StrategyVersion::BollingerLowerMacdSell => Box::new(BollingerBreakoutStrategy::new()),
            StrategyVersion::MacdBollinger => {
                Box::new(MacdBollingerStrategy::new(SellFilter::None))
            }
            StrategyVersion::MacdTurnSellBbUpper => {
                Box::new(MacdBollingerStrategy::new(SellFilter::AboveMiddleBand))
            }
        }
    }
}

impl fmt::Display for StrategyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

//helper to read an indicator `offset` bars back from the end of `history` (1 = current bar)
pub fn indicator_back(history: &[Candle], offset: usize, name: &str) -> Result<f64, StrategyError> {
    if offset == 0 || offset > history.len() {
        return Err(StrategyError::InsufficientHistory {
            required: offset,
            available: history.len(),
        });
    }

    history[history.len() - offset]
        .indicator(name)
        .ok_or_else(|| StrategyError::MissingIndicator {
            name: name.to_string(),
            offset,
        })
}

//helper to require a minimum history length
pub fn require_bars(history: &[Candle], required: usize) -> Result<(), StrategyError> {
    if history.len() < required {
        return Err(StrategyError::InsufficientHistory {
            required,
            available: history.len(),
        });
    }
    Ok(())
}
