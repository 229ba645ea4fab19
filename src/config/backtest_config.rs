use crate::engine::BacktestConfig;
use crate::strategy::{StrategyVersion, DEFAULT_SIGNAL_HISTORY_LEN};
use chrono::{DateTime, FixedOffset, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

//longest horizon a single run may replay
pub const MAX_BACKTEST_DAYS: u32 = 300;

const SECONDS_PER_DAY: u32 = 24 * 60 * 60;

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("invalid interval '{0}', expected e.g. 3m, 15m, 1h, 1d")]
    InvalidInterval(String),
    #[error("fee rate must not be negative, got {0}")]
    NegativeFeeRate(Decimal),
    #[error("fixed notional must be positive, got {0}")]
    NonPositiveNotional(Decimal),
    #[error("display window must be at least one day")]
    ZeroDisplayWindow,
    #[error("utc offset {0}h is outside -12..=14")]
    InvalidUtcOffset(i32),
    #[error("unknown strategy version '{0}'")]
    UnknownStrategy(String),
}

//bar spacing, stored in seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Interval {
    seconds: u32,
}

impl Interval {
    pub fn from_seconds(seconds: u32) -> Result<Self, ConfigError> {
        if seconds == 0 || seconds > SECONDS_PER_DAY {
            return Err(ConfigError::InvalidInterval(format!("{}s", seconds)));
        }
        Ok(Interval { seconds })
    }

    //bars in one 24h trading day (crypto markets never close)
    pub fn bars_per_day(&self) -> usize {
        (SECONDS_PER_DAY / self.seconds) as usize
    }
}

impl FromStr for Interval {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ConfigError::InvalidInterval(s.to_string());
        let s = s.trim();
        if s.len() < 2 {
            return Err(invalid());
        }

        let (count, unit) = s.split_at(s.len() - 1);
        let count: u32 = count.parse().map_err(|_| invalid())?;
        let unit_seconds = match unit {
            "s" => 1,
            "m" => 60,
            "h" => 60 * 60,
            "d" => SECONDS_PER_DAY,
            _ => return Err(invalid()),
        };

        count
            .checked_mul(unit_seconds)
            .ok_or_else(invalid)
            .and_then(|seconds| Interval::from_seconds(seconds).map_err(|_| invalid()))
    }
}

impl TryFrom<String> for Interval {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Interval> for String {
    fn from(value: Interval) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = self.seconds;
        if s % SECONDS_PER_DAY == 0 {
            write!(f, "{}d", s / SECONDS_PER_DAY)
        } else if s % 3600 == 0 {
            write!(f, "{}h", s / 3600)
        } else if s % 60 == 0 {
            write!(f, "{}m", s / 60)
        } else {
            write!(f, "{}s", s)
        }
    }
}

impl Default for Interval {
    fn default() -> Self {
        Interval { seconds: 3 * 60 }
    }
}

//complete backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfiguration {
    //horizon
    pub days: u32,
    pub interval: Interval,
    pub end_time: Option<DateTime<Utc>>,

    //strategy
    pub strategy_version: StrategyVersion,
    pub max_retries: u32,
    pub signal_history_len: usize,

    //accounting
    pub fee_rate: Decimal,
    pub fixed_notional: Decimal,

    //replay
    //none means one trading day of bars at the configured interval
    pub warmup_bars: Option<usize>,

    //presentation
    pub display_window_days: u32,
    pub utc_offset_hours: i32,
}

impl Default for BacktestConfiguration {
    fn default() -> Self {
        BacktestConfiguration {
            days: 2,
            interval: Interval::default(),
            end_time: None,
            strategy_version: StrategyVersion::default(),
            max_retries: 1,
            signal_history_len: DEFAULT_SIGNAL_HISTORY_LEN,
            fee_rate: dec!(0.0005),
            fixed_notional: dec!(100),
            warmup_bars: None,
            display_window_days: 20,
            utc_offset_hours: 8,
        }
    }
}

impl BacktestConfiguration {
    //checks the values a run cannot recover from
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fee_rate < Decimal::ZERO {
            return Err(ConfigError::NegativeFeeRate(self.fee_rate));
        }
        if self.fixed_notional <= Decimal::ZERO {
            return Err(ConfigError::NonPositiveNotional(self.fixed_notional));
        }
        if self.display_window_days == 0 {
            return Err(ConfigError::ZeroDisplayWindow);
        }
        if !(-12..=14).contains(&self.utc_offset_hours) {
            return Err(ConfigError::InvalidUtcOffset(self.utc_offset_hours));
        }
        Ok(())
    }

    //days clamped into 1..=MAX_BACKTEST_DAYS
    pub fn effective_days(&self) -> u32 {
        let days = self.days.clamp(1, MAX_BACKTEST_DAYS);
        if days != self.days {
            tracing::warn!(requested = self.days, days, "backtest horizon clamped");
        }
        days
    }

    pub fn effective_warmup_bars(&self) -> usize {
        self.warmup_bars
            .unwrap_or_else(|| self.interval.bars_per_day())
    }

    pub fn display_offset(&self) -> Result<FixedOffset, ConfigError> {
        FixedOffset::east_opt(self.utc_offset_hours * 3600)
            .ok_or(ConfigError::InvalidUtcOffset(self.utc_offset_hours))
    }

    //resolves the file-level options into the engine's runtime settings
    pub fn to_engine_config(&self) -> Result<BacktestConfig, ConfigError> {
        self.validate()?;

        Ok(BacktestConfig {
            days: self.effective_days(),
            interval: self.interval.to_string(),
            fee_rate: self.fee_rate,
            fixed_notional: self.fixed_notional,
            warmup_bars: self.effective_warmup_bars(),
            display_window_days: self.display_window_days,
            display_offset: self.display_offset()?,
            max_retries: self.max_retries,
            signal_history_len: self.signal_history_len,
        })
    }

    //load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BacktestConfiguration = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}
