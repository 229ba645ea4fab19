use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum CandleError {
    #[error("Invalid OHLC values: high ({high}) < low ({low})")]
    InvalidHighLow { high: f64, low: f64 },
    #[error("Invalid OHLC values: close ({close}) outside high-low range [{low}, {high}]")]
    InvalidClose { close: f64, high: f64, low: f64 },
    #[error("Invalid OHLC values: open ({open}) outside high-low range [{low}, {high}]")]
    InvalidOpen { open: f64, high: f64, low: f64 },
    #[error("Non-positive close price: {0}")]
    NonPositiveClose(f64),
    #[error("Negative volume: {0}")]
    NegativeVolume(f64),
}

//indicator columns attached to a candle, in source column order
pub type Indicators = IndexMap<String, f64>;

//represents a single ohlcv bar with its precomputed indicator fields
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub indicators: Indicators,
}

impl Candle {
    //creates a new candle with validation
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleError> {
        if high < low {
            return Err(CandleError::InvalidHighLow { high, low });
        }

        if close < low || close > high {
            return Err(CandleError::InvalidClose { close, high, low });
        }

        if open < low || open > high {
            return Err(CandleError::InvalidOpen { open, high, low });
        }

        if close <= 0.0 {
            return Err(CandleError::NonPositiveClose(close));
        }

        if volume < 0.0 {
            return Err(CandleError::NegativeVolume(volume));
        }

        Ok(Self::new_unchecked(timestamp, open, high, low, close, volume))
    }

    //creates a candle without validation
    pub fn new_unchecked(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            indicators: Indicators::new(),
        }
    }

    //builder-style helper for attaching an indicator value
    pub fn with_indicator(mut self, name: impl Into<String>, value: f64) -> Self {
        self.indicators.insert(name.into(), value);
        self
    }

    //returns an indicator value if the column exists and is finite
    pub fn indicator(&self, name: &str) -> Option<f64> {
        self.indicators.get(name).copied().filter(|v| v.is_finite())
    }
}
