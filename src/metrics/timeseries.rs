use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

//a point in the realized equity curve
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub equity: Decimal,
    pub drawdown: Decimal,
}

impl EquityPoint {
    pub fn new(timestamp: DateTime<Utc>, equity: Decimal, drawdown: Decimal) -> Self {
        EquityPoint {
            timestamp,
            equity,
            drawdown,
        }
    }
}

//pairs equity samples with their bar timestamps and tracks drawdown from the running peak
//
//equity starts at zero, so drawdown is measured in currency rather than percent.
pub fn calculate_equity_curve(
    timestamps: &[DateTime<Utc>],
    equity_values: &[Decimal],
) -> Vec<EquityPoint> {
    let mut curve = Vec::with_capacity(timestamps.len());
    let mut peak = Decimal::ZERO;

    for (&timestamp, &equity) in timestamps.iter().zip(equity_values.iter()) {
        if equity > peak {
            peak = equity;
        }
        curve.push(EquityPoint::new(timestamp, equity, peak - equity));
    }

    curve
}

//largest peak-to-trough fall of a realized equity series
pub fn max_drawdown(equity_values: &[Decimal]) -> Decimal {
    let mut peak = Decimal::ZERO;
    let mut worst = Decimal::ZERO;

    for &equity in equity_values {
        peak = peak.max(equity);
        worst = worst.max(peak - equity);
    }

    worst
}
