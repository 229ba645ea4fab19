use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

//ledger action recorded for a position transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeAction {
    OpenLong,
    OpenShort,
    CloseLong,
    CloseShort,
    //pyramiding entries written by live executors, never produced by the simulator
    AddLong,
    AddShort,
}

impl TradeAction {
    pub fn is_close(&self) -> bool {
        matches!(self, TradeAction::CloseLong | TradeAction::CloseShort)
    }

    //chart direction: +1 for buy-type actions, -1 for sell-type
    pub fn direction(&self) -> i8 {
        match self {
            TradeAction::OpenLong | TradeAction::CloseShort | TradeAction::AddLong => 1,
            TradeAction::OpenShort | TradeAction::CloseLong | TradeAction::AddShort => -1,
        }
    }
}

//price and provenance of the transitions made on one bar
#[derive(Debug, Clone, PartialEq)]
pub struct Fill {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: Decimal,
    pub reason: String,
}

impl Fill {
    pub fn new(
        bar_index: usize,
        timestamp: DateTime<Utc>,
        price: Decimal,
        reason: impl Into<String>,
    ) -> Self {
        Fill {
            bar_index,
            timestamp,
            price,
            reason: reason.into(),
        }
    }
}

//immutable ledger entry, pnl fields are only set on closing legs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub action: TradeAction,
    pub quantity: Decimal,
    pub entry_price: Decimal,
    pub close_price: Option<Decimal>,
    pub entry_fee: Decimal,
    pub exit_fee: Option<Decimal>,
    pub gross_pnl: Option<Decimal>,
    pub pnl: Option<Decimal>,
    pub reason: String,
}

impl TradeRecord {
    //creates an opening leg
    pub fn open(fill: &Fill, action: TradeAction, quantity: Decimal, entry_fee: Decimal) -> Self {
        TradeRecord {
            bar_index: fill.bar_index,
            timestamp: fill.timestamp,
            action,
            quantity,
            entry_price: fill.price,
            close_price: None,
            entry_fee,
            exit_fee: None,
            gross_pnl: None,
            pnl: None,
            reason: fill.reason.clone(),
        }
    }

    //creates a closing leg
    #[allow(clippy::too_many_arguments)]
    pub fn close(
        fill: &Fill,
        action: TradeAction,
        quantity: Decimal,
        entry_price: Decimal,
        entry_fee: Decimal,
        exit_fee: Decimal,
        gross_pnl: Decimal,
        net_pnl: Decimal,
    ) -> Self {
        TradeRecord {
            bar_index: fill.bar_index,
            timestamp: fill.timestamp,
            action,
            quantity,
            entry_price,
            close_price: Some(fill.price),
            entry_fee,
            exit_fee: Some(exit_fee),
            gross_pnl: Some(gross_pnl),
            pnl: Some(net_pnl),
            reason: fill.reason.clone(),
        }
    }

    //true once pnl has been realized on this entry
    pub fn is_closed(&self) -> bool {
        self.pnl.is_some()
    }

    //entry plus exit fee of a closed round trip
    pub fn total_fees(&self) -> Decimal {
        self.entry_fee + self.exit_fee.unwrap_or(Decimal::ZERO)
    }
}
