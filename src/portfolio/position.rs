use crate::engine::execution::{Fill, TradeAction, TradeRecord};
use crate::portfolio::account::{close_pnl, trade_fee};
use crate::strategy::SignalKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PositionSide {
    Flat,
    Long,
    Short,
}

//the single position held during a run
//
//invariant: flat <=> entry_price == 0 and entry_fee == 0
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub side: PositionSide,

    //fill price of the opening leg
    pub entry_price: Decimal,

    //fee paid to open
    pub entry_fee: Decimal,

    //fixed for the whole run
    pub quantity: Decimal,
}

//outcome of applying one signal: next position plus zero, one or two ledger legs
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub position: Position,
    pub trades: Vec<TradeRecord>,
    pub decision: i8,
}

impl Position {
    //creates a new flat position
    pub fn flat(quantity: Decimal) -> Self {
        Position {
            side: PositionSide::Flat,
            entry_price: Decimal::ZERO,
            entry_fee: Decimal::ZERO,
            quantity,
        }
    }

    pub fn is_flat(&self) -> bool {
        self.side == PositionSide::Flat
    }

    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    pub fn is_consistent(&self) -> bool {
        if self.is_flat() {
            self.entry_price.is_zero() && self.entry_fee.is_zero()
        } else {
            self.entry_price > Decimal::ZERO
        }
    }

    //applies a signal at the fill price
    //
    //FLAT+BUY opens long, FLAT+SELL opens short, an opposite signal closes and
    //reopens at the same price, everything else is a self-loop.
    pub fn apply(&self, signal: SignalKind, fill: &Fill, fee_rate: Decimal) -> Transition {
        match (self.side, signal) {
            (PositionSide::Flat, SignalKind::Buy) => {
                self.open(PositionSide::Long, fill, fee_rate, Vec::with_capacity(1))
            }
            (PositionSide::Flat, SignalKind::Sell) => {
                self.open(PositionSide::Short, fill, fee_rate, Vec::with_capacity(1))
            }
            (PositionSide::Short, SignalKind::Buy) => self.reverse(PositionSide::Long, fill, fee_rate),
            (PositionSide::Long, SignalKind::Sell) => self.reverse(PositionSide::Short, fill, fee_rate),
            _ => self.unchanged(),
        }
    }

    //closes an open position, none when already flat
    pub fn close(&self, fill: &Fill, fee_rate: Decimal) -> Option<Transition> {
        if self.is_flat() {
            return None;
        }

        let pnl = close_pnl(self, fill.price, fee_rate);
        let action = if self.is_long() {
            TradeAction::CloseLong
        } else {
            TradeAction::CloseShort
        };

        let record = TradeRecord::close(
            fill,
            action,
            self.quantity,
            self.entry_price,
            self.entry_fee,
            pnl.exit_fee,
            pnl.gross,
            pnl.net,
        );

        Some(Transition {
            position: Position::flat(self.quantity),
            trades: vec![record],
            decision: action.direction(),
        })
    }

    fn reverse(&self, side: PositionSide, fill: &Fill, fee_rate: Decimal) -> Transition {
        let closed = match self.close(fill, fee_rate) {
            Some(transition) => transition,
            None => unreachable!("reversal requires an open position"),
        };

        let mut trades = closed.trades;
        trades.reserve(1);
        closed.position.open(side, fill, fee_rate, trades)
    }

    fn open(
        &self,
        side: PositionSide,
        fill: &Fill,
        fee_rate: Decimal,
        mut trades: Vec<TradeRecord>,
    ) -> Transition {
        assert!(
            fill.price > Decimal::ZERO,
            "cannot open at non-positive price {} (bar {})",
            fill.price,
            fill.bar_index
        );

        let entry_fee = trade_fee(fill.price, self.quantity, fee_rate);
        let action = match side {
            PositionSide::Long => TradeAction::OpenLong,
            PositionSide::Short => TradeAction::OpenShort,
            PositionSide::Flat => unreachable!("cannot open a flat position"),
        };
        trades.push(TradeRecord::open(fill, action, self.quantity, entry_fee));

        Transition {
            position: Position {
                side,
                entry_price: fill.price,
                entry_fee,
                quantity: self.quantity,
            },
            trades,
            decision: action.direction(),
        }
    }

    fn unchanged(&self) -> Transition {
        Transition {
            position: self.clone(),
            trades: Vec::new(),
            decision: 0,
        }
    }
}
