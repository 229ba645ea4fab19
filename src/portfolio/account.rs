use crate::engine::execution::{Fill, TradeRecord};
use crate::portfolio::position::{Position, PositionSide};
use crate::strategy::SignalKind;
use rust_decimal::Decimal;

//realized result of closing a position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClosedPnl {
    pub gross: Decimal,
    pub exit_fee: Decimal,
    pub net: Decimal,
}

//run-wide position size, fixed notional over the first bar's close
//
//none when the close is not positive or the quotient does not fit a decimal
pub fn fixed_quantity(fixed_notional: Decimal, first_close: Decimal) -> Option<Decimal> {
    if first_close <= Decimal::ZERO {
        return None;
    }
    fixed_notional.checked_div(first_close)
}

//bound on any ledger value a run over `bars` bars can reach when no close exceeds `price`
//
//covers every leg's notional, fee and pnl plus the running sums and drawdown built from
//them, so a run whose bars all have a bound never overflows.
pub fn ledger_bound(
    price: Decimal,
    quantity: Decimal,
    fee_rate: Decimal,
    bars: usize,
) -> Option<Decimal> {
    let legs = Decimal::from(bars).checked_add(Decimal::ONE)?.checked_mul(Decimal::TWO)?;
    let per_leg = Decimal::ONE.checked_add(fee_rate.checked_mul(Decimal::TWO)?)?;
    price
        .checked_mul(quantity)?
        .checked_mul(per_leg)?
        .checked_mul(legs)
}

//fee paid on either leg of a trade
pub fn trade_fee(price: Decimal, quantity: Decimal, fee_rate: Decimal) -> Decimal {
    price * quantity * fee_rate
}

//computes gross pnl, exit fee and net pnl for closing `position` at `exit_price`
pub fn close_pnl(position: &Position, exit_price: Decimal, fee_rate: Decimal) -> ClosedPnl {
    assert!(
        !position.is_flat() && position.entry_price > Decimal::ZERO,
        "closing an invalid position: {:?}",
        position
    );

    let qty = position.quantity;
    let gross = match position.side {
        PositionSide::Long => (exit_price - position.entry_price) * qty,
        PositionSide::Short => (position.entry_price - exit_price) * qty,
        PositionSide::Flat => unreachable!(),
    };
    let exit_fee = trade_fee(exit_price, qty, fee_rate);
    let net = gross - (position.entry_fee + exit_fee);

    ClosedPnl {
        gross,
        exit_fee,
        net,
    }
}

//running ledger for one backtest run
#[derive(Debug, Clone)]
pub struct Account {
    //fee charged per leg as a fraction of notional
    pub fee_rate: Decimal,

    //the only state carried from bar to bar
    pub position: Position,

    //cumulative realized net pnl (the equity curve value)
    pub realized_pnl: Decimal,

    //cumulative realized gross pnl
    pub gross_pnl: Decimal,

    //fees of all closed round trips
    pub fees_paid: Decimal,

    //complete append-only trade log
    pub trade_log: Vec<TradeRecord>,
}

impl Account {
    //creates a flat account trading a fixed quantity
    pub fn new(quantity: Decimal, fee_rate: Decimal) -> Self {
        Account {
            fee_rate,
            position: Position::flat(quantity),
            realized_pnl: Decimal::ZERO,
            gross_pnl: Decimal::ZERO,
            fees_paid: Decimal::ZERO,
            trade_log: Vec::new(),
        }
    }

    //applies a signal at the fill price, returns the bar's decision flag
    pub fn apply_signal(&mut self, signal: SignalKind, fill: &Fill) -> i8 {
        let transition = self.position.apply(signal, fill, self.fee_rate);
        let decision = transition.decision;
        self.commit(transition.position, transition.trades);
        decision
    }

    //closes any open position, used once after the last bar
    pub fn force_close(&mut self, fill: &Fill) -> Option<TradeRecord> {
        let transition = self.position.close(fill, self.fee_rate)?;
        let record = transition.trades.first().cloned();
        self.commit(transition.position, transition.trades);
        record
    }

    fn commit(&mut self, position: Position, trades: Vec<TradeRecord>) {
        for trade in trades {
            if let (Some(gross), Some(net)) = (trade.gross_pnl, trade.pnl) {
                self.gross_pnl += gross;
                self.realized_pnl += net;
                self.fees_paid += trade.total_fees();
            }
            tracing::debug!(
                bar = trade.bar_index,
                action = ?trade.action,
                price = %trade.close_price.unwrap_or(trade.entry_price),
                pnl = ?trade.pnl,
                "ledger transition"
            );
            self.trade_log.push(trade);
        }

        debug_assert!(position.is_consistent(), "{:?}", position);
        self.position = position;
    }

    //realized equity, unrealized pnl of an open position is never included
    pub fn equity(&self) -> Decimal {
        self.realized_pnl
    }
}
