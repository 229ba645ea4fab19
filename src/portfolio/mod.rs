pub mod account;
pub mod position;

pub use account::{close_pnl, fixed_quantity, ledger_bound, trade_fee, Account, ClosedPnl};
pub use position::{Position, PositionSide, Transition};
