use crate::engine::execution::TradeRecord;
use crate::metrics::timeseries::max_drawdown;
use prettytable::{Cell, Row, Table};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//aggregate statistics of a full, untruncated run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    pub strategy: String,
    pub days: u32,
    pub interval: String,
    pub data_points: usize,
    //every ledger entry, opening and closing legs alike
    pub total_signals: usize,
    pub closed_trades: usize,
    pub winning_trades: usize,
    //percent of closed trades with positive net pnl
    pub win_rate: f64,
    pub gross_pnl_total: Decimal,
    pub fees_total: Decimal,
    pub net_pnl_total: Decimal,
    pub avg_gross_pnl: Decimal,
    pub avg_net_pnl: Decimal,
    pub max_drawdown: Decimal,
    pub net_pnl_std_dev: f64,
}

impl Summary {
    //calculate summary statistics from the full trade ledger and equity curve
    pub fn from_backtest(
        strategy: &str,
        trades: &[TradeRecord],
        equity: &[Decimal],
        days: u32,
        interval: &str,
    ) -> Self {
        let closed: Vec<&TradeRecord> = trades.iter().filter(|t| t.is_closed()).collect();
        let closed_trades = closed.len();

        let mut gross_pnl_total = Decimal::ZERO;
        let mut net_pnl_total = Decimal::ZERO;
        let mut fees_total = Decimal::ZERO;
        let mut winning_trades = 0;
        let mut net_values = Vec::with_capacity(closed_trades);

        for trade in &closed {
            let net = trade.pnl.unwrap_or(Decimal::ZERO);
            gross_pnl_total += trade.gross_pnl.unwrap_or(Decimal::ZERO);
            net_pnl_total += net;
            fees_total += trade.total_fees();
            if net > Decimal::ZERO {
                winning_trades += 1;
            }
            net_values.push(net.to_f64().unwrap_or(0.0));
        }

        let win_rate = 100.0 * winning_trades as f64 / closed_trades.max(1) as f64;

        let (avg_gross_pnl, avg_net_pnl) = if closed_trades > 0 {
            let n = Decimal::from(closed_trades);
            (gross_pnl_total / n, net_pnl_total / n)
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        let net_pnl_std_dev = if net_values.len() >= 2 {
            net_values.iter().std_dev()
        } else {
            0.0
        };

        Summary {
            strategy: strategy.to_string(),
            days,
            interval: interval.to_string(),
            data_points: equity.len(),
            total_signals: trades.len(),
            closed_trades,
            winning_trades,
            win_rate,
            gross_pnl_total,
            fees_total,
            net_pnl_total,
            avg_gross_pnl,
            avg_net_pnl,
            max_drawdown: max_drawdown(equity),
            net_pnl_std_dev,
        }
    }

    //prints the summary in a formatted table
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        let rows = [
            ("Strategy", self.strategy.clone()),
            ("Horizon", format!("{} days @ {}", self.days, self.interval)),
            ("Data Points", self.data_points.to_string()),
            ("Total Signals", self.total_signals.to_string()),
            ("Closed Trades", self.closed_trades.to_string()),
            ("Win Rate", format!("{:.2}%", self.win_rate)),
            ("Gross PnL", format!("{:.2}", self.gross_pnl_total)),
            ("Fees", format!("{:.2}", self.fees_total)),
            ("Net PnL", format!("{:.2}", self.net_pnl_total)),
            ("Avg Gross PnL", format!("{:.2}", self.avg_gross_pnl)),
            ("Avg Net PnL", format!("{:.2}", self.avg_net_pnl)),
            ("Max Drawdown", format!("{:.2}", self.max_drawdown)),
            ("Net PnL Std Dev", format!("{:.3}", self.net_pnl_std_dev)),
        ];

        for (metric, value) in rows {
            table.add_row(Row::new(vec![Cell::new(metric), Cell::new(&value)]));
        }

        table.printstd();
    }
}
