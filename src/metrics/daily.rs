use crate::engine::execution::TradeRecord;
use chrono::{FixedOffset, NaiveDate};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyPnl {
    pub date: NaiveDate,
    pub pnl: Decimal,
}

//sums realized net pnl per calendar date in the display timezone, newest date first
pub fn daily_pnl(trades: &[TradeRecord], offset: FixedOffset) -> Vec<DailyPnl> {
    let mut by_date: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();

    for trade in trades {
        if let Some(pnl) = trade.pnl {
            let date = trade.timestamp.with_timezone(&offset).date_naive();
            *by_date.entry(date).or_insert(Decimal::ZERO) += pnl;
        }
    }

    by_date
        .into_iter()
        .rev()
        .map(|(date, pnl)| DailyPnl { date, pnl })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::execution::{Fill, TradeAction};
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn closed_at(hour: u32, day: u32, pnl: Decimal) -> TradeRecord {
        let ts = Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap();
        let fill = Fill::new(0, ts, dec!(100), "close");
        TradeRecord::close(&fill, TradeAction::CloseLong, Decimal::ONE, dec!(100), Decimal::ZERO, Decimal::ZERO, pnl, pnl)
    }

    #[test]
    fn groups_by_local_date_newest_first() {
        let utc8 = FixedOffset::east_opt(8 * 3600).unwrap();
        let trades = vec![
            closed_at(1, 1, dec!(1)),
            //20:00 utc on the 1st is the 2nd in utc+8
            closed_at(20, 1, dec!(2)),
            closed_at(3, 2, dec!(-0.5)),
        ];

        let days = daily_pnl(&trades, utc8);
        assert_eq!(
            days,
            vec![
                DailyPnl {
                    date: NaiveDate::from_ymd_opt(2025, 1, 2).unwrap(),
                    pnl: dec!(1.5),
                },
                DailyPnl {
                    date: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                    pnl: dec!(1),
                },
            ]
        );
    }

    #[test]
    fn opening_legs_are_ignored() {
        let ts = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let open = TradeRecord::open(&Fill::new(0, ts, dec!(1), "o"), TradeAction::OpenShort, Decimal::ONE, Decimal::ZERO);
        assert!(daily_pnl(&[open], FixedOffset::east_opt(0).unwrap()).is_empty());
    }
}
