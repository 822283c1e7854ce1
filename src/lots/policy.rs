use crate::ledger::Ledger;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

/// Cost-basis assignment policy for matching sells against prior buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Policy {
    /// Highest spot price first.
    #[default]
    Hifo,
    /// Oldest purchase first.
    Fifo,
    /// Newest purchase first.
    Lifo,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("invalid policy {0:?}, expected one of FIFO, LIFO, HIFO")]
    Invalid(String),
}

impl FromStr for Policy {
    type Err = PolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "FIFO" => Ok(Policy::Fifo),
            "LIFO" => Ok(Policy::Lifo),
            "HIFO" => Ok(Policy::Hifo),
            _ => Err(PolicyError::Invalid(s.to_string())),
        }
    }
}

impl Policy {
    pub fn display(&self) -> &'static str {
        match self {
            Policy::Fifo => "FIFO",
            Policy::Lifo => "LIFO",
            Policy::Hifo => "HIFO",
        }
    }
}

impl std::fmt::Display for Policy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display())
    }
}

/// Order the buy candidates for a sell dated at `before`.
///
/// Only buys strictly earlier than the sell are eligible. FIFO keeps the
/// ledger's natural ascending order; LIFO and HIFO use a stable sort so
/// ties keep their original relative order, which makes the match sequence
/// deterministic for a given ledger.
pub fn order_candidates(
    ledger: &Ledger,
    buys: &[usize],
    before: DateTime<Utc>,
    policy: Policy,
) -> Vec<usize> {
    let mut candidates: Vec<usize> = buys
        .iter()
        .copied()
        .filter(|&idx| ledger.tx(idx).datetime < before)
        .collect();

    match policy {
        // Ledger order is already chronological ascending.
        Policy::Fifo => {}
        Policy::Lifo => {
            candidates.sort_by(|&a, &b| ledger.tx(b).datetime.cmp(&ledger.tx(a).datetime))
        }
        Policy::Hifo => candidates.sort_by(|&a, &b| ledger.tx(b).price.cmp(&ledger.tx(a).price)),
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{Ledger, Transaction, TxKind};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn buy(day: u32, price: Decimal) -> Transaction {
        Transaction::new(
            "BTC".to_string(),
            TxKind::Buy,
            dec!(1),
            price,
            chrono::NaiveDate::from_ymd_opt(2021, 1, day)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
                .and_utc(),
        )
    }

    fn ledger_of(txs: Vec<Transaction>) -> Ledger {
        Ledger::new(txs)
    }

    fn ts(day: u32) -> DateTime<Utc> {
        chrono::NaiveDate::from_ymd_opt(2021, 1, day)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
            .and_utc()
    }

    #[test]
    fn parse_policy_strings() {
        assert_eq!("FIFO".parse::<Policy>(), Ok(Policy::Fifo));
        assert_eq!("lifo".parse::<Policy>(), Ok(Policy::Lifo));
        assert_eq!("Hifo".parse::<Policy>(), Ok(Policy::Hifo));
    }

    #[test]
    fn unknown_policy_is_an_error() {
        assert_eq!(
            "AVCO".parse::<Policy>(),
            Err(PolicyError::Invalid("AVCO".to_string()))
        );
    }

    #[test]
    fn filters_buys_on_or_after_the_sell() {
        let ledger = ledger_of(vec![buy(1, dec!(100)), buy(5, dec!(100)), buy(9, dec!(100))]);
        let buys = vec![0, 1, 2];

        // The buy on day 5 is not strictly earlier than a sell on day 5.
        let candidates = order_candidates(&ledger, &buys, ts(5), Policy::Fifo);
        assert_eq!(candidates, vec![0]);
    }

    #[test]
    fn fifo_keeps_ledger_order() {
        let ledger = ledger_of(vec![buy(1, dec!(300)), buy(2, dec!(100)), buy(3, dec!(200))]);
        let candidates = order_candidates(&ledger, &[0, 1, 2], ts(10), Policy::Fifo);
        assert_eq!(candidates, vec![0, 1, 2]);
    }

    #[test]
    fn lifo_orders_newest_first() {
        let ledger = ledger_of(vec![buy(1, dec!(300)), buy(2, dec!(100)), buy(3, dec!(200))]);
        let candidates = order_candidates(&ledger, &[0, 1, 2], ts(10), Policy::Lifo);
        assert_eq!(candidates, vec![2, 1, 0]);
    }

    #[test]
    fn hifo_orders_highest_price_first() {
        let ledger = ledger_of(vec![buy(1, dec!(300)), buy(2, dec!(100)), buy(3, dec!(200))]);
        let candidates = order_candidates(&ledger, &[0, 1, 2], ts(10), Policy::Hifo);
        assert_eq!(candidates, vec![0, 2, 1]);
    }

    #[test]
    fn hifo_price_ties_keep_original_order() {
        let ledger = ledger_of(vec![
            buy(1, dec!(200)),
            buy(2, dec!(500)),
            buy(3, dec!(200)),
            buy(4, dec!(200)),
        ]);
        let candidates = order_candidates(&ledger, &[0, 1, 2, 3], ts(10), Policy::Hifo);
        assert_eq!(candidates, vec![1, 0, 2, 3]);
    }
}
