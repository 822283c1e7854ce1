use crate::lots::{DIGITS, EPSILON};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::io::Read;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("row {row}: invalid timestamp {value:?}")]
    InvalidTimestamp { row: usize, value: String },
    #[error("row {row}: negative quantity {value}")]
    NegativeQuantity { row: usize, value: Decimal },
    #[error("row {row}: negative price {value}")]
    NegativePrice { row: usize, value: Decimal },
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Transaction type from the exchange report.
///
/// Reward/earn/receive income act as buys for lot matching since they
/// establish basis at the spot price on receipt. Unrecognised types are
/// carried through the ledger untouched but never matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxKind {
    Buy,
    Sell,
    AdvancedTradeBuy,
    AdvancedTradeSell,
    RewardsIncome,
    CoinbaseEarn,
    Receive,
    Other(String),
}

impl TxKind {
    pub fn from_report(s: &str) -> TxKind {
        match s {
            "Buy" => TxKind::Buy,
            "Sell" => TxKind::Sell,
            "Advanced Trade Buy" => TxKind::AdvancedTradeBuy,
            "Advanced Trade Sell" => TxKind::AdvancedTradeSell,
            "Rewards Income" => TxKind::RewardsIncome,
            "Coinbase Earn" => TxKind::CoinbaseEarn,
            "Receive" => TxKind::Receive,
            other => TxKind::Other(other.to_string()),
        }
    }

    pub fn as_report(&self) -> &str {
        match self {
            TxKind::Buy => "Buy",
            TxKind::Sell => "Sell",
            TxKind::AdvancedTradeBuy => "Advanced Trade Buy",
            TxKind::AdvancedTradeSell => "Advanced Trade Sell",
            TxKind::RewardsIncome => "Rewards Income",
            TxKind::CoinbaseEarn => "Coinbase Earn",
            TxKind::Receive => "Receive",
            TxKind::Other(s) => s,
        }
    }

    pub fn is_buy_like(&self) -> bool {
        matches!(
            self,
            TxKind::Buy
                | TxKind::AdvancedTradeBuy
                | TxKind::RewardsIncome
                | TxKind::CoinbaseEarn
                | TxKind::Receive
        )
    }

    pub fn is_sell_like(&self) -> bool {
        matches!(self, TxKind::Sell | TxKind::AdvancedTradeSell)
    }
}

/// One row of the transaction report.
///
/// `consumed` is the running total of quantity already matched against the
/// opposite side; it persists across runs via the state cache so matching
/// is resumable and idempotent.
#[derive(Debug, Clone)]
pub struct Transaction {
    /// Content-derived identifier, assigned at ingestion. Used as the cache
    /// join key instead of the raw timestamp.
    pub id: String,
    pub asset: String,
    pub kind: TxKind,
    pub quantity: Decimal,
    pub price: Decimal,
    pub datetime: DateTime<Utc>,
    pub consumed: Decimal,
}

impl Transaction {
    pub fn new(
        asset: String,
        kind: TxKind,
        quantity: Decimal,
        price: Decimal,
        datetime: DateTime<Utc>,
    ) -> Self {
        Transaction {
            id: String::new(),
            asset,
            kind,
            quantity,
            price,
            datetime,
            consumed: Decimal::ZERO,
        }
    }

    /// Quantity not yet matched, after rounding both sides.
    pub fn unused(&self) -> Decimal {
        self.quantity.round_dp(DIGITS) - self.consumed.round_dp(DIGITS)
    }

    /// A row counts as fully used once its unused quantity is within the
    /// rounding slack.
    pub fn all_used(&self) -> bool {
        self.unused() <= EPSILON
    }

    pub fn consume(&mut self, quantity: Decimal) {
        self.consumed += quantity;
        debug_assert!(self.consumed <= self.quantity + EPSILON);
    }

    pub fn consume_all(&mut self) {
        self.consumed = self.quantity;
    }

    fn content_hash(&self, ordinal: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.datetime.to_rfc3339().as_bytes());
        hasher.update(b"|");
        hasher.update(self.asset.as_bytes());
        hasher.update(b"|");
        hasher.update(self.kind.as_report().as_bytes());
        hasher.update(b"|");
        hasher.update(self.quantity.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.price.to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(ordinal.to_string().as_bytes());
        hex::encode(hasher.finalize())[..16].to_string()
    }
}

/// CSV row of the exchange transaction report.
#[derive(Debug, Serialize, Deserialize)]
struct LedgerCsvRecord {
    #[serde(rename = "Timestamp")]
    timestamp: String,
    #[serde(rename = "Asset")]
    asset: String,
    #[serde(rename = "Transaction Type")]
    kind: String,
    #[serde(rename = "Quantity Transacted")]
    quantity: Decimal,
    #[serde(rename = "Spot Price at Transaction")]
    price: Decimal,
    #[serde(rename = "Used", default)]
    used: Option<Decimal>,
}

/// All transactions for one report, as an arena.
///
/// The classifier and the matcher refer to rows by index so that the buy
/// and sell views share the same underlying transactions: consuming a buy
/// is visible through every view that holds its index.
#[derive(Debug, Clone)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    /// Build a ledger, assigning each transaction its stable id. Identical
    /// rows are disambiguated by their occurrence count so ids stay unique.
    pub fn new(mut transactions: Vec<Transaction>) -> Self {
        let mut seen: HashMap<String, u32> = HashMap::new();
        for tx in &mut transactions {
            let key = format!(
                "{}|{}|{}|{}|{}",
                tx.datetime.to_rfc3339(),
                tx.asset,
                tx.kind.as_report(),
                tx.quantity,
                tx.price
            );
            let ordinal = seen.entry(key).or_insert(0);
            tx.id = tx.content_hash(*ordinal);
            *ordinal += 1;
        }
        Ledger { transactions }
    }

    /// Read a transaction report. Malformed rows abort the whole read.
    pub fn read_csv<R: Read>(reader: R) -> Result<Ledger, LedgerError> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut transactions = Vec::new();
        for (row, result) in rdr.deserialize().enumerate() {
            let record: LedgerCsvRecord = result?;
            let datetime =
                parse_timestamp(&record.timestamp).ok_or_else(|| LedgerError::InvalidTimestamp {
                    row: row + 1,
                    value: record.timestamp.clone(),
                })?;
            if record.quantity < Decimal::ZERO {
                return Err(LedgerError::NegativeQuantity {
                    row: row + 1,
                    value: record.quantity,
                });
            }
            if record.price < Decimal::ZERO {
                return Err(LedgerError::NegativePrice {
                    row: row + 1,
                    value: record.price,
                });
            }
            let mut tx = Transaction::new(
                record.asset,
                TxKind::from_report(&record.kind),
                record.quantity,
                record.price,
                datetime,
            );
            tx.consumed = record.used.unwrap_or(Decimal::ZERO);
            transactions.push(tx);
        }
        Ok(Ledger::new(transactions))
    }

    pub fn transactions(&self) -> &[Transaction] {
        &self.transactions
    }

    pub fn tx(&self, idx: usize) -> &Transaction {
        &self.transactions[idx]
    }

    pub fn tx_mut(&mut self, idx: usize) -> &mut Transaction {
        &mut self.transactions[idx]
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    /// Asset symbols in order of first appearance.
    pub fn assets(&self) -> Vec<String> {
        let mut assets: Vec<String> = Vec::new();
        for tx in &self.transactions {
            if !assets.contains(&tx.asset) {
                assets.push(tx.asset.clone());
            }
        }
        assets
    }

    /// Partition one asset's transaction indices into buys and sells,
    /// ledger order preserved. Unknown kinds appear in neither set.
    pub fn classify(&self, asset: &str) -> (Vec<usize>, Vec<usize>) {
        let mut buys = Vec::new();
        let mut sells = Vec::new();
        for (idx, tx) in self.transactions.iter().enumerate() {
            if tx.asset != asset {
                continue;
            }
            if tx.kind.is_buy_like() {
                buys.push(idx);
            } else if tx.kind.is_sell_like() {
                sells.push(idx);
            }
        }
        (buys, sells)
    }

    /// Map of stable id to transaction index.
    pub fn id_index(&self) -> HashMap<&str, usize> {
        self.transactions
            .iter()
            .enumerate()
            .map(|(idx, tx)| (tx.id.as_str(), idx))
            .collect()
    }
}

/// Parse a report timestamp, normalizing to UTC. Accepts RFC 3339 with an
/// offset, a naive datetime (assumed UTC), or a bare date at midnight.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0).unwrap().and_utc());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const REPORT: &str = "\
Timestamp,Asset,Transaction Type,Quantity Transacted,Spot Price at Transaction
2021-01-01T00:00:00Z,BTC,Buy,1.0,30000.00
2021-01-02T00:00:00Z,BTC,Rewards Income,0.01,31000.00
2021-01-03T00:00:00Z,ETH,Advanced Trade Buy,2.0,1000.00
2021-02-01T00:00:00Z,BTC,Sell,0.5,40000.00
2021-02-02T00:00:00Z,BTC,Convert,0.1,41000.00
";

    #[test]
    fn reads_report_rows() {
        let ledger = Ledger::read_csv(REPORT.as_bytes()).unwrap();
        assert_eq!(ledger.len(), 5);
        let first = ledger.tx(0);
        assert_eq!(first.asset, "BTC");
        assert_eq!(first.kind, TxKind::Buy);
        assert_eq!(first.quantity, dec!(1.0));
        assert_eq!(first.price, dec!(30000.00));
        assert_eq!(first.consumed, Decimal::ZERO);
    }

    #[test]
    fn reads_prior_used_column() {
        let report = "\
Timestamp,Asset,Transaction Type,Quantity Transacted,Spot Price at Transaction,Used
2021-01-01T00:00:00Z,BTC,Buy,1.0,30000.00,0.25
";
        let ledger = Ledger::read_csv(report.as_bytes()).unwrap();
        assert_eq!(ledger.tx(0).consumed, dec!(0.25));
        assert_eq!(ledger.tx(0).unused(), dec!(0.75));
    }

    #[test]
    fn classify_partitions_by_kind() {
        let ledger = Ledger::read_csv(REPORT.as_bytes()).unwrap();
        let (buys, sells) = ledger.classify("BTC");
        assert_eq!(buys, vec![0, 1]);
        assert_eq!(sells, vec![3]);
    }

    #[test]
    fn unknown_kind_excluded_from_both_sets() {
        let ledger = Ledger::read_csv(REPORT.as_bytes()).unwrap();
        assert_eq!(ledger.tx(4).kind, TxKind::Other("Convert".to_string()));
        let (buys, sells) = ledger.classify("BTC");
        assert!(!buys.contains(&4));
        assert!(!sells.contains(&4));
    }

    #[test]
    fn assets_in_discovery_order() {
        let ledger = Ledger::read_csv(REPORT.as_bytes()).unwrap();
        assert_eq!(ledger.assets(), vec!["BTC".to_string(), "ETH".to_string()]);
    }

    #[test]
    fn ids_are_stable_and_unique() {
        let a = Ledger::read_csv(REPORT.as_bytes()).unwrap();
        let b = Ledger::read_csv(REPORT.as_bytes()).unwrap();
        for (ta, tb) in a.transactions().iter().zip(b.transactions()) {
            assert_eq!(ta.id, tb.id);
            assert_eq!(ta.id.len(), 16);
        }
        let mut ids: Vec<_> = a.transactions().iter().map(|t| t.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), a.len());
    }

    #[test]
    fn duplicate_rows_get_distinct_ids() {
        let report = "\
Timestamp,Asset,Transaction Type,Quantity Transacted,Spot Price at Transaction
2021-01-01T00:00:00Z,BTC,Buy,1.0,30000.00
2021-01-01T00:00:00Z,BTC,Buy,1.0,30000.00
";
        let ledger = Ledger::read_csv(report.as_bytes()).unwrap();
        assert_ne!(ledger.tx(0).id, ledger.tx(1).id);
    }

    #[test]
    fn invalid_timestamp_is_fatal() {
        let report = "\
Timestamp,Asset,Transaction Type,Quantity Transacted,Spot Price at Transaction
not-a-date,BTC,Buy,1.0,30000.00
";
        let err = Ledger::read_csv(report.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::InvalidTimestamp { row: 1, .. }));
    }

    #[test]
    fn negative_quantity_is_fatal() {
        let report = "\
Timestamp,Asset,Transaction Type,Quantity Transacted,Spot Price at Transaction
2021-01-01T00:00:00Z,BTC,Buy,-1.0,30000.00
";
        let err = Ledger::read_csv(report.as_bytes()).unwrap_err();
        assert!(matches!(err, LedgerError::NegativeQuantity { row: 1, .. }));
    }

    #[test]
    fn timestamp_formats_normalize_to_utc() {
        let with_offset = parse_timestamp("2021-06-01T12:00:00+02:00").unwrap();
        assert_eq!(with_offset.to_rfc3339(), "2021-06-01T10:00:00+00:00");

        let naive = parse_timestamp("2021-06-01T12:00:00").unwrap();
        assert_eq!(naive.to_rfc3339(), "2021-06-01T12:00:00+00:00");

        let date_only = parse_timestamp("2021-06-01").unwrap();
        assert_eq!(date_only.to_rfc3339(), "2021-06-01T00:00:00+00:00");

        assert!(parse_timestamp("06/01/2021").is_none());
    }

    #[test]
    fn unused_respects_rounding_slack() {
        let mut tx = Transaction::new(
            "BTC".to_string(),
            TxKind::Buy,
            dec!(1.0),
            dec!(100),
            parse_timestamp("2021-01-01").unwrap(),
        );
        assert!(!tx.all_used());
        tx.consume(dec!(0.999995));
        // Within epsilon of fully used.
        assert!(tx.all_used());
    }
}
