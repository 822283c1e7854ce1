use crate::ledger::Ledger;
use crate::lots::policy::{order_candidates, Policy};
use crate::lots::report::DispositionReport;
use crate::lots::EPSILON;
use crate::warnings::Warning;
use chrono::{DateTime, Datelike, Duration, Utc};
use rust_decimal::Decimal;

/// One match of a sell against a buy lot. Emitted once per match and
/// never mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct DispositionRecord {
    pub asset: String,
    pub acquired: DateTime<Utc>,
    pub disposed: DateTime<Utc>,
    pub quantity: Decimal,
    pub proceeds: Decimal,
    pub basis: Decimal,
    pub gain: Decimal,
}

impl DispositionRecord {
    pub fn held(&self) -> Duration {
        self.disposed - self.acquired
    }

    /// Held for 365 days or more.
    pub fn is_long_term(&self) -> bool {
        self.held() >= Duration::days(365)
    }

    /// Calendar year of the disposal, for bucketing.
    pub fn year(&self) -> i32 {
        self.disposed.year()
    }
}

/// Match every sell in the ledger against earlier buys of the same asset,
/// under the given policy.
///
/// Assets are processed independently, in order of first appearance, and
/// the emitted records keep that order. Consumed quantities are updated in
/// place on the ledger so a re-run over the mutated ledger emits nothing
/// new. A sell that exhausts its candidates with quantity left over is
/// reported as an [`Warning::UnresolvedSell`] rather than dropped.
pub fn dispose(ledger: &mut Ledger, policy: Policy) -> DispositionReport {
    let mut records = Vec::new();
    let mut warnings = Vec::new();
    for asset in ledger.assets() {
        dispose_asset(ledger, &asset, policy, &mut records, &mut warnings);
    }
    DispositionReport { records, warnings }
}

fn dispose_asset(
    ledger: &mut Ledger,
    asset: &str,
    policy: Policy,
    records: &mut Vec<DispositionRecord>,
    warnings: &mut Vec<Warning>,
) {
    let (buys, sells) = ledger.classify(asset);
    for &sell in &sells {
        if ledger.tx(sell).all_used() {
            continue;
        }
        let candidates = order_candidates(ledger, &buys, ledger.tx(sell).datetime, policy);
        for &buy in &candidates {
            if ledger.tx(sell).all_used() {
                break;
            }
            if ledger.tx(buy).all_used() {
                continue;
            }
            records.push(match_lots(ledger, sell, buy));
        }
        let remaining = ledger.tx(sell).unused();
        if remaining > EPSILON {
            let disposed = ledger.tx(sell).datetime;
            log::warn!(
                "{}: sell on {} has {} unmatched after exhausting earlier buys",
                asset,
                disposed.format("%Y-%m-%d"),
                remaining
            );
            warnings.push(Warning::UnresolvedSell {
                asset: asset.to_string(),
                disposed,
                remaining,
            });
        }
    }
}

/// Consume the smaller of the buy's and the sell's unused quantity from
/// both rows and emit the disposition for the matched amount.
fn match_lots(ledger: &mut Ledger, sell: usize, buy: usize) -> DispositionRecord {
    let available = ledger.tx(buy).unused();
    let needed = ledger.tx(sell).unused();
    let matched = available.min(needed);

    if available == needed {
        ledger.tx_mut(buy).consume_all();
        ledger.tx_mut(sell).consume_all();
    } else if available < needed {
        ledger.tx_mut(buy).consume_all();
        ledger.tx_mut(sell).consume(available);
    } else {
        ledger.tx_mut(sell).consume_all();
        ledger.tx_mut(buy).consume(needed);
    }

    let buy_tx = ledger.tx(buy);
    let sell_tx = ledger.tx(sell);
    let proceeds = matched * sell_tx.price;
    let basis = matched * buy_tx.price;
    log::debug!(
        "{}: matched {} (buy {} -> sell {}), proceeds {}, basis {}",
        sell_tx.asset,
        matched,
        buy_tx.datetime.format("%Y-%m-%d"),
        sell_tx.datetime.format("%Y-%m-%d"),
        proceeds,
        basis
    );
    DispositionRecord {
        asset: sell_tx.asset.clone(),
        acquired: buy_tx.datetime,
        disposed: sell_tx.datetime,
        quantity: matched,
        proceeds,
        basis,
        gain: proceeds - basis,
    }
}
