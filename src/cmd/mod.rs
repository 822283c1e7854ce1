pub mod clear;
pub mod dispose;
pub mod summary;

use rust_decimal::Decimal;
use std::path::{Path, PathBuf};

/// Default cache file path for a ledger: `<stem>_cache.csv` next to it.
pub fn cache_path(ledger: &Path) -> PathBuf {
    sibling(ledger, "_cache.csv")
}

/// Default disposition report path for a ledger: `<stem>_report.csv`.
pub fn report_path(ledger: &Path) -> PathBuf {
    sibling(ledger, "_report.csv")
}

/// Summary text path for a disposition report: `<stem>_summary.txt`.
pub fn summary_path(report: &Path) -> PathBuf {
    sibling(report, "_summary.txt")
}

fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("report");
    path.with_file_name(format!("{stem}{suffix}"))
}

pub fn format_amount(amount: Decimal) -> String {
    format!("{:.2}", amount)
}

pub fn format_quantity(qty: Decimal) -> String {
    let s = format!("{:.6}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn derived_paths_keep_the_stem() {
        let ledger = Path::new("data/transactions.csv");
        assert_eq!(cache_path(ledger), Path::new("data/transactions_cache.csv"));
        assert_eq!(report_path(ledger), Path::new("data/transactions_report.csv"));
        assert_eq!(
            summary_path(&report_path(ledger)),
            Path::new("data/transactions_report_summary.txt")
        );
    }

    #[test]
    fn quantity_formatting_trims_zeros() {
        assert_eq!(format_quantity(dec!(1.500000)), "1.5");
        assert_eq!(format_quantity(dec!(0.000001)), "0.000001");
        assert_eq!(format_quantity(dec!(2)), "2");
    }
}
