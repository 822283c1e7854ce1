use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Domain warnings emitted during lot matching.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum Warning {
    /// A sell could not be fully matched against earlier buys. Usually
    /// means the report is partial (e.g. a single-year export) or has
    /// transactions out of order.
    UnresolvedSell {
        asset: String,
        disposed: DateTime<Utc>,
        remaining: Decimal,
    },
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::UnresolvedSell {
                asset,
                disposed,
                remaining,
            } => write!(
                f,
                "unresolved sell of {} {} on {}: insufficient earlier buys",
                remaining,
                asset,
                disposed.format("%Y-%m-%d")
            ),
        }
    }
}
