pub mod matcher;
pub mod policy;
pub mod report;

pub use matcher::{dispose, DispositionRecord};
pub use policy::{order_candidates, Policy, PolicyError};
pub use report::DispositionReport;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Decimal places quantities are rounded to before comparison.
pub const DIGITS: u32 = 6;

/// Rounding slack allowed when deciding whether a lot is fully consumed.
pub const EPSILON: Decimal = dec!(0.00001);
