use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// All monetary values. Wraps Decimal to prevent accidental f64 usage.
pub type Money = Decimal;

/// Periodic rates expressed as fractions (0.015 = 1.5% per period).
pub type Rate = Decimal;

/// Values expressed on a 0-100 scale (rates at the input/output boundary,
/// PD, LGD, provision).
pub type Percent = Decimal;

const HUNDRED: Decimal = dec!(100);

/// Convert a boundary percentage into an internal fractional rate.
pub fn pct_to_rate(pct: Percent) -> Rate {
    pct / HUNDRED
}

/// Convert an internal fractional rate into a boundary percentage.
pub fn rate_to_pct(rate: Rate) -> Percent {
    rate * HUNDRED
}

/// Currency presentation: 2 decimals.
pub fn round_money(value: Money) -> Money {
    value.round_dp(2)
}

/// Rate presentation: 4 decimals.
pub fn round_rate_pct(value: Percent) -> Percent {
    value.round_dp(4)
}

/// Clamp a percentage into [0, 100].
pub fn clamp_pct(value: Percent) -> Percent {
    value.max(Decimal::ZERO).min(HUNDRED)
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: "rust_decimal_128bit".to_string(),
        },
    }
}
