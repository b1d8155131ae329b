//! Contract rate versus central-bank reference rate.
//!
//! `pct_deviation = (contract / reference − 1) · 100`; a contract is abusive
//! above `1.5 × reference`. Severity bands the deviation on five levels whose
//! lower bounds (exclusive) default to 10 / 20 / 35 / 50 / 100 %.

use std::fmt;
use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::error::DebtEngineError;
use crate::tables::{AbusivenessRules, RegulatoryTables};
use crate::types::*;
use crate::DebtEngineResult;

const HUNDRED: Decimal = dec!(100);

/// Five ordinal severity levels, serialized with their regulatory labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Severity {
    #[serde(rename = "Leve")]
    Mild,
    #[serde(rename = "Moderada")]
    Moderate,
    #[serde(rename = "Grave")]
    Serious,
    #[serde(rename = "Muito Grave")]
    VerySerious,
    #[serde(rename = "Gravíssima")]
    Extreme,
}

impl Severity {
    const ASCENDING: [Severity; 5] = [
        Severity::Mild,
        Severity::Moderate,
        Severity::Serious,
        Severity::VerySerious,
        Severity::Extreme,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Severity::Mild => "Leve",
            Severity::Moderate => "Moderada",
            Severity::Serious => "Grave",
            Severity::VerySerious => "Muito Grave",
            Severity::Extreme => "Gravíssima",
        }
    }

    /// 1 (mild) to 5 (extreme).
    pub fn level(self) -> u8 {
        self as u8 + 1
    }

    /// Band a deviation; `None` when it does not exceed the first threshold.
    pub fn from_deviation(pct_deviation: Percent, rules: &AbusivenessRules) -> Option<Severity> {
        rules
            .severity_thresholds_pct
            .iter()
            .zip(Self::ASCENDING)
            .rev()
            .find(|(threshold, _)| pct_deviation > **threshold)
            .map(|(_, severity)| severity)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Input pair, both as percentages per period.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AbusivenessInput {
    pub contract_rate_pct: Percent,
    pub reference_rate_pct: Percent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbusivenessReport {
    pub contract_rate_pct: Percent,
    pub reference_rate_pct: Percent,
    /// Contract minus reference, in percentage points.
    pub difference_pp: Percent,
    /// Relative deviation above the reference rate, in %.
    pub pct_deviation: Percent,
    /// Highest contract rate that is not abusive.
    pub abusive_threshold_pct: Percent,
    pub is_abusive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Grade `contract_rate_pct` against `reference_rate_pct`.
pub fn analyze(
    contract_rate_pct: Percent,
    reference_rate_pct: Percent,
    tables: &RegulatoryTables,
) -> DebtEngineResult<AbusivenessReport> {
    if reference_rate_pct <= Decimal::ZERO {
        return Err(DebtEngineError::invalid(
            "reference_rate_pct",
            "Reference rate must be positive",
        ));
    }
    if contract_rate_pct < Decimal::ZERO {
        return Err(DebtEngineError::invalid(
            "contract_rate_pct",
            "Contract rate cannot be negative",
        ));
    }

    let rules = &tables.abusiveness;
    let pct_deviation = (contract_rate_pct / reference_rate_pct - Decimal::ONE) * HUNDRED;
    let abusive_threshold = reference_rate_pct * rules.abusive_multiple;

    Ok(AbusivenessReport {
        contract_rate_pct,
        reference_rate_pct,
        difference_pp: round_rate_pct(contract_rate_pct - reference_rate_pct),
        pct_deviation: round_rate_pct(pct_deviation),
        abusive_threshold_pct: round_rate_pct(abusive_threshold),
        is_abusive: contract_rate_pct > abusive_threshold,
        severity: Severity::from_deviation(pct_deviation, rules),
    })
}

/// [`analyze`] wrapped in the standard output envelope.
pub fn analyze_rates(
    input: &AbusivenessInput,
    tables: &RegulatoryTables,
) -> DebtEngineResult<ComputationOutput<AbusivenessReport>> {
    let start = Instant::now();
    let report = analyze(input.contract_rate_pct, input.reference_rate_pct, tables)?;

    let mut warnings = Vec::new();
    if report.is_abusive {
        warnings.push(format!(
            "Contract rate {}% exceeds {}x the reference rate ({}%)",
            report.contract_rate_pct,
            tables.abusiveness.abusive_multiple.normalize(),
            report.abusive_threshold_pct
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Rate abusiveness versus reference rate",
        &tables.abusiveness,
        warnings,
        elapsed,
        report,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn grade(contract: Decimal, reference: Decimal) -> AbusivenessReport {
        analyze(contract, reference, &RegulatoryTables::default()).unwrap()
    }

    #[test]
    fn test_very_serious_scenario() {
        let r = grade(dec!(3.5), dec!(2.0));
        assert_eq!(r.pct_deviation, dec!(75));
        assert_eq!(r.difference_pp, dec!(1.5));
        assert!(r.is_abusive);
        assert_eq!(r.severity, Some(Severity::VerySerious));
        assert_eq!(r.severity.unwrap().label(), "Muito Grave");
    }

    #[test]
    fn test_severity_bands() {
        let cases = [
            (dec!(2.2), None),                          // 10%: not above first threshold
            (dec!(2.3), Some(Severity::Mild)),          // 15%
            (dec!(2.4), Some(Severity::Mild)),          // 20%
            (dec!(2.5), Some(Severity::Moderate)),      // 25%
            (dec!(2.8), Some(Severity::Serious)),       // 40%
            (dec!(3.0), Some(Severity::Serious)),       // 50%
            (dec!(4.0), Some(Severity::VerySerious)),   // 100%
            (dec!(4.2), Some(Severity::Extreme)),       // 110%
        ];
        for (contract, expected) in cases {
            assert_eq!(grade(contract, dec!(2.0)).severity, expected, "contract {contract}");
        }
    }

    #[test]
    fn test_abusive_multiple_is_strict() {
        assert!(!grade(dec!(3.0), dec!(2.0)).is_abusive);
        assert!(grade(dec!(3.0001), dec!(2.0)).is_abusive);
    }

    #[test]
    fn test_contract_below_reference() {
        let r = grade(dec!(1.5), dec!(2.0));
        assert_eq!(r.pct_deviation, dec!(-25));
        assert!(!r.is_abusive);
        assert_eq!(r.severity, None);
    }

    #[test]
    fn test_reject_non_positive_reference() {
        let tables = RegulatoryTables::default();
        assert!(matches!(
            analyze(dec!(3.5), Decimal::ZERO, &tables),
            Err(DebtEngineError::InvalidInput { .. })
        ));
        assert!(analyze(dec!(3.5), dec!(-1), &tables).is_err());
    }

    #[test]
    fn test_severity_order_and_level() {
        assert!(Severity::Mild < Severity::Extreme);
        assert_eq!(Severity::Mild.level(), 1);
        assert_eq!(Severity::Extreme.level(), 5);
    }

    #[test]
    fn test_severity_serializes_label() {
        let json = serde_json::to_string(&Severity::VerySerious).unwrap();
        assert_eq!(json, "\"Muito Grave\"");
    }

    #[test]
    fn test_analyze_rates_warns_when_abusive() {
        let out = analyze_rates(
            &AbusivenessInput {
                contract_rate_pct: dec!(3.5),
                reference_rate_pct: dec!(2.0),
            },
            &RegulatoryTables::default(),
        )
        .unwrap();
        assert_eq!(out.warnings.len(), 1);
    }
}
