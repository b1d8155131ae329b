use debt_engine_core::abusiveness::analyzer::{analyze, analyze_rates, AbusivenessInput, Severity};
use debt_engine_core::abusiveness::contract::{analyze_contract, ContractRateInput};
use debt_engine_core::lending::amortization::installment;
use debt_engine_core::{DebtEngineError, RegulatoryTables};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ===========================================================================
// Rate grading
// ===========================================================================

#[test]
fn test_reference_scenario_is_very_serious() {
    let out = analyze_rates(
        &AbusivenessInput {
            contract_rate_pct: dec!(3.5),
            reference_rate_pct: dec!(2.0),
        },
        &RegulatoryTables::default(),
    )
    .unwrap();
    let r = &out.result;
    assert_eq!(r.pct_deviation, dec!(75));
    assert!(r.is_abusive);
    assert_eq!(r.severity, Some(Severity::VerySerious));
    assert_eq!(r.abusive_threshold_pct, dec!(3));
}

#[test]
fn test_severity_never_decreases_with_contract_rate() {
    let tables = RegulatoryTables::default();
    let mut previous = None;
    let mut contract = dec!(2.0);
    while contract <= dec!(6.0) {
        let severity = analyze(contract, dec!(2.0), &tables).unwrap().severity;
        assert!(severity >= previous, "severity fell at {contract}%");
        previous = severity;
        contract += dec!(0.05);
    }
    assert_eq!(previous, Some(Severity::Extreme));
}

#[test]
fn test_custom_multiple_from_tables() {
    let mut tables = RegulatoryTables::default();
    tables.abusiveness.abusive_multiple = dec!(2);
    let r = analyze(dec!(3.5), dec!(2.0), &tables).unwrap();
    assert!(!r.is_abusive);
}

#[test]
fn test_zero_reference_is_invalid_input() {
    let err = analyze(dec!(1), Decimal::ZERO, &RegulatoryTables::default()).unwrap_err();
    assert!(matches!(err, DebtEngineError::InvalidInput { ref field, .. } if field == "reference_rate_pct"));
}

// ===========================================================================
// Contract rate discrepancy
// ===========================================================================

#[test]
fn test_contract_inferred_rate_graded() {
    let pmt = installment(dec!(20_000), dec!(0.036), 24).unwrap();
    let out = analyze_contract(
        &ContractRateInput {
            principal: dec!(20_000),
            installment: pmt,
            term: 24,
            stated_rate_pct: Some(dec!(3.6)),
            reference_rate_pct: dec!(2.0),
        },
        &RegulatoryTables::default(),
    )
    .unwrap();
    let a = &out.result;
    assert!(a.inferred.converged);
    assert!((a.inferred.rate_pct - dec!(3.6)).abs() < dec!(0.01));
    assert!(a.abusiveness.is_abusive);
    assert_eq!(a.abusiveness.severity, Some(Severity::VerySerious));
    // Only the abusiveness warning: stated and implied agree
    assert_eq!(out.warnings.len(), 1);
}

#[test]
fn test_contract_without_stated_rate() {
    let pmt = installment(dec!(20_000), dec!(0.02), 24).unwrap();
    let out = analyze_contract(
        &ContractRateInput {
            principal: dec!(20_000),
            installment: pmt,
            term: 24,
            stated_rate_pct: None,
            reference_rate_pct: dec!(2.0),
        },
        &RegulatoryTables::default(),
    )
    .unwrap();
    assert!(out.result.discrepancy_pp.is_none());
    assert_eq!(out.result.abusiveness.severity, None);
    assert!(out.warnings.is_empty());
}
