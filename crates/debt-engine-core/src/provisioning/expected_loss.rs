//! Staged expected-loss provisioning for a single exposure.
//!
//! Covers:
//! 1. **Write-off horizon** -- arrears beyond the profile horizon are fully lost.
//! 2. **PD** -- stage base PD x profile multiplier; Stage 3 ramps linearly to
//!    100% between 3 months of arrears and the write-off horizon.
//! 3. **LGD** -- profile base LGD reduced by summed guarantee mitigation
//!    (capped), bounded to [floor, ceiling].
//! 4. **EAD** -- outstanding principal.
//! 5. **Expected loss** -- PD x LGD x EAD and the provision percentage.
//!
//! Every constant comes from the injected [`RegulatoryTables`].

use std::time::Instant;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::calendar::{days_in_arrears, elapsed_months};
use crate::error::DebtEngineError;
use crate::provisioning::staging::{
    classify_detailed, observation_window, ArrearsState, Stage, StageClassification,
};
use crate::tables::{ProfileParameters, RegulatoryTables};
use crate::types::*;
use crate::DebtEngineResult;

const HUNDRED: Decimal = dec!(100);

// ---------------------------------------------------------------------------
// Input / Output
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuaranteeKind {
    /// Backed by a pledged asset.
    Collateral,
    /// Personal guarantee or surety.
    Personal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Guarantee {
    pub kind: GuaranteeKind,
    pub appraised_value: Money,
    /// Share of the appraised value that covers this exposure (0-100).
    pub coverage_pct: Percent,
}

impl Guarantee {
    /// Appraised value x coverage. Fails on values beyond decimal range.
    pub fn mitigated_value(&self) -> DebtEngineResult<Money> {
        self.appraised_value
            .checked_mul(self.coverage_pct)
            .map(|v| v / HUNDRED)
            .ok_or_else(|| {
                DebtEngineError::invalid(
                    "guarantees",
                    format!(
                        "Appraised value {} x coverage {}% exceeds the representable range",
                        self.appraised_value, self.coverage_pct
                    ),
                )
            })
    }
}

/// Input for a single provision calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisionInput {
    /// Outstanding principal.
    pub principal: Money,
    pub days_in_arrears: i64,
    pub stage: Stage,
    /// Operation profile band code (`C1`..`C5`).
    pub operation_profile: String,
    #[serde(default)]
    pub guarantees: Vec<Guarantee>,
    #[serde(default)]
    pub is_restructured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restructuring_date: Option<NaiveDate>,
    /// Date the provision is measured at.
    pub reference_date: NaiveDate,
}

/// Aggregate of the guarantees considered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuaranteeSummary {
    pub count: usize,
    /// Sum of appraised value x coverage over all guarantees.
    pub total_value: Money,
    pub collateral_value: Money,
    pub personal_value: Money,
    /// Fractional LGD reduction applied (after the cap).
    pub mitigation: Decimal,
    pub mitigation_capped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionDiagnostics {
    pub elapsed_months: Decimal,
    pub write_off_horizon_months: Decimal,
    pub write_off_reached: bool,
    pub operation_profile: String,
    /// False when the profile code was unknown and the fallback band applied.
    pub profile_resolved: bool,
    /// Stage base PD after the profile multiplier, before any Stage 3 ramp.
    pub base_pd_pct: Percent,
    /// Profile LGD before guarantee mitigation.
    pub base_lgd_pct: Percent,
    pub in_observation_window: bool,
    pub observation_days_remaining: i64,
    pub guarantees: GuaranteeSummary,
}

/// Result of one provision calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvisionResult {
    pub stage: Stage,
    pub pd_pct: Percent,
    pub lgd_pct: Percent,
    pub ead: Money,
    pub expected_loss: Money,
    pub provision_pct: Percent,
    pub methodology: String,
    pub explanation: String,
    pub diagnostics: ProvisionDiagnostics,
}

/// Input for the classify-then-provision pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureAssessmentInput {
    pub principal: Money,
    pub last_payment_date: NaiveDate,
    pub reference_date: NaiveDate,
    pub operation_profile: String,
    #[serde(default)]
    pub guarantees: Vec<Guarantee>,
    #[serde(default)]
    pub is_restructured: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restructuring_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExposureAssessment {
    pub days_in_arrears: i64,
    pub classification: StageClassification,
    pub provision: ProvisionResult,
}

// ---------------------------------------------------------------------------
// Core functions
// ---------------------------------------------------------------------------

/// Compute PD, LGD, EAD and the expected-loss provision for one exposure.
pub fn compute(input: &ProvisionInput, tables: &RegulatoryTables) -> DebtEngineResult<ProvisionResult> {
    validate_provision_input(input)?;

    let (profile, profile_resolved) = tables.profile(&input.operation_profile);
    let months = elapsed_months(input.days_in_arrears);
    let horizon = profile.write_off_horizon_months;

    let observation = observation_window(
        input.is_restructured,
        input.restructuring_date,
        input.reference_date,
        tables,
    );
    let guarantees = summarize_guarantees(&input.guarantees, tables)?;
    let base_pd = clamp_pct(stage_base_pd(input.stage, tables) * profile.pd_multiplier);

    let ead = input.principal;
    let write_off_reached = months >= horizon;

    let (pd, lgd, methodology) = if write_off_reached {
        (HUNDRED, HUNDRED, "Write-off horizon reached (total loss)")
    } else {
        (
            stage_pd(input.stage, base_pd, months, profile, tables),
            mitigated_lgd(profile, &guarantees, tables),
            match input.stage {
                Stage::Stage1 => "12-month expected credit loss (PD x LGD x EAD)",
                Stage::Stage2 | Stage::Stage3 => "Lifetime expected credit loss (PD x LGD x EAD)",
            },
        )
    };

    let expected_loss = (pd / HUNDRED * lgd / HUNDRED * ead).min(input.principal);
    let provision_pct = clamp_pct(expected_loss / input.principal * HUNDRED);

    let explanation = if write_off_reached {
        format!(
            "{} months in arrears reached the {}-month write-off horizon of profile {}; exposure of {} fully provisioned.",
            months.round_dp(1),
            horizon.normalize(),
            input.operation_profile,
            round_money(ead)
        )
    } else {
        format!(
            "{} ({}) on profile {}: PD {}% x LGD {}% x EAD {} = {} ({}% of principal).",
            input.stage,
            input.stage.horizon(),
            input.operation_profile,
            pd.round_dp(2),
            lgd.round_dp(2),
            round_money(ead),
            round_money(expected_loss),
            provision_pct.round_dp(2)
        )
    };

    Ok(ProvisionResult {
        stage: input.stage,
        pd_pct: round_rate_pct(pd),
        lgd_pct: round_rate_pct(lgd),
        ead: round_money(ead),
        expected_loss: round_money(expected_loss).min(input.principal),
        provision_pct: round_rate_pct(provision_pct),
        methodology: methodology.to_string(),
        explanation,
        diagnostics: ProvisionDiagnostics {
            elapsed_months: months,
            write_off_horizon_months: horizon,
            write_off_reached,
            operation_profile: input.operation_profile.clone(),
            profile_resolved,
            base_pd_pct: base_pd,
            base_lgd_pct: profile.base_lgd_pct,
            in_observation_window: observation.inside,
            observation_days_remaining: observation.days_remaining,
            guarantees,
        },
    })
}

/// [`compute`] wrapped in the standard output envelope, with data-quality
/// warnings.
pub fn calculate_provision(
    input: &ProvisionInput,
    tables: &RegulatoryTables,
) -> DebtEngineResult<ComputationOutput<ProvisionResult>> {
    let start = Instant::now();
    let result = compute(input, tables)?;

    let mut warnings = profile_warnings(&result);

    let implied = classify_detailed(
        &ArrearsState {
            days_in_arrears: input.days_in_arrears,
            is_restructured: input.is_restructured,
            restructuring_date: input.restructuring_date,
        },
        input.reference_date,
        tables,
    )?;
    if implied.stage != input.stage {
        warnings.push(format!(
            "Supplied {} differs from {} implied by {} days in arrears",
            input.stage, implied.stage, input.days_in_arrears
        ));
    }

    let methodology = result.methodology.clone();
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        &methodology,
        &provision_assumptions(tables),
        warnings,
        elapsed,
        result,
    ))
}

/// Derive days in arrears from dates, classify, then compute the provision.
pub fn assess_exposure(
    input: &ExposureAssessmentInput,
    tables: &RegulatoryTables,
) -> DebtEngineResult<ComputationOutput<ExposureAssessment>> {
    let start = Instant::now();

    let days = days_in_arrears(input.last_payment_date, input.reference_date);
    let classification = classify_detailed(
        &ArrearsState {
            days_in_arrears: days,
            is_restructured: input.is_restructured,
            restructuring_date: input.restructuring_date,
        },
        input.reference_date,
        tables,
    )?;

    let provision = compute(
        &ProvisionInput {
            principal: input.principal,
            days_in_arrears: days,
            stage: classification.stage,
            operation_profile: input.operation_profile.clone(),
            guarantees: input.guarantees.clone(),
            is_restructured: input.is_restructured,
            restructuring_date: input.restructuring_date,
            reference_date: input.reference_date,
        },
        tables,
    )?;

    let mut warnings = profile_warnings(&provision);
    if input.is_restructured && input.restructuring_date.is_none() {
        warnings.push(
            "Contract flagged as restructured without a restructuring date; observation window not applied"
                .into(),
        );
    }
    if classification.floored_by_restructuring {
        warnings.push(format!(
            "Restructuring observation window holds the exposure at {} ({} days remaining)",
            classification.stage, classification.observation.days_remaining
        ));
    }

    let methodology = provision.methodology.clone();
    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        &methodology,
        &provision_assumptions(tables),
        warnings,
        elapsed,
        ExposureAssessment {
            days_in_arrears: days,
            classification,
            provision,
        },
    ))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn stage_base_pd(stage: Stage, tables: &RegulatoryTables) -> Percent {
    match stage {
        Stage::Stage1 => tables.stage_pd.stage_1_pct,
        Stage::Stage2 => tables.stage_pd.stage_2_pct,
        Stage::Stage3 => tables.stage_pd.stage_3_pct,
    }
}

/// Stage 3 PD climbs linearly from `base_pd` at the ramp start to 100% at the
/// write-off horizon:
///   pd = base + (100 − base) · clamp((months − start)/(horizon − start), 0, 1)
fn stage_pd(
    stage: Stage,
    base_pd: Percent,
    months: Decimal,
    profile: &ProfileParameters,
    tables: &RegulatoryTables,
) -> Percent {
    if stage != Stage::Stage3 {
        return base_pd;
    }

    let ramp_start = tables.stage_pd.stage_3_ramp_start_months;
    let span = profile.write_off_horizon_months - ramp_start;
    let progress = if span <= Decimal::ZERO {
        if months >= ramp_start {
            Decimal::ONE
        } else {
            Decimal::ZERO
        }
    } else {
        ((months - ramp_start) / span)
            .max(Decimal::ZERO)
            .min(Decimal::ONE)
    };

    clamp_pct(base_pd + (HUNDRED - base_pd) * progress)
}

fn summarize_guarantees(
    guarantees: &[Guarantee],
    tables: &RegulatoryTables,
) -> DebtEngineResult<GuaranteeSummary> {
    let overflow = || DebtEngineError::invalid("guarantees", "Total guarantee value exceeds the representable range");

    let mut collateral_value = Decimal::ZERO;
    let mut personal_value = Decimal::ZERO;

    for g in guarantees {
        let value = g.mitigated_value()?;
        let bucket = match g.kind {
            GuaranteeKind::Collateral => &mut collateral_value,
            GuaranteeKind::Personal => &mut personal_value,
        };
        *bucket = bucket.checked_add(value).ok_or_else(overflow)?;
    }

    let total_value = collateral_value
        .checked_add(personal_value)
        .ok_or_else(overflow)?;
    let uncapped = total_value / tables.lgd.mitigation_divisor;
    let mitigation = uncapped.min(tables.lgd.mitigation_cap);

    Ok(GuaranteeSummary {
        count: guarantees.len(),
        total_value,
        collateral_value,
        personal_value,
        mitigation,
        mitigation_capped: uncapped > tables.lgd.mitigation_cap,
    })
}

fn mitigated_lgd(
    profile: &ProfileParameters,
    guarantees: &GuaranteeSummary,
    tables: &RegulatoryTables,
) -> Percent {
    let lgd = profile.base_lgd_pct * (Decimal::ONE - guarantees.mitigation);
    lgd.max(tables.lgd.floor_pct).min(tables.lgd.ceiling_pct)
}

fn profile_warnings(result: &ProvisionResult) -> Vec<String> {
    let mut warnings = Vec::new();
    if !result.diagnostics.profile_resolved {
        warnings.push(format!(
            "Unknown operation profile '{}'; fallback band parameters applied",
            result.diagnostics.operation_profile
        ));
    }
    if result.diagnostics.guarantees.mitigation_capped {
        warnings.push("Guarantee mitigation capped".into());
    }
    warnings
}

fn provision_assumptions(tables: &RegulatoryTables) -> serde_json::Value {
    serde_json::json!({
        "months_from_days": "days / 30",
        "ead": "outstanding principal, no undrawn add-on",
        "stage_pd_pct": &tables.stage_pd,
        "lgd_rules": &tables.lgd,
        "observation_window_days": tables.stages.observation_window_days,
    })
}

fn validate_provision_input(input: &ProvisionInput) -> DebtEngineResult<()> {
    if input.principal <= Decimal::ZERO {
        return Err(DebtEngineError::invalid("principal", "Principal must be positive"));
    }
    if input.days_in_arrears < 0 {
        return Err(DebtEngineError::invalid(
            "days_in_arrears",
            "Days in arrears cannot be negative",
        ));
    }
    for (i, g) in input.guarantees.iter().enumerate() {
        if g.appraised_value < Decimal::ZERO {
            return Err(DebtEngineError::invalid(
                "guarantees",
                format!("Guarantee {i} has a negative appraised value"),
            ));
        }
        if g.coverage_pct < Decimal::ZERO || g.coverage_pct > HUNDRED {
            return Err(DebtEngineError::invalid(
                "guarantees",
                format!("Guarantee {i} coverage must be in [0, 100]"),
            ));
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn base_input() -> ProvisionInput {
        ProvisionInput {
            principal: dec!(100_000),
            days_in_arrears: 0,
            stage: Stage::Stage1,
            operation_profile: "C3".into(),
            guarantees: vec![],
            is_restructured: false,
            restructuring_date: None,
            reference_date: date(2024, 6, 30),
        }
    }

    #[test]
    fn test_stage_1_c3() {
        let r = compute(&base_input(), &RegulatoryTables::default()).unwrap();
        // 2% x 55% x 100,000 = 1,100
        assert_eq!(r.pd_pct, dec!(2));
        assert_eq!(r.lgd_pct, dec!(55));
        assert_eq!(r.expected_loss, dec!(1_100));
        assert_eq!(r.provision_pct, dec!(1.1));
        assert!(!r.diagnostics.write_off_reached);
    }

    #[test]
    fn test_stage_2_multiplier() {
        let input = ProvisionInput {
            stage: Stage::Stage2,
            days_in_arrears: 45,
            operation_profile: "C1".into(),
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        // 15 x 0.7 = 10.5; LGD 25
        assert_eq!(r.pd_pct, dec!(10.5));
        assert_eq!(r.lgd_pct, dec!(25));
        assert_eq!(r.expected_loss, dec!(2_625));
    }

    #[test]
    fn test_stage_3_pd_clamped_for_c5() {
        let input = ProvisionInput {
            stage: Stage::Stage3,
            days_in_arrears: 91,
            operation_profile: "C5".into(),
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        // 90 x 1.5 = 135 -> clamped to 100
        assert_eq!(r.pd_pct, dec!(100));
    }

    #[test]
    fn test_stage_3_ramp_midpoint() {
        // C3 horizon 18; at 10.5 months progress = (10.5-3)/15 = 0.5
        let input = ProvisionInput {
            stage: Stage::Stage3,
            days_in_arrears: 315,
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        assert_eq!(r.pd_pct, dec!(95));
    }

    #[test]
    fn test_stage_3_ramp_not_applied_to_stage_2() {
        let input = ProvisionInput {
            stage: Stage::Stage2,
            days_in_arrears: 315,
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        assert_eq!(r.pd_pct, dec!(15));
    }

    #[test]
    fn test_full_write_off_c3() {
        let input = ProvisionInput {
            stage: Stage::Stage3,
            days_in_arrears: 540,
            guarantees: vec![Guarantee {
                kind: GuaranteeKind::Collateral,
                appraised_value: dec!(5_000_000),
                coverage_pct: dec!(100),
            }],
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        assert!(r.diagnostics.write_off_reached);
        assert_eq!(r.pd_pct, dec!(100));
        assert_eq!(r.lgd_pct, dec!(100));
        assert_eq!(r.provision_pct, dec!(100));
        assert_eq!(r.expected_loss, dec!(100_000));
    }

    #[test]
    fn test_c1_horizon_is_36_months() {
        let input = ProvisionInput {
            stage: Stage::Stage3,
            days_in_arrears: 540,
            operation_profile: "C1".into(),
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        assert!(!r.diagnostics.write_off_reached);
        assert!(r.pd_pct < dec!(100));
    }

    #[test]
    fn test_guarantee_mitigation() {
        // 500,000 x 80% = 400,000 -> mitigation 0.4 (at the cap, not above)
        let input = ProvisionInput {
            guarantees: vec![Guarantee {
                kind: GuaranteeKind::Collateral,
                appraised_value: dec!(500_000),
                coverage_pct: dec!(80),
            }],
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        assert_eq!(r.diagnostics.guarantees.total_value, dec!(400_000));
        assert_eq!(r.diagnostics.guarantees.mitigation, dec!(0.4));
        assert!(!r.diagnostics.guarantees.mitigation_capped);
        // 55 x 0.6 = 33
        assert_eq!(r.lgd_pct, dec!(33));
    }

    #[test]
    fn test_guarantees_are_summed_and_capped() {
        let input = ProvisionInput {
            guarantees: vec![
                Guarantee {
                    kind: GuaranteeKind::Collateral,
                    appraised_value: dec!(300_000),
                    coverage_pct: dec!(100),
                },
                Guarantee {
                    kind: GuaranteeKind::Personal,
                    appraised_value: dec!(400_000),
                    coverage_pct: dec!(50),
                },
            ],
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        let g = &r.diagnostics.guarantees;
        assert_eq!(g.collateral_value, dec!(300_000));
        assert_eq!(g.personal_value, dec!(200_000));
        assert_eq!(g.total_value, dec!(500_000));
        assert_eq!(g.mitigation, dec!(0.40));
        assert!(g.mitigation_capped);
    }

    #[test]
    fn test_lgd_floor() {
        let mut tables = RegulatoryTables::default();
        tables.lgd.mitigation_cap = dec!(0.95);
        let input = ProvisionInput {
            operation_profile: "C1".into(),
            guarantees: vec![Guarantee {
                kind: GuaranteeKind::Collateral,
                appraised_value: dec!(10_000_000),
                coverage_pct: dec!(100),
            }],
            ..base_input()
        };
        let r = compute(&input, &tables).unwrap();
        // 25 x 0.05 = 1.25 -> floored at 5
        assert_eq!(r.lgd_pct, dec!(5));
    }

    #[test]
    fn test_unknown_profile_falls_back() {
        let input = ProvisionInput {
            operation_profile: "Z7".into(),
            ..base_input()
        };
        let out = calculate_provision(&input, &RegulatoryTables::default()).unwrap();
        assert!(!out.result.diagnostics.profile_resolved);
        assert_eq!(out.result.lgd_pct, dec!(65));
        assert!(out.warnings.iter().any(|w| w.contains("Z7")));
    }

    #[test]
    fn test_observation_diagnostics() {
        let input = ProvisionInput {
            stage: Stage::Stage2,
            is_restructured: true,
            restructuring_date: Some(date(2024, 6, 20)),
            ..base_input()
        };
        let r = compute(&input, &RegulatoryTables::default()).unwrap();
        assert!(r.diagnostics.in_observation_window);
        assert_eq!(r.diagnostics.observation_days_remaining, 170);
    }

    #[test]
    fn test_stage_mismatch_warning() {
        let input = ProvisionInput {
            days_in_arrears: 120,
            stage: Stage::Stage1,
            ..base_input()
        };
        let out = calculate_provision(&input, &RegulatoryTables::default()).unwrap();
        assert!(out.warnings.iter().any(|w| w.contains("Stage 3")));
    }

    #[test]
    fn test_reject_invalid_inputs() {
        let tables = RegulatoryTables::default();
        let zero_principal = ProvisionInput {
            principal: Decimal::ZERO,
            ..base_input()
        };
        assert!(compute(&zero_principal, &tables).is_err());

        let negative_days = ProvisionInput {
            days_in_arrears: -3,
            ..base_input()
        };
        assert!(compute(&negative_days, &tables).is_err());

        let bad_coverage = ProvisionInput {
            guarantees: vec![Guarantee {
                kind: GuaranteeKind::Personal,
                appraised_value: dec!(1_000),
                coverage_pct: dec!(120),
            }],
            ..base_input()
        };
        assert!(compute(&bad_coverage, &tables).is_err());
    }

    #[test]
    fn test_assess_exposure_pipeline() {
        let input = ExposureAssessmentInput {
            principal: dec!(100_000),
            last_payment_date: date(2024, 4, 1),
            reference_date: date(2024, 6, 30),
            operation_profile: "C3".into(),
            guarantees: vec![],
            is_restructured: false,
            restructuring_date: None,
        };
        let out = assess_exposure(&input, &RegulatoryTables::default()).unwrap();
        assert_eq!(out.result.days_in_arrears, 90);
        assert_eq!(out.result.classification.stage, Stage::Stage2);
        assert_eq!(out.result.provision.pd_pct, dec!(15));
    }

    #[test]
    fn test_assess_exposure_payment_after_reference() {
        let input = ExposureAssessmentInput {
            principal: dec!(100_000),
            last_payment_date: date(2024, 7, 15),
            reference_date: date(2024, 6, 30),
            operation_profile: "C3".into(),
            guarantees: vec![],
            is_restructured: false,
            restructuring_date: None,
        };
        let out = assess_exposure(&input, &RegulatoryTables::default()).unwrap();
        assert_eq!(out.result.days_in_arrears, 0);
        assert_eq!(out.result.classification.stage, Stage::Stage1);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let r = compute(&base_input(), &RegulatoryTables::default()).unwrap();
        let json = serde_json::to_string(&r).unwrap();
        let back: ProvisionResult = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn test_oversized_guarantees_are_invalid_input() {
        let mut input = base_input();
        let huge = Guarantee {
            kind: GuaranteeKind::Collateral,
            appraised_value: Decimal::MAX / dec!(2),
            coverage_pct: dec!(100),
        };
        input.guarantees = vec![huge.clone(), huge];
        let err = compute(&input, &RegulatoryTables::default()).unwrap_err();
        assert!(matches!(err, DebtEngineError::InvalidInput { ref field, .. } if field == "guarantees"));
    }

    #[test]
    fn test_guarantee_sum_overflow_is_invalid_input() {
        // Each mitigated value is a hundredth of the decimal range; the sum is not
        let mut input = base_input();
        let large = Guarantee {
            kind: GuaranteeKind::Personal,
            appraised_value: Decimal::MAX,
            coverage_pct: dec!(1),
        };
        assert!(large.mitigated_value().is_ok());
        input.guarantees = vec![large; 101];
        let err = compute(&input, &RegulatoryTables::default()).unwrap_err();
        assert!(matches!(err, DebtEngineError::InvalidInput { ref field, .. } if field == "guarantees"));
    }
}
