//! Rate-discrepancy analysis of a contract: infer the rate its installments
//! actually imply, compare it with the rate the contract states, and grade it
//! against the reference rate.

use std::time::Instant;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::abusiveness::analyzer::{analyze, AbusivenessReport};
use crate::lending::rate_solver::{solve_rate, RateSolution};
use crate::tables::RegulatoryTables;
use crate::types::*;
use crate::DebtEngineResult;

/// Stated and implied rates closer than this (pp) are treated as equal.
const DISCREPANCY_TOLERANCE_PP: Percent = dec!(0.01);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRateInput {
    pub principal: Money,
    pub installment: Money,
    pub term: u32,
    /// Periodic rate written in the contract, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stated_rate_pct: Option<Percent>,
    /// Published reference rate for the same period and product.
    pub reference_rate_pct: Percent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractRateAnalysis {
    pub inferred: RateSolution,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stated_rate_pct: Option<Percent>,
    /// Inferred minus stated, in percentage points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discrepancy_pp: Option<Percent>,
    /// Graded on the inferred rate.
    pub abusiveness: AbusivenessReport,
}

/// Infer the contract's effective periodic rate and grade it.
pub fn analyze_contract(
    input: &ContractRateInput,
    tables: &RegulatoryTables,
) -> DebtEngineResult<ComputationOutput<ContractRateAnalysis>> {
    let start = Instant::now();
    let mut warnings = Vec::new();

    let inferred = solve_rate(input.principal, input.installment, input.term)?;
    if !inferred.converged {
        warnings.push(format!(
            "Rate solver did not meet tolerance; grading best estimate {}%",
            inferred.rate_pct
        ));
    }

    let discrepancy_pp = input
        .stated_rate_pct
        .map(|stated| round_rate_pct(inferred.rate_pct - stated));
    if let Some(diff) = discrepancy_pp {
        if diff.abs() > DISCREPANCY_TOLERANCE_PP {
            warnings.push(format!(
                "Installments imply {}% per period; contract states {}% ({} pp difference)",
                inferred.rate_pct,
                input.stated_rate_pct.unwrap_or(Decimal::ZERO),
                diff
            ));
        }
    }

    let abusiveness = analyze(inferred.rate_pct, input.reference_rate_pct, tables)?;
    if abusiveness.is_abusive {
        warnings.push(format!(
            "Implied rate {}% is above the abusive threshold of {}%",
            inferred.rate_pct, abusiveness.abusive_threshold_pct
        ));
    }

    let elapsed = start.elapsed().as_micros() as u64;
    Ok(with_metadata(
        "Implicit rate inference and abusiveness grading",
        &serde_json::json!({
            "graded_rate": "inferred from installments",
            "discrepancy_tolerance_pp": DISCREPANCY_TOLERANCE_PP.to_string(),
            "abusive_multiple": tables.abusiveness.abusive_multiple.to_string(),
        }),
        warnings,
        elapsed,
        ContractRateAnalysis {
            inferred,
            stated_rate_pct: input.stated_rate_pct,
            discrepancy_pp,
            abusiveness,
        },
    ))
}
