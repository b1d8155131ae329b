use napi::Result as NapiResult;
use napi_derive::napi;

use debt_engine_core::RegulatoryTables;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

/// Tables override from the host application, or the published defaults.
fn tables_from(tables_json: Option<String>) -> NapiResult<RegulatoryTables> {
    match tables_json {
        Some(json) => RegulatoryTables::from_json(&json).map_err(to_napi_error),
        None => Ok(RegulatoryTables::default()),
    }
}

// ---------------------------------------------------------------------------
// Lending
// ---------------------------------------------------------------------------

#[napi]
pub fn solve_rate(input_json: String) -> NapiResult<String> {
    let input: debt_engine_core::lending::rate_solver::RateInferenceInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        debt_engine_core::lending::rate_solver::infer_rate(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

/// Scalar shortcut for form fields: the implied periodic rate in percent, as a
/// decimal string.
#[napi]
pub fn implied_rate_pct(principal: String, installment: String, term: u32) -> NapiResult<String> {
    let principal: rust_decimal::Decimal = principal.parse().map_err(to_napi_error)?;
    let installment: rust_decimal::Decimal = installment.parse().map_err(to_napi_error)?;
    let solution = debt_engine_core::lending::rate_solver::solve_rate(principal, installment, term)
        .map_err(to_napi_error)?;
    Ok(solution.rate_pct.to_string())
}

#[napi]
pub fn resolve_loan_terms(input_json: String) -> NapiResult<String> {
    let input: debt_engine_core::lending::amortization::LoanTerms =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        debt_engine_core::lending::amortization::resolve_terms(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn amortization_schedule(input_json: String) -> NapiResult<String> {
    let input: debt_engine_core::lending::amortization::ScheduleInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let output =
        debt_engine_core::lending::amortization::build_schedule(&input).map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Provisioning
// ---------------------------------------------------------------------------

#[derive(serde::Deserialize)]
struct StageBindingInput {
    #[serde(flatten)]
    state: debt_engine_core::provisioning::staging::ArrearsState,
    reference_date: chrono::NaiveDate,
}

#[napi]
pub fn classify_stage(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let binding_input: StageBindingInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = debt_engine_core::provisioning::staging::classify_detailed(
        &binding_input.state,
        binding_input.reference_date,
        &tables,
    )
    .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn calculate_provision(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: debt_engine_core::provisioning::expected_loss::ProvisionInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = debt_engine_core::provisioning::expected_loss::calculate_provision(&input, &tables)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn assess_exposure(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: debt_engine_core::provisioning::expected_loss::ExposureAssessmentInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = debt_engine_core::provisioning::expected_loss::assess_exposure(&input, &tables)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Abusiveness
// ---------------------------------------------------------------------------

#[napi]
pub fn analyze_abusiveness(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: debt_engine_core::abusiveness::analyzer::AbusivenessInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = debt_engine_core::abusiveness::analyzer::analyze_rates(&input, &tables)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

#[napi]
pub fn analyze_contract(input_json: String, tables_json: Option<String>) -> NapiResult<String> {
    let input: debt_engine_core::abusiveness::contract::ContractRateInput =
        serde_json::from_str(&input_json).map_err(to_napi_error)?;
    let tables = tables_from(tables_json)?;
    let output = debt_engine_core::abusiveness::contract::analyze_contract(&input, &tables)
        .map_err(to_napi_error)?;
    serde_json::to_string(&output).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[napi]
pub fn default_tables() -> NapiResult<String> {
    serde_json::to_string(&RegulatoryTables::default()).map_err(to_napi_error)
}
