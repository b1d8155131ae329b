use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use debt_engine_core::abusiveness::analyzer::{self, AbusivenessInput};
use debt_engine_core::abusiveness::contract::{self, ContractRateInput};
use debt_engine_core::RegulatoryTables;

use crate::input;

/// Arguments for rate abusiveness grading
#[derive(Args)]
pub struct AbusivenessArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Contract periodic rate in percent
    #[arg(long, alias = "contract-rate")]
    pub contract_rate_pct: Option<Decimal>,

    /// Reference periodic rate in percent
    #[arg(long, alias = "reference-rate")]
    pub reference_rate_pct: Option<Decimal>,
}

/// Arguments for contract rate analysis
#[derive(Args)]
pub struct ContractArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Periodic installment
    #[arg(long, alias = "pmt")]
    pub installment: Option<Decimal>,

    /// Number of periods
    #[arg(long)]
    pub term: Option<u32>,

    /// Rate stated in the contract, in percent
    #[arg(long, alias = "stated-rate")]
    pub stated_rate_pct: Option<Decimal>,

    /// Reference periodic rate in percent
    #[arg(long, alias = "reference-rate")]
    pub reference_rate_pct: Option<Decimal>,
}

pub fn run_abusiveness(args: AbusivenessArgs, tables: &RegulatoryTables) -> Result<Value, Box<dyn std::error::Error>> {
    let rates: AbusivenessInput = match input::read_structured(args.input.as_deref())? {
        Some(data) => data,
        None => AbusivenessInput {
            contract_rate_pct: args.contract_rate_pct
                .ok_or("--contract-rate-pct is required (or provide --input)")?,
            reference_rate_pct: args.reference_rate_pct
                .ok_or("--reference-rate-pct is required (or provide --input)")?,
        },
    };

    let result = analyzer::analyze_rates(&rates, tables)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_analyze_contract(args: ContractArgs, tables: &RegulatoryTables) -> Result<Value, Box<dyn std::error::Error>> {
    let contract_input: ContractRateInput = match input::read_structured(args.input.as_deref())? {
        Some(data) => data,
        None => ContractRateInput {
            principal: args.principal
                .ok_or("--principal is required (or provide --input)")?,
            installment: args.installment
                .ok_or("--installment is required (or provide --input)")?,
            term: args.term
                .ok_or("--term is required (or provide --input)")?,
            stated_rate_pct: args.stated_rate_pct,
            reference_rate_pct: args.reference_rate_pct
                .ok_or("--reference-rate-pct is required (or provide --input)")?,
        },
    };

    let result = contract::analyze_contract(&contract_input, tables)?;
    Ok(serde_json::to_value(result)?)
}
