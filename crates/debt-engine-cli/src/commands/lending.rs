use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use debt_engine_core::lending::amortization::{
    self, LoanTerms, PartialLoanTerms, ScheduleInput,
};
use debt_engine_core::lending::rate_solver::{self, RateInferenceInput};

use crate::input;

/// Arguments for implicit rate inference
#[derive(Args)]
pub struct SolveRateArgs {
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

    /// Fail instead of returning a flagged best estimate
    #[arg(long)]
    pub require_convergence: bool,
}

/// Loan terms given as flags; exactly one must be omitted
#[derive(Args)]
pub struct LoanTermFlags {
    /// Loan principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Periodic installment
    #[arg(long, alias = "pmt")]
    pub installment: Option<Decimal>,

    /// Periodic rate in percent (e.g. 1.5 for 1.5% per period)
    #[arg(long, alias = "rate")]
    pub rate_pct: Option<Decimal>,

    /// Number of periods
    #[arg(long)]
    pub term: Option<u32>,
}

impl LoanTermFlags {
    fn into_terms(self) -> Result<LoanTerms, Box<dyn std::error::Error>> {
        let partial = PartialLoanTerms {
            principal: self.principal,
            installment: self.installment,
            rate_pct: self.rate_pct,
            term: self.term,
        };
        Ok(LoanTerms::try_from(partial)?)
    }
}

/// Arguments for solving loan terms
#[derive(Args)]
pub struct ResolveArgs {
    /// Path to JSON input file with a `solve_for` tag (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub terms: LoanTermFlags,
}

/// Arguments for amortization schedule generation
#[derive(Args)]
pub struct ScheduleArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    #[command(flatten)]
    pub terms: LoanTermFlags,

    /// Emit only the period rows (one record per period)
    #[arg(long)]
    pub rows_only: bool,
}

pub fn run_solve_rate(args: SolveRateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let rate_input: RateInferenceInput = match input::read_structured(args.input.as_deref())? {
        Some(data) => data,
        None => RateInferenceInput {
            principal: args.principal
                .ok_or("--principal is required (or provide --input)")?,
            installment: args.installment
                .ok_or("--installment is required (or provide --input)")?,
            term: args.term
                .ok_or("--term is required (or provide --input)")?,
        },
    };

    let result = rate_solver::infer_rate(&rate_input)?;
    tracing::debug!(
        phase = ?result.result.phase,
        bisection = result.result.bisection_iterations,
        newton = result.result.newton_iterations,
        "rate solved"
    );
    if args.require_convergence {
        result.result.clone().require_convergence()?;
    }
    Ok(serde_json::to_value(result)?)
}

pub fn run_resolve_terms(args: ResolveArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let terms: LoanTerms = match input::read_structured(args.input.as_deref())? {
        Some(data) => data,
        None => args.terms.into_terms()?,
    };

    let result = amortization::resolve_terms(&terms)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_schedule(args: ScheduleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let schedule_input: ScheduleInput = match input::read_structured(args.input.as_deref())? {
        Some(data) => data,
        None => ScheduleInput {
            terms: args.terms.into_terms()?,
        },
    };

    let result = amortization::build_schedule(&schedule_input)?;
    if args.rows_only {
        return Ok(serde_json::json!({ "results": result.result.rows }));
    }
    Ok(serde_json::to_value(result)?)
}
