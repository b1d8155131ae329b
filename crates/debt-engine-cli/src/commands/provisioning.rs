use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use debt_engine_core::provisioning::expected_loss::{
    self, ExposureAssessmentInput, ProvisionInput,
};
use debt_engine_core::provisioning::staging::{self, ArrearsState, Stage};
use debt_engine_core::RegulatoryTables;

use crate::input;

/// Restructuring status shared by the staging commands
#[derive(Args)]
pub struct RestructuringFlags {
    /// Contract has been restructured
    #[arg(long)]
    pub restructured: bool,

    /// Restructuring date (YYYY-MM-DD)
    #[arg(long)]
    pub restructuring_date: Option<NaiveDate>,

    /// Reference date (YYYY-MM-DD); defaults to today
    #[arg(long)]
    pub reference_date: Option<NaiveDate>,
}

/// Arguments for stage classification
#[derive(Args)]
pub struct StageArgs {
    /// Path to JSON input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Days in arrears (non-negative)
    #[arg(long)]
    pub days_in_arrears: Option<i64>,

    #[command(flatten)]
    pub restructuring: RestructuringFlags,
}

/// Arguments for a provision on an already staged exposure
#[derive(Args)]
pub struct ProvisionArgs {
    /// Path to JSON input file (overrides individual flags; required for guarantees)
    #[arg(long)]
    pub input: Option<String>,

    /// Outstanding principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Days in arrears (non-negative)
    #[arg(long)]
    pub days_in_arrears: Option<i64>,

    /// Stage (1, 2 or 3)
    #[arg(long, value_parser = clap::value_parser!(u8).range(1..=3))]
    pub stage: Option<u8>,

    /// Operation profile band (C1..C5)
    #[arg(long)]
    pub profile: Option<String>,

    #[command(flatten)]
    pub restructuring: RestructuringFlags,
}

/// Arguments for the classify-then-provision pipeline
#[derive(Args)]
pub struct AssessArgs {
    /// Path to JSON input file (overrides individual flags; required for guarantees)
    #[arg(long)]
    pub input: Option<String>,

    /// Outstanding principal
    #[arg(long)]
    pub principal: Option<Decimal>,

    /// Date of the last payment received (YYYY-MM-DD)
    #[arg(long)]
    pub last_payment_date: Option<NaiveDate>,

    /// Operation profile band (C1..C5)
    #[arg(long)]
    pub profile: Option<String>,

    #[command(flatten)]
    pub restructuring: RestructuringFlags,
}

/// JSON shape accepted by `stage --input`.
#[derive(Deserialize)]
struct StageRequest {
    #[serde(flatten)]
    state: ArrearsState,
    reference_date: NaiveDate,
}

pub fn run_stage(args: StageArgs, tables: &RegulatoryTables) -> Result<Value, Box<dyn std::error::Error>> {
    let request: StageRequest = match input::read_structured(args.input.as_deref())? {
        Some(data) => data,
        None => StageRequest {
            state: ArrearsState {
                days_in_arrears: args.days_in_arrears
                    .ok_or("--days-in-arrears is required (or provide --input)")?,
                is_restructured: args.restructuring.restructured,
                restructuring_date: args.restructuring.restructuring_date,
            },
            reference_date: reference_date(&args.restructuring),
        },
    };

    let classification = staging::classify_detailed(&request.state, request.reference_date, tables)?;
    Ok(serde_json::to_value(classification)?)
}

pub fn run_provision(args: ProvisionArgs, tables: &RegulatoryTables) -> Result<Value, Box<dyn std::error::Error>> {
    let provision_input: ProvisionInput = match input::read_structured(args.input.as_deref())? {
        Some(data) => data,
        None => ProvisionInput {
            principal: args.principal
                .ok_or("--principal is required (or provide --input)")?,
            days_in_arrears: args.days_in_arrears
                .ok_or("--days-in-arrears is required (or provide --input)")?,
            stage: stage_from_number(args.stage
                .ok_or("--stage is required (or provide --input)")?)?,
            operation_profile: args.profile
                .ok_or("--profile is required (or provide --input)")?,
            guarantees: Vec::new(),
            is_restructured: args.restructuring.restructured,
            restructuring_date: args.restructuring.restructuring_date,
            reference_date: reference_date(&args.restructuring),
        },
    };

    let result = expected_loss::calculate_provision(&provision_input, tables)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_assess(args: AssessArgs, tables: &RegulatoryTables) -> Result<Value, Box<dyn std::error::Error>> {
    let assessment_input: ExposureAssessmentInput = match input::read_structured(args.input.as_deref())? {
        Some(data) => data,
        None => ExposureAssessmentInput {
            principal: args.principal
                .ok_or("--principal is required (or provide --input)")?,
            last_payment_date: args.last_payment_date
                .ok_or("--last-payment-date is required (or provide --input)")?,
            reference_date: reference_date(&args.restructuring),
            operation_profile: args.profile
                .ok_or("--profile is required (or provide --input)")?,
            guarantees: Vec::new(),
            is_restructured: args.restructuring.restructured,
            restructuring_date: args.restructuring.restructuring_date,
        },
    };

    let result = expected_loss::assess_exposure(&assessment_input, tables)?;
    tracing::debug!(
        days_in_arrears = result.result.days_in_arrears,
        stage = %result.result.classification.stage,
        "exposure assessed"
    );
    Ok(serde_json::to_value(result)?)
}

fn reference_date(flags: &RestructuringFlags) -> NaiveDate {
    flags
        .reference_date
        .unwrap_or_else(|| chrono::Local::now().date_naive())
}

fn stage_from_number(n: u8) -> Result<Stage, Box<dyn std::error::Error>> {
    match n {
        1 => Ok(Stage::Stage1),
        2 => Ok(Stage::Stage2),
        3 => Ok(Stage::Stage3),
        other => Err(format!("Stage must be 1, 2 or 3 (got {other})").into()),
    }
}
