mod commands;
mod config;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;
use tracing_subscriber::EnvFilter;

use commands::abusiveness::{AbusivenessArgs, ContractArgs};
use commands::lending::{ResolveArgs, ScheduleArgs, SolveRateArgs};
use commands::provisioning::{AssessArgs, ProvisionArgs, StageArgs};

/// Implicit rates, amortization and staged provisioning for bank-debt contracts
#[derive(Parser)]
#[command(
    name = "debt",
    version,
    about = "Implicit rates, amortization and staged provisioning for bank-debt contracts",
    long_about = "A CLI for the debt calculation engine with decimal precision. Infers \
                  implicit periodic rates, builds price-table amortization schedules, \
                  classifies exposures into risk stages, computes expected-loss \
                  provisions and grades contract rates against reference rates."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Regulatory tables override (JSON or YAML)
    #[arg(long, global = true)]
    tables: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Infer the periodic rate implied by principal, installment and term
    SolveRate(SolveRateArgs),
    /// Solve loan terms for whichever of the four quantities is missing
    ResolveTerms(ResolveArgs),
    /// Build a price-table amortization schedule
    Schedule(ScheduleArgs),
    /// Classify an exposure into a risk stage
    Stage(StageArgs),
    /// Compute the expected-loss provision for a staged exposure
    Provision(ProvisionArgs),
    /// Derive arrears from dates, classify and provision in one step
    Assess(AssessArgs),
    /// Grade a contract rate against a reference rate
    Abusiveness(AbusivenessArgs),
    /// Infer a contract's implied rate and grade it against the reference rate
    AnalyzeContract(ContractArgs),
    /// Print the active regulatory tables
    Tables,
    /// Print version information
    Version,
}

const DEFAULT_LOG_LEVEL: &str = "warn";

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(log_filter(std::env::var("RUST_LOG").ok().as_deref()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let tables = match config::load_tables(cli.tables.as_deref()) {
        Ok(tables) => tables,
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    };

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::SolveRate(args) => commands::lending::run_solve_rate(args),
        Commands::ResolveTerms(args) => commands::lending::run_resolve_terms(args),
        Commands::Schedule(args) => commands::lending::run_schedule(args),
        Commands::Stage(args) => commands::provisioning::run_stage(args, &tables),
        Commands::Provision(args) => commands::provisioning::run_provision(args, &tables),
        Commands::Assess(args) => commands::provisioning::run_assess(args, &tables),
        Commands::Abusiveness(args) => commands::abusiveness::run_abusiveness(args, &tables),
        Commands::AnalyzeContract(args) => commands::abusiveness::run_analyze_contract(args, &tables),
        Commands::Tables => serde_json::to_value(&tables).map_err(Into::into),
        Commands::Version => {
            println!("debt {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            log_warnings(&value);
            if let Err(e) = output::format_output(&cli.output, &value) {
                eprintln!("{}: {}", "error".red().bold(), e);
                process::exit(1);
            }
            process::exit(0);
        }
        Err(e) => {
            tracing::debug!(error = %e, "command failed");
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}

/// `RUST_LOG` when it parses, warnings only otherwise.
fn log_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Surface engine warnings from the output envelope on the log stream.
fn log_warnings(value: &serde_json::Value) {
    if let Some(warnings) = value.get("warnings").and_then(|w| w.as_array()) {
        for warning in warnings.iter().filter_map(|w| w.as_str()) {
            tracing::warn!("{}", warning);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing::level_filters::LevelFilter;

    #[test]
    fn test_log_filter_honors_rust_log() {
        assert_eq!(log_filter(Some("debug")).max_level_hint(), Some(LevelFilter::DEBUG));
        assert_eq!(log_filter(Some("trace")).max_level_hint(), Some(LevelFilter::TRACE));
    }

    #[test]
    fn test_log_filter_defaults_to_warn() {
        assert_eq!(log_filter(None).max_level_hint(), Some(LevelFilter::WARN));
    }
}
