mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::plan::{AdjustPaymentArgs, OperationIdArgs, PlanArgs, PrepayArgs, RateAdjustArgs};

/// Replay a mortgage plan and edit its operation log
#[derive(Parser)]
#[command(
    name = "mrp",
    version,
    about = "Replay a mortgage plan and edit its operation log",
    long_about = "Rebuilds a loan's amortisation schedule from its original terms plus a \
                  log of rate adjustments, payment overrides and prepayments. Every edit \
                  to the log is followed by a full replay with decimal precision."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay the plan and print the full payment schedule
    Schedule(PlanArgs),
    /// Replay the plan and print its summary only
    Summary(PlanArgs),
    /// Operation history with recorded impact, plus the scenario timeline
    History(PlanArgs),
    /// Append a rate adjustment taking effect after --period
    RateAdjust(RateAdjustArgs),
    /// Append a one-off payment override for --period
    AdjustPayment(AdjustPaymentArgs),
    /// Append a lump-sum prepayment at the end of --period
    Prepay(PrepayArgs),
    /// Remove one operation from the log
    DeleteOp(OperationIdArgs),
    /// Drop every operation logged after --id
    Revert(OperationIdArgs),
    /// Check loan terms and every logged operation against caller limits
    Validate(PlanArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    env_logger::init();
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Schedule(args) => commands::plan::run_schedule(args),
        Commands::Summary(args) => commands::plan::run_summary(args),
        Commands::History(args) => commands::plan::run_history(args),
        Commands::RateAdjust(args) => commands::plan::run_rate_adjust(args),
        Commands::AdjustPayment(args) => commands::plan::run_adjust_payment(args),
        Commands::Prepay(args) => commands::plan::run_prepay(args),
        Commands::DeleteOp(args) => commands::plan::run_delete_op(args),
        Commands::Revert(args) => commands::plan::run_revert(args),
        Commands::Validate(args) => commands::plan::run_validate(args),
        Commands::Version => {
            println!("mrp {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
