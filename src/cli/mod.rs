//! CLI definitions.

pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "quant")]
#[command(author, version, about = "End-of-day portfolio backtesting system")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: PathBuf,

    /// Log level (defaults to the configured level)
    #[arg(short, long)]
    pub log_level: Option<LogLevel>,

    /// Enable JSON log format
    #[arg(long)]
    pub json_logs: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Clone, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run a backtest
    Run(RunArgs),
    /// List or inspect saved runs
    Runs(RunsArgs),
    /// List available strategies
    Strategies,
    /// Validate configuration
    ValidateConfig,
}

#[derive(clap::Args)]
pub struct RunArgs {
    /// Strategies to backtest (comma-separated; several run side by side)
    #[arg(short, long, value_delimiter = ',', required = true)]
    pub strategy: Vec<String>,

    /// Universe of symbols (comma-separated)
    #[arg(short = 'S', long, value_delimiter = ',', required = true)]
    pub symbols: Vec<String>,

    /// Start date (YYYY-MM-DD)
    #[arg(long)]
    pub start: String,

    /// End date (YYYY-MM-DD)
    #[arg(long)]
    pub end: String,

    /// Initial capital (defaults to the configured capital)
    #[arg(long)]
    pub capital: Option<Decimal>,

    /// Rebalance frequency: daily, weekly, monthly, quarterly, annually,
    /// every:<n> or custom:<date>,<date>,...
    #[arg(short, long)]
    pub rebalance: Option<String>,

    /// Benchmark symbol
    #[arg(short, long)]
    pub benchmark: Option<String>,

    /// Strategy configuration file (JSON)
    #[arg(long)]
    pub strategy_config: Option<PathBuf>,

    /// Directory of <SYMBOL>.csv files (defaults to the configured directory)
    #[arg(long)]
    pub data: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,

    /// Save run artifacts (report, equity curve, trades) under the output directory
    #[arg(long)]
    pub save: bool,
}

#[derive(clap::Args)]
pub struct RunsArgs {
    /// Show one saved run instead of listing all
    #[arg(long)]
    pub show: Option<Uuid>,

    /// Directory of saved runs (defaults to the configured output directory)
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    pub output: OutputFormat,
}
