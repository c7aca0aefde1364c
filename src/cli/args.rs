//! CLI argument definitions using clap derive

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::cli::commands::{
    completions::CompletionsArgs, config::ConfigCommands, customer::CustomerCommands,
    init::InitArgs, notify::NotifyCommands, order::OrderCommands, part::PartCommands,
    report::ReportCommands, shop::ShopCommands, stock::StockCommands, vehicle::VehicleCommands,
};

#[derive(Parser)]
#[command(name = "garage")]
#[command(author, version, about = "Garage Desk - auto repair shop management")]
#[command(long_about = "Customers, vehicles, service orders, parts inventory, notifications and revenue reports for one or more repair shops, kept in a local workspace database.")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalOpts,
}

#[derive(clap::Args, Clone, Debug)]
pub struct GlobalOpts {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "auto")]
    pub format: OutputFormat,

    /// Suppress non-essential output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Enable verbose output (debug logging)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Workspace root (default: auto-detect by finding .garage/)
    #[arg(long, global = true, env = "GARAGE_WORKSPACE")]
    pub workspace: Option<PathBuf>,

    /// Shop to operate on (id or name); overrides the configured shop
    #[arg(long, global = true)]
    pub shop: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new Garage Desk workspace
    Init(InitArgs),

    /// Shops and their staff
    #[command(subcommand)]
    Shop(ShopCommands),

    /// Customer management
    #[command(subcommand)]
    Customer(CustomerCommands),

    /// Vehicle management
    #[command(subcommand)]
    Vehicle(VehicleCommands),

    /// Service orders, line items and status changes
    #[command(subcommand)]
    Order(OrderCommands),

    /// Parts inventory
    #[command(subcommand)]
    Part(PartCommands),

    /// Stock movements (entries, exits, adjustments, returns)
    #[command(subcommand)]
    Stock(StockCommands),

    /// Notification center
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// Revenue and activity reports
    #[command(subcommand)]
    Report(ReportCommands),

    /// View and modify configuration
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Automatically detect based on context (pretty for show, tsv for list)
    #[default]
    Auto,
    /// YAML format (full fidelity)
    Yaml,
    /// Tab-separated values (for piping)
    Tsv,
    /// JSON format (for programming)
    Json,
    /// CSV format (for spreadsheets)
    Csv,
    /// Markdown tables
    Md,
    /// Just IDs, one per line
    Id,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Self as ValueEnum>::from_str(s, true)
    }
}
