use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod runner;

#[derive(Parser)]
#[command(name = "nestegg")]
#[command(
    version,
    about = "Household investment tracker with monthly valuations, XIRR and capital gains"
)]
pub struct Cli {
    /// Database file path (defaults to ~/.nestegg/data.db)
    #[arg(long = "db", global = true)]
    pub db_path: Option<PathBuf>,

    /// Output results in JSON format
    #[arg(long = "json", global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the database schema
    Init,

    /// Household member management
    Users {
        #[command(subcommand)]
        action: UserCommands,
    },

    /// Investment management
    Investments {
        #[command(subcommand)]
        action: InvestmentCommands,
    },

    /// Ledger transaction entry
    Transactions {
        #[command(subcommand)]
        action: TransactionCommands,
    },

    /// Spot price entry (stand-in for the pricing collaborator)
    Prices {
        #[command(subcommand)]
        action: PriceCommands,
    },

    /// Monthly snapshots and net worth
    Snapshots {
        #[command(subcommand)]
        action: SnapshotCommands,
    },

    /// Historical backfill job
    Backfill {
        #[command(subcommand)]
        action: BackfillCommands,
    },

    /// Annualized return (XIRR) for one investment type
    Xirr {
        /// User name
        user: String,

        /// Investment type, e.g. SHARES, EQUITY_FUND, FIXED_DEPOSIT
        investment_type: String,
    },

    /// Capital gains summary for a fiscal period
    Gains {
        /// User name
        user: String,

        /// Period start (YYYY-MM-DD)
        fy_start: String,

        /// Period end (YYYY-MM-DD)
        fy_end: String,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Add a household member (idempotent on name)
    Add { name: String },
}

#[derive(Subcommand)]
pub enum InvestmentCommands {
    /// Add an investment
    Add {
        /// Owner user name
        user: String,

        /// Display name
        name: String,

        /// Investment type, e.g. FIXED_DEPOSIT, SHARES, GOLD
        investment_type: String,

        /// Opening date (YYYY-MM-DD)
        open_date: String,

        /// Annual interest rate in percent (deposit types)
        #[arg(long)]
        rate: Option<String>,

        /// Annual appreciation rate in percent (fixed assets, pensions)
        #[arg(long)]
        appreciation: Option<String>,

        /// Maturity date (YYYY-MM-DD)
        #[arg(long)]
        maturity: Option<String>,

        /// Pricing symbol for unit-based types
        #[arg(long)]
        symbol: Option<String>,
    },

    /// List a user's investments
    List { user: String },
}

#[derive(Subcommand)]
pub enum TransactionCommands {
    /// Append a transaction to the ledger
    Add {
        /// Investment id
        investment_id: i64,

        /// Kind, e.g. BUY, SELL, DEPOSIT, WITHDRAWAL, DIVIDEND
        kind: String,

        /// Date (YYYY-MM-DD)
        date: String,

        /// Amount in major units, e.g. 1500.00
        amount: String,

        /// Unit count for quantity-bearing types
        #[arg(long)]
        units: Option<String>,

        /// Per-unit price in major units
        #[arg(long)]
        unit_price: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum PriceCommands {
    /// Record a spot price
    Set {
        symbol: String,

        /// Date (YYYY-MM-DD)
        date: String,

        /// Price per unit in major units
        price: String,
    },
}

#[derive(Subcommand)]
pub enum SnapshotCommands {
    /// Build snapshots and aggregate net worth for a month
    Calculate {
        /// User name
        user: String,

        /// Target month (YYYY-MM); defaults to the current month
        #[arg(long)]
        month: Option<String>,
    },

    /// Show the net worth history
    Networth { user: String },

    /// Delete all snapshot and net worth rows (irreversible)
    Clear,
}

#[derive(Subcommand)]
pub enum BackfillCommands {
    /// Run a full backfill from the earliest transaction to now
    Run { user: String },
}
