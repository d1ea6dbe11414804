use crate::core::domain::BalanceFilter;
use crate::core::path_template::{
    AxisRange, PathTemplate, DEFAULT_INNER_COUNT, DEFAULT_MIDDLE_COUNT, DEFAULT_OUTER_COUNT, DEFAULT_START,
    DEFAULT_TEMPLATE,
};
use crate::service::{PathRequest, ScanOptions};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Ledger address scanner
#[derive(Debug, Parser)]
#[command(
    name = "ledger-scanner",
    about = "Enumerate Ledger-derived Ethereum addresses across a path template and report their balances",
    version,
    disable_help_subcommand = true
)]
pub struct Cli {
    /// Config file (TOML). Defaults to $CONFIG_PATH, then ./ledger-scanner.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Ethereum JSON-RPC endpoint, overrides the config file
    #[arg(long, global = true)]
    pub rpc: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Derive addresses from the device and fetch their balances
    Scan {
        #[command(flatten)]
        path: PathArgs,
        #[command(flatten)]
        balance: BalanceArgs,
    },
    /// Export the extended public key of every path-prefix (sensitive!)
    ExportPubkeys {
        #[command(flatten)]
        path: PathArgs,
        /// Output CSV file; must not exist
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Export derived addresses without fetching balances
    ExportAddresses {
        #[command(flatten)]
        path: PathArgs,
        /// Output CSV file; must not exist
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Derive addresses from exported public keys (no device) and fetch their balances
    ScanPubkeys {
        /// CSV with publicKey, chainCode, path columns
        #[arg(short, long)]
        input: PathBuf,
        #[command(flatten)]
        addresses: InnerRangeArgs,
        #[command(flatten)]
        balance: BalanceArgs,
    },
    /// Fetch balances for addresses listed in a CSV file
    ScanAddresses {
        /// CSV with index, address, path columns
        #[arg(short, long)]
        input: PathBuf,
        #[command(flatten)]
        balance: BalanceArgs,
    },
}

#[derive(Debug, Clone, Args)]
pub struct InnerRangeArgs {
    /// First index of the innermost axis (O)
    #[arg(long, default_value_t = DEFAULT_START)]
    pub address_start: u32,

    /// Number of innermost indices per path-prefix
    #[arg(long, default_value_t = DEFAULT_INNER_COUNT)]
    pub address_count: u32,
}

impl InnerRangeArgs {
    pub fn range(&self) -> AxisRange {
        AxisRange::new(self.address_start, self.address_count)
    }
}

#[derive(Debug, Clone, Args)]
pub struct PathArgs {
    /// Derivation path template; M, N and O mark the outer, middle and innermost axes
    #[arg(short, long, default_value = DEFAULT_TEMPLATE)]
    pub path: String,

    #[arg(long, default_value_t = DEFAULT_START)]
    pub outer_start: u32,

    #[arg(long, default_value_t = DEFAULT_OUTER_COUNT)]
    pub outer_count: u32,

    #[arg(long, default_value_t = DEFAULT_START)]
    pub middle_start: u32,

    #[arg(long, default_value_t = DEFAULT_MIDDLE_COUNT)]
    pub middle_count: u32,

    #[command(flatten)]
    pub addresses: InnerRangeArgs,
}

impl PathArgs {
    pub fn request(&self) -> PathRequest {
        PathRequest {
            template: PathTemplate::new(self.path.as_str()),
            outer: AxisRange::new(self.outer_start, self.outer_count),
            middle: AxisRange::new(self.middle_start, self.middle_count),
            inner: self.addresses.range(),
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct BalanceArgs {
    /// Hide empty addresses; with a value, hide balances at or below it (`false` disables)
    #[arg(
        short = 'H',
        long,
        num_args = 0..=1,
        default_value = "false",
        default_missing_value = "true",
        value_name = "THRESHOLD"
    )]
    pub hide_small_addresses: BalanceFilter,

    /// Do not fetch balances
    #[arg(short, long)]
    pub skip_balance: bool,

    /// Also write the report to this CSV file; must not exist
    #[arg(short = 'r', long)]
    pub csv: Option<PathBuf>,
}

impl BalanceArgs {
    pub fn options(&self) -> ScanOptions {
        ScanOptions {
            skip_balance: self.skip_balance,
            filter: self.hide_small_addresses,
        }
    }
}
