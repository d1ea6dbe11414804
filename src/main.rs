//! ledger-scanner entry point
use anyhow::{Context, Result};
use clap::Parser;
use ledger_scanner::blockchain::EthereumClient;
use ledger_scanner::cli::{BalanceArgs, Cli, Commands};
use ledger_scanner::core::config::ScanConfig;
use ledger_scanner::core::domain::ScanResult;
use ledger_scanner::core::errors::ScanError;
use ledger_scanner::hardware::connect_ledger;
use ledger_scanner::report::{csv, render};
use ledger_scanner::scanner::BalanceScanner;
use ledger_scanner::service::{export_addresses, export_pubkeys, ScanService};
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging() {
        eprintln!("Failed to initialize logging: {}", e);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(exit_code(&e));
    }
}

/// 2 for bad input (nothing was sent to the device or the node), 1 otherwise.
fn exit_code(e: &anyhow::Error) -> i32 {
    match e.downcast_ref::<ScanError>() {
        Some(scan_error) if scan_error.is_input_error() => 2,
        _ => 1,
    }
}

/// Logs go to stderr so the report on stdout stays clean.
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = ScanConfig::load(cli.config.as_deref())?;
    if let Some(rpc) = cli.rpc {
        config.rpc_url = rpc;
        config.validate()?;
    }

    let timeout = config.device_timeout();
    let connect = || connect_ledger(timeout);

    match cli.command {
        Commands::Scan { path, balance } => {
            let service = build_service(&config)?;
            let result = service.scan(&path.request(), balance.options(), connect).await?;
            report(&result, &balance)?;
        }
        Commands::ExportPubkeys { path, output } => {
            let records = export_pubkeys(&path.request(), &output, connect)?;
            info!("Exported {} extended public keys", records.len());
        }
        Commands::ExportAddresses { path, output } => {
            let result = export_addresses(&path.request(), &output, connect)?;
            print!("{}", render(&result, false));
            info!("Exported {} addresses to {}", result.len(), output.display());
        }
        Commands::ScanPubkeys { input, addresses, balance } => {
            let service = build_service(&config)?;
            let result = service.scan_pubkeys(&input, addresses.range(), balance.options()).await?;
            report(&result, &balance)?;
        }
        Commands::ScanAddresses { input, balance } => {
            let service = build_service(&config)?;
            let result = service.scan_addresses(&input, balance.options()).await?;
            report(&result, &balance)?;
        }
    }

    Ok(())
}

fn build_service(config: &ScanConfig) -> Result<ScanService<EthereumClient>> {
    let oracle = EthereumClient::new(&config.rpc_url)?;
    let balances = BalanceScanner::new(config.batch_size, config.failure_policy.policy());
    Ok(ScanService::new(balances, oracle))
}

/// Prints the table, then writes the optional CSV.
fn report(result: &ScanResult, args: &BalanceArgs) -> Result<()> {
    let show_balance = !args.skip_balance;
    print!("{}", render(result, show_balance));

    if let Some(path) = &args.csv {
        csv::export_scan_csv(path, result, show_balance)
            .with_context(|| format!("CSV export to {} failed", path.display()))?;
    }
    Ok(())
}
