use alloy::network::EthereumWallet;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use anyhow::{Context, Result};
use args::{CliArgs, TxctlConfig};
use clap::Parser;
use savings_tx_engine::{AlloyChainProvider, TransactionOrchestrator, TransactionOutcome};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

mod args;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let cli_args = CliArgs::parse();
    let config = TxctlConfig::load(cli_args)?;

    let wallet = EthereumWallet::from(config.signer.clone());
    let provider: DynProvider = ProviderBuilder::new()
        .wallet(wallet)
        .connect(&config.rpc_url)
        .await
        .context("Failed to connect to RPC endpoint")?
        .erased();

    let mut orchestrator =
        TransactionOrchestrator::new(Arc::new(AlloyChainProvider::new(provider)), config.engine);
    if let Some(interface) = config.interface {
        orchestrator = orchestrator.with_interface(interface);
    }

    let outcome = orchestrator
        .run(config.intent, |status| info!(%status, "Status update"))
        .await;

    println!("{}", outcome.user_message());
    match &outcome {
        TransactionOutcome::Confirmed { receipt, .. } => {
            println!(
                "tx {} in block {}, gas used {}",
                receipt.transaction_hash, receipt.block_number, receipt.gas_used
            );
        }
        TransactionOutcome::RevertedOnChain { diagnostics, .. } => {
            println!("{}", diagnostics.to_json()?);
        }
        TransactionOutcome::TimedOut { handle, waited } => {
            println!("tx {} still pending after {waited:?}", handle.hash);
        }
        TransactionOutcome::RejectedLocally(error) => {
            warn!(kind = error.kind.name(), raw = %error.raw, "Rejected before confirmation");
        }
    }

    if !outcome.is_confirmed() {
        anyhow::bail!("transaction did not confirm ({})", outcome.status());
    }
    Ok(())
}
