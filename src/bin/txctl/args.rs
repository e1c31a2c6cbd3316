use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes, U256};
use alloy::signers::local::PrivateKeySigner;
use anyhow::{Context, Result};
use clap::Parser;
use savings_tx_engine::{load_config_from_path, EngineConfig, TransactionIntent};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// CLI arguments for txctl
#[derive(Parser, Debug)]
#[command(name = "txctl")]
#[command(
    about = "Submit one contract call and follow it to a terminal outcome",
    long_about = None
)]
pub struct CliArgs {
    /// JSON-RPC endpoint
    #[arg(long, env = "RPC_URL")]
    pub rpc_url: String,

    /// Private key used to sign the transaction
    #[arg(long, env = "PRIVATE_KEY")]
    pub private_key: String,

    /// Target contract address
    #[arg(long)]
    pub to: Address,

    /// ABI-encoded calldata, selector included
    #[arg(long)]
    pub calldata: Bytes,

    /// Function label used in logs
    #[arg(long, default_value = "call")]
    pub function: String,

    /// Correlation id of the business operation. Defaults to "<function>@<to>"
    #[arg(long)]
    pub correlation_id: Option<String>,

    /// Fixed gas limit, skips estimation
    #[arg(long)]
    pub gas_limit: Option<u64>,

    /// Native value to attach, in wei
    #[arg(long, default_value_t = Default::default())]
    pub value_wei: U256,

    /// Engine configuration file (TOML)
    #[arg(long, env = "TXCTL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Contract ABI (JSON) used to decode failed transactions
    #[arg(long)]
    pub abi: Option<PathBuf>,
}

/// txctl configuration with every input resolved
#[derive(Clone)]
pub struct TxctlConfig {
    pub rpc_url: String,
    pub signer: PrivateKeySigner,
    pub intent: TransactionIntent,
    pub engine: EngineConfig,
    pub interface: Option<Arc<JsonAbi>>,
}

impl TxctlConfig {
    pub fn load(args: CliArgs) -> Result<Self> {
        let signer: PrivateKeySigner = args
            .private_key
            .parse()
            .context("Failed to parse private key")?;

        let engine = match &args.config {
            Some(path) => load_config_from_path(path)?,
            None => EngineConfig::default(),
        };

        let interface = match &args.abi {
            Some(path) => {
                let raw = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read ABI file {}", path.display()))?;
                let abi: JsonAbi = serde_json::from_str(&raw)
                    .with_context(|| format!("failed to parse ABI file {}", path.display()))?;
                Some(Arc::new(abi))
            }
            None => None,
        };

        let correlation_id = args
            .correlation_id
            .unwrap_or_else(|| format!("{}@{}", args.function, args.to));

        let mut intent =
            TransactionIntent::new(args.to, args.function, args.calldata, correlation_id)
                .with_value(args.value_wei);
        if let Some(gas_limit) = args.gas_limit {
            intent = intent.with_gas_limit(gas_limit);
        }

        info!(
            rpc_url = %args.rpc_url,
            wallet_address = %signer.address(),
            to = %intent.to(),
            correlation_id = intent.correlation_id(),
            "Loaded txctl config"
        );

        Ok(Self {
            rpc_url: args.rpc_url,
            signer,
            intent,
            engine,
            interface,
        })
    }
}
