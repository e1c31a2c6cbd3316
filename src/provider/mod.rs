//! # Provider Boundary
//!
//! The engine only talks to the chain through [`ChainProvider`]. Any JSON-RPC client can sit
//! behind it; [`AlloyChainProvider`] adapts an alloy provider, tests use a scripted mock.

use alloy::primitives::{Bytes, B256};
use async_trait::async_trait;

use crate::types::{ReadCall, TransactionDetails, TransactionIntent, TxReceipt};

mod alloy_rpc;

pub use alloy_rpc::AlloyChainProvider;

/// JSON-RPC error code geth and most clients use for `execution reverted`.
const EXECUTION_REVERTED_CODE: i64 = 3;

/// Error surfaced by a [`ChainProvider`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProviderError {
    /// The node could not be reached or the connection failed mid-request.
    #[error("transport error: {0}")]
    Transport(String),
    /// The node answered with a JSON-RPC error response.
    #[error("{message} (code {code})")]
    Rpc {
        code: i64,
        message: String,
        /// Raw revert payload, when the node returned one.
        data: Option<Bytes>,
    },
    /// The wallet or signer refused or failed to sign.
    #[error("wallet error: {0}")]
    Wallet(String),
    #[error("{0}")]
    Other(String),
}

impl ProviderError {
    pub fn rpc(code: i64, message: impl Into<String>) -> Self {
        ProviderError::Rpc {
            code,
            message: message.into(),
            data: None,
        }
    }

    /// An `execution reverted` response carrying revert data.
    pub fn reverted(message: impl Into<String>, data: impl Into<Bytes>) -> Self {
        ProviderError::Rpc {
            code: EXECUTION_REVERTED_CODE,
            message: message.into(),
            data: Some(data.into()),
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ProviderError::Transport(message)
            | ProviderError::Wallet(message)
            | ProviderError::Other(message)
            | ProviderError::Rpc { message, .. } => message,
        }
    }

    pub fn revert_data(&self) -> Option<&Bytes> {
        match self {
            ProviderError::Rpc {
                data: Some(data), ..
            } if !data.is_empty() => Some(data),
            _ => None,
        }
    }

    /// Network-layer failure. Retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, ProviderError::Transport(_))
    }

    /// The call itself reverts, so no amount of gas or retrying will fix it.
    pub fn is_execution_revert(&self) -> bool {
        if self.revert_data().is_some() {
            return true;
        }
        if let ProviderError::Rpc { code, .. } = self {
            if *code == EXECUTION_REVERTED_CODE {
                return true;
            }
        }
        self.message()
            .to_ascii_lowercase()
            .contains("execution reverted")
    }
}

/// Chain access the engine needs. Implementations must be safe to share across intents.
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Estimate gas units for the intent's call.
    async fn estimate_gas(&self, intent: &TransactionIntent) -> Result<u64, ProviderError>;

    /// Sign and broadcast the call with the given gas limit. Returns as soon as the node
    /// accepts it, not once it is mined.
    async fn send_transaction(
        &self,
        intent: &TransactionIntent,
        gas_limit: u64,
    ) -> Result<B256, ProviderError>;

    /// `Ok(None)` while the transaction is unknown or not mined yet.
    async fn get_transaction_receipt(&self, hash: B256)
        -> Result<Option<TxReceipt>, ProviderError>;

    async fn get_block_number(&self) -> Result<u64, ProviderError>;

    async fn get_transaction(&self, hash: B256)
        -> Result<Option<TransactionDetails>, ProviderError>;

    /// Execute a read-only call against the latest state.
    async fn call(&self, read: &ReadCall) -> Result<Bytes, ProviderError>;
}
