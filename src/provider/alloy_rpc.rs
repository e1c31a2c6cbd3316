use alloy::{
    consensus::Transaction,
    network::TransactionBuilder,
    primitives::{Bytes, B256},
    providers::Provider,
    rpc::types::TransactionRequest,
    transports::{RpcError, TransportError},
};
use async_trait::async_trait;

use super::{ChainProvider, ProviderError};
use crate::types::{ReadCall, TransactionDetails, TransactionIntent, TxReceipt};

/// [`ChainProvider`] backed by an alloy provider.
///
/// Sending requires a provider built with a wallet, e.g.
/// `ProviderBuilder::new().wallet(wallet).connect(url).await?.erased()`.
#[derive(Clone)]
pub struct AlloyChainProvider<P> {
    provider: P,
}

impl<P: Provider + Clone> AlloyChainProvider<P> {
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    pub fn inner(&self) -> &P {
        &self.provider
    }

    fn request(intent: &TransactionIntent) -> TransactionRequest {
        TransactionRequest::default()
            .with_to(intent.to())
            .with_input(intent.calldata().clone())
            .with_value(intent.value())
    }
}

#[async_trait]
impl<P: Provider + Clone + 'static> ChainProvider for AlloyChainProvider<P> {
    async fn estimate_gas(&self, intent: &TransactionIntent) -> Result<u64, ProviderError> {
        Ok(self.provider.estimate_gas(Self::request(intent)).await?)
    }

    async fn send_transaction(
        &self,
        intent: &TransactionIntent,
        gas_limit: u64,
    ) -> Result<B256, ProviderError> {
        let request = Self::request(intent).with_gas_limit(gas_limit);
        let pending = self.provider.send_transaction(request).await?;
        Ok(*pending.tx_hash())
    }

    async fn get_transaction_receipt(
        &self,
        hash: B256,
    ) -> Result<Option<TxReceipt>, ProviderError> {
        let receipt = self.provider.get_transaction_receipt(hash).await?;

        // Receipts without a block number belong to pending blocks
        Ok(receipt.and_then(|receipt| {
            let block_number = receipt.block_number?;
            Some(TxReceipt {
                transaction_hash: receipt.transaction_hash,
                block_number,
                status: receipt.status(),
                gas_used: receipt.gas_used,
                logs: receipt
                    .inner
                    .logs()
                    .iter()
                    .map(|log| log.inner.clone())
                    .collect(),
            })
        }))
    }

    async fn get_block_number(&self) -> Result<u64, ProviderError> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn get_transaction(
        &self,
        hash: B256,
    ) -> Result<Option<TransactionDetails>, ProviderError> {
        let tx = self.provider.get_transaction_by_hash(hash).await?;
        Ok(tx.map(|tx| TransactionDetails {
            hash,
            to: tx.to(),
            gas_limit: tx.gas_limit(),
            input: tx.input().clone(),
        }))
    }

    async fn call(&self, read: &ReadCall) -> Result<Bytes, ProviderError> {
        let request = TransactionRequest::default()
            .with_to(read.to)
            .with_input(read.data.clone());
        Ok(self.provider.call(request).await?)
    }
}

impl From<TransportError> for ProviderError {
    fn from(err: TransportError) -> Self {
        match err {
            RpcError::ErrorResp(payload) => ProviderError::Rpc {
                code: payload.code,
                message: payload.message.to_string(),
                data: payload.as_revert_data(),
            },
            RpcError::Transport(kind) => ProviderError::Transport(kind.to_string()),
            RpcError::NullResp => ProviderError::Transport("node returned a null response".into()),
            RpcError::LocalUsageError(e) => ProviderError::Wallet(e.to_string()),
            other => ProviderError::Other(other.to_string()),
        }
    }
}
