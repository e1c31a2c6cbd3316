//! Receipt polling with confirmation depth and an overall timeout.
//!
//! States move `Pending -> Mined -> Confirmed`, `Pending -> Mined(status 0) -> Failed` or
//! `Pending -> TimedOut`. The returned result is authoritative; the status callback only mirrors
//! the transitions for progress display.

use alloy::primitives::B256;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, info, warn};

use crate::config::MonitorConfig;
use crate::provider::{ChainProvider, ProviderError};
use crate::status::{StatusReporter, TxStatus};
use crate::types::{TransactionHandle, TxReceipt};

/// Where a monitored transaction currently stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Pending,
    /// Receipt with status 1 seen, confirmation depth not reached yet.
    Mined { block_number: u64 },
    Confirmed,
    Failed,
    TimedOut,
}

/// How a monitored transaction resolved on-chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MonitorResolution {
    Confirmed(TxReceipt),
    /// Mined with status 0. Analysis is left to the caller.
    Failed(TxReceipt),
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum MonitorError {
    /// No resolution before the deadline. The transaction may still confirm later.
    #[error("no confirmed receipt for {hash} after {waited:?}")]
    Timeout {
        hash: B256,
        waited: Duration,
        /// Most recent read error, if polling was failing when the deadline hit.
        last_error: Option<ProviderError>,
    },
}

pub struct ConfirmationMonitor<P> {
    provider: Arc<P>,
    config: MonitorConfig,
}

impl<P: ChainProvider> ConfirmationMonitor<P> {
    pub fn new(provider: Arc<P>, config: MonitorConfig) -> Self {
        Self { provider, config }
    }

    /// Wait for `handle` using the configured timeout.
    pub async fn await_receipt(
        &self,
        handle: &TransactionHandle,
        reporter: &StatusReporter<'_>,
    ) -> Result<MonitorResolution, MonitorError> {
        self.await_receipt_with_timeout(handle, reporter, self.config.timeout())
            .await
    }

    /// Poll until the transaction confirms, fails on-chain, or `timeout` elapses.
    ///
    /// Read errors never end monitoring: the transaction is already on its way, so a rate limit
    /// or a lagging node is polled through and only the timeout ends a monitor stuck on a flaky
    /// node.
    pub async fn await_receipt_with_timeout(
        &self,
        handle: &TransactionHandle,
        reporter: &StatusReporter<'_>,
        timeout: Duration,
    ) -> Result<MonitorResolution, MonitorError> {
        let hash = handle.hash;
        let start = Instant::now();
        let deadline = start + timeout;
        let mut state = MonitorState::Pending;
        let mut polls = 0u32;
        let mut last_error = None;

        reporter.report(TxStatus::Pending);
        debug!(tx_hash = ?hash, timeout_ms = timeout.as_millis() as u64, "Monitoring transaction");

        loop {
            if Instant::now() >= deadline {
                break;
            }
            polls += 1;

            match timeout_at(deadline, self.poll_once(hash, &mut state)).await {
                Err(_) => break,
                Ok(Ok(Some(resolution))) => {
                    let status = match &resolution {
                        MonitorResolution::Confirmed(receipt) => {
                            info!(
                                tx_hash = ?hash,
                                block_number = receipt.block_number,
                                gas_used = receipt.gas_used,
                                polls,
                                "Transaction confirmed"
                            );
                            TxStatus::Confirmed
                        }
                        MonitorResolution::Failed(receipt) => {
                            warn!(
                                tx_hash = ?hash,
                                block_number = receipt.block_number,
                                gas_used = receipt.gas_used,
                                polls,
                                "Transaction reverted on-chain"
                            );
                            TxStatus::Failed
                        }
                    };
                    reporter.report(status);
                    return Ok(resolution);
                }
                Ok(Ok(None)) => last_error = None,
                Ok(Err(e)) => {
                    if e.is_transient() {
                        debug!(tx_hash = ?hash, error = %e, "Network error while polling, continuing");
                    } else {
                        warn!(tx_hash = ?hash, error = %e, "RPC error while polling, continuing");
                    }
                    last_error = Some(e);
                }
            }

            let interval = self.config.poll_interval(start.elapsed());
            sleep_until((Instant::now() + interval).min(deadline)).await;
        }

        let waited = start.elapsed();
        state = MonitorState::TimedOut;
        warn!(
            tx_hash = ?hash,
            waited_ms = waited.as_millis() as u64,
            polls,
            ?state,
            last_error = ?last_error,
            "Gave up waiting for confirmation"
        );
        reporter.report(TxStatus::Timeout);
        Err(MonitorError::Timeout {
            hash,
            waited,
            last_error,
        })
    }

    /// One receipt check. `Ok(None)` means keep polling.
    async fn poll_once(
        &self,
        hash: B256,
        state: &mut MonitorState,
    ) -> Result<Option<MonitorResolution>, ProviderError> {
        let Some(receipt) = self.provider.get_transaction_receipt(hash).await? else {
            if let MonitorState::Mined { block_number } = *state {
                warn!(tx_hash = ?hash, block_number, "Receipt disappeared, possible reorg");
                *state = MonitorState::Pending;
            }
            return Ok(None);
        };

        if !receipt.status {
            *state = MonitorState::Failed;
            return Ok(Some(MonitorResolution::Failed(receipt)));
        }

        if *state != (MonitorState::Mined { block_number: receipt.block_number }) {
            debug!(tx_hash = ?hash, block_number = receipt.block_number, "Transaction mined");
            *state = MonitorState::Mined {
                block_number: receipt.block_number,
            };
        }

        let latest = self.provider.get_block_number().await?;
        let required = receipt
            .block_number
            .saturating_add(self.config.confirmation_depth);
        if latest >= required {
            *state = MonitorState::Confirmed;
            return Ok(Some(MonitorResolution::Confirmed(receipt)));
        }

        debug!(
            tx_hash = ?hash,
            block_number = receipt.block_number,
            latest,
            required,
            "Waiting for confirmation depth"
        );
        Ok(None)
    }
}
