//! # Transaction Orchestrator
//!
//! Composes the engine into one awaitable call per intent:
//!
//! ```text
//! estimate -> submit -> monitor -> { verify | analyze } -> TransactionOutcome
//! ```
//!
//! `run` never errors. Every exit path, including a deterministic revert during estimation or a
//! duplicate correlation id, is folded into exactly one [`TransactionOutcome`]. The status
//! callback mirrors progress and is never the only way to learn the result.

use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

use crate::analyzer::FailureAnalyzer;
use crate::classifier::{classify, ClassifiedError, ClassifyContext, ErrorKind};
use crate::config::EngineConfig;
use crate::gas::GasEstimator;
use crate::monitor::{ConfirmationMonitor, MonitorError, MonitorResolution};
use crate::provider::ChainProvider;
use crate::status::{StatusReporter, TxStatus};
use crate::submitter::TransactionSubmitter;
use crate::types::{
    ReadCall, TransactionDetails, TransactionHandle, TransactionIntent, TransactionOutcome,
    TxReceipt,
};
use crate::verifier::StateVerifier;

type Expectation = Arc<dyn Fn(&Bytes) -> bool + Send + Sync>;

/// Read-only query plus the predicate its result must satisfy once the write is confirmed.
#[derive(Clone)]
pub struct StateCheck {
    pub query: ReadCall,
    expectation: Expectation,
}

impl StateCheck {
    pub fn new<F>(query: ReadCall, expectation: F) -> Self
    where
        F: Fn(&Bytes) -> bool + Send + Sync + 'static,
    {
        Self {
            query,
            expectation: Arc::new(expectation),
        }
    }

    /// Check built from a `sol!` call; the result is decoded with the call's return type.
    /// An undecodable result does not match.
    pub fn for_call<C, F>(to: Address, call: &C, expectation: F) -> Self
    where
        C: SolCall + 'static,
        F: Fn(&C::Return) -> bool + Send + Sync + 'static,
    {
        Self::new(ReadCall::from_call(to, call), move |raw: &Bytes| {
            C::abi_decode_returns(raw)
                .map(|decoded| expectation(&decoded))
                .unwrap_or(false)
        })
    }

    pub fn matches(&self, raw: &Bytes) -> bool {
        (self.expectation)(raw)
    }
}

impl fmt::Debug for StateCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateCheck")
            .field("query", &self.query)
            .finish_non_exhaustive()
    }
}

/// Registry entry for an intent that has not resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InFlight {
    /// Estimating gas or waiting for the node to accept the transaction.
    Preparing,
    Submitted(TransactionHandle),
}

#[derive(Debug, Default)]
struct InFlightRegistry {
    entries: Mutex<HashMap<String, InFlight>>,
}

impl InFlightRegistry {
    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, InFlight>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `None` when `correlation_id` is already in flight.
    fn claim(&self, correlation_id: &str) -> Option<InFlightGuard<'_>> {
        let mut entries = self.lock();
        if entries.contains_key(correlation_id) {
            return None;
        }
        entries.insert(correlation_id.to_string(), InFlight::Preparing);
        Some(InFlightGuard {
            registry: self,
            correlation_id: correlation_id.to_string(),
        })
    }

    fn get(&self, correlation_id: &str) -> Option<InFlight> {
        self.lock().get(correlation_id).cloned()
    }

    fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Removes its registry entry when dropped, whichever way the run ends.
struct InFlightGuard<'a> {
    registry: &'a InFlightRegistry,
    correlation_id: String,
}

impl InFlightGuard<'_> {
    fn record(&self, handle: &TransactionHandle) {
        self.registry
            .lock()
            .insert(self.correlation_id.clone(), InFlight::Submitted(handle.clone()));
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.correlation_id);
    }
}

pub struct TransactionOrchestrator<P> {
    provider: Arc<P>,
    estimator: GasEstimator<P>,
    submitter: TransactionSubmitter<P>,
    monitor: ConfirmationMonitor<P>,
    verifier: StateVerifier<P>,
    analyzer: FailureAnalyzer,
    in_flight: InFlightRegistry,
}

impl<P: ChainProvider> TransactionOrchestrator<P> {
    pub fn new(provider: Arc<P>, config: EngineConfig) -> Self {
        Self {
            estimator: GasEstimator::new(provider.clone(), config.gas),
            submitter: TransactionSubmitter::new(provider.clone(), config.submit)
                .with_escalation_percent(config.gas.escalation_percent),
            monitor: ConfirmationMonitor::new(provider.clone(), config.monitor),
            verifier: StateVerifier::new(provider.clone(), config.verify),
            analyzer: FailureAnalyzer::default(),
            in_flight: InFlightRegistry::default(),
            provider,
        }
    }

    /// Contract interface used to decode input and logs of failed transactions.
    pub fn with_interface(mut self, interface: Arc<JsonAbi>) -> Self {
        self.analyzer = FailureAnalyzer::new(Some(interface));
        self
    }

    /// Execute `intent` to a terminal outcome.
    ///
    /// `on_status` receives `Pending` once the transaction is accepted by the node, then one
    /// terminal status. Pass [`ignore_status`](crate::status::ignore_status) when progress is
    /// not needed.
    pub async fn run<F>(&self, intent: TransactionIntent, on_status: F) -> TransactionOutcome
    where
        F: Fn(TxStatus) + Send + Sync,
    {
        self.execute(intent, None, &on_status).await
    }

    /// Like [`run`](Self::run), then re-read state with `check` after confirmation.
    /// The result lands in `Confirmed::verified`; a failed check does not change the outcome.
    pub async fn run_verified<F>(
        &self,
        intent: TransactionIntent,
        check: StateCheck,
        on_status: F,
    ) -> TransactionOutcome
    where
        F: Fn(TxStatus) + Send + Sync,
    {
        self.execute(intent, Some(&check), &on_status).await
    }

    /// Registry entry for `correlation_id`, if an intent with that id is running.
    pub fn in_flight(&self, correlation_id: &str) -> Option<InFlight> {
        self.in_flight.get(correlation_id)
    }

    pub fn is_in_flight(&self, correlation_id: &str) -> bool {
        self.in_flight(correlation_id).is_some()
    }

    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    async fn execute(
        &self,
        intent: TransactionIntent,
        check: Option<&StateCheck>,
        on_status: &(dyn Fn(TxStatus) + Send + Sync),
    ) -> TransactionOutcome {
        let reporter = StatusReporter::new(on_status);
        let intent = Arc::new(intent);

        let outcome = match self.in_flight.claim(intent.correlation_id()) {
            Some(guard) => self.drive(&intent, check, &guard, &reporter).await,
            None => {
                warn!(
                    correlation_id = intent.correlation_id(),
                    "Intent already in flight, rejecting duplicate"
                );
                TransactionOutcome::RejectedLocally(ClassifiedError::new(
                    ErrorKind::DuplicateInFlight,
                    format!("intent {} is already in flight", intent.correlation_id()),
                ))
            }
        };

        reporter.report(outcome.status());
        debug!(
            correlation_id = intent.correlation_id(),
            status = %outcome.status(),
            tx_hash = ?outcome.tx_hash(),
            "Intent resolved"
        );
        outcome
    }

    async fn drive(
        &self,
        intent: &Arc<TransactionIntent>,
        check: Option<&StateCheck>,
        guard: &InFlightGuard<'_>,
        reporter: &StatusReporter<'_>,
    ) -> TransactionOutcome {
        let plan = match self.estimator.estimate(intent).await {
            Ok(plan) => plan,
            Err(e) => return TransactionOutcome::RejectedLocally(e),
        };

        let handle = match self.submitter.submit(intent, plan).await {
            Ok(handle) => handle,
            Err(e) => return TransactionOutcome::RejectedLocally(e),
        };
        guard.record(&handle);

        match self.monitor.await_receipt(&handle, reporter).await {
            Ok(MonitorResolution::Confirmed(receipt)) => {
                log_gas_summary(&handle, &receipt);
                let verified = match check {
                    Some(check) => Some(
                        self.verifier
                            .verify(&check.query, |raw| check.matches(raw))
                            .await,
                    ),
                    None => None,
                };
                TransactionOutcome::Confirmed { receipt, verified }
            }
            Ok(MonitorResolution::Failed(receipt)) => {
                let tx = self.transaction_details(&handle).await;
                let diagnostics = self.analyzer.analyze(&receipt, &tx);
                warn!(
                    correlation_id = intent.correlation_id(),
                    tx_hash = ?handle.hash,
                    gas_used = diagnostics.gas_used,
                    gas_limit = diagnostics.gas_limit,
                    issues = ?diagnostics.suspected_issues,
                    "Transaction reverted on-chain"
                );
                TransactionOutcome::RevertedOnChain {
                    receipt,
                    diagnostics,
                }
            }
            Err(MonitorError::Timeout {
                waited, last_error, ..
            }) => {
                if let Some(e) = &last_error {
                    let context = ClassifyContext::new(
                        "get_transaction_receipt",
                        Some(intent.correlation_id()),
                    );
                    let classified = classify(e, &context);
                    warn!(
                        correlation_id = intent.correlation_id(),
                        tx_hash = ?handle.hash,
                        kind = classified.kind.name(),
                        "Timed out while the node was failing reads"
                    );
                }
                TransactionOutcome::TimedOut { handle, waited }
            }
        }
    }

    /// The mined transaction as the node reports it, or a reconstruction from the handle.
    async fn transaction_details(&self, handle: &TransactionHandle) -> TransactionDetails {
        match self.provider.get_transaction(handle.hash).await {
            Ok(Some(details)) => details,
            Ok(None) => reconstruct_details(handle),
            Err(e) => {
                debug!(
                    tx_hash = ?handle.hash,
                    error = %e,
                    "Could not fetch transaction, using submitted values"
                );
                reconstruct_details(handle)
            }
        }
    }
}

fn reconstruct_details(handle: &TransactionHandle) -> TransactionDetails {
    TransactionDetails {
        hash: handle.hash,
        to: Some(handle.intent.to()),
        gas_limit: handle.gas_plan.ceiling,
        input: handle.intent.calldata().clone(),
    }
}

fn log_gas_summary(handle: &TransactionHandle, receipt: &TxReceipt) {
    let plan = &handle.gas_plan;
    info!(
        correlation_id = handle.intent.correlation_id(),
        tx_hash = ?handle.hash,
        block_number = receipt.block_number,
        estimated = ?plan.estimated,
        buffer = plan.buffer_multiplier(),
        gas_ceiling = plan.ceiling,
        gas_used = receipt.gas_used,
        attempts = plan.attempt,
        source = ?plan.source,
        "Gas summary"
    );
}
