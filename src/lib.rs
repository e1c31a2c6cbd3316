//! Transaction execution and confirmation engine for savings-circle and time-lock contracts.
//!
//! [`TransactionOrchestrator::run`] takes a [`TransactionIntent`] through gas estimation,
//! submission, confirmation polling and optional state verification, and always resolves to one
//! [`TransactionOutcome`]. The chain is reached only through [`ChainProvider`].

pub mod analyzer;
pub mod classifier;
pub mod config;
pub mod gas;
pub mod monitor;
pub mod orchestrator;
pub mod provider;
pub mod retry;
pub mod status;
pub mod submitter;
pub mod types;
pub mod verifier;

#[cfg(test)]
mod mock;

pub use analyzer::{Diagnostics, FailureAnalyzer, SuspectedIssue};
pub use classifier::{classify, ClassifiedError, ClassifyContext, ErrorKind};
pub use config::{load_config_from_path, EngineConfig};
pub use gas::GasEstimator;
pub use monitor::{ConfirmationMonitor, MonitorError, MonitorResolution};
pub use orchestrator::{InFlight, StateCheck, TransactionOrchestrator};
pub use provider::{AlloyChainProvider, ChainProvider, ProviderError};
pub use status::{ignore_status, StatusReporter, TxStatus};
pub use submitter::TransactionSubmitter;
pub use types::{
    GasPlan, GasPlanSource, ReadCall, TransactionDetails, TransactionHandle, TransactionIntent,
    TransactionOutcome, TxReceipt,
};
pub use verifier::StateVerifier;
