use alloy::primitives::{Address, Bytes, Log, B256, U256};
use alloy::sol_types::SolCall;
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::analyzer::Diagnostics;
use crate::classifier::ClassifiedError;
use crate::status::TxStatus;

/// Caller's description of one on-chain write, prior to submission.
///
/// Fields are private so an intent cannot change once it has been handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionIntent {
    to: Address,
    function: String,
    calldata: Bytes,
    value: U256,
    gas_limit: Option<u64>,
    correlation_id: String,
}

impl TransactionIntent {
    /// Create an intent from already-encoded calldata.
    ///
    /// # Arguments
    /// * `to` - Target contract address
    /// * `function` - Function name or signature, used for logs and diagnostics
    /// * `calldata` - ABI-encoded call input, selector included
    /// * `correlation_id` - Stable id of the business operation, e.g. "contribute week 3 to circle 0xabc"
    pub fn new(
        to: Address,
        function: impl Into<String>,
        calldata: impl Into<Bytes>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            to,
            function: function.into(),
            calldata: calldata.into(),
            value: U256::ZERO,
            gas_limit: None,
            correlation_id: correlation_id.into(),
        }
    }

    /// Create an intent from a `sol!`-generated call.
    pub fn from_call<C: SolCall>(to: Address, call: &C, correlation_id: impl Into<String>) -> Self {
        Self::new(to, C::SIGNATURE, call.abi_encode(), correlation_id)
    }

    /// Use a fixed gas limit instead of estimating.
    pub fn with_gas_limit(mut self, gas_limit: u64) -> Self {
        self.gas_limit = Some(gas_limit);
        self
    }

    /// Attach native value to the call.
    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }

    pub fn to(&self) -> Address {
        self.to
    }

    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn calldata(&self) -> &Bytes {
        &self.calldata
    }

    pub fn value(&self) -> U256 {
        self.value
    }

    pub fn gas_limit(&self) -> Option<u64> {
        self.gas_limit
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

/// Where the initial gas ceiling of a plan came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GasPlanSource {
    Estimated,
    Fallback,
    Override,
}

/// Working gas values for one submission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GasPlan {
    /// Raw units reported by the node, if estimation succeeded.
    pub estimated: Option<u64>,
    /// Buffer applied to `estimated`, in percent.
    pub buffer_percent: u64,
    /// Gas limit sent with the attempt.
    pub ceiling: u64,
    /// 1-based attempt this ceiling is meant for.
    pub attempt: u32,
    pub source: GasPlanSource,
}

impl GasPlan {
    pub fn estimated(units: u64, buffer_percent: u64) -> Self {
        Self {
            estimated: Some(units),
            buffer_percent,
            ceiling: apply_percent(units, buffer_percent),
            attempt: 1,
            source: GasPlanSource::Estimated,
        }
    }

    pub fn fallback(ceiling: u64) -> Self {
        Self {
            estimated: None,
            buffer_percent: 100,
            ceiling,
            attempt: 1,
            source: GasPlanSource::Fallback,
        }
    }

    pub fn with_override(gas_limit: u64) -> Self {
        Self {
            estimated: None,
            buffer_percent: 100,
            ceiling: gas_limit,
            attempt: 1,
            source: GasPlanSource::Override,
        }
    }

    pub fn buffer_multiplier(&self) -> f64 {
        self.buffer_percent as f64 / 100.0
    }

    /// Plan for the next attempt with the ceiling raised by `percent`.
    pub fn escalated(&self, percent: u64) -> Self {
        Self {
            ceiling: apply_percent(self.ceiling, percent),
            attempt: self.attempt.saturating_add(1),
            ..*self
        }
    }

    /// Plan for the given 1-based attempt, escalating once per attempt after the first.
    pub fn for_attempt(&self, attempt: u32, percent: u64) -> Self {
        let mut plan = *self;
        while plan.attempt < attempt {
            plan = plan.escalated(percent);
        }
        plan
    }
}

/// `ceil(value * percent / 100)`, saturating at `u64::MAX`.
pub(crate) fn apply_percent(value: u64, percent: u64) -> u64 {
    let scaled = (value as u128 * percent as u128).div_ceil(100);
    u64::try_from(scaled).unwrap_or(u64::MAX)
}

/// A transaction accepted by the node but not resolved yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionHandle {
    pub hash: B256,
    pub submitted_at: SystemTime,
    pub intent: Arc<TransactionIntent>,
    /// Plan of the attempt that was accepted.
    pub gas_plan: GasPlan,
}

impl TransactionHandle {
    pub fn new(hash: B256, intent: Arc<TransactionIntent>, gas_plan: GasPlan) -> Self {
        Self {
            hash,
            submitted_at: SystemTime::now(),
            intent,
            gas_plan,
        }
    }
}

/// The node's record of a mined transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: B256,
    pub block_number: u64,
    /// `true` for status 1, `false` for a revert.
    pub status: bool,
    pub gas_used: u64,
    pub logs: Vec<Log>,
}

/// The submitted transaction as reported back by the node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionDetails {
    pub hash: B256,
    pub to: Option<Address>,
    pub gas_limit: u64,
    pub input: Bytes,
}

/// Read-only contract call used for state verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadCall {
    pub to: Address,
    pub data: Bytes,
}

impl ReadCall {
    pub fn new(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            data: data.into(),
        }
    }

    pub fn from_call<C: SolCall>(to: Address, call: &C) -> Self {
        Self::new(to, call.abi_encode())
    }
}

/// Terminal result of one intent. Exactly one is produced per `run`.
#[derive(Debug, Clone)]
pub enum TransactionOutcome {
    /// Mined with status 1 and buried under the required confirmation depth.
    /// `verified` is `None` when no state check was requested.
    Confirmed {
        receipt: TxReceipt,
        verified: Option<bool>,
    },
    /// Mined with status 0.
    RevertedOnChain {
        receipt: TxReceipt,
        diagnostics: Diagnostics,
    },
    /// Submitted, but no receipt within the budget. It may still confirm later.
    TimedOut {
        handle: TransactionHandle,
        waited: Duration,
    },
    /// Never made it on-chain.
    RejectedLocally(ClassifiedError),
}

impl TransactionOutcome {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TransactionOutcome::Confirmed { .. })
    }

    pub fn tx_hash(&self) -> Option<B256> {
        match self {
            TransactionOutcome::Confirmed { receipt, .. }
            | TransactionOutcome::RevertedOnChain { receipt, .. } => {
                Some(receipt.transaction_hash)
            }
            TransactionOutcome::TimedOut { handle, .. } => Some(handle.hash),
            TransactionOutcome::RejectedLocally(_) => None,
        }
    }

    /// Terminal status token matching this outcome.
    pub fn status(&self) -> TxStatus {
        match self {
            TransactionOutcome::Confirmed { .. } => TxStatus::Confirmed,
            TransactionOutcome::TimedOut { .. } => TxStatus::Timeout,
            TransactionOutcome::RevertedOnChain { .. } | TransactionOutcome::RejectedLocally(_) => {
                TxStatus::Failed
            }
        }
    }

    /// One end-user message. Diagnostics are deliberately left out.
    pub fn user_message(&self) -> String {
        match self {
            TransactionOutcome::Confirmed { .. } => "Transaction confirmed.".to_string(),
            TransactionOutcome::RevertedOnChain { .. } => {
                "The transaction failed on-chain and was rolled back.".to_string()
            }
            TransactionOutcome::TimedOut { .. } => {
                "The transaction is still pending. It may confirm later, check back before retrying."
                    .to_string()
            }
            TransactionOutcome::RejectedLocally(error) => error.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimated_plan_applies_buffer() {
        let plan = GasPlan::estimated(21_000, 130);
        assert_eq!(plan.ceiling, 27_300);
        assert_eq!(plan.attempt, 1);
        assert_eq!(plan.buffer_multiplier(), 1.3);
        assert_eq!(plan.source, GasPlanSource::Estimated);
    }

    #[test]
    fn test_buffer_rounds_up() {
        // 1001 * 1.3 = 1301.3
        assert_eq!(GasPlan::estimated(1_001, 130).ceiling, 1_302);
    }

    #[test]
    fn test_escalation_is_exactly_one_point_two() {
        let plan = GasPlan::fallback(3_000_000);
        let next = plan.escalated(120);
        assert_eq!(next.ceiling, 3_600_000);
        assert_eq!(next.attempt, 2);
        assert_eq!(plan.for_attempt(3, 120).ceiling, 4_320_000);
        assert_eq!(plan.for_attempt(1, 120), plan);
    }

    #[test]
    fn test_apply_percent_saturates() {
        assert_eq!(apply_percent(u64::MAX, 200), u64::MAX);
    }

    #[test]
    fn test_intent_builders() {
        let intent = TransactionIntent::new(Address::ZERO, "contribute", vec![1u8, 2, 3], "c-1")
            .with_gas_limit(50_000)
            .with_value(U256::from(7));
        assert_eq!(intent.gas_limit(), Some(50_000));
        assert_eq!(intent.value(), U256::from(7));
        assert_eq!(intent.calldata().as_ref(), &[1u8, 2, 3]);
        assert_eq!(intent.correlation_id(), "c-1");
    }
}
