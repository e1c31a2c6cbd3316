//! Post-mortem of a transaction that was mined with status 0.
//!
//! Everything here is pure: the analyzer only looks at the receipt, the transaction as the node
//! reported it, and an optional contract interface. Decoding failures leave the corresponding
//! fields empty instead of erroring.

use alloy::dyn_abi::{DynSolValue, EventExt, JsonAbiExt};
use alloy::hex;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, Log, B256};
use serde::Serialize;
use std::sync::Arc;

use crate::config::consts::OUT_OF_GAS_UTILIZATION;
use crate::types::{TransactionDetails, TxReceipt};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SuspectedIssue {
    OutOfGas,
    /// Reverted without emitting anything.
    SilentRevert,
    /// Logs were emitted before the revert; an intermediate call may have moved funds.
    RevertedWithLogs,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedParam {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedCall {
    pub function_name: String,
    pub params: Vec<DecodedParam>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DecodedLog {
    pub address: Address,
    pub event_name: String,
    pub params: Vec<DecodedParam>,
}

/// Developer-facing report attached to [`TransactionOutcome::RevertedOnChain`].
///
/// [`TransactionOutcome::RevertedOnChain`]: crate::types::TransactionOutcome::RevertedOnChain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnostics {
    pub tx_hash: B256,
    pub gas_used: u64,
    pub gas_limit: u64,
    /// `gas_used / gas_limit`, 0 when the limit is unknown.
    pub gas_utilization: f64,
    pub decoded_input: Option<DecodedCall>,
    /// Logs the interface could decode. Undecodable logs are only counted.
    pub decoded_logs: Vec<DecodedLog>,
    pub log_count: usize,
    pub suspected_issues: Vec<SuspectedIssue>,
}

impl Diagnostics {
    pub fn has_issue(&self, issue: SuspectedIssue) -> bool {
        self.suspected_issues.contains(&issue)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Holds the optional contract interface shared by every analysis.
#[derive(Debug, Clone, Default)]
pub struct FailureAnalyzer {
    interface: Option<Arc<JsonAbi>>,
}

impl FailureAnalyzer {
    pub fn new(interface: Option<Arc<JsonAbi>>) -> Self {
        Self { interface }
    }

    pub fn interface(&self) -> Option<&JsonAbi> {
        self.interface.as_deref()
    }

    pub fn analyze(&self, receipt: &TxReceipt, tx: &TransactionDetails) -> Diagnostics {
        analyze(receipt, tx, self.interface())
    }
}

/// Build diagnostics for a failed receipt.
pub fn analyze(
    receipt: &TxReceipt,
    tx: &TransactionDetails,
    interface: Option<&JsonAbi>,
) -> Diagnostics {
    let gas_utilization = if tx.gas_limit == 0 {
        0.0
    } else {
        receipt.gas_used as f64 / tx.gas_limit as f64
    };

    let mut suspected_issues = Vec::new();
    if gas_utilization >= OUT_OF_GAS_UTILIZATION {
        suspected_issues.push(SuspectedIssue::OutOfGas);
    }
    if receipt.logs.is_empty() {
        suspected_issues.push(SuspectedIssue::SilentRevert);
    } else {
        suspected_issues.push(SuspectedIssue::RevertedWithLogs);
    }

    let (decoded_input, decoded_logs) = match interface {
        Some(abi) => (
            decode_input(abi, &tx.input),
            receipt
                .logs
                .iter()
                .filter_map(|log| decode_log(abi, log))
                .collect(),
        ),
        None => (None, Vec::new()),
    };

    Diagnostics {
        tx_hash: receipt.transaction_hash,
        gas_used: receipt.gas_used,
        gas_limit: tx.gas_limit,
        gas_utilization,
        decoded_input,
        decoded_logs,
        log_count: receipt.logs.len(),
        suspected_issues,
    }
}

/// Decode call input (selector included) against any function of `abi`.
pub fn decode_input(abi: &JsonAbi, input: &[u8]) -> Option<DecodedCall> {
    let (selector, args) = input.split_first_chunk::<4>()?;
    let function = abi.functions().find(|f| f.selector().0 == *selector)?;
    let values = function.abi_decode_input(args).ok()?;

    let params = function
        .inputs
        .iter()
        .zip(values.iter())
        .enumerate()
        .map(|(i, (param, value))| DecodedParam {
            name: param_name(&param.name, i),
            value: format_value(value),
        })
        .collect();

    Some(DecodedCall {
        function_name: function.name.clone(),
        params,
    })
}

/// Decode a log against the non-anonymous events of `abi`, matched by topic 0.
pub fn decode_log(abi: &JsonAbi, log: &Log) -> Option<DecodedLog> {
    let topic0 = log.data.topics().first()?;
    let event = abi
        .events()
        .find(|e| !e.anonymous && e.selector() == *topic0)?;
    let decoded = event.decode_log(&log.data).ok()?;

    let mut indexed = decoded.indexed.iter();
    let mut body = decoded.body.iter();
    let params = event
        .inputs
        .iter()
        .enumerate()
        .filter_map(|(i, input)| {
            let value = if input.indexed {
                indexed.next()
            } else {
                body.next()
            }?;
            Some(DecodedParam {
                name: param_name(&input.name, i),
                value: format_value(value),
            })
        })
        .collect();

    Some(DecodedLog {
        address: log.address,
        event_name: event.name.clone(),
        params,
    })
}

fn param_name(name: &str, index: usize) -> String {
    if name.is_empty() {
        format!("arg{index}")
    } else {
        name.to_string()
    }
}

/// Render a decoded value for humans: decimal integers, checksummed addresses, 0x-hex bytes.
pub fn format_value(value: &DynSolValue) -> String {
    match value {
        DynSolValue::Bool(b) => b.to_string(),
        DynSolValue::Int(i, _) => i.to_string(),
        DynSolValue::Uint(u, _) => u.to_string(),
        DynSolValue::Address(a) => a.to_checksum(None),
        DynSolValue::FixedBytes(word, size) => hex::encode_prefixed(&word[..(*size).min(32)]),
        DynSolValue::Bytes(bytes) => hex::encode_prefixed(bytes),
        DynSolValue::String(s) => s.clone(),
        DynSolValue::Array(items) | DynSolValue::FixedArray(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("[{}]", inner.join(", "))
        }
        DynSolValue::Tuple(items) => {
            let inner: Vec<String> = items.iter().map(format_value).collect();
            format!("({})", inner.join(", "))
        }
        other => format!("{other:?}"),
    }
}
