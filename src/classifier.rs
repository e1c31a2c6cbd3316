//! # Error Classifier
//!
//! Maps any provider error onto the closed [`ErrorKind`] taxonomy plus one user-facing message.
//!
//! Classification is a pure function evaluated in this order:
//! 1. transport failures are `NetworkTransient`
//! 2. structured revert data: known custom-error selectors, then `Error(string)` / `Panic(uint256)`
//! 3. the ordered [`MESSAGE_RULES`] table, first match wins
//! 4. anything else is `Unknown`

use alloy::primitives::Bytes;
use alloy::sol;
use alloy::sol_types::{decode_revert_reason, Revert, SolError};
use serde::Serialize;
use tracing::debug;

use crate::config::consts::{ERROR_STRING_SELECTOR, PANIC_SELECTOR};
use crate::provider::ProviderError;

sol! {
    // OpenZeppelin v5 ERC-20
    error ERC20InsufficientAllowance(address spender, uint256 allowance, uint256 needed);
    error ERC20InsufficientBalance(address sender, uint256 balance, uint256 needed);

    // OpenZeppelin access / security
    error OwnableUnauthorizedAccount(address account);
    error ReentrancyGuardReentrantCall();

    // Savings circles and time locks
    error NotCircleMember(address account);
    error AlreadyContributed(uint256 circleId, uint256 week);
    error ContributionWindowClosed(uint256 circleId);
    error CircleFull(uint256 circleId);
    error LockNotMatured(uint256 unlockTime);
    error LockNotFound(uint256 lockId);
}

/// Custom error selector with the rejection reason shown to users.
#[derive(Debug, Clone, Copy)]
pub struct KnownRevert {
    pub selector: [u8; 4],
    pub signature: &'static str,
    pub reason: &'static str,
}

pub const KNOWN_REVERTS: &[KnownRevert] = &[
    KnownRevert {
        selector: ERC20InsufficientAllowance::SELECTOR,
        signature: ERC20InsufficientAllowance::SIGNATURE,
        reason: "token allowance is too low",
    },
    KnownRevert {
        selector: ERC20InsufficientBalance::SELECTOR,
        signature: ERC20InsufficientBalance::SIGNATURE,
        reason: "token balance is too low",
    },
    KnownRevert {
        selector: OwnableUnauthorizedAccount::SELECTOR,
        signature: OwnableUnauthorizedAccount::SIGNATURE,
        reason: "caller is not the owner",
    },
    KnownRevert {
        selector: ReentrancyGuardReentrantCall::SELECTOR,
        signature: ReentrancyGuardReentrantCall::SIGNATURE,
        reason: "reentrant call",
    },
    KnownRevert {
        selector: NotCircleMember::SELECTOR,
        signature: NotCircleMember::SIGNATURE,
        reason: "you are not a member of this circle",
    },
    KnownRevert {
        selector: AlreadyContributed::SELECTOR,
        signature: AlreadyContributed::SIGNATURE,
        reason: "contribution for this week was already made",
    },
    KnownRevert {
        selector: ContributionWindowClosed::SELECTOR,
        signature: ContributionWindowClosed::SIGNATURE,
        reason: "the contribution window is closed",
    },
    KnownRevert {
        selector: CircleFull::SELECTOR,
        signature: CircleFull::SIGNATURE,
        reason: "the circle is full",
    },
    KnownRevert {
        selector: LockNotMatured::SELECTOR,
        signature: LockNotMatured::SIGNATURE,
        reason: "the lock has not matured yet",
    },
    KnownRevert {
        selector: LockNotFound::SELECTOR,
        signature: LockNotFound::SIGNATURE,
        reason: "the lock does not exist",
    },
];

/// Closed error taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ErrorKind {
    UserCancelled,
    /// Not enough native balance to pay for gas.
    InsufficientGas,
    InsufficientBalance,
    StaleNonce,
    DuplicateInFlight,
    NotAuthorized,
    AlreadyDone,
    OnChainRejection(String),
    GenericOnChainRejection,
    NetworkTransient,
    Unknown(String),
}

impl ErrorKind {
    pub fn name(&self) -> &'static str {
        match self {
            ErrorKind::UserCancelled => "UserCancelled",
            ErrorKind::InsufficientGas => "InsufficientGas",
            ErrorKind::InsufficientBalance => "InsufficientBalance",
            ErrorKind::StaleNonce => "StaleNonce",
            ErrorKind::DuplicateInFlight => "DuplicateInFlight",
            ErrorKind::NotAuthorized => "NotAuthorized",
            ErrorKind::AlreadyDone => "AlreadyDone",
            ErrorKind::OnChainRejection(_) => "OnChainRejection",
            ErrorKind::GenericOnChainRejection => "GenericOnChainRejection",
            ErrorKind::NetworkTransient => "NetworkTransient",
            ErrorKind::Unknown(_) => "Unknown",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            ErrorKind::UserCancelled => "Transaction was cancelled in your wallet.".to_string(),
            ErrorKind::InsufficientGas => {
                "Not enough funds to pay the network fee. Top up your wallet and try again."
                    .to_string()
            }
            ErrorKind::InsufficientBalance => {
                "Insufficient balance or allowance for this operation.".to_string()
            }
            ErrorKind::StaleNonce => {
                "Your wallet is out of sync with the network. Reload and try again.".to_string()
            }
            ErrorKind::DuplicateInFlight => {
                "A similar transaction is already pending. Wait for it to complete.".to_string()
            }
            ErrorKind::NotAuthorized => "You are not allowed to perform this action.".to_string(),
            ErrorKind::AlreadyDone => "This action has already been completed.".to_string(),
            ErrorKind::OnChainRejection(reason) => {
                format!("The contract rejected the transaction: {reason}.")
            }
            ErrorKind::GenericOnChainRejection => {
                "The contract rejected the transaction.".to_string()
            }
            ErrorKind::NetworkTransient => {
                "Network problem while contacting the blockchain. Please try again.".to_string()
            }
            ErrorKind::Unknown(message) => format!("Transaction failed: {message}"),
        }
    }
}

/// Classification result: taxonomy kind, user message, and the raw error text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
    pub raw: String,
}

/// Submission failures caused by a too-low gas limit. Retrying with a higher ceiling helps.
const GAS_SHORTFALL_MARKERS: &[&str] = &["intrinsic gas too low", "gas too low", "out of gas"];

impl ClassifiedError {
    pub fn new(kind: ErrorKind, raw: impl Into<String>) -> Self {
        Self {
            message: kind.user_message(),
            kind,
            raw: raw.into(),
        }
    }

    /// Whether a bounded local retry may succeed.
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            ErrorKind::NetworkTransient => true,
            ErrorKind::Unknown(_) => {
                let raw = self.raw.to_ascii_lowercase();
                GAS_SHORTFALL_MARKERS.iter().any(|m| raw.contains(m))
            }
            _ => false,
        }
    }
}

/// Where an error was raised. Only used for logging.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext<'a> {
    pub operation: &'a str,
    pub correlation_id: Option<&'a str>,
}

impl<'a> ClassifyContext<'a> {
    pub fn new(operation: &'a str, correlation_id: Option<&'a str>) -> Self {
        Self {
            operation,
            correlation_id,
        }
    }
}

/// One message heuristic. Matches when any needle is a substring of the lowercased message.
#[derive(Debug)]
pub struct MessageRule {
    pub name: &'static str,
    pub needles: &'static [&'static str],
    pub kind: ErrorKind,
}

impl MessageRule {
    pub fn matches(&self, lowered: &str) -> bool {
        self.needles.iter().any(|needle| lowered.contains(needle))
    }
}

/// Ordered message heuristics. Order matters: "insufficient funds" must win over "insufficient".
pub const MESSAGE_RULES: &[MessageRule] = &[
    MessageRule {
        name: "user_cancelled",
        needles: &["user rejected", "user denied"],
        kind: ErrorKind::UserCancelled,
    },
    MessageRule {
        name: "insufficient_gas_funds",
        needles: &["insufficient funds"],
        kind: ErrorKind::InsufficientGas,
    },
    MessageRule {
        name: "stale_nonce",
        needles: &["nonce too"],
        kind: ErrorKind::StaleNonce,
    },
    MessageRule {
        name: "duplicate_in_flight",
        needles: &[
            "already pending",
            "already known",
            "replacement transaction underpriced",
        ],
        kind: ErrorKind::DuplicateInFlight,
    },
    MessageRule {
        name: "insufficient_balance",
        needles: &["insufficient", "balance too low"],
        kind: ErrorKind::InsufficientBalance,
    },
    MessageRule {
        name: "not_authorized",
        needles: &["not a member", "membership required"],
        kind: ErrorKind::NotAuthorized,
    },
    MessageRule {
        name: "already_done",
        needles: &["already contributed", "already paid"],
        kind: ErrorKind::AlreadyDone,
    },
    MessageRule {
        name: "generic_revert",
        needles: &["execution reverted"],
        kind: ErrorKind::GenericOnChainRejection,
    },
    MessageRule {
        name: "network",
        needles: &[
            "network error",
            "connection refused",
            "connection reset",
            "timed out",
            "timeout",
            "too many requests",
            "rate limit",
            "service unavailable",
            "bad gateway",
        ],
        kind: ErrorKind::NetworkTransient,
    },
];

/// Run the message heuristics alone. `None` when no rule matches.
pub fn classify_message(message: &str) -> Option<ErrorKind> {
    let lowered = message.to_ascii_lowercase();
    MESSAGE_RULES
        .iter()
        .find(|rule| rule.matches(&lowered))
        .map(|rule| rule.kind.clone())
}

/// Decoded structured revert data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedRevert {
    /// A selector from [`KNOWN_REVERTS`].
    Known(KnownRevertMatch),
    /// `Error(string)` or `Panic(uint256)` with its decoded reason.
    Reason(String),
    /// Any other selector.
    UnknownSelector([u8; 4]),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnownRevertMatch {
    pub signature: &'static str,
    pub reason: &'static str,
}

/// Decode raw revert bytes. `None` when shorter than a selector.
pub fn decode_revert(data: &[u8]) -> Option<DecodedRevert> {
    let selector: [u8; 4] = data.get(..4)?.try_into().ok()?;

    if let Some(known) = KNOWN_REVERTS.iter().find(|k| k.selector == selector) {
        return Some(DecodedRevert::Known(KnownRevertMatch {
            signature: known.signature,
            reason: known.reason,
        }));
    }

    if selector == ERROR_STRING_SELECTOR {
        if let Ok(revert) = Revert::abi_decode(data) {
            return Some(DecodedRevert::Reason(revert.reason));
        }
    }

    if selector == PANIC_SELECTOR {
        if let Some(reason) = decode_revert_reason(data) {
            return Some(DecodedRevert::Reason(reason));
        }
    }

    Some(DecodedRevert::UnknownSelector(selector))
}

fn classify_revert_data(data: &Bytes) -> Option<ErrorKind> {
    match decode_revert(data)? {
        DecodedRevert::Known(known) => Some(ErrorKind::OnChainRejection(known.reason.to_string())),
        // Revert strings often carry the same wording the heuristics know about
        DecodedRevert::Reason(reason) => match classify_message(&reason) {
            Some(ErrorKind::GenericOnChainRejection) | Some(ErrorKind::NetworkTransient) | None => {
                Some(ErrorKind::OnChainRejection(reason))
            }
            Some(kind) => Some(kind),
        },
        DecodedRevert::UnknownSelector(_) => None,
    }
}

/// Classify a provider error. Pure apart from a debug log; `context` never affects the result.
pub fn classify(error: &ProviderError, context: &ClassifyContext<'_>) -> ClassifiedError {
    let raw = error.to_string();

    let kind = if error.is_transient() {
        ErrorKind::NetworkTransient
    } else {
        error
            .revert_data()
            .and_then(classify_revert_data)
            .or_else(|| classify_message(error.message()))
            .unwrap_or_else(|| ErrorKind::Unknown(error.message().to_string()))
    };

    debug!(
        operation = context.operation,
        correlation_id = ?context.correlation_id,
        kind = kind.name(),
        error = %raw,
        "Classified error"
    );

    ClassifiedError::new(kind, raw)
}
