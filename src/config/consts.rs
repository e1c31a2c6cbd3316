//! Centralized constants for the transaction engine.
//!
//! Every tunable number used by the engine components lives here so the defaults in
//! [`EngineConfig`](super::EngineConfig) and the component presets stay in one place.

// =============================================================================
// Gas Estimation
// =============================================================================

/// Safety buffer applied on top of a successful estimate, in percent (1.3x).
pub const DEFAULT_GAS_BUFFER_PERCENT: u64 = 130;

/// Ceiling increase applied on each submission retry, in percent (1.2x).
pub const DEFAULT_GAS_ESCALATION_PERCENT: u64 = 120;

/// Conservative ceiling used when estimation fails for a non-deterministic reason
pub const DEFAULT_FALLBACK_GAS_CEILING: u64 = 3_000_000;

// =============================================================================
// Submission
// =============================================================================

/// Total submission attempts, including the first one
pub const DEFAULT_SUBMIT_MAX_ATTEMPTS: u32 = 2;

/// Delay between submission attempts in seconds
pub const DEFAULT_SUBMIT_RETRY_DELAY_SECS: u64 = 2;

// =============================================================================
// Confirmation Monitoring
// =============================================================================

/// Overall budget for a receipt to show up, in milliseconds
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 120_000;

/// First poll interval in milliseconds
pub const DEFAULT_POLL_BASE_MS: u64 = 2_000;

/// Added to the poll interval for every `DEFAULT_POLL_STEP_EVERY_MS` elapsed
pub const DEFAULT_POLL_STEP_MS: u64 = 1_000;

/// Elapsed time after which the poll interval grows by one step
pub const DEFAULT_POLL_STEP_EVERY_MS: u64 = 10_000;

/// Upper bound for the poll interval in milliseconds
pub const DEFAULT_POLL_MAX_MS: u64 = 10_000;

/// Blocks required on top of the receipt's block before success is final
pub const DEFAULT_CONFIRMATION_DEPTH: u64 = 1;

// =============================================================================
// State Verification
// =============================================================================

/// Read attempts before a verification is reported as failed
pub const DEFAULT_VERIFY_MAX_ATTEMPTS: u32 = 3;

/// Fixed delay between verification reads in seconds
pub const DEFAULT_VERIFY_RETRY_DELAY_SECS: u64 = 2;

// =============================================================================
// Failure Analysis
// =============================================================================

/// Gas utilization at or above which a revert is flagged as out-of-gas.
///
/// Kept below 0.95 on purpose: a revert that used 2.8M of a 3M limit (0.933) must be flagged.
/// See `analyzer::tests::test_near_limit_revert_with_logs`.
pub const OUT_OF_GAS_UTILIZATION: f64 = 0.9;

// =============================================================================
// Revert Data
// =============================================================================

/// Solidity Error(string) function selector
pub const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];

/// Solidity Panic(uint256) function selector
pub const PANIC_SELECTOR: [u8; 4] = [0x4e, 0x48, 0x7b, 0x71];
