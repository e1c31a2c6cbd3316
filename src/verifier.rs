use alloy::primitives::{Address, Bytes};
use alloy::sol_types::SolCall;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::VerifyConfig;
use crate::provider::{ChainProvider, ProviderError};
use crate::retry::retry;
use crate::types::ReadCall;

/// Why a single verification read did not pass.
#[derive(Debug)]
enum VerifyMiss {
    Read(ProviderError),
    Undecodable(String),
    Unmet,
}

impl fmt::Display for VerifyMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerifyMiss::Read(e) => write!(f, "read failed: {e}"),
            VerifyMiss::Undecodable(e) => write!(f, "could not decode result: {e}"),
            VerifyMiss::Unmet => f.write_str("expectation not met"),
        }
    }
}

/// Re-reads contract state after a confirmed write to check that the side effect landed.
///
/// Reads are retried because a node may still serve pre-write state right after confirmation.
/// Verification never errors: a miss is reported as `false` and the caller decides how much it
/// matters, since the confirmed receipt remains the primary source of truth.
pub struct StateVerifier<P> {
    provider: Arc<P>,
    config: VerifyConfig,
}

impl<P: ChainProvider> StateVerifier<P> {
    pub fn new(provider: Arc<P>, config: VerifyConfig) -> Self {
        Self { provider, config }
    }

    /// Verify with the configured attempts and delay.
    pub async fn verify<F>(&self, query: &ReadCall, expectation: F) -> bool
    where
        F: Fn(&Bytes) -> bool,
    {
        self.verify_with(query, expectation, self.config).await
    }

    pub async fn verify_with<F>(
        &self,
        query: &ReadCall,
        expectation: F,
        options: VerifyConfig,
    ) -> bool
    where
        F: Fn(&Bytes) -> bool,
    {
        let evaluate = |raw: &Bytes| {
            if expectation(raw) {
                Ok(())
            } else {
                Err(VerifyMiss::Unmet)
            }
        };
        self.check(query, evaluate, options).await
    }

    /// Typed variant: the read result is decoded as `C`'s return type before the expectation runs.
    pub async fn verify_call<C, F>(&self, to: Address, call: &C, expectation: F) -> bool
    where
        C: SolCall,
        F: Fn(&C::Return) -> bool,
    {
        let query = ReadCall::from_call(to, call);
        let evaluate = |raw: &Bytes| {
            let decoded = C::abi_decode_returns(raw)
                .map_err(|e| VerifyMiss::Undecodable(e.to_string()))?;
            if expectation(&decoded) {
                Ok(())
            } else {
                Err(VerifyMiss::Unmet)
            }
        };
        self.check(&query, evaluate, self.config).await
    }

    async fn check<F>(&self, query: &ReadCall, evaluate: F, options: VerifyConfig) -> bool
    where
        F: Fn(&Bytes) -> Result<(), VerifyMiss>,
    {
        let provider = &*self.provider;
        let evaluate = &evaluate;

        let result = retry(options.into(), "verify_state", |attempt| async move {
            let raw = provider.call(query).await.map_err(VerifyMiss::Read)?;
            evaluate(&raw)?;
            debug!(to = %query.to, attempt, "State verified");
            Ok::<(), VerifyMiss>(())
        })
        .await;

        match result {
            Ok(()) => true,
            Err(miss) => {
                warn!(
                    to = %query.to,
                    max_attempts = options.max_attempts,
                    reason = %miss,
                    "State verification failed"
                );
                false
            }
        }
    }
}
