use std::sync::Arc;
use tracing::info;

use crate::classifier::{classify, ClassifiedError, ClassifyContext};
use crate::config::consts::DEFAULT_GAS_ESCALATION_PERCENT;
use crate::config::SubmitConfig;
use crate::provider::ChainProvider;
use crate::retry::{retry_with_classifier, RetryConfig};
use crate::types::{GasPlan, TransactionHandle, TransactionIntent};

/// Broadcasts an intent, retrying gas shortfalls and network blips with a higher ceiling.
pub struct TransactionSubmitter<P> {
    provider: Arc<P>,
    retry: RetryConfig,
    escalation_percent: u64,
}

impl<P: ChainProvider> TransactionSubmitter<P> {
    pub fn new(provider: Arc<P>, config: SubmitConfig) -> Self {
        Self {
            provider,
            retry: config.into(),
            escalation_percent: DEFAULT_GAS_ESCALATION_PERCENT,
        }
    }

    pub fn with_escalation_percent(mut self, percent: u64) -> Self {
        self.escalation_percent = percent;
        self
    }

    /// Send the transaction and return as soon as the node accepts it.
    ///
    /// Attempt `n` uses `plan` escalated `n - 1` times. Only retryable classifications
    /// (network failures, gas-limit shortfalls) are retried; user cancellation, missing funds
    /// and contract rejections fail on the first attempt.
    pub async fn submit(
        &self,
        intent: &Arc<TransactionIntent>,
        plan: GasPlan,
    ) -> Result<TransactionHandle, ClassifiedError> {
        let provider = &*self.provider;
        let escalation_percent = self.escalation_percent;
        let context = ClassifyContext::new("send_transaction", Some(intent.correlation_id()));

        let (hash, plan) = retry_with_classifier(
            self.retry,
            "send_transaction",
            move |attempt| {
                let plan = plan.for_attempt(attempt, escalation_percent);
                async move {
                    info!(
                        correlation_id = intent.correlation_id(),
                        function = intent.function(),
                        attempt,
                        gas_ceiling = plan.ceiling,
                        "Submitting transaction"
                    );
                    provider
                        .send_transaction(intent, plan.ceiling)
                        .await
                        .map(|hash| (hash, plan))
                        .map_err(|e| classify(&e, &context))
                }
            },
            ClassifiedError::is_retryable,
        )
        .await?;

        info!(
            correlation_id = intent.correlation_id(),
            tx_hash = ?hash,
            attempt = plan.attempt,
            gas_ceiling = plan.ceiling,
            "Transaction accepted by node"
        );

        Ok(TransactionHandle::new(hash, intent.clone(), plan))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorKind;
    use crate::mock::{intent, MockProvider, TX_HASH};
    use crate::provider::ProviderError;
    use std::time::Duration;

    fn submitter(provider: MockProvider) -> (Arc<MockProvider>, TransactionSubmitter<MockProvider>) {
        let provider = Arc::new(provider);
        (
            provider.clone(),
            TransactionSubmitter::new(provider, SubmitConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_first_attempt_success() {
        let (provider, submitter) = submitter(MockProvider::new().with_sends(vec![Ok(TX_HASH)]));
        let handle = submitter
            .submit(&Arc::new(intent("c-1")), GasPlan::estimated(21_000, 130))
            .await
            .unwrap();

        assert_eq!(handle.hash, TX_HASH);
        assert_eq!(handle.gas_plan.attempt, 1);
        assert_eq!(provider.sent_gas_limits(), vec![27_300]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_gas_shortfall_retried_with_higher_ceiling() {
        let (provider, submitter) = submitter(MockProvider::new().with_sends(vec![
            Err(ProviderError::rpc(-32000, "intrinsic gas too low")),
            Ok(TX_HASH),
        ]));

        let start = tokio::time::Instant::now();
        let handle = submitter
            .submit(&Arc::new(intent("c-1")), GasPlan::fallback(1_000_000))
            .await
            .unwrap();

        assert_eq!(handle.gas_plan.attempt, 2);
        assert_eq!(handle.gas_plan.ceiling, 1_200_000);
        assert_eq!(provider.sent_gas_limits(), vec![1_000_000, 1_200_000]);
        assert!(start.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_never_more_than_two_attempts() {
        let (provider, submitter) = submitter(
            MockProvider::new()
                .with_sends(vec![Err(ProviderError::Transport("connection reset".into()))]),
        );

        let err = submitter
            .submit(&Arc::new(intent("c-1")), GasPlan::fallback(1_000_000))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::NetworkTransient);
        assert_eq!(provider.send_calls(), 2);
        let limits = provider.sent_gas_limits();
        assert_eq!(limits, vec![1_000_000, 1_200_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_configured_escalation_percent() {
        let provider = Arc::new(MockProvider::new().with_sends(vec![
            Err(ProviderError::rpc(-32000, "intrinsic gas too low")),
            Ok(TX_HASH),
        ]));
        let submitter = TransactionSubmitter::new(provider.clone(), SubmitConfig::default())
            .with_escalation_percent(150);

        let handle = submitter
            .submit(&Arc::new(intent("c-1")), GasPlan::estimated(21_000, 130))
            .await
            .unwrap();

        assert_eq!(handle.gas_plan.ceiling, 40_950);
        assert_eq!(provider.sent_gas_limits(), vec![27_300, 40_950]);
    }

    #[tokio::test]
    async fn test_user_rejection_is_not_retried() {
        let (provider, submitter) = submitter(
            MockProvider::new()
                .with_sends(vec![Err(ProviderError::Wallet("user rejected transaction".into()))]),
        );

        let err = submitter
            .submit(&Arc::new(intent("c-1")), GasPlan::estimated(21_000, 130))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::UserCancelled);
        assert_eq!(provider.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_insufficient_funds_is_a_hard_stop() {
        let (provider, submitter) = submitter(MockProvider::new().with_sends(vec![Err(
            ProviderError::rpc(-32000, "insufficient funds for gas * price + value"),
        )]));

        let err = submitter
            .submit(&Arc::new(intent("c-1")), GasPlan::estimated(21_000, 130))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::InsufficientGas);
        assert_eq!(provider.send_calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_nonce_is_not_retried() {
        let (provider, submitter) = submitter(
            MockProvider::new().with_sends(vec![Err(ProviderError::rpc(-32000, "nonce too low"))]),
        );

        let err = submitter
            .submit(&Arc::new(intent("c-1")), GasPlan::estimated(21_000, 130))
            .await
            .unwrap_err();

        assert_eq!(err.kind, ErrorKind::StaleNonce);
        assert_eq!(provider.send_calls(), 1);
    }
}
