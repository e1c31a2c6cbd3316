use std::sync::Arc;
use tracing::{debug, warn};

use crate::classifier::{classify, ClassifiedError, ClassifyContext};
use crate::config::GasConfig;
use crate::provider::ChainProvider;
use crate::types::{GasPlan, TransactionIntent};

/// Turns an intent into an initial [`GasPlan`].
pub struct GasEstimator<P> {
    provider: Arc<P>,
    config: GasConfig,
}

impl<P: ChainProvider> GasEstimator<P> {
    pub fn new(provider: Arc<P>, config: GasConfig) -> Self {
        Self { provider, config }
    }

    /// Estimate and buffer the gas for `intent`.
    ///
    /// Fails only when the call reverts deterministically; more gas cannot fix that.
    /// Every other estimation failure falls back to the configured ceiling so a flaky
    /// node does not block submission.
    pub async fn estimate(&self, intent: &TransactionIntent) -> Result<GasPlan, ClassifiedError> {
        if let Some(limit) = intent.gas_limit() {
            debug!(
                correlation_id = intent.correlation_id(),
                gas_limit = limit,
                "Using explicit gas limit, skipping estimation"
            );
            return Ok(GasPlan::with_override(limit));
        }

        match self.provider.estimate_gas(intent).await {
            Ok(units) => {
                let plan = GasPlan::estimated(units, self.config.buffer_percent);
                debug!(
                    correlation_id = intent.correlation_id(),
                    function = intent.function(),
                    estimated = units,
                    gas_ceiling = plan.ceiling,
                    "Gas estimated"
                );
                Ok(plan)
            }
            Err(e) => {
                let context = ClassifyContext::new("estimate_gas", Some(intent.correlation_id()));
                let classified = classify(&e, &context);

                if e.is_execution_revert() {
                    warn!(
                        correlation_id = intent.correlation_id(),
                        function = intent.function(),
                        kind = classified.kind.name(),
                        error = %e,
                        "Call reverts during estimation, aborting"
                    );
                    return Err(classified);
                }

                warn!(
                    correlation_id = intent.correlation_id(),
                    function = intent.function(),
                    fallback_ceiling = self.config.fallback_ceiling,
                    error = %e,
                    "Gas estimation failed, using fallback ceiling"
                );
                Ok(GasPlan::fallback(self.config.fallback_ceiling))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ErrorKind;
    use crate::mock::{intent, MockProvider};
    use crate::provider::ProviderError;
    use crate::types::GasPlanSource;

    fn estimator(provider: MockProvider) -> (Arc<MockProvider>, GasEstimator<MockProvider>) {
        let provider = Arc::new(provider);
        (
            provider.clone(),
            GasEstimator::new(provider, GasConfig::default()),
        )
    }

    #[tokio::test]
    async fn test_successful_estimate_is_buffered() {
        let (_, estimator) = estimator(MockProvider::new().with_estimates(vec![Ok(21_000)]));
        let plan = estimator.estimate(&intent("c-1")).await.unwrap();
        assert_eq!(plan.estimated, Some(21_000));
        assert_eq!(plan.ceiling, 27_300);
        assert_eq!(plan.source, GasPlanSource::Estimated);
    }

    #[tokio::test]
    async fn test_override_skips_estimation() {
        let (provider, estimator) = estimator(MockProvider::new());
        let plan = estimator
            .estimate(&intent("c-1").with_gas_limit(90_000))
            .await
            .unwrap();
        assert_eq!(plan.ceiling, 90_000);
        assert_eq!(plan.source, GasPlanSource::Override);
        assert_eq!(provider.estimate_calls(), 0);
    }

    #[tokio::test]
    async fn test_deterministic_revert_aborts() {
        let (_, estimator) = estimator(MockProvider::new().with_estimates(vec![Err(
            ProviderError::rpc(-32000, "execution reverted: already contributed"),
        )]));
        let err = estimator.estimate(&intent("c-1")).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::AlreadyDone);
    }

    #[tokio::test]
    async fn test_network_failure_falls_back() {
        let (_, estimator) = estimator(
            MockProvider::new()
                .with_estimates(vec![Err(ProviderError::Transport("connection reset".into()))]),
        );
        let plan = estimator.estimate(&intent("c-1")).await.unwrap();
        assert_eq!(plan.ceiling, 3_000_000);
        assert_eq!(plan.source, GasPlanSource::Fallback);
    }

    #[tokio::test]
    async fn test_non_revert_rpc_failure_falls_back() {
        let (_, estimator) = estimator(
            MockProvider::new()
                .with_estimates(vec![Err(ProviderError::rpc(-32603, "internal error"))]),
        );
        let plan = estimator.estimate(&intent("c-1")).await.unwrap();
        assert_eq!(plan.source, GasPlanSource::Fallback);
    }
}
