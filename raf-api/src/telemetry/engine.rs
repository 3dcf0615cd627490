//! Metrics wrapper around a scoring engine.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use raf_core::{EngineError, RawResultSet, StagingPlan};
use raf_storage::ScoringEngine;

use super::metrics::with_metrics;

/// Records call counts and latency for every engine call, retries included.
pub struct InstrumentedEngine {
    inner: Arc<dyn ScoringEngine>,
}

impl InstrumentedEngine {
    pub fn new(inner: Arc<dyn ScoringEngine>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &Arc<dyn ScoringEngine> {
        &self.inner
    }
}

fn outcome_label(result: &Result<RawResultSet, EngineError>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(EngineError::Unavailable { .. }) => "unavailable",
        Err(EngineError::Failed { .. }) => "failed",
    }
}

#[async_trait]
impl ScoringEngine for InstrumentedEngine {
    async fn score(&self, plan: &StagingPlan) -> Result<RawResultSet, EngineError> {
        let start = Instant::now();
        let result = self.inner.score(plan).await;
        let elapsed = start.elapsed().as_secs_f64();
        let engine = self.inner.name();
        let outcome = outcome_label(&result);
        with_metrics(|metrics| metrics.record_engine_call(engine, outcome, elapsed));
        result
    }

    async fn health_check(&self) -> Result<Duration, EngineError> {
        self.inner.health_check().await
    }

    fn name(&self) -> &'static str {
        self.inner.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::metrics::METRICS;
    use raf_core::ScoringRequest;
    use raf_storage::MockScoringEngine;

    fn plan() -> StagingPlan {
        let request = Arc::new(ScoringRequest {
            payment_year: 2024,
            memberships: Vec::new(),
            diagnoses: Vec::new(),
        });
        StagingPlan::new(request, 10).unwrap()
    }

    #[tokio::test]
    async fn test_delegates_and_counts_failures() {
        let mock = Arc::new(MockScoringEngine::new());
        mock.fail_next(EngineError::failed("division by zero"));
        let engine = InstrumentedEngine::new(mock.clone());
        assert_eq!(engine.name(), "mock");

        let metrics = METRICS.as_ref().unwrap();
        let before = metrics
            .engine_calls_total
            .with_label_values(&["mock", "failed"])
            .get();

        let err = engine.score(&plan()).await.unwrap_err();
        assert_eq!(err, EngineError::failed("division by zero"));
        assert!(engine.score(&plan()).await.is_ok());
        assert_eq!(mock.calls(), 2);

        let after = metrics
            .engine_calls_total
            .with_label_values(&["mock", "failed"])
            .get();
        assert!(after >= before + 1.0);
    }

    #[test]
    fn test_outcome_labels() {
        assert_eq!(outcome_label(&Ok(RawResultSet::default())), "success");
        assert_eq!(
            outcome_label(&Err(EngineError::unavailable("pool timeout"))),
            "unavailable"
        );
        assert_eq!(outcome_label(&Err(EngineError::failed("bad"))), "failed");
    }
}
