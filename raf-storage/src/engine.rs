//! Scoring engine abstraction
//!
//! The engine is the collaborator that stages records and runs the actual
//! risk score calculation. The executor only knows this trait; the Postgres
//! implementation lives in the API crate and tests use [`crate::MockScoringEngine`].

use std::time::Duration;

use async_trait::async_trait;
use raf_core::{EngineError, RawResultSet, StagingPlan};

/// A remote scoring computation.
///
/// Implementations must treat every call as self-contained: staging state
/// created for one plan must never be visible to another call.
#[async_trait]
pub trait ScoringEngine: Send + Sync {
    /// Stage the plan's records and run the computation for its payment year.
    ///
    /// Either the complete result set is returned or nothing is; a failed
    /// call leaves no partial staging behind.
    async fn score(&self, plan: &StagingPlan) -> Result<RawResultSet, EngineError>;

    /// Check that the engine is reachable, returning the round-trip time.
    async fn health_check(&self) -> Result<Duration, EngineError> {
        Ok(Duration::ZERO)
    }

    /// Short identifier used in logs and metrics labels.
    fn name(&self) -> &'static str;
}
