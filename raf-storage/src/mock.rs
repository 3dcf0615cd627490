//! In-memory scoring engine for tests and local development.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use raf_core::{EngineError, RawResultSet, RawValue, StagingPlan};

use crate::engine::ScoringEngine;

/// Column names of the default echo result.
pub const MOCK_RESULT_COLUMNS: [&str; 4] = ["MemberID", "PaymentYear", "HccCount", "RAF"];

/// Scoring engine that never leaves the process.
///
/// By default it returns one row per membership with a deterministic
/// pseudo score derived from the member's diagnosis count. A fixed result
/// set, an artificial delay and a queue of injected failures can be set up
/// per test.
#[derive(Debug, Default)]
pub struct MockScoringEngine {
    result: Option<RawResultSet>,
    delay: Option<Duration>,
    failures: Mutex<VecDeque<EngineError>>,
    member_failures: Mutex<HashMap<String, EngineError>>,
    calls: AtomicUsize,
    staged_batches: AtomicUsize,
    unhealthy: AtomicBool,
}

impl MockScoringEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Always return `result` instead of the echo rows.
    pub fn with_result(mut self, result: RawResultSet) -> Self {
        self.result = Some(result);
        self
    }

    /// Sleep this long inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Make the next call fail with `err`. Queued failures are consumed in order.
    pub fn fail_next(&self, err: EngineError) {
        if let Ok(mut failures) = self.failures.lock() {
            failures.push_back(err);
        }
    }

    /// Fail every call whose request stages `member_id`, without waiting
    /// out the configured delay.
    pub fn fail_member(&self, member_id: &str, err: EngineError) {
        if let Ok(mut failures) = self.member_failures.lock() {
            failures.insert(member_id.to_string(), err);
        }
    }

    fn member_failure(&self, plan: &StagingPlan) -> Option<EngineError> {
        let failures = self.member_failures.lock().ok()?;
        plan.request()
            .memberships
            .iter()
            .find_map(|m| failures.get(&m.member_id).cloned())
    }

    pub fn set_unhealthy(&self, unhealthy: bool) {
        self.unhealthy.store(unhealthy, Ordering::SeqCst);
    }

    /// Number of `score` calls made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of staging batches consumed across all successful calls.
    pub fn staged_batches(&self) -> usize {
        self.staged_batches.load(Ordering::SeqCst)
    }

    fn echo(plan: &StagingPlan) -> RawResultSet {
        let request = plan.request();
        let mut dx_counts: HashMap<&str, usize> = HashMap::new();
        for dx in &request.diagnoses {
            *dx_counts.entry(dx.member_id.as_str()).or_default() += 1;
        }

        let columns = MOCK_RESULT_COLUMNS.iter().map(|c| c.to_string()).collect();
        request
            .memberships
            .iter()
            .fold(RawResultSet::new(columns), |set, member| {
                let count = dx_counts.get(member.member_id.as_str()).copied().unwrap_or(0);
                set.with_row(vec![
                    RawValue::Text(member.member_id.clone()),
                    RawValue::Integer(i64::from(plan.payment_year())),
                    RawValue::Integer(count as i64),
                    RawValue::Decimal(format!("{:.3}", 0.350 + 0.125 * count as f64)),
                ])
            })
    }
}

#[async_trait]
impl ScoringEngine for MockScoringEngine {
    async fn score(&self, plan: &StagingPlan) -> Result<RawResultSet, EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.member_failure(plan) {
            return Err(err);
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let injected = self.failures.lock().ok().and_then(|mut f| f.pop_front());
        if let Some(err) = injected {
            return Err(err);
        }

        // walk the batches the way a real engine would
        let batches = plan.membership_batches().count() + plan.diagnosis_batches().count();
        self.staged_batches.fetch_add(batches, Ordering::SeqCst);

        Ok(match &self.result {
            Some(result) => result.clone(),
            None => Self::echo(plan),
        })
    }

    async fn health_check(&self) -> Result<Duration, EngineError> {
        if self.unhealthy.load(Ordering::SeqCst) {
            Err(EngineError::unavailable("mock engine marked unhealthy"))
        } else {
            Ok(Duration::from_micros(50))
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
