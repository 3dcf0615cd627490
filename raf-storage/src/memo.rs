//! Memoizing, single-flight scoring executor.
//!
//! Per fingerprint the executor moves through
//!
//! ```text
//! Absent --miss--> Pending --ok--> Ready (LRU, capacity bounded)
//!                     |
//!                     +--err--> Absent (never cached)
//! ```
//!
//! One mutex guards the ready table, the pending markers and the counters.
//! It is never held across an await: the engine call runs in a detached
//! task, so a caller that goes away (client disconnect) cannot cancel a
//! computation other callers are waiting on. Waiters block on a per
//! fingerprint `watch` channel that the task resolves exactly once.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chrono::{DateTime, Utc};
use raf_core::{
    normalize_result_set, RequestFingerprint, ScoringConfig, ScoringError, ScoringRequest,
    ScoringResult, ScoringResultRow, StagingPlan,
};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::cache::{CacheRead, CacheStats, LruTable};
use crate::engine::ScoringEngine;

// ============================================================================
// ENTRIES
// ============================================================================

/// A successfully computed result, shared read-only by every identical request.
#[derive(Debug)]
pub struct CacheEntry {
    pub fingerprint: RequestFingerprint,
    pub rows: Vec<ScoringResultRow>,
    pub computed_at: DateTime<Utc>,
    /// Values passed through raw during normalization.
    pub anomalies: usize,
}

type Outcome = Result<Arc<CacheEntry>, ScoringError>;
type Signal = watch::Receiver<Option<Outcome>>;

struct MemoState {
    ready: LruTable<RequestFingerprint, Arc<CacheEntry>>,
    pending: HashMap<RequestFingerprint, Signal>,
    stats: CacheStats,
}

fn record(state: &Mutex<MemoState>, f: impl FnOnce(&mut CacheStats)) {
    if let Ok(mut state) = state.lock() {
        f(&mut state.stats);
    }
}

// ============================================================================
// EXECUTOR
// ============================================================================

/// Memoizing executor over a [`ScoringEngine`].
pub struct MemoizingExecutor {
    engine: Arc<dyn ScoringEngine>,
    config: ScoringConfig,
    state: Arc<Mutex<MemoState>>,
}

impl MemoizingExecutor {
    pub fn new(engine: Arc<dyn ScoringEngine>, config: ScoringConfig) -> ScoringResult<Self> {
        config.validate()?;
        let state = MemoState {
            ready: LruTable::new(config.cache_capacity),
            pending: HashMap::new(),
            stats: CacheStats::default(),
        };
        Ok(Self {
            engine,
            config,
            state: Arc::new(Mutex::new(state)),
        })
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<dyn ScoringEngine> {
        &self.engine
    }

    fn lock(&self) -> ScoringResult<MutexGuard<'_, MemoState>> {
        self.state.lock().map_err(|_| ScoringError::LockPoisoned)
    }

    /// Return the result for `fingerprint`, computing it at most once.
    ///
    /// The caller that starts the computation gets a miss; callers that find
    /// a ready result or join an in-flight computation get a hit. Failures
    /// reach every waiter and leave nothing cached.
    pub async fn execute(
        &self,
        request: Arc<ScoringRequest>,
        fingerprint: RequestFingerprint,
    ) -> ScoringResult<CacheRead<Arc<CacheEntry>>> {
        let (leader, mut signal) = {
            let mut state = self.lock()?;

            if let Some(entry) = state.ready.get(&fingerprint).cloned() {
                state.stats.hits += 1;
                drop(state);
                let computed_at = entry.computed_at;
                let read = CacheRead::from_cache(entry, computed_at, self.config.entry_ttl);
                debug!(
                    fingerprint = %fingerprint.short(),
                    stale = read.is_stale(),
                    "Scoring cache hit"
                );
                return Ok(read);
            }

            if let Some(signal) = state.pending.get(&fingerprint).cloned() {
                state.stats.coalesced += 1;
                debug!(fingerprint = %fingerprint.short(), "Joining in-flight scoring computation");
                (false, signal)
            } else {
                let plan = StagingPlan::new(request, self.config.batch_size)?;
                let (tx, rx) = watch::channel(None);
                state.pending.insert(fingerprint, rx.clone());
                state.stats.misses += 1;
                self.spawn_computation(fingerprint, plan, tx);
                (true, rx)
            }
        };

        let outcome = match signal.wait_for(Option::is_some).await {
            Ok(resolved) => resolved.clone(),
            Err(_) => None,
        };

        match outcome {
            Some(Ok(entry)) => {
                let computed_at = entry.computed_at;
                if leader {
                    Ok(CacheRead::computed(entry, computed_at))
                } else {
                    Ok(CacheRead::from_cache(entry, computed_at, self.config.entry_ttl))
                }
            }
            Some(Err(err)) => Err(err),
            None => Err(ScoringError::ComputationAbandoned {
                fingerprint: fingerprint.to_hex(),
            }),
        }
    }

    fn spawn_computation(
        &self,
        fingerprint: RequestFingerprint,
        plan: StagingPlan,
        tx: watch::Sender<Option<Outcome>>,
    ) {
        let engine = Arc::clone(&self.engine);
        let state = Arc::clone(&self.state);
        let retry_attempts = self.config.retry_attempts;
        let span = info_span!(
            "scoring_computation",
            fingerprint = %fingerprint.short(),
            engine = engine.name(),
            payment_year = plan.payment_year(),
        );

        tokio::spawn(
            async move {
                let guard = PendingGuard {
                    state: Arc::clone(&state),
                    fingerprint,
                    armed: true,
                };
                let outcome =
                    compute(engine.as_ref(), &plan, fingerprint, retry_attempts, &state).await;
                guard.resolve(&outcome);
                tx.send_replace(Some(outcome));
            }
            .instrument(span),
        );
    }

    /// Whether a ready result exists, without touching recency.
    pub fn is_cached(&self, fingerprint: &RequestFingerprint) -> ScoringResult<bool> {
        Ok(self.lock()?.ready.contains(fingerprint))
    }

    /// Whether a computation for `fingerprint` is in flight.
    pub fn is_pending(&self, fingerprint: &RequestFingerprint) -> ScoringResult<bool> {
        Ok(self.lock()?.pending.contains_key(fingerprint))
    }

    pub fn stats(&self) -> ScoringResult<CacheStats> {
        let state = self.lock()?;
        Ok(CacheStats {
            capacity: state.ready.capacity(),
            entries: state.ready.len(),
            pending: state.pending.len(),
            ..state.stats.clone()
        })
    }
}

async fn compute(
    engine: &dyn ScoringEngine,
    plan: &StagingPlan,
    fingerprint: RequestFingerprint,
    retry_attempts: u32,
    state: &Mutex<MemoState>,
) -> Outcome {
    let started = Instant::now();
    let mut attempt: u32 = 0;
    loop {
        record(state, |stats| stats.engine_calls += 1);
        match engine.score(plan).await {
            Ok(raw) => {
                let normalized = normalize_result_set(raw);
                for anomaly in &normalized.anomalies {
                    warn!(
                        row = anomaly.row,
                        column = %anomaly.column,
                        reason = %anomaly.reason,
                        "Result value passed through without normalization"
                    );
                }
                info!(
                    rows = normalized.rows.len(),
                    batches = plan.batch_count(),
                    attempts = attempt + 1,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scoring computation finished"
                );
                return Ok(Arc::new(CacheEntry {
                    fingerprint,
                    rows: normalized.rows,
                    computed_at: Utc::now(),
                    anomalies: normalized.anomalies.len(),
                }));
            }
            Err(err) if err.is_retryable() && attempt < retry_attempts => {
                attempt += 1;
                record(state, |stats| stats.retries += 1);
                warn!(attempt, error = %err, "Scoring engine unavailable, retrying");
            }
            Err(err) => {
                warn!(
                    attempts = attempt + 1,
                    error = %err,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Scoring computation failed"
                );
                return Err(err.into());
            }
        }
    }
}

/// Clears the pending marker however the computation task ends.
struct PendingGuard {
    state: Arc<Mutex<MemoState>>,
    fingerprint: RequestFingerprint,
    armed: bool,
}

impl PendingGuard {
    fn resolve(mut self, outcome: &Outcome) {
        self.armed = false;
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.pending.remove(&self.fingerprint);
        match outcome {
            Ok(entry) => {
                if let Some((evicted, _)) = state.ready.insert(self.fingerprint, Arc::clone(entry))
                {
                    state.stats.evictions += 1;
                    debug!(evicted = %evicted.short(), "Evicted least recently used scoring result");
                }
            }
            Err(_) => state.stats.failures += 1,
        }
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut state) = self.state.lock() {
            state.pending.remove(&self.fingerprint);
            state.stats.failures += 1;
        }
        warn!(
            fingerprint = %self.fingerprint.short(),
            "Scoring computation ended without a result"
        );
    }
}
