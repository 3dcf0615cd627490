//! RAF Storage - Result Cache and Engine Abstraction
//!
//! This crate owns everything between a validated request and the scoring
//! engine:
//! - [`ScoringEngine`]: the collaborator trait the executor drives
//! - [`LruTable`]: bounded least-recently-used storage for ready results
//! - [`MemoizingExecutor`]: single-flight memoization with bounded retry
//! - [`MockScoringEngine`]: in-process engine for tests

pub mod cache;
pub mod engine;
pub mod memo;
pub mod mock;

pub use cache::{CacheRead, CacheStats, CacheStatus, LruTable};
pub use engine::ScoringEngine;
pub use memo::{CacheEntry, MemoizingExecutor};
pub use mock::{MockScoringEngine, MOCK_RESULT_COLUMNS};
