//! Engagement-to-payout settlement pipeline.
//!
//! Data flows: engagement counters -> [`scoring::EngagementScorer`] ->
//! [`ledger::PointLedger`] (idempotent deltas, append-only history) -> on a
//! slower cadence [`pool::RewardPool`] reads balances ->
//! [`settlement::SettlementProcessor`] dispatches payments and commits
//! ledger resets only for confirmed successes -> audit trail records the
//! cycle.

pub mod domain;
pub mod ledger;
pub mod memory;
pub mod pool;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod settlement;

#[cfg(test)]
mod tests;

pub use domain::{
    ContentId, ContentItem, CycleKind, CycleStatus, EngagementCounts, PayoutId, PayoutRecord,
    PayoutStatus, PayoutView, PointHistoryEntry, PointReason, SettlementLogEntry, SettlementStats,
    UserAccount, UserId, UserStatsView,
};
pub use ledger::{LedgerError, PointLedger, ReviewOutcome, ScoringSummary};
pub use pool::{Allocation, PoolError, RewardPool};
pub use repository::{
    AccountStore, BalanceProbe, ContentStore, DispatchError, DispatchReceipt, DispatchRequest,
    EngagementCountsUpdate, HistoryStore, PaymentDispatcher, PayoutStore, RepositoryError,
    SettlementLogStore,
};
pub use router::{pipeline_router, PipelineState};
pub use scoring::{EngagementScorer, ScoringConfig};
pub use settlement::{CycleSummary, SettlementConfig, SettlementError, SettlementProcessor};
