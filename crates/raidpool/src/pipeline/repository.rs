use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::time::Duration as StdDuration;

use super::domain::{
    ContentId, ContentItem, PayoutId, PayoutRecord, PayoutStatus, PointHistoryEntry,
    SettlementLogEntry, SettlementStats, UserAccount, UserId,
};

/// Error enumeration for store failures.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Storage abstraction for tracked content items. The ledger is the only
/// writer of `points_awarded` / `last_scored_at`.
pub trait ContentStore: Send + Sync {
    fn insert(&self, item: ContentItem) -> Result<ContentItem, RepositoryError>;
    fn fetch(&self, id: &ContentId) -> Result<Option<ContentItem>, RepositoryError>;
    /// Items due for a scoring pass: never scored, or scored before
    /// `now - rescore_interval`.
    fn due(&self, now: DateTime<Utc>, rescore_interval: Duration)
        -> Result<Vec<ContentItem>, RepositoryError>;
    /// Items awaiting manual review: never scored or carrying zero points,
    /// newest first, capped at `limit`.
    fn pending_review(&self, limit: usize) -> Result<Vec<ContentItem>, RepositoryError>;
    /// Commit a scoring result: counters, new point value, and scored-at stamp.
    fn record_score(
        &self,
        id: &ContentId,
        counts: EngagementCountsUpdate,
        points: i64,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    /// Zero-delta passes only refresh the scored-at stamp.
    fn touch(&self, id: &ContentId, at: DateTime<Utc>) -> Result<(), RepositoryError>;
    /// Moderation rejection. Bypasses the ledger entirely.
    fn delete(&self, id: &ContentId) -> Result<(), RepositoryError>;
    fn count_for_author(&self, author: &UserId) -> Result<usize, RepositoryError>;
}

/// Counter update accompanying a score commit. `Keep` leaves the externally
/// fetched counters alone; `Replace` is the manual-review override path.
#[derive(Debug, Clone, Copy)]
pub enum EngagementCountsUpdate {
    Keep,
    Replace(super::domain::EngagementCounts),
}

/// Storage abstraction for participant accounts. Balance mutation goes
/// through `add_points` and `commit_settlement` only, and implementations
/// must serialize the two against each other so a scoring pass and a
/// settlement pass cannot lose updates.
pub trait AccountStore: Send + Sync {
    fn upsert(&self, account: UserAccount) -> Result<(), RepositoryError>;
    fn fetch(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError>;
    fn all(&self) -> Result<Vec<UserAccount>, RepositoryError>;
    /// Users with a positive balance and a configured destination.
    fn eligible(&self) -> Result<Vec<UserAccount>, RepositoryError>;
    /// Atomically apply a signed point delta. The balance never drops below
    /// zero.
    fn add_points(&self, id: &UserId, delta: i64) -> Result<(), RepositoryError>;
    /// Commit a confirmed payout: decrement the balance by the snapshotted
    /// point total (scoped to this user, saturating at zero so deltas
    /// accrued mid-cycle survive) and credit `total_settled`.
    fn commit_settlement(
        &self,
        id: &UserId,
        amount: Decimal,
        points_snapshot: i64,
    ) -> Result<(), RepositoryError>;
}

/// Append-only store for point history entries.
pub trait HistoryStore: Send + Sync {
    fn append(&self, entry: PointHistoryEntry) -> Result<(), RepositoryError>;
    fn for_user(&self, user: &UserId) -> Result<Vec<PointHistoryEntry>, RepositoryError>;
}

/// Store owning the payout record lifecycle.
pub trait PayoutStore: Send + Sync {
    fn insert(&self, record: PayoutRecord) -> Result<PayoutRecord, RepositoryError>;
    fn mark(
        &self,
        id: &PayoutId,
        status: PayoutStatus,
        tx_reference: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError>;
    fn for_user(&self, user: &UserId, limit: usize)
        -> Result<Vec<PayoutRecord>, RepositoryError>;
    fn stats(&self) -> Result<SettlementStats, RepositoryError>;
}

/// Append-only audit trail, one entry per cycle execution.
pub trait SettlementLogStore: Send + Sync {
    fn append(&self, entry: SettlementLogEntry) -> Result<(), RepositoryError>;
    fn recent(&self, limit: usize) -> Result<Vec<SettlementLogEntry>, RepositoryError>;
}

/// One attempted transfer to one destination.
#[derive(Debug, Clone, PartialEq)]
pub struct DispatchRequest {
    pub destination: String,
    pub amount: Decimal,
    /// Implementations must give up after this long and surface
    /// [`DispatchError::Timeout`]; an unconfirmed transfer is a failure.
    pub timeout: StdDuration,
}

/// Successful dispatch confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReceipt {
    pub reference: String,
}

/// Dispatch failure taxonomy. All variants leave the allocation FAILED and
/// the user's balance intact; the next cycle is the retry mechanism.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("transfer rejected: {0}")]
    Rejected(String),
    #[error("payment transport unavailable: {0}")]
    Transport(String),
    #[error("transfer unconfirmed within timeout")]
    Timeout,
}

/// Outbound payment boundary. The settlement processor calls this exactly
/// once per allocation per cycle and never retries within a cycle.
pub trait PaymentDispatcher: Send + Sync {
    fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReceipt, DispatchError>;
}

/// Read-only view of the funding wallet, used for operational status
/// reporting only. The pool size is configuration, never this number.
pub trait BalanceProbe: Send + Sync {
    fn available(&self) -> Result<Decimal, DispatchError>;
}
