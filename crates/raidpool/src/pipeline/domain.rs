use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Identifier wrapper for reward-program participants.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub String);

/// Identifier wrapper for tracked content items.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentId(pub String);

/// Identifier wrapper for payout records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayoutId(pub String);

/// The four independent interaction counts attached to a tracked item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngagementCounts {
    pub likes: u32,
    pub reposts: u32,
    pub replies: u32,
    pub quotes: u32,
}

impl EngagementCounts {
    pub fn describe(&self) -> String {
        format!(
            "{} likes, {} reposts, {} replies, {} quotes",
            self.likes, self.reposts, self.replies, self.quotes
        )
    }
}

/// A tracked post. `points_awarded` is always the most recent scorer output
/// for the stored counters; it is the basis for the next delta.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentItem {
    pub id: ContentId,
    pub author: UserId,
    pub counts: EngagementCounts,
    pub created_at: DateTime<Utc>,
    pub points_awarded: i64,
    pub last_scored_at: Option<DateTime<Utc>>,
}

impl ContentItem {
    pub fn new(
        id: ContentId,
        author: UserId,
        counts: EngagementCounts,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author,
            counts,
            created_at,
            points_awarded: 0,
            last_scored_at: None,
        }
    }
}

/// A reward-program participant. `total_points` is the running balance since
/// the user's last successful settlement; `total_settled` only grows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: UserId,
    pub handle: String,
    /// Payout destination address; `None` excludes the user from settlement.
    pub destination: Option<String>,
    pub total_points: i64,
    pub total_settled: Decimal,
}

impl UserAccount {
    pub fn new(id: UserId, handle: impl Into<String>, destination: Option<String>) -> Self {
        Self {
            id,
            handle: handle.into(),
            destination,
            total_points: 0,
            total_settled: Decimal::ZERO,
        }
    }

    /// Eligible users hold a destination and a positive balance.
    pub fn is_eligible(&self) -> bool {
        self.destination.is_some() && self.total_points > 0
    }
}

/// Reason tag attached to every point-history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointReason {
    EngagementUpdate,
    ManualReview,
    Adjustment,
}

impl PointReason {
    pub fn label(&self) -> &'static str {
        match self {
            PointReason::EngagementUpdate => "engagement_update",
            PointReason::ManualReview => "manual_review",
            PointReason::Adjustment => "adjustment",
        }
    }
}

/// Append-only ledger entry. The sum of deltas per user equals that user's
/// all-time accumulation; settlement resets are not journaled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointHistoryEntry {
    pub user: UserId,
    /// Absent for entries not tied to a single item (e.g. adjustments).
    pub content: Option<ContentId>,
    pub delta: i64,
    pub reason: PointReason,
    pub description: String,
    pub recorded_at: DateTime<Utc>,
}

/// Payout lifecycle. Terminal states are final; a failed payout is only
/// retried by a later cycle re-evaluating the still-intact balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PayoutStatus {
    Processing,
    Completed,
    Failed,
}

impl PayoutStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PayoutStatus::Processing => "PROCESSING",
            PayoutStatus::Completed => "COMPLETED",
            PayoutStatus::Failed => "FAILED",
        }
    }
}

/// One user's share of one settlement cycle, with the point totals that
/// produced the amount kept for audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PayoutRecord {
    pub id: PayoutId,
    pub user: UserId,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: PayoutStatus,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
    /// Numerator of the proportional split.
    pub user_points: i64,
    /// Denominator of the proportional split.
    pub pool_points: i64,
    pub tx_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

/// Which batch job produced an audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleKind {
    Scoring,
    Settlement,
}

impl CycleKind {
    pub fn label(&self) -> &'static str {
        match self {
            CycleKind::Scoring => "scoring",
            CycleKind::Settlement => "settlement",
        }
    }
}

/// Overall outcome of one cycle execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStatus {
    Completed,
    CompletedWithErrors,
    Failed,
    Noop,
}

impl CycleStatus {
    pub fn label(&self) -> &'static str {
        match self {
            CycleStatus::Completed => "completed",
            CycleStatus::CompletedWithErrors => "completed_with_errors",
            CycleStatus::Failed => "failed",
            CycleStatus::Noop => "noop",
        }
    }
}

/// Append-only audit record, one per cycle execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementLogEntry {
    pub kind: CycleKind,
    pub status: CycleStatus,
    pub message: String,
    pub metrics: serde_json::Value,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Sanitized payout representation for API responses.
#[derive(Debug, Clone, Serialize)]
pub struct PayoutView {
    pub id: PayoutId,
    pub amount: Decimal,
    pub fee: Decimal,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_reference: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_at: Option<DateTime<Utc>>,
}

impl PayoutRecord {
    pub fn view(&self) -> PayoutView {
        PayoutView {
            id: self.id.clone(),
            amount: self.amount,
            fee: self.fee,
            status: self.status.label(),
            tx_reference: self.tx_reference.clone(),
            created_at: self.created_at,
            processed_at: self.processed_at,
        }
    }
}

/// Per-user dashboard numbers.
#[derive(Debug, Clone, Serialize)]
pub struct UserStatsView {
    pub user_id: UserId,
    pub total_points: i64,
    pub total_settled: Decimal,
    pub tracked_items: usize,
    /// 1-based position when ordering by `total_points` descending.
    pub rank: usize,
}

/// Aggregate payout counts and totals by status.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SettlementStats {
    pub total_payouts: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_paid: Decimal,
    pub total_fees: Decimal,
}
