use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use super::domain::{
    ContentId, ContentItem, CycleKind, CycleStatus, EngagementCounts, PointHistoryEntry,
    PointReason, SettlementLogEntry, UserId, UserStatsView,
};
use super::repository::{
    AccountStore, ContentStore, EngagementCountsUpdate, HistoryStore, RepositoryError,
    SettlementLogStore,
};
use super::scoring::EngagementScorer;

/// Error raised by ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("a scoring pass is already running")]
    PassInProgress,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome summary of one scoring pass, also persisted to the audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct ScoringSummary {
    pub processed_items: usize,
    pub rescored_items: usize,
    pub skipped_items: usize,
    pub total_delta: i64,
    pub affected_users: usize,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Result of a manual review decision.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum ReviewOutcome {
    Approved { delta: i64, points_awarded: i64 },
    Rejected,
}

/// Maintains per-content and per-user point balances with idempotent deltas.
///
/// The ledger is the sole writer of `ContentItem::points_awarded`,
/// `ContentItem::last_scored_at`, and the point history; user balances are
/// only ever incremented here and decremented by the settlement processor
/// through the shared [`AccountStore`] primitives.
pub struct PointLedger<C, U, H, L> {
    content: Arc<C>,
    accounts: Arc<U>,
    history: Arc<H>,
    logs: Arc<L>,
    scorer: EngagementScorer,
    rescore_interval: Duration,
    pass_lock: Mutex<()>,
}

impl<C, U, H, L> PointLedger<C, U, H, L>
where
    C: ContentStore,
    U: AccountStore,
    H: HistoryStore,
    L: SettlementLogStore,
{
    pub fn new(
        content: Arc<C>,
        accounts: Arc<U>,
        history: Arc<H>,
        logs: Arc<L>,
        scorer: EngagementScorer,
        rescore_interval: Duration,
    ) -> Self {
        Self {
            content,
            accounts,
            history,
            logs,
            scorer,
            rescore_interval,
            pass_lock: Mutex::new(()),
        }
    }

    /// Rescore every item that is due and apply the resulting deltas.
    ///
    /// Per-item failures are logged and skipped; they never abort the batch.
    /// Two overlapping passes are rejected rather than queued.
    pub fn run_scoring_pass(&self, now: DateTime<Utc>) -> Result<ScoringSummary, LedgerError> {
        let _guard = self
            .pass_lock
            .try_lock()
            .map_err(|_| LedgerError::PassInProgress)?;

        let due = self.content.due(now, self.rescore_interval)?;
        debug!(items = due.len(), "scoring pass selected due items");

        let mut rescored = 0usize;
        let mut skipped = 0usize;
        let mut total_delta = 0i64;
        let mut affected: HashSet<UserId> = HashSet::new();

        for item in &due {
            match self.apply_score(item, now) {
                Ok(0) => {}
                Ok(delta) => {
                    rescored += 1;
                    total_delta += delta;
                    affected.insert(item.author.clone());
                }
                Err(err) => {
                    skipped += 1;
                    warn!(content = %item.id.0, error = %err, "skipping item in scoring pass");
                }
            }
        }

        let summary = ScoringSummary {
            processed_items: due.len(),
            rescored_items: rescored,
            skipped_items: skipped,
            total_delta,
            affected_users: affected.len(),
            started_at: now,
            completed_at: Utc::now(),
        };

        let status = if skipped > 0 {
            CycleStatus::CompletedWithErrors
        } else {
            CycleStatus::Completed
        };
        self.logs.append(SettlementLogEntry {
            kind: CycleKind::Scoring,
            status,
            message: format!(
                "Scored {} items, awarded {} points across {} users",
                summary.processed_items, summary.total_delta, summary.affected_users
            ),
            metrics: json!({
                "processed_items": summary.processed_items,
                "rescored_items": summary.rescored_items,
                "skipped_items": summary.skipped_items,
                "total_delta": summary.total_delta,
                "affected_users": summary.affected_users,
            }),
            started_at: summary.started_at,
            completed_at: summary.completed_at,
        })?;

        Ok(summary)
    }

    /// Apply one scoring result to one item and return the signed delta.
    ///
    /// A zero delta only refreshes `last_scored_at`; that touch is what makes
    /// repeated passes idempotent. Nonzero deltas commit in write-ahead
    /// order: item state, then the history entry, then the balance
    /// increment, so a crash after the history write is recoverable by
    /// replaying balances from history.
    fn apply_score(&self, item: &ContentItem, now: DateTime<Utc>) -> Result<i64, RepositoryError> {
        let age = now - item.created_at;
        let new_points = self.scorer.score(&item.counts, age);
        let delta = new_points - item.points_awarded;

        if delta == 0 {
            self.content.touch(&item.id, now)?;
            return Ok(0);
        }

        self.content
            .record_score(&item.id, EngagementCountsUpdate::Keep, new_points, now)?;
        self.history.append(PointHistoryEntry {
            user: item.author.clone(),
            content: Some(item.id.clone()),
            delta,
            reason: PointReason::EngagementUpdate,
            description: format!("Engagement update: {}", item.counts.describe()),
            recorded_at: now,
        })?;
        self.accounts.add_points(&item.author, delta)?;

        Ok(delta)
    }

    /// Manual review: an operator supplies corrected engagement counts and an
    /// approval decision. Approval flows through the same delta pipeline as
    /// automatic scoring, tagged `manual_review`; rejection deletes the item
    /// outright with no ledger writes, since it was never counted.
    pub fn review(
        &self,
        content_id: &ContentId,
        counts: EngagementCounts,
        approved: bool,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, LedgerError> {
        let item = self
            .content
            .fetch(content_id)?
            .ok_or(RepositoryError::NotFound)?;

        if !approved {
            self.content.delete(content_id)?;
            return Ok(ReviewOutcome::Rejected);
        }

        let age = now - item.created_at;
        let new_points = self.scorer.score(&counts, age);
        let delta = new_points - item.points_awarded;

        if delta == 0 {
            self.content.touch(content_id, now)?;
            return Ok(ReviewOutcome::Approved {
                delta: 0,
                points_awarded: new_points,
            });
        }

        self.content.record_score(
            content_id,
            EngagementCountsUpdate::Replace(counts),
            new_points,
            now,
        )?;
        self.history.append(PointHistoryEntry {
            user: item.author.clone(),
            content: Some(content_id.clone()),
            delta,
            reason: PointReason::ManualReview,
            description: format!("Manual review: {}", counts.describe()),
            recorded_at: now,
        })?;
        self.accounts.add_points(&item.author, delta)?;

        Ok(ReviewOutcome::Approved {
            delta,
            points_awarded: new_points,
        })
    }

    /// Items awaiting operator attention, for the admin layer.
    pub fn pending_review(&self, limit: usize) -> Result<Vec<ContentItem>, LedgerError> {
        Ok(self.content.pending_review(limit)?)
    }

    pub fn history_for(&self, user: &UserId) -> Result<Vec<PointHistoryEntry>, LedgerError> {
        Ok(self.history.for_user(user)?)
    }

    /// Dashboard numbers for one user, including rank by current balance.
    pub fn user_stats(&self, user: &UserId) -> Result<UserStatsView, LedgerError> {
        let account = self
            .accounts
            .fetch(user)?
            .ok_or(RepositoryError::NotFound)?;
        let tracked_items = self.content.count_for_author(user)?;
        let users_above = self
            .accounts
            .all()?
            .iter()
            .filter(|other| other.total_points > account.total_points)
            .count();

        Ok(UserStatsView {
            user_id: account.id,
            total_points: account.total_points,
            total_settled: account.total_settled,
            tracked_items,
            rank: users_above + 1,
        })
    }
}
