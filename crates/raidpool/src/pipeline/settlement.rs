use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use tracing::{info, warn};

use super::domain::{
    CycleKind, CycleStatus, PayoutId, PayoutRecord, PayoutStatus, SettlementLogEntry,
};
use super::pool::{Allocation, PoolError, RewardPool};
use super::repository::{
    AccountStore, DispatchRequest, PaymentDispatcher, PayoutStore, RepositoryError,
    SettlementLogStore,
};

/// Fixed-pool settlement parameters. The pool size is configuration; the
/// funding wallet balance is never consulted to size it.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementConfig {
    pub pool: Decimal,
    pub fee_percent: Decimal,
    /// Reserved recipient of the aggregated fee cut.
    pub fee_destination: String,
    /// Length of the settlement period recorded on payout records.
    pub period: Duration,
    /// Upper bound on any single dispatch attempt.
    pub dispatch_timeout: StdDuration,
}

/// Error raised by the settlement processor.
#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("a settlement cycle is already running")]
    CycleInProgress,
    #[error(transparent)]
    Invariant(#[from] PoolError),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome summary of one settlement cycle. The manual trigger returns the
/// same structure an automatic cycle logs.
#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub status: CycleStatus,
    pub eligible_users: usize,
    pub completed: usize,
    pub failed: usize,
    pub total_paid: Decimal,
    pub total_fees: Decimal,
    pub fee_dispatched: bool,
    pub period_start: DateTime<Utc>,
    pub period_end: DateTime<Utc>,
}

static PAYOUT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_payout_id() -> PayoutId {
    let id = PAYOUT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    PayoutId(format!("payout-{id:06}"))
}

/// Orchestrates one settlement cycle: snapshot eligible users, split the
/// pool, drive each payout record through `PROCESSING -> COMPLETED | FAILED`,
/// and commit ledger resets only for confirmed successes.
///
/// A dispatch is attempted exactly once per allocation per cycle; the next
/// scheduled cycle, operating on the still-intact balance, is the retry
/// mechanism for failures.
pub struct SettlementProcessor<U, P, L, D> {
    accounts: Arc<U>,
    payouts: Arc<P>,
    logs: Arc<L>,
    dispatcher: Arc<D>,
    config: SettlementConfig,
    cycle_lock: Mutex<()>,
}

impl<U, P, L, D> SettlementProcessor<U, P, L, D>
where
    U: AccountStore,
    P: PayoutStore,
    L: SettlementLogStore,
    D: PaymentDispatcher,
{
    pub fn new(
        accounts: Arc<U>,
        payouts: Arc<P>,
        logs: Arc<L>,
        dispatcher: Arc<D>,
        config: SettlementConfig,
    ) -> Self {
        Self {
            accounts,
            payouts,
            logs,
            dispatcher,
            config,
            cycle_lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &SettlementConfig {
        &self.config
    }

    /// Execute one settlement cycle. Overlapping invocations are rejected so
    /// a snapshot can never be settled twice.
    pub fn run_cycle(&self, now: DateTime<Utc>) -> Result<CycleSummary, SettlementError> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| SettlementError::CycleInProgress)?;

        let period_start = now - self.config.period;
        let period_end = now;
        let pool = RewardPool::new(self.config.pool, self.config.fee_percent);

        // Invariant violations abort before any payout record exists.
        if let Err(violation) = pool.validate() {
            self.logs.append(SettlementLogEntry {
                kind: CycleKind::Settlement,
                status: CycleStatus::Failed,
                message: violation.to_string(),
                metrics: json!({ "eligible_users": 0 }),
                started_at: now,
                completed_at: Utc::now(),
            })?;
            return Err(violation.into());
        }

        let snapshot = self.accounts.eligible()?;
        let allocations = pool.split(&snapshot)?;

        if allocations.is_empty() {
            let summary = CycleSummary {
                status: CycleStatus::Noop,
                eligible_users: 0,
                completed: 0,
                failed: 0,
                total_paid: Decimal::ZERO,
                total_fees: Decimal::ZERO,
                fee_dispatched: false,
                period_start,
                period_end,
            };
            self.log_cycle(&summary, "No users eligible for payout", now)?;
            return Ok(summary);
        }

        info!(allocations = allocations.len(), "processing settlement cycle");

        let mut completed = 0usize;
        let mut failed = 0usize;
        let mut total_paid = Decimal::ZERO;
        let mut total_fees = Decimal::ZERO;
        let pool_points: i64 = allocations.iter().map(|a| a.points).sum();

        for allocation in &allocations {
            match self.settle_allocation(allocation, pool_points, period_start, period_end, now) {
                Ok(true) => {
                    completed += 1;
                    total_paid += allocation.amount;
                    total_fees += allocation.fee;
                }
                Ok(false) => failed += 1,
                Err(err) => {
                    // Per-user store failures never abort the batch.
                    failed += 1;
                    warn!(user = %allocation.user.0, error = %err, "payout aborted by store error");
                }
            }
        }

        // One aggregated fee transfer; its outcome never alters user payout
        // statuses.
        let fee_dispatched = if total_fees > Decimal::ZERO {
            match self.dispatcher.dispatch(&DispatchRequest {
                destination: self.config.fee_destination.clone(),
                amount: total_fees,
                timeout: self.config.dispatch_timeout,
            }) {
                Ok(receipt) => {
                    info!(amount = %total_fees, reference = %receipt.reference, "fee transfer confirmed");
                    true
                }
                Err(err) => {
                    warn!(amount = %total_fees, error = %err, "fee transfer failed");
                    false
                }
            }
        } else {
            false
        };

        let summary = CycleSummary {
            status: if failed > 0 {
                CycleStatus::CompletedWithErrors
            } else {
                CycleStatus::Completed
            },
            eligible_users: allocations.len(),
            completed,
            failed,
            total_paid,
            total_fees,
            fee_dispatched,
            period_start,
            period_end,
        };

        let message = format!(
            "Processed {} payouts, {} successful, {} failed",
            completed + failed,
            completed,
            failed
        );
        self.log_cycle(&summary, &message, now)?;

        Ok(summary)
    }

    /// Drive one allocation through the payout state machine. Returns
    /// `Ok(true)` on a confirmed transfer, `Ok(false)` when the dispatch
    /// failed and the record was marked FAILED.
    fn settle_allocation(
        &self,
        allocation: &Allocation,
        pool_points: i64,
        period_start: DateTime<Utc>,
        period_end: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let record = self.payouts.insert(PayoutRecord {
            id: next_payout_id(),
            user: allocation.user.clone(),
            amount: allocation.amount,
            fee: allocation.fee,
            status: PayoutStatus::Processing,
            period_start,
            period_end,
            user_points: allocation.points,
            pool_points,
            tx_reference: None,
            created_at: now,
            processed_at: None,
        })?;

        let dispatch = self.dispatcher.dispatch(&DispatchRequest {
            destination: allocation.destination.clone(),
            amount: allocation.amount,
            timeout: self.config.dispatch_timeout,
        });

        match dispatch {
            Ok(receipt) => {
                self.payouts.mark(
                    &record.id,
                    PayoutStatus::Completed,
                    Some(receipt.reference.clone()),
                    Utc::now(),
                )?;
                // Reset is scoped to this user's own confirmed outcome; a
                // failed neighbor keeps its balance for the next cycle.
                self.accounts.commit_settlement(
                    &allocation.user,
                    allocation.amount,
                    allocation.points,
                )?;
                info!(
                    user = %allocation.user.0,
                    amount = %allocation.amount,
                    reference = %receipt.reference,
                    "payout completed"
                );
                Ok(true)
            }
            Err(err) => {
                self.payouts
                    .mark(&record.id, PayoutStatus::Failed, None, Utc::now())?;
                warn!(user = %allocation.user.0, error = %err, "payout failed");
                Ok(false)
            }
        }
    }

    fn log_cycle(
        &self,
        summary: &CycleSummary,
        message: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        self.logs.append(SettlementLogEntry {
            kind: CycleKind::Settlement,
            status: summary.status,
            message: message.to_string(),
            metrics: json!({
                "eligible_users": summary.eligible_users,
                "completed": summary.completed,
                "failed": summary.failed,
                "total_paid": summary.total_paid,
                "total_fees": summary.total_fees,
                "fee_dispatched": summary.fee_dispatched,
            }),
            started_at,
            completed_at: Utc::now(),
        })
    }
}
