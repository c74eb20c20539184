//! In-memory store implementations backing tests, the demo command, and
//! single-node deployments. Each store serializes access behind one mutex,
//! which is what gives `add_points` and `commit_settlement` their required
//! atomicity with respect to each other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;

use super::domain::{
    ContentId, ContentItem, PayoutId, PayoutRecord, PayoutStatus, PointHistoryEntry,
    SettlementLogEntry, SettlementStats, UserAccount, UserId,
};
use super::repository::{
    AccountStore, ContentStore, EngagementCountsUpdate, HistoryStore, PayoutStore,
    RepositoryError, SettlementLogStore,
};

#[derive(Default, Clone)]
pub struct InMemoryContentStore {
    items: Arc<Mutex<HashMap<ContentId, ContentItem>>>,
}

impl ContentStore for InMemoryContentStore {
    fn insert(&self, item: ContentItem) -> Result<ContentItem, RepositoryError> {
        let mut guard = self.items.lock().expect("content mutex poisoned");
        if guard.contains_key(&item.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.insert(item.id.clone(), item.clone());
        Ok(item)
    }

    fn fetch(&self, id: &ContentId) -> Result<Option<ContentItem>, RepositoryError> {
        let guard = self.items.lock().expect("content mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn due(
        &self,
        now: DateTime<Utc>,
        rescore_interval: Duration,
    ) -> Result<Vec<ContentItem>, RepositoryError> {
        let cutoff = now - rescore_interval;
        let guard = self.items.lock().expect("content mutex poisoned");
        Ok(guard
            .values()
            .filter(|item| match item.last_scored_at {
                None => true,
                Some(scored_at) => scored_at < cutoff,
            })
            .cloned()
            .collect())
    }

    fn pending_review(&self, limit: usize) -> Result<Vec<ContentItem>, RepositoryError> {
        let guard = self.items.lock().expect("content mutex poisoned");
        let mut pending: Vec<ContentItem> = guard
            .values()
            .filter(|item| item.points_awarded == 0 || item.last_scored_at.is_none())
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        pending.truncate(limit);
        Ok(pending)
    }

    fn record_score(
        &self,
        id: &ContentId,
        counts: EngagementCountsUpdate,
        points: i64,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.items.lock().expect("content mutex poisoned");
        let item = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        if let EngagementCountsUpdate::Replace(new_counts) = counts {
            item.counts = new_counts;
        }
        item.points_awarded = points;
        item.last_scored_at = Some(at);
        Ok(())
    }

    fn touch(&self, id: &ContentId, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        let mut guard = self.items.lock().expect("content mutex poisoned");
        let item = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        item.last_scored_at = Some(at);
        Ok(())
    }

    fn delete(&self, id: &ContentId) -> Result<(), RepositoryError> {
        let mut guard = self.items.lock().expect("content mutex poisoned");
        guard.remove(id).ok_or(RepositoryError::NotFound)?;
        Ok(())
    }

    fn count_for_author(&self, author: &UserId) -> Result<usize, RepositoryError> {
        let guard = self.items.lock().expect("content mutex poisoned");
        Ok(guard.values().filter(|item| &item.author == author).count())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryAccountStore {
    accounts: Arc<Mutex<HashMap<UserId, UserAccount>>>,
}

impl AccountStore for InMemoryAccountStore {
    fn upsert(&self, account: UserAccount) -> Result<(), RepositoryError> {
        let mut guard = self.accounts.lock().expect("account mutex poisoned");
        guard.insert(account.id.clone(), account);
        Ok(())
    }

    fn fetch(&self, id: &UserId) -> Result<Option<UserAccount>, RepositoryError> {
        let guard = self.accounts.lock().expect("account mutex poisoned");
        Ok(guard.get(id).cloned())
    }

    fn all(&self) -> Result<Vec<UserAccount>, RepositoryError> {
        let guard = self.accounts.lock().expect("account mutex poisoned");
        Ok(guard.values().cloned().collect())
    }

    fn eligible(&self) -> Result<Vec<UserAccount>, RepositoryError> {
        let guard = self.accounts.lock().expect("account mutex poisoned");
        Ok(guard
            .values()
            .filter(|account| account.is_eligible())
            .cloned()
            .collect())
    }

    fn add_points(&self, id: &UserId, delta: i64) -> Result<(), RepositoryError> {
        let mut guard = self.accounts.lock().expect("account mutex poisoned");
        let account = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        account.total_points = (account.total_points + delta).max(0);
        Ok(())
    }

    fn commit_settlement(
        &self,
        id: &UserId,
        amount: Decimal,
        points_snapshot: i64,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.accounts.lock().expect("account mutex poisoned");
        let account = guard.get_mut(id).ok_or(RepositoryError::NotFound)?;
        // Decrement by the settled snapshot rather than zeroing, so deltas
        // that landed between snapshot and commit survive.
        account.total_points = (account.total_points - points_snapshot).max(0);
        account.total_settled += amount;
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryHistoryStore {
    entries: Arc<Mutex<Vec<PointHistoryEntry>>>,
}

impl HistoryStore for InMemoryHistoryStore {
    fn append(&self, entry: PointHistoryEntry) -> Result<(), RepositoryError> {
        let mut guard = self.entries.lock().expect("history mutex poisoned");
        guard.push(entry);
        Ok(())
    }

    fn for_user(&self, user: &UserId) -> Result<Vec<PointHistoryEntry>, RepositoryError> {
        let guard = self.entries.lock().expect("history mutex poisoned");
        Ok(guard
            .iter()
            .filter(|entry| &entry.user == user)
            .cloned()
            .collect())
    }
}

#[derive(Default, Clone)]
pub struct InMemoryPayoutStore {
    records: Arc<Mutex<Vec<PayoutRecord>>>,
}

impl PayoutStore for InMemoryPayoutStore {
    fn insert(&self, record: PayoutRecord) -> Result<PayoutRecord, RepositoryError> {
        let mut guard = self.records.lock().expect("payout mutex poisoned");
        if guard.iter().any(|existing| existing.id == record.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.push(record.clone());
        Ok(record)
    }

    fn mark(
        &self,
        id: &PayoutId,
        status: PayoutStatus,
        tx_reference: Option<String>,
        at: DateTime<Utc>,
    ) -> Result<(), RepositoryError> {
        let mut guard = self.records.lock().expect("payout mutex poisoned");
        let record = guard
            .iter_mut()
            .find(|record| &record.id == id)
            .ok_or(RepositoryError::NotFound)?;
        record.status = status;
        record.tx_reference = tx_reference;
        record.processed_at = Some(at);
        Ok(())
    }

    fn for_user(
        &self,
        user: &UserId,
        limit: usize,
    ) -> Result<Vec<PayoutRecord>, RepositoryError> {
        let guard = self.records.lock().expect("payout mutex poisoned");
        let mut records: Vec<PayoutRecord> = guard
            .iter()
            .filter(|record| &record.user == user)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    fn stats(&self) -> Result<SettlementStats, RepositoryError> {
        let guard = self.records.lock().expect("payout mutex poisoned");
        let mut stats = SettlementStats::default();
        for record in guard.iter() {
            stats.total_payouts += 1;
            match record.status {
                PayoutStatus::Processing => stats.processing += 1,
                PayoutStatus::Completed => {
                    stats.completed += 1;
                    stats.total_paid += record.amount;
                    stats.total_fees += record.fee;
                }
                PayoutStatus::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }
}

#[derive(Default, Clone)]
pub struct InMemorySettlementLogStore {
    entries: Arc<Mutex<Vec<SettlementLogEntry>>>,
}

impl SettlementLogStore for InMemorySettlementLogStore {
    fn append(&self, entry: SettlementLogEntry) -> Result<(), RepositoryError> {
        let mut guard = self.entries.lock().expect("log mutex poisoned");
        guard.push(entry);
        Ok(())
    }

    fn recent(&self, limit: usize) -> Result<Vec<SettlementLogEntry>, RepositoryError> {
        let guard = self.entries.lock().expect("log mutex poisoned");
        let mut entries: Vec<SettlementLogEntry> = guard.iter().cloned().collect();
        entries.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        entries.truncate(limit);
        Ok(entries)
    }
}
