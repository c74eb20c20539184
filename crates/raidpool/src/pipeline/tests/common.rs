use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;

use crate::pipeline::domain::{ContentId, ContentItem, EngagementCounts, UserAccount, UserId};
use crate::pipeline::ledger::PointLedger;
use crate::pipeline::memory::{
    InMemoryAccountStore, InMemoryContentStore, InMemoryHistoryStore, InMemoryPayoutStore,
    InMemorySettlementLogStore,
};
use crate::pipeline::repository::{
    AccountStore, ContentStore, DispatchError, DispatchReceipt, DispatchRequest,
    PaymentDispatcher,
};
use crate::pipeline::scoring::{EngagementScorer, ScoringConfig};
use crate::pipeline::settlement::{SettlementConfig, SettlementProcessor};

pub(super) fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).single().expect("valid timestamp")
}

/// Scorer with decay disabled so rescoring identical counters is a no-op
/// regardless of elapsed time.
pub(super) fn flat_scorer() -> EngagementScorer {
    EngagementScorer::new(ScoringConfig {
        decay_window: Duration::zero(),
        ..ScoringConfig::default()
    })
}

pub(super) fn counts(likes: u32, reposts: u32, replies: u32, quotes: u32) -> EngagementCounts {
    EngagementCounts {
        likes,
        reposts,
        replies,
        quotes,
    }
}

pub(super) fn account(id: &str, points: i64, destination: Option<&str>) -> UserAccount {
    UserAccount {
        id: UserId(id.to_string()),
        handle: format!("@{id}"),
        destination: destination.map(str::to_string),
        total_points: points,
        total_settled: Decimal::ZERO,
    }
}

pub(super) fn item(id: &str, author: &str, c: EngagementCounts) -> ContentItem {
    ContentItem::new(
        ContentId(id.to_string()),
        UserId(author.to_string()),
        c,
        epoch() - Duration::hours(1),
    )
}

pub(super) struct LedgerFixture {
    pub content: Arc<InMemoryContentStore>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub history: Arc<InMemoryHistoryStore>,
    pub logs: Arc<InMemorySettlementLogStore>,
    pub ledger: PointLedger<
        InMemoryContentStore,
        InMemoryAccountStore,
        InMemoryHistoryStore,
        InMemorySettlementLogStore,
    >,
}

pub(super) fn ledger_fixture() -> LedgerFixture {
    let content = Arc::new(InMemoryContentStore::default());
    let accounts = Arc::new(InMemoryAccountStore::default());
    let history = Arc::new(InMemoryHistoryStore::default());
    let logs = Arc::new(InMemorySettlementLogStore::default());
    let ledger = PointLedger::new(
        content.clone(),
        accounts.clone(),
        history.clone(),
        logs.clone(),
        flat_scorer(),
        Duration::minutes(10),
    );
    LedgerFixture {
        content,
        accounts,
        history,
        logs,
        ledger,
    }
}

/// Dispatcher with scripted failures per destination. Every request is
/// recorded so tests can assert the single-attempt policy.
#[derive(Default)]
pub(super) struct ScriptedDispatcher {
    rejected: Mutex<HashSet<String>>,
    timed_out: Mutex<HashSet<String>>,
    requests: Mutex<Vec<DispatchRequest>>,
    sequence: AtomicU64,
}

impl ScriptedDispatcher {
    pub(super) fn reject(&self, destination: &str) {
        self.rejected
            .lock()
            .expect("dispatcher mutex poisoned")
            .insert(destination.to_string());
    }

    pub(super) fn time_out(&self, destination: &str) {
        self.timed_out
            .lock()
            .expect("dispatcher mutex poisoned")
            .insert(destination.to_string());
    }

    /// Forget scripted failures and recorded requests, as if the transport
    /// recovered between cycles.
    pub(super) fn reset(&self) {
        self.rejected
            .lock()
            .expect("dispatcher mutex poisoned")
            .clear();
        self.timed_out
            .lock()
            .expect("dispatcher mutex poisoned")
            .clear();
        self.requests
            .lock()
            .expect("dispatcher mutex poisoned")
            .clear();
    }

    pub(super) fn requests(&self) -> Vec<DispatchRequest> {
        self.requests
            .lock()
            .expect("dispatcher mutex poisoned")
            .clone()
    }
}

impl PaymentDispatcher for ScriptedDispatcher {
    fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReceipt, DispatchError> {
        self.requests
            .lock()
            .expect("dispatcher mutex poisoned")
            .push(request.clone());

        if self
            .timed_out
            .lock()
            .expect("dispatcher mutex poisoned")
            .contains(&request.destination)
        {
            return Err(DispatchError::Timeout);
        }
        if self
            .rejected
            .lock()
            .expect("dispatcher mutex poisoned")
            .contains(&request.destination)
        {
            return Err(DispatchError::Rejected("insufficient funds".to_string()));
        }

        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        Ok(DispatchReceipt {
            reference: format!("tx-{id:04}"),
        })
    }
}

pub(super) struct SettlementFixture {
    pub accounts: Arc<InMemoryAccountStore>,
    pub payouts: Arc<InMemoryPayoutStore>,
    pub logs: Arc<InMemorySettlementLogStore>,
    pub dispatcher: Arc<ScriptedDispatcher>,
    pub processor: SettlementProcessor<
        InMemoryAccountStore,
        InMemoryPayoutStore,
        InMemorySettlementLogStore,
        ScriptedDispatcher,
    >,
}

pub(super) fn settlement_fixture(pool: Decimal, fee_percent: Decimal) -> SettlementFixture {
    let accounts = Arc::new(InMemoryAccountStore::default());
    let payouts = Arc::new(InMemoryPayoutStore::default());
    let logs = Arc::new(InMemorySettlementLogStore::default());
    let dispatcher = Arc::new(ScriptedDispatcher::default());
    let processor = SettlementProcessor::new(
        accounts.clone(),
        payouts.clone(),
        logs.clone(),
        dispatcher.clone(),
        SettlementConfig {
            pool,
            fee_percent,
            fee_destination: "fee-wallet".to_string(),
            period: Duration::minutes(10),
            dispatch_timeout: std::time::Duration::from_secs(30),
        },
    );
    SettlementFixture {
        accounts,
        payouts,
        logs,
        dispatcher,
        processor,
    }
}

pub(super) fn seed_accounts(store: &InMemoryAccountStore, accounts: &[UserAccount]) {
    for account in accounts {
        store.upsert(account.clone()).expect("seed account");
    }
}

pub(super) fn seed_items(store: &InMemoryContentStore, items: &[ContentItem]) {
    for item in items {
        store.insert(item.clone()).expect("seed item");
    }
}
