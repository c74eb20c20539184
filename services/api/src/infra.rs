use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use raidpool::config::PipelineConfig;
use raidpool::pipeline::memory::{
    InMemoryAccountStore, InMemoryContentStore, InMemoryHistoryStore, InMemoryPayoutStore,
    InMemorySettlementLogStore,
};
use raidpool::pipeline::{
    BalanceProbe, DispatchError, DispatchReceipt, DispatchRequest, EngagementScorer,
    PaymentDispatcher, PipelineState, PointLedger, SettlementProcessor,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Payment dispatcher standing in for the on-chain transport. Transfers
/// succeed with a synthetic reference unless the destination is scripted to
/// fail, which the demo uses to show partial-failure handling.
#[derive(Default)]
pub(crate) struct SimulatedDispatcher {
    failing: Mutex<HashSet<String>>,
    sequence: AtomicU64,
}

impl SimulatedDispatcher {
    pub(crate) fn fail_destination(&self, destination: &str) {
        self.failing
            .lock()
            .expect("dispatcher mutex poisoned")
            .insert(destination.to_string());
    }
}

impl PaymentDispatcher for SimulatedDispatcher {
    fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReceipt, DispatchError> {
        if request.destination.is_empty() {
            return Err(DispatchError::Rejected(
                "destination address missing".to_string(),
            ));
        }
        if self
            .failing
            .lock()
            .expect("dispatcher mutex poisoned")
            .contains(&request.destination)
        {
            return Err(DispatchError::Transport(
                "simulated transport outage".to_string(),
            ));
        }
        let id = self.sequence.fetch_add(1, Ordering::Relaxed);
        Ok(DispatchReceipt {
            reference: format!("sim-{id:08x}"),
        })
    }
}

/// Fixed-balance probe for operational status reporting.
pub(crate) struct SimulatedBalanceProbe {
    pub(crate) balance: Decimal,
}

impl BalanceProbe for SimulatedBalanceProbe {
    fn available(&self) -> Result<Decimal, DispatchError> {
        Ok(self.balance)
    }
}

pub(crate) type ApiPipelineState = PipelineState<
    InMemoryContentStore,
    InMemoryAccountStore,
    InMemoryHistoryStore,
    InMemoryPayoutStore,
    InMemorySettlementLogStore,
    SimulatedDispatcher,
    SimulatedBalanceProbe,
>;

pub(crate) struct PipelineHandles {
    pub(crate) state: Arc<ApiPipelineState>,
    pub(crate) content: Arc<InMemoryContentStore>,
    pub(crate) accounts: Arc<InMemoryAccountStore>,
    pub(crate) dispatcher: Arc<SimulatedDispatcher>,
}

/// Wire the pipeline against in-memory stores and the simulated transport.
pub(crate) fn build_pipeline(config: &PipelineConfig) -> PipelineHandles {
    let content = Arc::new(InMemoryContentStore::default());
    let accounts = Arc::new(InMemoryAccountStore::default());
    let history = Arc::new(InMemoryHistoryStore::default());
    let payouts = Arc::new(InMemoryPayoutStore::default());
    let logs = Arc::new(InMemorySettlementLogStore::default());
    let dispatcher = Arc::new(SimulatedDispatcher::default());

    let ledger = Arc::new(PointLedger::new(
        content.clone(),
        accounts.clone(),
        history.clone(),
        logs.clone(),
        EngagementScorer::new(config.scoring.clone()),
        config.rescore_interval,
    ));
    let processor = Arc::new(SettlementProcessor::new(
        accounts.clone(),
        payouts.clone(),
        logs.clone(),
        dispatcher.clone(),
        config.settlement.clone(),
    ));

    let state = Arc::new(PipelineState {
        ledger,
        processor,
        payouts,
        logs,
        probe: Arc::new(SimulatedBalanceProbe {
            balance: config.settlement.pool * Decimal::from(10),
        }),
    });

    PipelineHandles {
        state,
        content,
        accounts,
        dispatcher,
    }
}
