//! Integration specifications for the engagement-to-payout pipeline.
//!
//! Scenarios exercise the public service facades and HTTP router end to end:
//! counters flow through the scorer into the ledger, balances settle into
//! payout records, and the audit trail captures every cycle.

mod common {
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::{Arc, Mutex};

    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    use raidpool::pipeline::memory::{
        InMemoryAccountStore, InMemoryContentStore, InMemoryHistoryStore, InMemoryPayoutStore,
        InMemorySettlementLogStore,
    };
    use raidpool::pipeline::{
        AccountStore, BalanceProbe, ContentId, ContentItem, ContentStore, DispatchError,
        DispatchReceipt, DispatchRequest, EngagementCounts, EngagementScorer, PaymentDispatcher,
        PipelineState, PointLedger, ScoringConfig, SettlementConfig, SettlementProcessor,
        UserAccount, UserId,
    };

    pub(super) fn epoch() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0)
            .single()
            .expect("valid timestamp")
    }

    /// Dispatcher succeeding everywhere except scripted destinations.
    #[derive(Default)]
    pub(super) struct FakeDispatcher {
        failing: Mutex<HashSet<String>>,
        sequence: AtomicU64,
    }

    impl FakeDispatcher {
        pub(super) fn fail(&self, destination: &str) {
            self.failing
                .lock()
                .expect("dispatcher lock")
                .insert(destination.to_string());
        }
    }

    impl PaymentDispatcher for FakeDispatcher {
        fn dispatch(&self, request: &DispatchRequest) -> Result<DispatchReceipt, DispatchError> {
            if self
                .failing
                .lock()
                .expect("dispatcher lock")
                .contains(&request.destination)
            {
                return Err(DispatchError::Transport("connection refused".to_string()));
            }
            let id = self.sequence.fetch_add(1, Ordering::Relaxed);
            Ok(DispatchReceipt {
                reference: format!("sig-{id:05}"),
            })
        }
    }

    pub(super) struct StaticProbe;

    impl BalanceProbe for StaticProbe {
        fn available(&self) -> Result<Decimal, DispatchError> {
            Ok(dec!(500))
        }
    }

    pub(super) struct Pipeline {
        pub content: Arc<InMemoryContentStore>,
        pub accounts: Arc<InMemoryAccountStore>,
        pub payouts: Arc<InMemoryPayoutStore>,
        pub dispatcher: Arc<FakeDispatcher>,
        pub state: Arc<
            PipelineState<
                InMemoryContentStore,
                InMemoryAccountStore,
                InMemoryHistoryStore,
                InMemoryPayoutStore,
                InMemorySettlementLogStore,
                FakeDispatcher,
                StaticProbe,
            >,
        >,
    }

    pub(super) fn build_pipeline(pool: Decimal, fee_percent: Decimal) -> Pipeline {
        let content = Arc::new(InMemoryContentStore::default());
        let accounts = Arc::new(InMemoryAccountStore::default());
        let history = Arc::new(InMemoryHistoryStore::default());
        let payouts = Arc::new(InMemoryPayoutStore::default());
        let logs = Arc::new(InMemorySettlementLogStore::default());
        let dispatcher = Arc::new(FakeDispatcher::default());

        let scorer = EngagementScorer::new(ScoringConfig {
            decay_window: Duration::zero(),
            ..ScoringConfig::default()
        });
        let ledger = Arc::new(PointLedger::new(
            content.clone(),
            accounts.clone(),
            history.clone(),
            logs.clone(),
            scorer,
            Duration::minutes(10),
        ));
        let processor = Arc::new(SettlementProcessor::new(
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
        ));

        let state = Arc::new(PipelineState {
            ledger,
            processor,
            payouts: payouts.clone(),
            logs,
            probe: Arc::new(StaticProbe),
        });

        Pipeline {
            content,
            accounts,
            payouts,
            dispatcher,
            state,
        }
    }

    pub(super) fn seed_user(pipeline: &Pipeline, id: &str, destination: Option<&str>) {
        pipeline
            .accounts
            .upsert(UserAccount::new(
                UserId(id.to_string()),
                format!("@{id}"),
                destination.map(str::to_string),
            ))
            .expect("seed user");
    }

    pub(super) fn seed_post(
        pipeline: &Pipeline,
        id: &str,
        author: &str,
        likes: u32,
        reposts: u32,
        replies: u32,
        quotes: u32,
    ) {
        pipeline
            .content
            .insert(ContentItem::new(
                ContentId(id.to_string()),
                UserId(author.to_string()),
                EngagementCounts {
                    likes,
                    reposts,
                    replies,
                    quotes,
                },
                epoch() - Duration::hours(2),
            ))
            .expect("seed post");
    }
}

mod pipeline {
    use super::common::*;
    use raidpool::pipeline::{AccountStore, CycleStatus, PayoutStatus, PayoutStore, UserId};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    #[test]
    fn counters_flow_from_scorer_to_settled_payouts() {
        let pipeline = build_pipeline(dec!(100), dec!(5));
        seed_user(&pipeline, "alice", Some("wallet-a"));
        seed_user(&pipeline, "bob", Some("wallet-b"));
        // 300 = 100*1 + 50*3 + 25*2; 700 = 400*1 + 60*3 + 60*2
        seed_post(&pipeline, "post-a", "alice", 100, 50, 25, 0);
        seed_post(&pipeline, "post-b", "bob", 400, 60, 60, 0);

        let scoring = pipeline
            .state
            .ledger
            .run_scoring_pass(epoch())
            .expect("scoring pass");
        assert_eq!(scoring.total_delta, 1000);

        let summary = pipeline
            .state
            .processor
            .run_cycle(epoch())
            .expect("settlement cycle");

        assert_eq!(summary.status, CycleStatus::Completed);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.total_paid, dec!(95));
        assert_eq!(summary.total_fees, dec!(5));

        let alice = pipeline
            .accounts
            .fetch(&UserId("alice".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(alice.total_points, 0);
        assert_eq!(alice.total_settled, dec!(28.5));

        let bob = pipeline
            .accounts
            .fetch(&UserId("bob".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(bob.total_settled, dec!(66.5));
    }

    #[test]
    fn partial_failure_preserves_unpaid_balances() {
        let pipeline = build_pipeline(dec!(100), dec!(5));
        seed_user(&pipeline, "alice", Some("wallet-a"));
        seed_user(&pipeline, "bob", Some("wallet-b"));
        seed_post(&pipeline, "post-a", "alice", 300, 0, 0, 0);
        seed_post(&pipeline, "post-b", "bob", 700, 0, 0, 0);
        pipeline.dispatcher.fail("wallet-b");

        pipeline
            .state
            .ledger
            .run_scoring_pass(epoch())
            .expect("scoring pass");
        let summary = pipeline
            .state
            .processor
            .run_cycle(epoch())
            .expect("settlement cycle");

        assert_eq!(summary.status, CycleStatus::CompletedWithErrors);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.failed, 1);

        let bob = pipeline
            .accounts
            .fetch(&UserId("bob".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(bob.total_points, 700);
        assert_eq!(bob.total_settled, Decimal::ZERO);

        let records = pipeline
            .payouts
            .for_user(&UserId("bob".to_string()), 10)
            .expect("payouts");
        assert_eq!(records[0].status, PayoutStatus::Failed);
    }

    #[test]
    fn settled_users_drop_out_until_new_engagement_arrives() {
        let pipeline = build_pipeline(dec!(10), dec!(0));
        seed_user(&pipeline, "alice", Some("wallet-a"));
        seed_post(&pipeline, "post-a", "alice", 10, 0, 0, 0);

        pipeline
            .state
            .ledger
            .run_scoring_pass(epoch())
            .expect("scoring pass");
        pipeline
            .state
            .processor
            .run_cycle(epoch())
            .expect("first cycle");

        let second = pipeline
            .state
            .processor
            .run_cycle(epoch() + chrono::Duration::minutes(10))
            .expect("second cycle");
        assert_eq!(second.status, CycleStatus::Noop);
    }
}

mod routes {
    use super::common::*;
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use raidpool::pipeline::{pipeline_router, AccountStore, UserId};
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    #[tokio::test]
    async fn settle_endpoint_returns_cycle_summary() {
        let pipeline = build_pipeline(dec!(100), dec!(5));
        seed_user(&pipeline, "alice", Some("wallet-a"));
        seed_post(&pipeline, "post-a", "alice", 20, 0, 0, 0);
        pipeline
            .state
            .ledger
            .run_scoring_pass(epoch())
            .expect("scoring pass");

        let router = pipeline_router(pipeline.state.clone());
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/pipeline/settle")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("status"), Some(&json!("completed")));
        assert_eq!(payload.get("completed"), Some(&json!(1)));
    }

    #[tokio::test]
    async fn payout_history_is_exposed_per_user() {
        let pipeline = build_pipeline(dec!(100), dec!(0));
        seed_user(&pipeline, "alice", Some("wallet-a"));
        seed_post(&pipeline, "post-a", "alice", 20, 0, 0, 0);
        pipeline
            .state
            .ledger
            .run_scoring_pass(epoch())
            .expect("scoring pass");
        pipeline
            .state
            .processor
            .run_cycle(epoch())
            .expect("settlement cycle");

        let router = pipeline_router(pipeline.state.clone());
        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/users/alice/payouts")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        let records = payload.as_array().expect("array of payouts");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get("status"), Some(&json!("COMPLETED")));
        assert!(records[0].get("tx_reference").is_some());
    }

    #[tokio::test]
    async fn review_endpoint_applies_operator_counts() {
        let pipeline = build_pipeline(dec!(100), dec!(5));
        seed_user(&pipeline, "alice", Some("wallet-a"));
        seed_post(&pipeline, "post-a", "alice", 0, 0, 0, 0);

        let router = pipeline_router(pipeline.state.clone());
        let response = router
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/review/post-a")
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::to_vec(&json!({
                            "likes": 10,
                            "reposts": 2,
                            "replies": 1,
                            "approved": true,
                        }))
                        .expect("serialize"),
                    ))
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("outcome"), Some(&json!("approved")));
        assert_eq!(payload.get("points_awarded"), Some(&json!(18)));

        let alice = pipeline
            .accounts
            .fetch(&UserId("alice".to_string()))
            .expect("fetch")
            .expect("present");
        assert_eq!(alice.total_points, 18);
    }

    #[tokio::test]
    async fn stats_endpoint_reports_totals_by_status() {
        let pipeline = build_pipeline(dec!(100), dec!(5));
        seed_user(&pipeline, "alice", Some("wallet-a"));
        seed_post(&pipeline, "post-a", "alice", 20, 0, 0, 0);
        pipeline
            .state
            .ledger
            .run_scoring_pass(epoch())
            .expect("scoring pass");
        pipeline
            .state
            .processor
            .run_cycle(epoch())
            .expect("settlement cycle");

        let router = pipeline_router(pipeline.state.clone());
        let response = router
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/api/v1/settlement/stats")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("router dispatch");

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("body");
        let payload: Value = serde_json::from_slice(&body).expect("json");
        assert_eq!(payload.get("total_payouts"), Some(&json!(1)));
        assert_eq!(payload.get("completed"), Some(&json!(1)));
        assert_eq!(payload.get("failed"), Some(&json!(0)));
    }
}
