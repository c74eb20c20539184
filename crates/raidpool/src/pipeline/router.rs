use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::domain::{ContentId, EngagementCounts, PayoutView, UserId};
use super::ledger::{LedgerError, PointLedger};
use super::repository::{
    AccountStore, BalanceProbe, ContentStore, HistoryStore, PaymentDispatcher, PayoutStore,
    RepositoryError, SettlementLogStore,
};
use super::settlement::{SettlementError, SettlementProcessor};

/// Shared handles for the HTTP surface consumed by the admin/UI layer.
pub struct PipelineState<C, U, H, P, L, D, B> {
    pub ledger: Arc<PointLedger<C, U, H, L>>,
    pub processor: Arc<SettlementProcessor<U, P, L, D>>,
    pub payouts: Arc<P>,
    pub logs: Arc<L>,
    pub probe: Arc<B>,
}

/// Router builder exposing scoring/settlement triggers and read access to
/// payout history, stats, and the audit trail.
pub fn pipeline_router<C, U, H, P, L, D, B>(
    state: Arc<PipelineState<C, U, H, P, L, D, B>>,
) -> Router
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    Router::new()
        .route(
            "/api/v1/pipeline/score",
            post(score_handler::<C, U, H, P, L, D, B>),
        )
        .route(
            "/api/v1/pipeline/settle",
            post(settle_handler::<C, U, H, P, L, D, B>),
        )
        .route(
            "/api/v1/users/:user_id/payouts",
            get(user_payouts_handler::<C, U, H, P, L, D, B>),
        )
        .route(
            "/api/v1/users/:user_id/stats",
            get(user_stats_handler::<C, U, H, P, L, D, B>),
        )
        .route(
            "/api/v1/settlement/stats",
            get(stats_handler::<C, U, H, P, L, D, B>),
        )
        .route(
            "/api/v1/settlement/status",
            get(status_handler::<C, U, H, P, L, D, B>),
        )
        .route(
            "/api/v1/settlement/logs",
            get(logs_handler::<C, U, H, P, L, D, B>),
        )
        .route(
            "/api/v1/review/pending",
            get(pending_review_handler::<C, U, H, P, L, D, B>),
        )
        .route(
            "/api/v1/review/:content_id",
            post(review_handler::<C, U, H, P, L, D, B>),
        )
        .with_state(state)
}

/// Manual trigger for one scoring pass.
async fn score_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    match state.ledger.run_scoring_pass(Utc::now()) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(LedgerError::PassInProgress) => {
            let payload = json!({ "error": "a scoring pass is already running" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

/// Manual trigger for one settlement cycle; returns the same summary an
/// automatic cycle would log.
async fn settle_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    match state.processor.run_cycle(Utc::now()) {
        Ok(summary) => (StatusCode::OK, axum::Json(summary)).into_response(),
        Err(SettlementError::CycleInProgress) => {
            let payload = json!({ "error": "a settlement cycle is already running" });
            (StatusCode::CONFLICT, axum::Json(payload)).into_response()
        }
        Err(SettlementError::Invariant(violation)) => {
            let payload = json!({ "error": violation.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

async fn user_payouts_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
    Path(user_id): Path<String>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    match state.payouts.for_user(&UserId(user_id), 10) {
        Ok(records) => {
            let views: Vec<PayoutView> = records.iter().map(|record| record.view()).collect();
            (StatusCode::OK, axum::Json(views)).into_response()
        }
        Err(err) => internal_error(err),
    }
}

async fn user_stats_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
    Path(user_id): Path<String>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    match state.ledger.user_stats(&UserId(user_id)) {
        Ok(view) => (StatusCode::OK, axum::Json(view)).into_response(),
        Err(LedgerError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({ "error": "user not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

async fn stats_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    match state.payouts.stats() {
        Ok(stats) => (StatusCode::OK, axum::Json(stats)).into_response(),
        Err(err) => internal_error(err),
    }
}

/// Operational status: configured pool parameters, funding wallet probe, and
/// aggregate payout counts. The probe result is informational; probe errors
/// are reported, not fatal.
async fn status_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    let config = state.processor.config();
    let (balance, balance_error) = match state.probe.available() {
        Ok(balance) => (Some(balance), None),
        Err(err) => (None, Some(err.to_string())),
    };
    let stats = match state.payouts.stats() {
        Ok(stats) => stats,
        Err(err) => return internal_error(err),
    };
    let recent = match state.logs.recent(5) {
        Ok(entries) => entries,
        Err(err) => return internal_error(err),
    };

    let payload = json!({
        "system": {
            "reward_pool": config.pool,
            "fee_percent": config.fee_percent,
            "fee_destination": config.fee_destination,
        },
        "wallet": {
            "balance": balance,
            "balance_error": balance_error,
        },
        "payouts": stats,
        "recent_logs": recent,
    });
    (StatusCode::OK, axum::Json(payload)).into_response()
}

async fn logs_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    match state.logs.recent(20) {
        Ok(entries) => (StatusCode::OK, axum::Json(entries)).into_response(),
        Err(err) => internal_error(err),
    }
}

async fn pending_review_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    match state.ledger.pending_review(50) {
        Ok(items) => (StatusCode::OK, axum::Json(items)).into_response(),
        Err(err) => internal_error(err),
    }
}

/// Operator decision on one tracked item.
#[derive(Debug, Deserialize)]
struct ReviewRequest {
    #[serde(default)]
    likes: u32,
    #[serde(default)]
    reposts: u32,
    #[serde(default)]
    replies: u32,
    #[serde(default)]
    quotes: u32,
    approved: bool,
}

async fn review_handler<C, U, H, P, L, D, B>(
    State(state): State<Arc<PipelineState<C, U, H, P, L, D, B>>>,
    Path(content_id): Path<String>,
    axum::Json(request): axum::Json<ReviewRequest>,
) -> Response
where
    C: ContentStore + 'static,
    U: AccountStore + 'static,
    H: HistoryStore + 'static,
    P: PayoutStore + 'static,
    L: SettlementLogStore + 'static,
    D: PaymentDispatcher + 'static,
    B: BalanceProbe + 'static,
{
    let counts = EngagementCounts {
        likes: request.likes,
        reposts: request.reposts,
        replies: request.replies,
        quotes: request.quotes,
    };
    match state.ledger.review(
        &ContentId(content_id),
        counts,
        request.approved,
        Utc::now(),
    ) {
        Ok(outcome) => (StatusCode::OK, axum::Json(outcome)).into_response(),
        Err(LedgerError::Repository(RepositoryError::NotFound)) => {
            let payload = json!({ "error": "content item not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(other) => internal_error(other),
    }
}

fn internal_error(err: impl std::fmt::Display) -> Response {
    let payload = json!({ "error": err.to_string() });
    (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
}
