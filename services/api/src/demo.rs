use crate::infra::build_pipeline;
use chrono::Utc;
use clap::Args;
use raidpool::config::AppConfig;
use raidpool::error::AppError;
use raidpool::pipeline::{
    AccountStore, ContentId, ContentItem, ContentStore, EngagementCounts, PayoutStore,
    RepositoryError, SettlementLogStore, UserAccount, UserId,
};
use rust_decimal::Decimal;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Override the configured reward pool size for the demo cycle.
    #[arg(long)]
    pub(crate) pool: Option<Decimal>,
    /// Override the configured fee percentage for the demo cycle.
    #[arg(long)]
    pub(crate) fee_percent: Option<Decimal>,
    /// Script a transport failure for the given destination to show how a
    /// failed payout preserves the balance for the next cycle.
    #[arg(long)]
    pub(crate) fail_destination: Option<String>,
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let DemoArgs {
        pool,
        fee_percent,
        fail_destination,
    } = args;

    let mut config = AppConfig::load()?;
    if let Some(pool) = pool {
        config.pipeline.settlement.pool = pool;
    }
    if let Some(fee_percent) = fee_percent {
        config.pipeline.settlement.fee_percent = fee_percent;
    }

    let handles = build_pipeline(&config.pipeline);
    let now = Utc::now();

    println!("Settlement pipeline demo");
    println!(
        "Reward pool: {} | fee: {}% -> {}",
        config.pipeline.settlement.pool,
        config.pipeline.settlement.fee_percent,
        config.pipeline.settlement.fee_destination
    );

    let participants = [
        ("alice", Some("wallet-alice")),
        ("bob", Some("wallet-bob")),
        ("carol", None),
    ];
    for (handle, destination) in participants {
        handles.accounts.upsert(UserAccount::new(
            UserId(handle.to_string()),
            handle,
            destination.map(str::to_string),
        ))?;
    }
    println!("\nSeeded {} participants (carol has no payout wallet)", participants.len());

    let posts = [
        ("post-1", "alice", 10, 2, 1, 0),
        ("post-2", "alice", 4, 0, 3, 1),
        ("post-3", "bob", 25, 8, 6, 2),
        ("post-4", "carol", 7, 1, 0, 0),
    ];
    for (id, author, likes, reposts, replies, quotes) in posts {
        handles.content.insert(ContentItem::new(
            ContentId(id.to_string()),
            UserId(author.to_string()),
            EngagementCounts {
                likes,
                reposts,
                replies,
                quotes,
            },
            now,
        ))?;
    }
    println!("Seeded {} tracked posts", posts.len());

    println!("\nScoring pass");
    let scoring = handles.state.ledger.run_scoring_pass(now)?;
    println!(
        "- {} items processed ({} rescored, {} skipped) | {} points awarded to {} users",
        scoring.processed_items,
        scoring.rescored_items,
        scoring.skipped_items,
        scoring.total_delta,
        scoring.affected_users
    );
    for (handle, _) in participants {
        let stats = handles.state.ledger.user_stats(&UserId(handle.to_string()))?;
        println!(
            "- {}: {} points across {} items (rank {})",
            handle, stats.total_points, stats.tracked_items, stats.rank
        );
    }

    if let Some(destination) = fail_destination {
        println!("\nScripting a transport failure for {destination}");
        handles.dispatcher.fail_destination(&destination);
    }

    println!("\nSettlement cycle");
    let cycle = handles.state.processor.run_cycle(now)?;
    println!(
        "- status {} | {} eligible, {} completed, {} failed",
        cycle.status.label(),
        cycle.eligible_users,
        cycle.completed,
        cycle.failed
    );
    println!(
        "- paid {} | fees {} (fee transfer dispatched: {})",
        cycle.total_paid, cycle.total_fees, cycle.fee_dispatched
    );

    for (handle, _) in participants {
        let user = UserId(handle.to_string());
        let records = handles.state.payouts.for_user(&user, 10)?;
        if records.is_empty() {
            println!("- {}: no payout this cycle", handle);
            continue;
        }
        for record in records {
            let reference = record.tx_reference.as_deref().unwrap_or("-");
            println!(
                "- {}: {} ({} of {} points) -> {} [{}]",
                handle,
                record.amount,
                record.user_points,
                record.pool_points,
                reference,
                record.status.label()
            );
        }
        let account = handles
            .accounts
            .fetch(&user)?
            .ok_or(AppError::Repository(RepositoryError::NotFound))?;
        println!(
            "  balance after cycle: {} points | {} settled all-time",
            account.total_points, account.total_settled
        );
    }

    println!("\nAudit trail");
    for entry in handles.state.logs.recent(10)? {
        println!(
            "- [{}] {}: {}",
            entry.kind.label(),
            entry.status.label(),
            entry.message
        );
    }

    Ok(())
}
