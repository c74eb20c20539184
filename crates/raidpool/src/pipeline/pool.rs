use rust_decimal::Decimal;

use super::domain::{UserAccount, UserId};

/// Computed share of one settlement cycle for one eligible user. The fee is
/// attributed per user proportionally but dispatched as a single aggregated
/// transfer to the reserved recipient.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub user: UserId,
    pub destination: String,
    pub points: i64,
    pub amount: Decimal,
    pub fee: Decimal,
}

/// Invariant violations detected before any payout record is created. These
/// abort the whole cycle; they must never partially commit.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("reward pool must not be negative (got {0})")]
    NegativePool(Decimal),
    #[error("fee percent must lie within 0..=100 (got {0})")]
    FeeOutOfRange(Decimal),
}

/// Fixed reward pool split proportionally by point share, net of a
/// percentage fee. All arithmetic is decimal; rounding happens only at
/// output formatting, never between steps.
#[derive(Debug, Clone, PartialEq)]
pub struct RewardPool {
    pub pool: Decimal,
    pub fee_percent: Decimal,
}

impl RewardPool {
    pub fn new(pool: Decimal, fee_percent: Decimal) -> Self {
        Self { pool, fee_percent }
    }

    pub fn validate(&self) -> Result<(), PoolError> {
        if self.pool < Decimal::ZERO {
            return Err(PoolError::NegativePool(self.pool));
        }
        if self.fee_percent < Decimal::ZERO || self.fee_percent > Decimal::ONE_HUNDRED {
            return Err(PoolError::FeeOutOfRange(self.fee_percent));
        }
        Ok(())
    }

    /// Split the pool across the eligible subset of `users`. Users without a
    /// destination or without positive points are skipped; an empty eligible
    /// set yields an empty allocation list rather than a division by zero.
    pub fn split(&self, users: &[UserAccount]) -> Result<Vec<Allocation>, PoolError> {
        self.validate()?;

        // Pairing each account with its destination up front means an
        // allocation can only ever be built from a present address.
        let eligible: Vec<(&UserAccount, &str)> = users
            .iter()
            .filter_map(|user| match user.destination.as_deref() {
                Some(destination) if user.total_points > 0 => Some((user, destination)),
                _ => None,
            })
            .collect();
        let total_points: i64 = eligible.iter().map(|(user, _)| user.total_points).sum();
        if eligible.is_empty() || total_points == 0 {
            return Ok(Vec::new());
        }

        let fee_total = self.pool * self.fee_percent / Decimal::ONE_HUNDRED;
        let distributable = self.pool - fee_total;
        let denominator = Decimal::from(total_points);

        Ok(eligible
            .into_iter()
            .map(|(user, destination)| {
                let share = Decimal::from(user.total_points) / denominator;
                Allocation {
                    user: user.id.clone(),
                    destination: destination.to_string(),
                    points: user.total_points,
                    amount: share * distributable,
                    fee: share * fee_total,
                }
            })
            .collect())
    }
}
