use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use super::domain::EngagementCounts;

/// Weights and decay controls for the engagement scorer.
///
/// Reposts and quotes are worth more than likes because they increase reach.
/// The decay multiplier is `1 - age/decay_window`, clamped to `decay_floor`,
/// so older items keep at least half weight by default.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringConfig {
    pub like_weight: i64,
    pub repost_weight: i64,
    pub reply_weight: i64,
    pub quote_weight: i64,
    pub decay_window: Duration,
    pub decay_floor: Decimal,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            like_weight: 1,
            repost_weight: 3,
            reply_weight: 2,
            quote_weight: 3,
            decay_window: Duration::days(7),
            decay_floor: Decimal::new(5, 1),
        }
    }
}

/// Pure mapping from engagement counters to a point value. Deterministic for
/// a given `(counts, age)` pair, which is what makes rescoring idempotent.
#[derive(Debug, Clone)]
pub struct EngagementScorer {
    config: ScoringConfig,
}

impl EngagementScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    /// Weighted engagement total before decay.
    pub fn weighted_total(&self, counts: &EngagementCounts) -> i64 {
        i64::from(counts.likes) * self.config.like_weight
            + i64::from(counts.reposts) * self.config.repost_weight
            + i64::from(counts.replies) * self.config.reply_weight
            + i64::from(counts.quotes) * self.config.quote_weight
    }

    /// Score an item given its age since creation. Clamped to a minimum of 1
    /// so any tracked item carries nonzero weight.
    pub fn score(&self, counts: &EngagementCounts, age: Duration) -> i64 {
        let weighted = Decimal::from(self.weighted_total(counts));
        let decayed = weighted * self.decay_multiplier(age);
        decayed.floor().to_i64().unwrap_or(i64::MAX).max(1)
    }

    fn decay_multiplier(&self, age: Duration) -> Decimal {
        let window_secs = self.config.decay_window.num_seconds();
        if window_secs <= 0 || age <= Duration::zero() {
            return Decimal::ONE;
        }

        let ratio = Decimal::from(age.num_seconds()) / Decimal::from(window_secs);
        (Decimal::ONE - ratio).clamp(self.config.decay_floor, Decimal::ONE)
    }
}
