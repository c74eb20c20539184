//! Engagement-to-payout settlement pipeline.
//!
//! The crate converts raw engagement counters into a monotonically consistent
//! point ledger and periodically settles accumulated points into proportional
//! shares of a fixed reward pool. Payment transport, the social fetch client,
//! and scheduling live behind traits in [`pipeline::repository`]; everything
//! that guards money or point conservation lives here.

pub mod config;
pub mod error;
pub mod pipeline;
pub mod telemetry;
