//! Aggregation engine.
//!
//! Strategies are pure per-type reducers; the aggregator assembles them
//! into a full [`DistributionSnapshot`](crate::models::DistributionSnapshot).

pub mod aggregator;
pub mod strategies;

pub use aggregator::compute;
