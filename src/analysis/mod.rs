//! Normalization, bucketing and aggregation of fetched records.

pub mod activity;
pub mod aggregator;
pub mod normalize;
pub mod record;
pub mod stats;
pub mod timezone;
