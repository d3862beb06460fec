pub mod aggregator;
pub mod rollup;
