//! Metrics definitions for the indexer.
//!
//! This module defines all metrics used throughout the indexer.
//! Metrics are collected using the `metrics` crate and can be exported
//! to Prometheus via `metrics-exporter-prometheus`.

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use std::time::Instant;

/// Initialize all metric descriptions.
/// Call this once at startup before any metrics are recorded.
pub fn init_metrics() {
    describe_counter!(
        "blocks_processed_total",
        "Total number of blocks committed to the ledger"
    );
    describe_counter!(
        "blocks_skipped_total",
        "Total number of blocks skipped because they were already processed"
    );
    describe_histogram!(
        "block_processing_duration_seconds",
        "Time taken to process a block in seconds"
    );
    describe_counter!(
        "exchanges_recorded_total",
        "Total number of exchanges recorded"
    );
    describe_counter!(
        "exchanged_usd_total",
        "Total USD value of recorded exchanges, in cents"
    );
    describe_counter!("burns_recorded_total", "Total number of burns recorded");
    describe_counter!(
        "speculative_blocks_total",
        "Total number of blocks processed ahead of finality"
    );
    describe_counter!(
        "burn_submissions_total",
        "Total number of burn transactions submitted, by outcome"
    );
    describe_counter!(
        "decode_errors_total",
        "Total number of events or extrinsics that could not be decoded"
    );
    describe_gauge!("dollar_pool_usd", "Dollar pool size after the last block");
    describe_gauge!("last_block_processed", "Current ledger checkpoint");
}

/// Record a committed block and the resulting ledger state.
pub fn record_block_committed(block_number: u64, pool_after: f64) {
    counter!("blocks_processed_total").increment(1);
    gauge!("last_block_processed").set(block_number as f64);
    gauge!("dollar_pool_usd").set(pool_after);
}

/// Record a decode error.
///
/// # Arguments
/// * `error_type` - The type of error ("event" or "extrinsic")
/// * `pallet` - The pallet name (if known)
pub fn record_decode_error(error_type: &str, pallet: &str) {
    counter!(
        "decode_errors_total",
        "type" => error_type.to_string(),
        "pallet" => pallet.to_string()
    )
    .increment(1);
}

/// Record a block skipped as already processed.
pub fn record_block_skipped() {
    counter!("blocks_skipped_total").increment(1);
}

/// Record block processing duration.
pub fn record_block_processing_duration(duration_secs: f64) {
    histogram!("block_processing_duration_seconds").record(duration_secs);
}

/// Record the exchanges of a block.
///
/// # Arguments
/// * `count` - Number of exchanges
/// * `usd` - Their total USD value
pub fn record_exchanges(count: usize, usd: f64) {
    if count == 0 {
        return;
    }
    counter!("exchanges_recorded_total").increment(count as u64);
    // Counters are integral
    counter!("exchanged_usd_total").increment((usd * 100.0).round().max(0.0) as u64);
}

/// Record the burns of a block.
pub fn record_burns(count: usize) {
    if count > 0 {
        counter!("burns_recorded_total").increment(count as u64);
    }
}

/// Record a block processed ahead of finality.
pub fn record_speculative_block() {
    counter!("speculative_blocks_total").increment(1);
}

/// Record a burn submission.
///
/// # Arguments
/// * `outcome` - "included" or "failed"
pub fn record_burn_submission(outcome: &'static str) {
    counter!("burn_submissions_total", "outcome" => outcome).increment(1);
}

/// A timer that automatically records duration when dropped.
pub struct ProcessingTimer {
    start: Instant,
}

impl ProcessingTimer {
    /// Start a new processing timer.
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for ProcessingTimer {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ProcessingTimer {
    fn drop(&mut self) {
        let duration = self.start.elapsed().as_secs_f64();
        record_block_processing_duration(duration);
    }
}
