//! Core indexer service - drives the block processor from chain heads.
//!
//! Every new head moves the processing target to `head - finality_depth`,
//! and the service replays every block between the checkpoint and that
//! target, strictly in order. Any failure on a block is fatal: it is
//! recorded in the ledger, the checkpoint moves to the failing block and
//! the service stops.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::StreamExt;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::error::{IndexerError, IndexerResult};
use crate::models::ProcessingError;
use crate::ports::{BlockSource, LedgerRepository};

use super::processor::BlockProcessor;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for the indexer service.
#[derive(Debug, Clone)]
pub struct IndexerConfig {
    /// Chain identifier (genesis hash).
    pub chain_id: String,
    /// Blocks withheld below the announced head.
    pub finality_depth: u64,
    /// Lowest block ever processed.
    pub first_block: u64,
    /// Upper bound for fetching and processing one block.
    pub block_timeout: Duration,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            chain_id: String::new(),
            finality_depth: 10,
            first_block: 1,
            block_timeout: Duration::from_secs(10),
        }
    }
}

// =============================================================================
// IndexerService
// =============================================================================

/// Catch-up and subscription controller.
///
/// # Flow
///
/// 1. Check the stored chain id against the connected chain
/// 2. Subscribe to new heads
/// 3. For each head, process `checkpoint + 1 ..= head - finality_depth`
/// 4. On the first failing block, record it and return
pub struct IndexerService<S: BlockSource, R: LedgerRepository> {
    config: IndexerConfig,
    block_source: Arc<S>,
    ledger: Arc<R>,
    processor: Arc<BlockProcessor<S, R>>,
}

impl<S: BlockSource + 'static, R: LedgerRepository> IndexerService<S, R> {
    pub fn new(
        config: IndexerConfig,
        block_source: Arc<S>,
        ledger: Arc<R>,
        processor: Arc<BlockProcessor<S, R>>,
    ) -> Self {
        Self {
            config,
            block_source,
            ledger,
            processor,
        }
    }

    /// Start the indexer.
    ///
    /// Only returns on shutdown or on a fatal error, which is
    /// [`IndexerError::BlockProcessingFailed`] once a block has failed.
    #[instrument(
        skip_all,
        fields(chain = %&self.config.chain_id[..16.min(self.config.chain_id.len())])
    )]
    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) -> IndexerResult<()> {
        info!(
            finality_depth = self.config.finality_depth,
            first_block = self.config.first_block,
            "⛓️  Starting indexer"
        );

        // Verify we're connecting to the correct chain
        self.verify_chain_id().await?;

        match self.ledger.checkpoint().await? {
            Some(checkpoint) => info!(checkpoint, "📍 Resuming from checkpoint"),
            None => info!(from = self.config.first_block, "📍 Empty ledger, starting fresh"),
        }

        self.follow_heads(&mut shutdown_rx).await
    }

    /// Verify the connected chain matches the ledger.
    /// The first run records the chain id; later runs must match it.
    async fn verify_chain_id(&self) -> IndexerResult<()> {
        let stored = self.ledger.ensure_chain_id(&self.config.chain_id).await?;

        if stored != self.config.chain_id {
            let connected_short = &self.config.chain_id[..16.min(self.config.chain_id.len())];
            let expected_short = &stored[..16.min(stored.len())];

            error!(
                connected = connected_short,
                expected = expected_short,
                "❌ Chain mismatch! Ledger contains data from a different chain"
            );
            error!(
                "   Manual action required: either connect to the correct chain or purge the ledger"
            );

            return Err(IndexerError::ChainMismatch {
                connected: self.config.chain_id.clone(),
                expected: stored,
            });
        }
        debug!("Chain ID verified");

        Ok(())
    }

    /// Follow new heads via subscription.
    #[instrument(skip_all)]
    async fn follow_heads(&self, shutdown_rx: &mut watch::Receiver<bool>) -> IndexerResult<()> {
        debug!("Subscribing to new heads");

        // Exponential backoff configuration
        const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(500);
        const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);
        let mut retry_delay = INITIAL_RETRY_DELAY;

        loop {
            if *shutdown_rx.borrow() {
                debug!("Shutdown requested");
                return Err(IndexerError::ShutdownRequested);
            }

            match self.block_source.subscribe_new_heads().await {
                Ok(mut stream) => {
                    debug!("📡 Subscription established");
                    retry_delay = INITIAL_RETRY_DELAY; // Reset backoff on success

                    while let Some(result) = stream.next().await {
                        if *shutdown_rx.borrow() {
                            debug!("Shutdown requested");
                            return Err(IndexerError::ShutdownRequested);
                        }

                        match result {
                            Ok(head) => {
                                self.catch_up_until(head.number, Some(&*shutdown_rx)).await?;
                            }
                            Err(e) => {
                                warn!(error = ?e, "⚠️  Subscription error, reconnecting...");
                                break;
                            }
                        }
                    }
                }
                Err(e) => {
                    warn!(
                        error = ?e,
                        retry_in_ms = retry_delay.as_millis(),
                        "⚠️  Failed to subscribe, retrying..."
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(retry_delay) => {
                    debug!(
                        retry_delay_ms = retry_delay.as_millis(),
                        "🔄 Reconnecting to chain..."
                    );
                    // Exponential backoff: double the delay, up to max
                    retry_delay = (retry_delay * 2).min(MAX_RETRY_DELAY);
                }
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        return Err(IndexerError::ShutdownRequested);
                    }
                }
            }
        }
    }

    /// Process every block up to `head - finality_depth` that is above the
    /// checkpoint. Returns how many blocks were processed.
    pub async fn catch_up(&self, head: u64) -> IndexerResult<u64> {
        self.catch_up_until(head, None).await
    }

    async fn catch_up_until(
        &self,
        head: u64,
        shutdown_rx: Option<&watch::Receiver<bool>>,
    ) -> IndexerResult<u64> {
        let target = head.saturating_sub(self.config.finality_depth);
        let start = self.resume_point().await?;

        if target < self.config.first_block || target < start {
            return Ok(0);
        }

        debug!(head, from = start, to = target, "Catching up");

        let mut processed = 0;
        for number in start..=target {
            if shutdown_rx.is_some_and(|rx| *rx.borrow()) {
                debug!("Shutdown requested");
                return Err(IndexerError::ShutdownRequested);
            }
            self.index_block(number).await?;
            processed += 1;
        }

        Ok(processed)
    }

    /// First block not yet processed.
    async fn resume_point(&self) -> IndexerResult<u64> {
        let next = self
            .ledger
            .checkpoint()
            .await?
            .map_or(self.config.first_block, |checkpoint| checkpoint + 1);
        Ok(next.max(self.config.first_block))
    }

    /// Fetch and process one block within the timeout. Failures go through
    /// the fatal path.
    #[instrument(skip(self))]
    async fn index_block(&self, number: u64) -> IndexerResult<()> {
        let work = async {
            let block = self.block_source.block_at(number).await?;
            self.processor.process_block(&block).await
        };

        let error = match tokio::time::timeout(self.config.block_timeout, work).await {
            Ok(Ok(_)) => return Ok(()),
            Ok(Err(e)) => e,
            Err(_) => IndexerError::BlockTimeout {
                block: number,
                timeout_ms: self.config.block_timeout.as_millis() as u64,
            },
        };

        Err(self.fail(number, error).await)
    }

    /// Record `cause` for block `number` and build the terminal error.
    async fn fail(&self, number: u64, cause: IndexerError) -> IndexerError {
        let reason = cause.to_string();
        error!(block = number, error = %reason, "❌ Block processing failed");

        let record = ProcessingError {
            block_number: number,
            reason: Some(reason.clone()),
            log_time: Utc::now(),
        };
        if let Err(e) = self.ledger.record_fatal_error(&record).await {
            error!(block = number, error = %e, "❌ Failed to record processing error");
        }

        IndexerError::BlockProcessingFailed {
            block: number,
            reason,
        }
    }
}
