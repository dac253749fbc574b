//! Block processor: turns one block into ledger records.
//!
//! Processing a block reads chain state at that block's hash, derives the
//! exchanges into the treasury and the burns out of it, and commits them
//! together with the new pool size and checkpoint in one repository write.
//! Blocks at or below the checkpoint are skipped, so replaying a range is
//! harmless.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, trace, warn};

use crate::error::{DomainError, IndexerResult};
use crate::memo::AddressExtractor;
use crate::metrics::{
    ProcessingTimer, record_block_committed, record_block_skipped, record_burns,
    record_exchanges, record_speculative_block,
};
use crate::models::{
    AccountId, BlockCommit, Burn, Exchange, ExchangeStatus, ProcessingWarning,
};
use crate::ports::{BlockSource, LedgerRepository, RawBlock};
use crate::price::{to_tokens, token_price, usd_value};

use super::burner::AutoBurner;
use super::transfer::TransferCall;

/// What a committed block contributed to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct BlockSummary {
    pub block_number: u64,
    pub exchanges: usize,
    pub burns: usize,
    pub exchanged_usd: f64,
    pub pool_after: f64,
    /// Processed before the node reported it final.
    pub speculative: bool,
}

/// Processes blocks one at a time under the processing lock.
pub struct BlockProcessor<S: BlockSource, R: LedgerRepository> {
    treasury: AccountId,
    token_decimals: u8,
    source: Arc<S>,
    ledger: Arc<R>,
    extractor: AddressExtractor,
    lock: Arc<Mutex<()>>,
    burner: Option<Arc<AutoBurner<S>>>,
}

impl<S: BlockSource + 'static, R: LedgerRepository> BlockProcessor<S, R> {
    pub fn new(
        treasury: AccountId,
        token_decimals: u8,
        source: Arc<S>,
        ledger: Arc<R>,
        extractor: AddressExtractor,
        lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            treasury,
            token_decimals,
            source,
            ledger,
            extractor,
            lock,
            burner: None,
        }
    }

    /// Trigger `burner` after every committed block.
    pub fn with_burner(mut self, burner: Arc<AutoBurner<S>>) -> Self {
        self.burner = Some(burner);
        self
    }

    /// Process `block`.
    ///
    /// Returns `Ok(None)` when the block is at or below the checkpoint. Any
    /// error leaves the ledger untouched apart from warnings already written.
    #[instrument(skip(self, block), fields(block = block.number))]
    pub async fn process_block(&self, block: &RawBlock) -> IndexerResult<Option<BlockSummary>> {
        let _guard = self.lock.lock().await;

        let summary = self.process_locked(block).await?;

        if summary.is_some()
            && let Some(burner) = &self.burner
        {
            burner.trigger();
        }

        Ok(summary)
    }

    async fn process_locked(&self, block: &RawBlock) -> IndexerResult<Option<BlockSummary>> {
        let height = block.number;

        if let Some(checkpoint) = self.ledger.checkpoint().await?
            && height <= checkpoint
        {
            trace!(checkpoint, "Block already processed, skipping");
            record_block_skipped();
            return Ok(None);
        }

        let _timer = ProcessingTimer::new();

        let finalized = self.source.finalized_head().await?.number;
        let speculative = height > finalized;
        if speculative {
            let warning = ProcessingWarning::speculative(height, finalized);
            warn!(finalized, "⚠️  {}", warning.message);
            self.ledger.append_warning(&warning).await?;
            record_speculative_block();
        }

        let timestamp_ms = self.source.timestamp_at(&block.hash).await?;
        let date = i64::try_from(timestamp_ms)
            .ok()
            .and_then(DateTime::from_timestamp_millis)
            .ok_or_else(|| {
                DomainError::ValidationError(format!("invalid block timestamp {timestamp_ms}"))
            })?;

        let issuance = self.source.total_issuance_at(&block.hash).await?;
        let pool_before = self.ledger.pool_size().await?;
        let price = token_price(to_tokens(issuance, self.token_decimals), pool_before)?;
        debug!(price, pool = pool_before, "Token price computed");

        let events = self.source.events_at(&block.hash).await?;
        let log_time = Utc::now();

        let mut exchanges = Vec::new();
        let mut burns = Vec::new();

        for ext in &block.extrinsics {
            let Some(transfer) = TransferCall::from_extrinsic(ext) else {
                continue;
            };
            if !events.iter().any(|e| e.is_success_of(transfer.index)) {
                trace!(ext = transfer.index, "Transfer not successful, ignoring");
                continue;
            }

            if transfer.dest == self.treasury && transfer.amount > 0 {
                let memo = self.source.memo_at(&block.hash, &transfer.sender).await?;
                let payment_address = self.extractor.payment_address_or_sentinel(&memo);
                let amount_usd = usd_value(transfer.amount, self.token_decimals, price);

                debug!(
                    sender = %transfer.sender,
                    amount = %transfer.amount,
                    amount_usd,
                    address = %payment_address,
                    "💱 Exchange detected"
                );

                exchanges.push(Exchange {
                    sender: transfer.sender.clone(),
                    recipient: transfer.dest.clone(),
                    sender_memo: memo,
                    payment_address,
                    amount: transfer.amount,
                    price,
                    amount_usd,
                    block_height: height,
                    date,
                    log_time,
                    status: ExchangeStatus::Pending,
                });
            }

            if transfer.sender == self.treasury && transfer.tip > 0 {
                debug!(amount = %transfer.tip, "🔥 Burn detected");
                burns.push(Burn {
                    amount: transfer.tip,
                    block_height: height,
                    date,
                    log_time,
                });
            }
        }

        let mut commit = BlockCommit {
            block_number: height,
            pool_after: pool_before,
            exchanges,
            burns,
        };
        let exchanged_usd = commit.exchanged_usd();
        commit.pool_after -= exchanged_usd;

        self.ledger.commit_block(&commit).await?;

        record_exchanges(commit.exchanges.len(), exchanged_usd);
        record_burns(commit.burns.len());
        record_block_committed(height, commit.pool_after);

        if commit.exchanges.is_empty() && commit.burns.is_empty() {
            trace!("Block committed");
        } else {
            info!(
                exchanges = commit.exchanges.len(),
                burns = commit.burns.len(),
                usd = exchanged_usd,
                pool = commit.pool_after,
                "⛓️  Block committed"
            );
        }

        Ok(Some(BlockSummary {
            block_number: height,
            exchanges: commit.exchanges.len(),
            burns: commit.burns.len(),
            exchanged_usd,
            pool_after: commit.pool_after,
            speculative,
        }))
    }
}
