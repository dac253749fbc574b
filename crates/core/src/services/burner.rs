//! Auto-burn trigger.
//!
//! Whenever the treasury holds a free balance, the whole balance is spent as
//! the tip of a zero-amount transfer from the treasury to itself. The tip is
//! paid away as a fee, which removes the tokens from circulation, and the
//! block processor later records that transfer as a burn.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{Instrument, debug, error, info, info_span, instrument};

use crate::error::ChainResult;
use crate::metrics::record_burn_submission;
use crate::models::{AccountId, BlockHash};
use crate::ports::{BlockSource, TransactionSubmitter};

/// Result of one burn check.
#[derive(Debug, Clone, PartialEq)]
pub enum BurnOutcome {
    /// Nothing to burn.
    Idle,
    /// Another burn is still being submitted.
    InFlight,
    /// The burn transaction was included in a block.
    Included { amount: u128, block_hash: BlockHash },
    /// Submission failed. Not retried; the next block triggers a new check.
    Failed { amount: u128, reason: String },
}

/// Submits burn transactions for the treasury, one at a time.
pub struct AutoBurner<S: BlockSource> {
    treasury: AccountId,
    source: Arc<S>,
    submitter: Arc<dyn TransactionSubmitter>,
    lock: Arc<Mutex<()>>,
}

impl<S: BlockSource + 'static> AutoBurner<S> {
    /// `lock` is the burn lock. It must not be the block processing lock.
    pub fn new(
        treasury: AccountId,
        source: Arc<S>,
        submitter: Arc<dyn TransactionSubmitter>,
        lock: Arc<Mutex<()>>,
    ) -> Self {
        Self {
            treasury,
            source,
            submitter,
            lock,
        }
    }

    /// Run [`maybe_burn`](Self::maybe_burn) in the background.
    pub fn trigger(self: &Arc<Self>) {
        let burner = Arc::clone(self);
        tokio::spawn(
            async move {
                burner.maybe_burn().await;
            }
            .instrument(info_span!("burner")),
        );
    }

    /// Burn the treasury's free balance if there is one.
    ///
    /// Never fails: submission errors are logged and reported as
    /// [`BurnOutcome::Failed`].
    #[instrument(skip(self))]
    pub async fn maybe_burn(&self) -> BurnOutcome {
        let Ok(_guard) = Arc::clone(&self.lock).try_lock_owned() else {
            debug!("Burn already in flight, skipping");
            return BurnOutcome::InFlight;
        };

        let balance = match self.treasury_balance().await {
            Ok(balance) => balance,
            Err(e) => {
                error!(error = %e, "❌ Failed to read treasury balance");
                record_burn_submission("failed");
                return BurnOutcome::Failed {
                    amount: 0,
                    reason: e.to_string(),
                };
            }
        };

        if balance == 0 {
            debug!("Treasury empty, nothing to burn");
            return BurnOutcome::Idle;
        }

        info!(amount = %balance, "🔥 Burning treasury balance");
        match self.submit(balance).await {
            Ok(block_hash) => {
                info!(amount = %balance, block = %block_hash, "🔥 Burn included");
                record_burn_submission("included");
                BurnOutcome::Included {
                    amount: balance,
                    block_hash,
                }
            }
            Err(e) => {
                error!(amount = %balance, error = %e, "❌ Burn submission failed");
                record_burn_submission("failed");
                BurnOutcome::Failed {
                    amount: balance,
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Treasury balance at the best head, which already includes the last
    /// burn: the lock is released once a burn reaches a best block.
    async fn treasury_balance(&self) -> ChainResult<u128> {
        let best = self.source.best_head().await?;
        self.source.free_balance_at(&best.hash, &self.treasury).await
    }

    async fn submit(&self, balance: u128) -> ChainResult<BlockHash> {
        let inclusion = self
            .submitter
            .submit_transfer(&self.treasury, 0, balance)
            .await?;
        Ok(inclusion.block_hash)
    }
}
