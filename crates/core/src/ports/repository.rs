//! Port trait for the ledger store.
//!
//! The ledger is a log: records are appended once and never updated. The
//! scalar state (pool size, checkpoint) only changes through
//! [`LedgerRepository::commit_block`] and
//! [`LedgerRepository::record_fatal_error`], each of which is a single
//! atomic write. Implementations live in the infrastructure layer (e.g.,
//! `furnace-storage`).

use async_trait::async_trait;

use crate::error::StorageResult;
use crate::models::{
    BlockCommit, Burn, Exchange, LedgerState, ProcessingError, ProcessingWarning,
};

use super::pagination::{Connection, OrderDirection, Pagination};

/// Statistics from a ledger purge.
#[derive(Debug, Clone, Default)]
pub struct PurgeStats {
    pub exchanges_removed: u64,
    pub burns_removed: u64,
    pub errors_removed: u64,
    pub warnings_removed: u64,
}

/// Repository for the treasury ledger.
///
/// Writers are serialized by the block processing lock; implementations
/// still make each write method atomic on its own.
#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Current scalar state (defaults when nothing was ever written).
    async fn state(&self) -> StorageResult<LedgerState>;

    /// Height of the last processed block, if any.
    async fn checkpoint(&self) -> StorageResult<Option<u64>> {
        Ok(self.state().await?.last_block_processed)
    }

    /// Current dollar pool size.
    async fn pool_size(&self) -> StorageResult<f64> {
        Ok(self.state().await?.size_dollar_pool)
    }

    /// Store `chain_id` if none is set; return the stored one.
    async fn ensure_chain_id(&self, chain_id: &str) -> StorageResult<String>;

    /// Append a non-fatal warning.
    async fn append_warning(&self, warning: &ProcessingWarning) -> StorageResult<()>;

    /// Persist a processed block in one transaction: append its exchanges
    /// and burns, set the pool size, add to `tokens_burned`, and advance
    /// the checkpoint.
    async fn commit_block(&self, commit: &BlockCommit) -> StorageResult<()>;

    /// Append an error record and set the checkpoint to its block, atomically.
    async fn record_fatal_error(&self, error: &ProcessingError) -> StorageResult<()>;

    /// List exchanges in insertion order.
    async fn list_exchanges(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<Exchange>>;

    /// List burns in insertion order.
    async fn list_burns(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<Burn>>;

    /// List error records in insertion order.
    async fn list_errors(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<ProcessingError>>;

    /// List warning records in insertion order.
    async fn list_warnings(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<ProcessingWarning>>;

    /// Delete every record and reset the checkpoint. Operator use only.
    async fn purge(&self) -> StorageResult<PurgeStats>;
}
