//! In-memory port implementations for service tests.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream;

use crate::error::{ChainError, ChainResult, StorageError, StorageResult};
use crate::models::{
    AccountId, BlockCommit, BlockHash, Burn, Exchange, LedgerState, ProcessingError,
    ProcessingWarning,
};
use crate::ports::{
    BlockSource, ChainHead, Connection, HeadStream, LedgerRepository, OrderDirection, Pagination,
    PurgeStats, RawBlock, RawEvent, RawExtrinsic, TransactionSubmitter, TxInclusion,
};

pub const TREASURY: AccountId = AccountId([0xee; 32]);
pub const ALICE: AccountId = AccountId([0xa1; 32]);

/// Deterministic hash for block `number`.
pub fn hash_of(number: u64) -> BlockHash {
    let mut bytes = [0x42u8; 32];
    bytes[24..].copy_from_slice(&number.to_be_bytes());
    BlockHash(bytes)
}

/// Signed `Balances.transfer` extrinsic.
pub fn transfer(
    index: u32,
    from: &AccountId,
    to: &AccountId,
    amount: u128,
    tip: u128,
) -> RawExtrinsic {
    RawExtrinsic {
        index,
        pallet: "Balances".into(),
        call: "transfer".into(),
        signer: Some(from.clone()),
        args: serde_json::json!({ "dest": { "Id": to.to_hex() }, "value": amount.to_string() }),
        tip: Some(tip),
    }
}

/// `System.ExtrinsicSuccess` for extrinsic `index`.
pub fn success(index: u32) -> RawEvent {
    system_event(index, "ExtrinsicSuccess")
}

/// `System.ExtrinsicFailed` for extrinsic `index`.
pub fn failure(index: u32) -> RawEvent {
    system_event(index, "ExtrinsicFailed")
}

fn system_event(index: u32, name: &str) -> RawEvent {
    RawEvent {
        index,
        extrinsic_index: Some(index),
        pallet: "System".into(),
        name: name.into(),
        data: serde_json::Value::Null,
    }
}

// =============================================================================
// MockChain
// =============================================================================

struct ChainState {
    blocks: HashMap<u64, (RawBlock, Vec<RawEvent>)>,
    finalized: u64,
    best: Option<u64>,
    issuance: u128,
    memos: HashMap<AccountId, String>,
    /// Treasury balance from each height on, sorted by height.
    balances: Vec<(u64, u128)>,
    failing_block: Option<u64>,
    slow_block: Option<(u64, Duration)>,
    fetched: Vec<u64>,
    heads: Vec<u64>,
}

/// Chain with empty blocks at every height unless configured otherwise.
pub struct MockChain {
    state: Mutex<ChainState>,
}

impl MockChain {
    pub fn new(finalized: u64, issuance: u128) -> Self {
        Self {
            state: Mutex::new(ChainState {
                blocks: HashMap::new(),
                finalized,
                best: None,
                issuance,
                memos: HashMap::new(),
                balances: Vec::new(),
                failing_block: None,
                slow_block: None,
                fetched: Vec::new(),
                heads: Vec::new(),
            }),
        }
    }

    pub fn add_block(&self, number: u64, extrinsics: Vec<RawExtrinsic>, events: Vec<RawEvent>) {
        let block = RawBlock {
            number,
            hash: hash_of(number),
            extrinsics,
        };
        self.state.lock().unwrap().blocks.insert(number, (block, events));
    }

    pub fn set_memo(&self, account: &AccountId, memo: &str) {
        self.state.lock().unwrap().memos.insert(account.clone(), memo.into());
    }

    pub fn set_finalized(&self, finalized: u64) {
        self.state.lock().unwrap().finalized = finalized;
    }

    /// Free balance at every height.
    pub fn set_free_balance(&self, balance: u128) {
        self.state.lock().unwrap().balances = vec![(0, balance)];
    }

    /// Free balance from block `number` on.
    pub fn set_free_balance_from(&self, number: u64, balance: u128) {
        let mut state = self.state.lock().unwrap();
        state.balances.retain(|(n, _)| *n != number);
        state.balances.push((number, balance));
        state.balances.sort_by_key(|(n, _)| *n);
    }

    /// Best head, ahead of the finalized one. Defaults to the finalized head.
    pub fn set_best(&self, best: u64) {
        self.state.lock().unwrap().best = Some(best);
    }

    /// Heads announced by each new subscription.
    pub fn set_heads(&self, heads: Vec<u64>) {
        self.state.lock().unwrap().heads = heads;
    }

    /// Make every query at block `number` fail.
    pub fn fail_at(&self, number: u64) {
        self.state.lock().unwrap().failing_block = Some(number);
    }

    /// Delay the timestamp query of block `number`.
    pub fn slow_at(&self, number: u64, delay: Duration) {
        self.state.lock().unwrap().slow_block = Some((number, delay));
    }

    pub fn raw_block(&self, number: u64) -> RawBlock {
        let state = self.state.lock().unwrap();
        state
            .blocks
            .get(&number)
            .map(|(b, _)| b.clone())
            .unwrap_or_else(|| empty_block(number))
    }

    /// Heights fetched through `block()`, in call order.
    pub fn fetched(&self) -> Vec<u64> {
        self.state.lock().unwrap().fetched.clone()
    }

    fn number_of(hash: &BlockHash) -> u64 {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.0[24..]);
        u64::from_be_bytes(bytes)
    }

    fn check(&self, hash: &BlockHash) -> ChainResult<u64> {
        let number = Self::number_of(hash);
        if self.state.lock().unwrap().failing_block == Some(number) {
            return Err(ChainError::RpcError(format!("node unavailable at {number}")));
        }
        Ok(number)
    }
}

fn empty_block(number: u64) -> RawBlock {
    RawBlock {
        number,
        hash: hash_of(number),
        extrinsics: Vec::new(),
    }
}

#[async_trait]
impl BlockSource for MockChain {
    async fn genesis_hash(&self) -> ChainResult<BlockHash> {
        Ok(hash_of(0))
    }

    async fn finalized_head(&self) -> ChainResult<ChainHead> {
        let finalized = self.state.lock().unwrap().finalized;
        Ok(ChainHead {
            number: finalized,
            hash: hash_of(finalized),
        })
    }

    async fn best_head(&self) -> ChainResult<ChainHead> {
        let state = self.state.lock().unwrap();
        let best = state.best.unwrap_or(state.finalized);
        Ok(ChainHead {
            number: best,
            hash: hash_of(best),
        })
    }

    async fn subscribe_new_heads(&self) -> ChainResult<HeadStream> {
        let heads = self.state.lock().unwrap().heads.clone();
        Ok(Box::pin(stream::iter(heads.into_iter().map(|number| {
            Ok(ChainHead {
                number,
                hash: hash_of(number),
            })
        }))))
    }

    async fn block_hash(&self, number: u64) -> ChainResult<BlockHash> {
        let hash = hash_of(number);
        self.check(&hash)?;
        Ok(hash)
    }

    async fn block(&self, hash: &BlockHash) -> ChainResult<RawBlock> {
        let number = self.check(hash)?;
        self.state.lock().unwrap().fetched.push(number);
        Ok(self.raw_block(number))
    }

    async fn events_at(&self, hash: &BlockHash) -> ChainResult<Vec<RawEvent>> {
        let number = self.check(hash)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .blocks
            .get(&number)
            .map(|(_, e)| e.clone())
            .unwrap_or_default())
    }

    async fn timestamp_at(&self, hash: &BlockHash) -> ChainResult<u64> {
        let number = self.check(hash)?;
        let delay = self
            .state
            .lock()
            .unwrap()
            .slow_block
            .filter(|(n, _)| *n == number)
            .map(|(_, d)| d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(1_700_000_000_000 + number * 6_000)
    }

    async fn total_issuance_at(&self, hash: &BlockHash) -> ChainResult<u128> {
        self.check(hash)?;
        Ok(self.state.lock().unwrap().issuance)
    }

    async fn free_balance_at(&self, hash: &BlockHash, _account: &AccountId) -> ChainResult<u128> {
        let number = self.check(hash)?;
        let state = self.state.lock().unwrap();
        Ok(state
            .balances
            .iter()
            .rev()
            .find(|(n, _)| *n <= number)
            .map_or(0, |(_, b)| *b))
    }

    async fn memo_at(&self, hash: &BlockHash, account: &AccountId) -> ChainResult<String> {
        self.check(hash)?;
        let state = self.state.lock().unwrap();
        Ok(state.memos.get(account).cloned().unwrap_or_default())
    }

    async fn token_decimals(&self) -> ChainResult<u8> {
        Ok(0)
    }
}

// =============================================================================
// MockLedger
// =============================================================================

#[derive(Default)]
struct LedgerInner {
    state: LedgerState,
    exchanges: Vec<Exchange>,
    burns: Vec<Burn>,
    errors: Vec<ProcessingError>,
    warnings: Vec<ProcessingWarning>,
    commits: usize,
}

/// Ledger keeping everything in memory, with the same atomicity as the
/// PostgreSQL one (a commit either lands fully or not at all).
#[derive(Default)]
pub struct MockLedger {
    inner: Mutex<LedgerInner>,
}

impl MockLedger {
    pub fn with_state(pool: f64, checkpoint: Option<u64>) -> Self {
        let ledger = Self::default();
        {
            let mut inner = ledger.inner.lock().unwrap();
            inner.state.size_dollar_pool = pool;
            inner.state.last_block_processed = checkpoint;
        }
        ledger
    }

    pub fn snapshot(&self) -> LedgerState {
        self.inner.lock().unwrap().state.clone()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.inner.lock().unwrap().exchanges.clone()
    }

    pub fn burns(&self) -> Vec<Burn> {
        self.inner.lock().unwrap().burns.clone()
    }

    pub fn errors(&self) -> Vec<ProcessingError> {
        self.inner.lock().unwrap().errors.clone()
    }

    pub fn warnings(&self) -> Vec<ProcessingWarning> {
        self.inner.lock().unwrap().warnings.clone()
    }

    pub fn commits(&self) -> usize {
        self.inner.lock().unwrap().commits
    }
}

fn page<T: Clone>(items: &[T], pagination: Pagination, order: OrderDirection) -> Connection<T> {
    let limit = pagination.limit();
    let after = pagination.after_seq();
    let mut rows: Vec<(i64, T)> = items
        .iter()
        .enumerate()
        .map(|(i, item)| (i as i64 + 1, item.clone()))
        .collect();
    if order == OrderDirection::Desc {
        rows.reverse();
    }
    let rows: Vec<(i64, T)> = rows
        .into_iter()
        .filter(|(seq, _)| match (after, order) {
            (Some(a), OrderDirection::Asc) => *seq > a,
            (Some(a), OrderDirection::Desc) => *seq < a,
            (None, _) => true,
        })
        .take(limit as usize + 1)
        .collect();
    Connection::from_rows(rows, limit, after.is_some())
}

#[async_trait]
impl LedgerRepository for MockLedger {
    async fn state(&self) -> StorageResult<LedgerState> {
        Ok(self.snapshot())
    }

    async fn ensure_chain_id(&self, chain_id: &str) -> StorageResult<String> {
        let mut inner = self.inner.lock().unwrap();
        Ok(inner
            .state
            .chain_id
            .get_or_insert_with(|| chain_id.to_string())
            .clone())
    }

    async fn append_warning(&self, warning: &ProcessingWarning) -> StorageResult<()> {
        self.inner.lock().unwrap().warnings.push(warning.clone());
        Ok(())
    }

    async fn commit_block(&self, commit: &BlockCommit) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner
            .state
            .last_block_processed
            .is_some_and(|cp| cp >= commit.block_number)
        {
            return Err(StorageError::TransactionError(format!(
                "checkpoint would not advance to {}",
                commit.block_number
            )));
        }
        inner.exchanges.extend(commit.exchanges.iter().cloned());
        inner.burns.extend(commit.burns.iter().cloned());
        inner.state.size_dollar_pool = commit.pool_after;
        inner.state.tokens_burned += commit.burned();
        inner.state.last_block_processed = Some(commit.block_number);
        inner.state.updated_at = Utc::now();
        inner.commits += 1;
        Ok(())
    }

    async fn record_fatal_error(&self, error: &ProcessingError) -> StorageResult<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.errors.push(error.clone());
        let checkpoint = inner
            .state
            .last_block_processed
            .map_or(error.block_number, |cp| cp.max(error.block_number));
        inner.state.last_block_processed = Some(checkpoint);
        inner.state.updated_at = Utc::now();
        Ok(())
    }

    async fn list_exchanges(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<Exchange>> {
        Ok(page(&self.inner.lock().unwrap().exchanges, pagination, order))
    }

    async fn list_burns(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<Burn>> {
        Ok(page(&self.inner.lock().unwrap().burns, pagination, order))
    }

    async fn list_errors(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<ProcessingError>> {
        Ok(page(&self.inner.lock().unwrap().errors, pagination, order))
    }

    async fn list_warnings(
        &self,
        pagination: Pagination,
        order: OrderDirection,
    ) -> StorageResult<Connection<ProcessingWarning>> {
        Ok(page(&self.inner.lock().unwrap().warnings, pagination, order))
    }

    async fn purge(&self) -> StorageResult<PurgeStats> {
        let mut inner = self.inner.lock().unwrap();
        let stats = PurgeStats {
            exchanges_removed: inner.exchanges.len() as u64,
            burns_removed: inner.burns.len() as u64,
            errors_removed: inner.errors.len() as u64,
            warnings_removed: inner.warnings.len() as u64,
        };
        // The dollar pool survives a purge
        let pool = inner.state.size_dollar_pool;
        *inner = LedgerInner::default();
        inner.state.size_dollar_pool = pool;
        Ok(stats)
    }
}

// =============================================================================
// MockSubmitter
// =============================================================================

/// Records submissions; optionally fails or waits before "inclusion".
pub struct MockSubmitter {
    pub submissions: Mutex<Vec<(AccountId, u128, u128)>>,
    fail: bool,
    delay: Duration,
}

impl MockSubmitter {
    pub fn new() -> Self {
        Self {
            submissions: Mutex::new(Vec::new()),
            fail: false,
            delay: Duration::ZERO,
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::new()
        }
    }

    pub fn count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }
}

#[async_trait]
impl TransactionSubmitter for MockSubmitter {
    fn signer_account(&self) -> AccountId {
        TREASURY
    }

    async fn submit_transfer(
        &self,
        dest: &AccountId,
        amount: u128,
        tip: u128,
    ) -> ChainResult<TxInclusion> {
        self.submissions
            .lock()
            .unwrap()
            .push((dest.clone(), amount, tip));
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.fail {
            return Err(ChainError::SubmissionFailed("priority too low".into()));
        }
        Ok(TxInclusion {
            block_hash: hash_of(999),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fatal(block_number: u64) -> ProcessingError {
        ProcessingError {
            block_number,
            reason: Some("boom".into()),
            log_time: Utc::now(),
        }
    }

    // Même contrat que PostgreSQL: GREATEST sur le checkpoint
    #[tokio::test]
    async fn fatal_error_never_lowers_checkpoint() {
        let ledger = MockLedger::with_state(100.0, Some(50));

        ledger.record_fatal_error(&fatal(40)).await.unwrap();
        assert_eq!(ledger.snapshot().last_block_processed, Some(50));

        ledger.record_fatal_error(&fatal(60)).await.unwrap();
        assert_eq!(ledger.snapshot().last_block_processed, Some(60));
        assert_eq!(ledger.errors().len(), 2);
    }

    #[tokio::test]
    async fn purge_keeps_dollar_pool() {
        let ledger = MockLedger::with_state(1_500.0, Some(9));
        ledger.record_fatal_error(&fatal(10)).await.unwrap();

        let stats = ledger.purge().await.unwrap();

        assert_eq!(stats.errors_removed, 1);
        let state = ledger.snapshot();
        assert_eq!(state.size_dollar_pool, 1_500.0);
        assert_eq!(state.last_block_processed, None);
        assert!(ledger.errors().is_empty());
    }
}
