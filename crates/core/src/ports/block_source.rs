//! Port traits for the ledger node.
//!
//! These traits define the interface for reading blocks, events and state
//! from a Substrate chain and for submitting transactions. Implementations
//! live in the infrastructure layer (e.g., `furnace-substrate`).

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

use crate::error::ChainResult;
use crate::models::{AccountId, BlockHash};

/// Raw block data from the chain: header fields plus decoded extrinsics.
#[derive(Debug, Clone)]
pub struct RawBlock {
    /// Block number.
    pub number: u64,
    /// Block hash.
    pub hash: BlockHash,
    /// Decoded extrinsics, in block order.
    pub extrinsics: Vec<RawExtrinsic>,
}

/// Raw extrinsic data.
#[derive(Debug, Clone)]
pub struct RawExtrinsic {
    /// Index in block.
    pub index: u32,
    /// Decoded pallet name.
    pub pallet: String,
    /// Decoded call name.
    pub call: String,
    /// Signer (if signed).
    pub signer: Option<AccountId>,
    /// Arguments as JSON.
    pub args: serde_json::Value,
    /// Tip.
    pub tip: Option<u128>,
}

/// Raw event data.
#[derive(Debug, Clone)]
pub struct RawEvent {
    /// Index in block.
    pub index: u32,
    /// Extrinsic index, when the event was emitted in an `ApplyExtrinsic` phase.
    pub extrinsic_index: Option<u32>,
    /// Pallet name.
    pub pallet: String,
    /// Event variant name.
    pub name: String,
    /// Event data as JSON.
    pub data: serde_json::Value,
}

impl RawEvent {
    /// Whether this is `System.ExtrinsicSuccess` for extrinsic `index`.
    pub fn is_success_of(&self, index: u32) -> bool {
        self.pallet == "System"
            && self.name == "ExtrinsicSuccess"
            && self.extrinsic_index == Some(index)
    }
}

/// A block header announced by the node.
#[derive(Debug, Clone)]
pub struct ChainHead {
    pub number: u64,
    pub hash: BlockHash,
}

/// Stream of new chain heads.
pub type HeadStream = Pin<Box<dyn Stream<Item = ChainResult<ChainHead>> + Send>>;

/// Port trait for blockchain data source.
///
/// Every `*_at` query reads state as of the given block, not the live head.
#[async_trait]
pub trait BlockSource: Send + Sync {
    /// Get the genesis hash of the connected chain.
    async fn genesis_hash(&self) -> ChainResult<BlockHash>;

    /// Get the current finalized block head.
    async fn finalized_head(&self) -> ChainResult<ChainHead>;

    /// Get the current best block head, finalized or not.
    async fn best_head(&self) -> ChainResult<ChainHead>;

    /// Subscribe to new best block heads.
    async fn subscribe_new_heads(&self) -> ChainResult<HeadStream>;

    /// Hash of the canonical block at `number`.
    async fn block_hash(&self, number: u64) -> ChainResult<BlockHash>;

    /// Fetch a block body by hash.
    async fn block(&self, hash: &BlockHash) -> ChainResult<RawBlock>;

    /// Events emitted by the block.
    async fn events_at(&self, hash: &BlockHash) -> ChainResult<Vec<RawEvent>>;

    /// Block timestamp in milliseconds since the epoch.
    async fn timestamp_at(&self, hash: &BlockHash) -> ChainResult<u64>;

    /// Total token issuance in base units.
    async fn total_issuance_at(&self, hash: &BlockHash) -> ChainResult<u128>;

    /// Free balance of `account` in base units.
    async fn free_balance_at(&self, hash: &BlockHash, account: &AccountId) -> ChainResult<u128>;

    /// Memo attached to `account`. Empty when the account has none.
    async fn memo_at(&self, hash: &BlockHash, account: &AccountId) -> ChainResult<String>;

    /// Number of decimals of the native token.
    async fn token_decimals(&self) -> ChainResult<u8>;

    /// Fetch the block at `number`.
    async fn block_at(&self, number: u64) -> ChainResult<RawBlock> {
        let hash = self.block_hash(number).await?;
        self.block(&hash).await
    }
}

/// Outcome of a transaction that made it into a block.
#[derive(Debug, Clone)]
pub struct TxInclusion {
    /// Block the transaction was included in.
    pub block_hash: BlockHash,
}

/// Port trait for signing and submitting transactions.
///
/// The implementation owns the signing key.
#[async_trait]
pub trait TransactionSubmitter: Send + Sync {
    /// Account of the signing key.
    fn signer_account(&self) -> AccountId;

    /// Submit `Balances` transfer of `amount` to `dest` with a `tip`,
    /// resolving once the transaction is included or has failed.
    async fn submit_transfer(
        &self,
        dest: &AccountId,
        amount: u128,
        tip: u128,
    ) -> ChainResult<TxInclusion>;
}
