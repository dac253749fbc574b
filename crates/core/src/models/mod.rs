//! Domain models for the treasury ledger.
//!
//! These models are storage-agnostic and represent the canonical
//! form of the ledger records within the domain layer. Every record
//! is created once, while its block is processed, and never mutated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// 32-byte Hash Types
// =============================================================================

/// Macro to generate 32-byte hash newtypes with common functionality.
///
/// Generates:
/// - `from_hex()` - Parse from hex string (with or without 0x prefix)
/// - `to_hex()` - Convert to 0x-prefixed hex string
/// - `Display` trait implementation
/// - `From<[u8; 32]>` implementation
macro_rules! hash32_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub [u8; 32]);

        impl $name {
            /// Parse from hex string (with or without 0x prefix).
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                let s = s.strip_prefix("0x").unwrap_or(s);
                let bytes = hex::decode(s)?;
                let arr: [u8; 32] = bytes
                    .try_into()
                    .map_err(|_| hex::FromHexError::InvalidStringLength)?;
                Ok(Self(arr))
            }

            /// Convert to 0x-prefixed hex string.
            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }

            /// Get the inner bytes.
            pub fn as_bytes(&self) -> &[u8; 32] {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.to_hex())
            }
        }

        impl From<[u8; 32]> for $name {
            fn from(bytes: [u8; 32]) -> Self {
                Self(bytes)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

hash32_newtype!(
    /// 32-byte block hash (Blake2-256).
    BlockHash
);

hash32_newtype!(
    /// 32-byte account identifier (SS58 decoded public key).
    AccountId
);

// =============================================================================
// Exchanges
// =============================================================================

/// Sentinel stored when no payment address could be extracted from a memo.
pub const NO_ADDRESS_FOUND: &str = "No address found";

/// Payout status of an exchange.
///
/// Exchanges are always recorded as `Pending`; the payout process that
/// settles them lives outside the indexer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExchangeStatus {
    #[default]
    Pending,
    Completed,
}

impl ExchangeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExchangeStatus::Pending => "PENDING",
            ExchangeStatus::Completed => "COMPLETED",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ExchangeStatus::Pending),
            "COMPLETED" => Some(ExchangeStatus::Completed),
            _ => None,
        }
    }
}

/// A successful transfer into the treasury address, priced in USD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Exchange {
    /// Account that sent the tokens.
    pub sender: AccountId,
    /// Treasury account that received them.
    pub recipient: AccountId,
    /// Raw memo of the sender at the block.
    pub sender_memo: String,
    /// External payment address parsed from the memo, or [`NO_ADDRESS_FOUND`].
    pub payment_address: String,
    /// Transferred amount in base units.
    pub amount: u128,
    /// Unit token price in USD at the block.
    pub price: f64,
    /// `price * amount` in whole tokens.
    pub amount_usd: f64,
    /// Block containing the transfer.
    pub block_height: u64,
    /// Block timestamp.
    pub date: DateTime<Utc>,
    /// When the exchange was recorded.
    pub log_time: DateTime<Utc>,
    /// Payout status.
    pub status: ExchangeStatus,
}

impl Exchange {
    /// Whether a payment address was found in the sender's memo.
    pub fn has_payment_address(&self) -> bool {
        self.payment_address != NO_ADDRESS_FOUND
    }
}

// =============================================================================
// Burns
// =============================================================================

/// An outgoing tipped transfer from the treasury.
///
/// The burned quantity is the extrinsic tip, not the transferred amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Burn {
    /// Burned amount (the tip) in base units.
    pub amount: u128,
    /// Block containing the burn.
    pub block_height: u64,
    /// Block timestamp.
    pub date: DateTime<Utc>,
    /// When the burn was recorded.
    pub log_time: DateTime<Utc>,
}

// =============================================================================
// Processing diagnostics
// =============================================================================

/// A block that could not be processed; the pipeline halted on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingError {
    pub block_number: u64,
    pub reason: Option<String>,
    pub log_time: DateTime<Utc>,
}

/// A block processed before the chain finalized it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingWarning {
    pub block_number: u64,
    pub message: String,
    pub log_time: DateTime<Utc>,
}

impl ProcessingWarning {
    /// Warning for a block processed ahead of finality.
    pub fn speculative(block_number: u64, finalized: u64) -> Self {
        Self {
            block_number,
            message: format!(
                "Processing before finalized! Finalized: {}, Processing: {}",
                finalized, block_number
            ),
            log_time: Utc::now(),
        }
    }
}

// =============================================================================
// Ledger State
// =============================================================================

/// Scalar ledger state, stored as a single row.
///
/// `last_block_processed` is the pipeline's only resumption point and is
/// advanced in the same transaction as the pool decrement of its block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerState {
    /// Genesis hash of the chain this ledger belongs to (hex).
    pub chain_id: Option<String>,
    /// USD backing the circulating tokens.
    pub size_dollar_pool: f64,
    /// Height of the last fully processed block.
    pub last_block_processed: Option<u64>,
    /// Total USD added to the pool by operators.
    pub replenish_amount: f64,
    /// Sum of all recorded burns, in base units.
    pub tokens_burned: u128,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

impl Default for LedgerState {
    fn default() -> Self {
        Self {
            chain_id: None,
            size_dollar_pool: 0.0,
            last_block_processed: None,
            replenish_amount: 0.0,
            tokens_burned: 0,
            updated_at: Utc::now(),
        }
    }
}

/// Everything one block writes to the ledger, committed atomically.
#[derive(Debug, Clone)]
pub struct BlockCommit {
    /// Height that becomes the new checkpoint.
    pub block_number: u64,
    /// Pool size after subtracting this block's exchanges.
    pub pool_after: f64,
    pub exchanges: Vec<Exchange>,
    pub burns: Vec<Burn>,
}

impl BlockCommit {
    /// USD value of all exchanges in the block.
    pub fn exchanged_usd(&self) -> f64 {
        self.exchanges.iter().map(|e| e.amount_usd).sum()
    }

    /// Base units burned in the block.
    pub fn burned(&self) -> u128 {
        self.burns.iter().map(|b| b.amount).sum()
    }
}

// =============================================================================
// Tests
// =============================================================================
