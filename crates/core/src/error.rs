//! Error types for the indexer domain layer.
//!
//! This module defines a hierarchy of error types:
//!
//! - [`DomainError`] - Business logic errors
//! - [`StorageError`] - Ledger store errors
//! - [`ChainError`] - Blockchain RPC and submission errors
//! - [`IndexerError`] - Top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

// =============================================================================
// Domain Errors
// =============================================================================

/// Business logic and domain rule violations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// Total token supply is zero, negative or not a finite number.
    ///
    /// Pricing against such a supply would persist `inf`/`NaN`, so this is
    /// a precondition violation rather than a recoverable condition.
    #[error("Invalid token supply for pricing: {0}")]
    InvalidSupply(f64),

    /// Account ID failed validation.
    #[error("Invalid account ID: {0}")]
    InvalidAccountId(String),

    /// Generic validation error.
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Ledger store errors.
///
/// These errors originate from storage operations like queries,
/// transactions, and data serialization.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to establish database connection.
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    /// SQL query execution failed.
    #[error("Query execution error: {0}")]
    QueryError(String),

    /// Database migration failed.
    #[error("Migration error: {0}")]
    MigrationError(String),

    /// Transaction commit/rollback failed.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// Data serialization/deserialization failed.
    #[error("Serialization error: {0}")]
    SerializationError(String),
}

// =============================================================================
// Chain Errors
// =============================================================================

/// Blockchain RPC, connectivity and submission errors.
#[derive(Debug, Error)]
pub enum ChainError {
    /// WebSocket connection failed.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// RPC request failed.
    #[error("RPC error: {0}")]
    RpcError(String),

    /// Head subscription failed or disconnected.
    #[error("Subscription error: {0}")]
    SubscriptionError(String),

    /// Runtime metadata could not be fetched or parsed.
    #[error("Metadata error: {0}")]
    MetadataError(String),

    /// No block exists at the requested height.
    #[error("Block {0} not found")]
    BlockNotFound(u64),

    /// Block could not be fetched.
    #[error("Block fetch error at hash {hash}: {message}")]
    BlockFetchError {
        /// Block hash that failed to fetch.
        hash: String,
        /// Error details.
        message: String,
    },

    /// A storage item expected at a block was missing.
    #[error("Missing storage {item} at {hash}")]
    MissingStorage {
        /// Pallet and entry name, e.g. `Balances.TotalIssuance`.
        item: String,
        /// Block hash queried.
        hash: String,
    },

    /// Signing key could not be loaded.
    #[error("Signer error: {0}")]
    SignerError(String),

    /// Transaction was rejected, dropped or failed on chain.
    #[error("Transaction submission failed: {0}")]
    SubmissionFailed(String),
}

// =============================================================================
// Indexer Errors
// =============================================================================

/// Top-level indexer orchestration errors.
///
/// This is the main error type returned by [`crate::services::IndexerService`]
/// and [`crate::services::BlockProcessor`].
#[derive(Debug, Error)]
pub enum IndexerError {
    /// Domain logic error.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// Storage/database error.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// Blockchain connectivity error.
    #[error("Chain error: {0}")]
    Chain(#[from] ChainError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Connected chain doesn't match stored data.
    ///
    /// This is a fatal error that requires manual intervention.
    #[error("Chain mismatch: connected to {connected} but database contains data for {expected}")]
    ChainMismatch {
        /// Genesis hash of connected chain.
        connected: String,
        /// Genesis hash expected by database.
        expected: String,
    },

    /// Block processing exceeded its wall-clock budget.
    #[error("Block {block} processing timed out after {timeout_ms}ms")]
    BlockTimeout {
        /// Height of the stuck block.
        block: u64,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// A block could not be processed and the pipeline halted.
    ///
    /// The error record and checkpoint have already been persisted when
    /// this is returned. Operator intervention is required.
    #[error("Block {block} processing failed: {reason}")]
    BlockProcessingFailed {
        /// Faulting block height.
        block: u64,
        /// Reason recorded in the error log.
        reason: String,
    },

    /// Graceful shutdown was requested.
    ///
    /// This is not really an error but uses the error type for control flow.
    #[error("Indexer shutdown requested")]
    ShutdownRequested,
}

impl IndexerError {
    /// Whether the process must stop and wait for an operator.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            IndexerError::BlockProcessingFailed { .. } | IndexerError::ChainMismatch { .. }
        )
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for indexer operations.
pub type IndexerResult<T> = Result<T, IndexerError>;

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Result type for chain operations.
pub type ChainResult<T> = Result<T, ChainError>;

#[cfg(test)]
mod tests {
    use super::*;

    // Test critique: la chaîne de conversion d'erreurs fonctionne
    // Permet d'utiliser ? à travers les couches
    #[test]
    fn test_error_conversion_chain() {
        // Storage -> Domain -> Indexer
        let storage_err = StorageError::QueryError("db failed".into());
        let domain_err: DomainError = storage_err.into();
        let indexer_err: IndexerError = domain_err.into();

        assert!(indexer_err.to_string().contains("db failed"));

        // Chain -> Indexer
        let chain_err = ChainError::RpcError("rpc failed".into());
        let indexer_err: IndexerError = chain_err.into();
        assert!(indexer_err.to_string().contains("rpc failed"));
    }

    #[test]
    fn test_timeout_message_names_block() {
        let err = IndexerError::BlockTimeout {
            block: 102,
            timeout_ms: 10_000,
        };
        let msg = err.to_string();
        assert!(msg.contains("102") && msg.contains("10000ms"));
    }

    // Seuls les arrêts qui exigent une intervention sont fatals
    #[test]
    fn test_fatal_classification() {
        assert!(
            IndexerError::BlockProcessingFailed {
                block: 1,
                reason: "x".into()
            }
            .is_fatal()
        );
        assert!(
            IndexerError::ChainMismatch {
                connected: "0xaaa".into(),
                expected: "0xbbb".into()
            }
            .is_fatal()
        );
        assert!(!IndexerError::ShutdownRequested.is_fatal());
        assert!(!IndexerError::Chain(ChainError::RpcError("x".into())).is_fatal());
    }
}
