//! Shared helper functions for PostgreSQL row conversion.

use furnace_core::error::{StorageError, StorageResult};
use furnace_core::models::AccountId;

/// Convert a `Vec<u8>` to a fixed-size 32-byte array.
///
/// Returns an error if the length doesn't match.
pub fn bytes_to_hash32(bytes: Vec<u8>, field_name: &str) -> StorageResult<[u8; 32]> {
    bytes.try_into().map_err(|v: Vec<u8>| {
        StorageError::SerializationError(format!(
            "{} has invalid length: expected 32, got {}",
            field_name,
            v.len()
        ))
    })
}

/// Convert a `BYTEA` column to an account id.
pub fn bytes_to_account(bytes: Vec<u8>, field_name: &str) -> StorageResult<AccountId> {
    bytes_to_hash32(bytes, field_name).map(AccountId)
}

/// Parse a `NUMERIC` column selected as `TEXT` into base units.
///
/// Balances exceed `i64`, so they are stored as `NUMERIC(39, 0)` and bound
/// or read through their decimal string.
pub fn numeric_to_u128(text: &str, field_name: &str) -> StorageResult<u128> {
    text.parse().map_err(|_| {
        StorageError::SerializationError(format!(
            "{} is not a non-negative integer: {}",
            field_name, text
        ))
    })
}

/// Convert a `BIGINT` column to a block number.
pub fn bigint_to_u64(value: i64, field_name: &str) -> StorageResult<u64> {
    u64::try_from(value).map_err(|_| {
        StorageError::SerializationError(format!("{} is negative: {}", field_name, value))
    })
}
