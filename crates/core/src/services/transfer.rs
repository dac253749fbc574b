//! Balance transfer decoding.
//!
//! Extrinsic arguments arrive as JSON converted from SCALE values, and their
//! shape varies with runtime metadata versions. These helpers pull the
//! destination and amount out of a `Balances` transfer call regardless of
//! the exact representation.

use crate::models::AccountId;
use crate::ports::RawExtrinsic;

/// Pallet holding the transfer calls.
pub const BALANCES_PALLET: &str = "Balances";

/// Call names treated as a plain balance transfer.
pub const TRANSFER_CALLS: &[&str] = &["transfer", "transfer_keep_alive", "transfer_allow_death"];

/// A decoded balance transfer extrinsic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferCall {
    /// Index of the extrinsic in its block.
    pub index: u32,
    pub sender: AccountId,
    pub dest: AccountId,
    /// Transferred amount in base units.
    pub amount: u128,
    /// Tip paid by the sender, zero when absent.
    pub tip: u128,
}

impl TransferCall {
    /// Decode `ext` if it is a signed `Balances` transfer.
    ///
    /// Returns `None` for any other call or when the arguments can't be
    /// parsed.
    pub fn from_extrinsic(ext: &RawExtrinsic) -> Option<Self> {
        if ext.pallet != BALANCES_PALLET || !TRANSFER_CALLS.contains(&ext.call.as_str()) {
            return None;
        }

        let sender = ext.signer.clone()?;
        let dest = extract_field(&ext.args, &["dest", "to"], 0, parse_account)?;
        let amount = extract_field(&ext.args, &["value", "amount"], 1, parse_amount)?;

        Some(Self {
            index: ext.index,
            sender,
            dest,
            amount,
            tip: ext.tip.unwrap_or(0),
        })
    }
}

// =============================================================================
// Field extraction
// =============================================================================

/// Extract a field from call data, trying multiple key names and falling back to index.
pub fn extract_field<T>(
    data: &serde_json::Value,
    keys: &[&str],
    index: usize,
    parser: fn(&serde_json::Value) -> Option<T>,
) -> Option<T> {
    keys.iter()
        .find_map(|key| data.get(*key))
        .or_else(|| data.get(index))
        .and_then(parser)
}

/// Parse an account ID from various JSON representations.
///
/// Handles multiple formats that may be returned by Substrate nodes:
/// - Hex string: `"0x1234..."`
/// - Wrapped object: `{ "Id": "0x..." }`
/// - Array wrapper: `["0x..."]`
/// - Byte array: `[b0, b1, ..., b31]`
pub fn parse_account(value: &serde_json::Value) -> Option<AccountId> {
    match value {
        serde_json::Value::String(s) => AccountId::from_hex(s).ok(),
        serde_json::Value::Object(obj) => obj
            .get("Id")
            .or_else(|| obj.get("id"))
            .and_then(parse_account),
        serde_json::Value::Array(arr) => {
            if arr.len() == 1 {
                return parse_account(&arr[0]);
            }
            if arr.len() != 32 {
                return None;
            }
            let mut bytes = [0u8; 32];
            for (i, v) in arr.iter().enumerate() {
                bytes[i] = u8::try_from(v.as_u64()?).ok()?;
            }
            Some(AccountId(bytes))
        }
        _ => None,
    }
}

/// Parse an amount (u128) from JSON.
///
/// Handles both numeric and string representations: JSON numbers are
/// limited to u64 but balances can be u128.
pub fn parse_amount(value: &serde_json::Value) -> Option<u128> {
    match value {
        serde_json::Value::Number(n) => n.as_u64().map(u128::from),
        serde_json::Value::String(s) => s.parse().ok(),
        _ => None,
    }
}
