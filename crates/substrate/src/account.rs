//! Account id parsing and formatting.

use std::str::FromStr;

use subxt::utils::AccountId32;

use furnace_core::error::DomainError;
use furnace_core::models::AccountId;

/// Parse an account from SS58 or `0x`-prefixed hex.
pub fn parse_account(input: &str) -> Result<AccountId, DomainError> {
    let input = input.trim();

    if input.starts_with("0x") {
        return AccountId::from_hex(input)
            .map_err(|e| DomainError::InvalidAccountId(format!("{}: {}", input, e)));
    }

    AccountId32::from_str(input)
        .map(|account| AccountId(account.0))
        .map_err(|e| DomainError::InvalidAccountId(format!("{}: {}", input, e)))
}

/// SS58 representation with the generic Substrate prefix.
pub fn to_ss58(account: &AccountId) -> String {
    AccountId32(account.0).to_string()
}
