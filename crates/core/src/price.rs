//! Token price model.
//!
//! The unit price is the dollar pool spread over the total token supply:
//! `price = pool / supply`. Supply is always read at the block being
//! priced, so transfers inside that block cannot move their own price.

use crate::error::{DomainError, DomainResult};

/// Unit token price in USD for a given supply (whole tokens) and pool size.
///
/// A zero, negative or non-finite supply is rejected instead of producing
/// `inf` or `NaN` that would end up in a persisted record.
pub fn token_price(total_supply: f64, pool_size: f64) -> DomainResult<f64> {
    if !total_supply.is_finite() || total_supply <= 0.0 {
        return Err(DomainError::InvalidSupply(total_supply));
    }
    Ok(pool_size / total_supply)
}

/// Convert an amount in base units to whole tokens.
pub fn to_tokens(base_units: u128, decimals: u8) -> f64 {
    base_units as f64 / 10f64.powi(decimals as i32)
}

/// USD value of `base_units` at `price`.
pub fn usd_value(base_units: u128, decimals: u8, price: f64) -> f64 {
    price * to_tokens(base_units, decimals)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn price_is_pool_over_supply() {
        assert_eq!(token_price(10_000.0, 2_000.0).unwrap(), 0.2);
        assert_eq!(token_price(3.0, 1.0).unwrap(), 1.0 / 3.0);
        // Un pool vide donne un prix nul, pas une erreur
        assert_eq!(token_price(10.0, 0.0).unwrap(), 0.0);
    }

    // Test critique: jamais de inf/NaN dans un enregistrement persisté
    #[test]
    fn zero_supply_is_rejected() {
        assert!(matches!(
            token_price(0.0, 2_000.0),
            Err(DomainError::InvalidSupply(s)) if s == 0.0
        ));
        assert!(token_price(-1.0, 2_000.0).is_err());
        assert!(token_price(f64::NAN, 2_000.0).is_err());
        assert!(token_price(f64::INFINITY, 2_000.0).is_err());
    }

    #[test]
    fn base_units_scale_by_decimals() {
        assert_eq!(to_tokens(500, 0), 500.0);
        assert_eq!(to_tokens(1_500_000_000, 10), 0.15);
        assert_eq!(usd_value(500, 0, 0.2), 100.0);
    }
}
