//! Conversion between human token amounts and ledger base units.
//!
//! The ledger only moves integers: `base = round(human × 10^decimals)`.
//! Decimals always come from the live asset configuration.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{LedgerError, constants};

/// Convert a human amount into the asset's smallest integer unit.
///
/// Rounds half away from zero.
///
/// # Errors
/// [`LedgerError::AmountOverflow`] if the result does not fit a `u64`, the
/// amount is negative, or `decimals` exceeds
/// [`constants::MAX_ASSET_DECIMALS`].
pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64, LedgerError> {
    let overflow = || LedgerError::AmountOverflow {
        amount: amount.to_string(),
        decimals,
    };

    if decimals > constants::MAX_ASSET_DECIMALS || amount.is_sign_negative() {
        return Err(overflow());
    }

    let scale = Decimal::from(10u64.pow(u32::from(decimals)));
    amount
        .checked_mul(scale)
        .map(|scaled| scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
        .and_then(|rounded| rounded.to_u64())
        .ok_or_else(overflow)
}

/// Convert base units back into a human amount, for logs and receipts.
#[must_use]
pub fn from_base_units(base: u64, decimals: u8) -> Decimal {
    let decimals = decimals.min(constants::MAX_ASSET_DECIMALS);
    Decimal::from_i128_with_scale(i128::from(base), u32::from(decimals)).normalize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn airdrop_amount_nine_decimals() {
        assert_eq!(
            to_base_units(Decimal::from(250), 9).unwrap(),
            250_000_000_000
        );
    }

    #[test]
    fn purchase_amount_five_decimals() {
        assert_eq!(
            to_base_units(Decimal::from(50_000), 5).unwrap(),
            5_000_000_000
        );
    }

    #[test]
    fn zero_decimals_is_identity() {
        assert_eq!(to_base_units(Decimal::from(42), 0).unwrap(), 42);
    }

    #[test]
    fn fractional_amount_rounds_half_away() {
        // 0.0000005 with 6 decimals = 0.5 base units -> 1
        assert_eq!(to_base_units(Decimal::new(5, 7), 6).unwrap(), 1);
        // 0.0000004 with 6 decimals = 0.4 base units -> 0
        assert_eq!(to_base_units(Decimal::new(4, 7), 6).unwrap(), 0);
        // 1.25 with 1 decimal = 12.5 -> 13
        assert_eq!(to_base_units(Decimal::new(125, 2), 1).unwrap(), 13);
    }

    #[test]
    fn overflow_is_reported() {
        let err = to_base_units(Decimal::from(u64::MAX), 9).unwrap_err();
        assert!(matches!(err, LedgerError::AmountOverflow { decimals: 9, .. }));
    }

    #[test]
    fn too_many_decimals_rejected() {
        assert!(to_base_units(Decimal::ONE, 20).is_err());
        assert_eq!(
            to_base_units(Decimal::ONE, 19).unwrap(),
            10_000_000_000_000_000_000
        );
    }

    #[test]
    fn negative_amount_rejected() {
        assert!(to_base_units(Decimal::from(-1), 9).is_err());
    }

    #[test]
    fn back_to_human() {
        assert_eq!(from_base_units(250_000_000_000, 9), Decimal::from(250));
        assert_eq!(from_base_units(15, 1), Decimal::new(15, 1));
    }
}
