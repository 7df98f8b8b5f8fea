//! Validation of user-supplied monetary values.
//!
//! Money is always [`Decimal`]; floating point never enters the ledger.

use rust_decimal::Decimal;

use crate::{BidmarketError, Result, constants};

/// Reject zero, negative, or over-precise values (bid amounts, invoice prices).
pub fn ensure_positive(field: &str, value: Decimal) -> Result<Decimal> {
    if value <= Decimal::ZERO {
        return Err(BidmarketError::invalid(format!(
            "{field} must be greater than 0, got {value}"
        )));
    }
    ensure_scale(field, value)
}

/// Reject negative or over-precise values (opening balances).
pub fn ensure_non_negative(field: &str, value: Decimal) -> Result<Decimal> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(BidmarketError::invalid(format!(
            "{field} must not be negative, got {value}"
        )));
    }
    ensure_scale(field, value)
}

/// `lhs + rhs`, or `InvalidArgument` if the sum leaves the `Decimal` range.
pub fn checked_add(field: &str, lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_add(rhs)
        .ok_or_else(|| BidmarketError::invalid(format!("{field} overflows: {lhs} + {rhs}")))
}

/// `lhs - rhs`, or `InvalidArgument` if the difference leaves the `Decimal` range.
pub fn checked_sub(field: &str, lhs: Decimal, rhs: Decimal) -> Result<Decimal> {
    lhs.checked_sub(rhs)
        .ok_or_else(|| BidmarketError::invalid(format!("{field} overflows: {lhs} - {rhs}")))
}

fn ensure_scale(field: &str, value: Decimal) -> Result<Decimal> {
    if value.scale() > constants::MONEY_SCALE {
        return Err(BidmarketError::invalid(format!(
            "{field} has more than {} decimal places: {value}",
            constants::MONEY_SCALE
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_accepts_cents() {
        assert_eq!(
            ensure_positive("amount", Decimal::new(9999, 2)).unwrap(),
            Decimal::new(9999, 2)
        );
    }

    #[test]
    fn positive_rejects_zero_and_negative() {
        assert!(ensure_positive("amount", Decimal::ZERO).is_err());
        assert!(ensure_positive("amount", Decimal::new(-1, 0)).is_err());
    }

    #[test]
    fn checked_add_reports_overflow() {
        assert_eq!(
            checked_add("balance", Decimal::ONE, Decimal::TWO).unwrap(),
            Decimal::new(3, 0)
        );
        let err = checked_add("balance", Decimal::MAX, Decimal::ONE).unwrap_err();
        assert!(matches!(err, BidmarketError::InvalidArgument { .. }));
        assert!(checked_sub("balance", Decimal::MIN, Decimal::ONE).is_err());
    }

    #[test]
    fn non_negative_accepts_zero() {
        assert!(ensure_non_negative("balance", Decimal::ZERO).is_ok());
        assert!(ensure_non_negative("balance", Decimal::new(-5, 1)).is_err());
    }

    #[test]
    fn rejects_excess_precision() {
        let err = ensure_positive("price", Decimal::new(1, 9)).unwrap_err();
        assert!(format!("{err}").contains("decimal places"));
    }
}
