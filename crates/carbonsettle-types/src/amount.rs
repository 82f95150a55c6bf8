//! Token amounts and checked arithmetic.
//!
//! Amounts are raw integer token units (no decimals applied). Every
//! addition and subtraction that touches custodied value goes through the
//! helpers here so overflow and underflow surface as errors instead of
//! wrapping.

use rust_decimal::{
    Decimal,
    prelude::{FromPrimitive, ToPrimitive},
};

use crate::{Result, SettleError};

/// Raw token quantity in the token's smallest unit.
pub type Amount = u128;

/// `a + b`, or [`SettleError::ArithmeticOverflow`].
pub fn checked_add(a: Amount, b: Amount, context: &str) -> Result<Amount> {
    a.checked_add(b).ok_or_else(|| SettleError::ArithmeticOverflow {
        context: format!("{context}: {a} + {b}"),
    })
}

/// `a - b`, or [`SettleError::ArithmeticUnderflow`].
pub fn checked_sub(a: Amount, b: Amount, context: &str) -> Result<Amount> {
    a.checked_sub(b).ok_or_else(|| SettleError::ArithmeticUnderflow {
        context: format!("{context}: {a} - {b}"),
    })
}

/// Sum a sequence of amounts, failing on overflow.
pub fn checked_sum<'a>(
    amounts: impl IntoIterator<Item = &'a Amount>,
    context: &str,
) -> Result<Amount> {
    amounts
        .into_iter()
        .try_fold(0, |acc: Amount, amount| checked_add(acc, *amount, context))
}

/// Lower bound for an exact-input swap given a quoted output and a
/// fractional slippage tolerance in `[0, 1]`.
///
/// The result is rounded down, so the floor never exceeds the quote.
pub fn apply_tolerance(quoted: Amount, tolerance: Decimal) -> Result<Amount> {
    if tolerance.is_sign_negative() || tolerance > Decimal::ONE {
        return Err(SettleError::Configuration(format!(
            "slippage tolerance {tolerance} outside [0, 1]"
        )));
    }
    let quoted_dec = Decimal::from_u128(quoted).ok_or_else(|| SettleError::ArithmeticOverflow {
        context: format!("slippage floor: quote {quoted} exceeds decimal range"),
    })?;
    let floor = quoted_dec
        .checked_mul(Decimal::ONE - tolerance)
        .ok_or_else(|| SettleError::ArithmeticOverflow {
            context: format!("slippage floor: {quoted} * (1 - {tolerance})"),
        })?
        .floor();
    floor.to_u128().ok_or_else(|| SettleError::Internal(format!(
        "slippage floor {floor} not representable as an amount"
    )))
}
