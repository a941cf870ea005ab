//! Raw amount and price arithmetic
//!
//! Ledger events carry amounts as raw smallest-unit integers (`u128`).
//! Prices are computed from those integers with a scaled ratio before any
//! conversion to `Decimal`, so no precision is lost to intermediate floats.
//! Display amounts divide by the asset's unit size (18 decimals).

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

/// Number of decimals in one display unit of the native asset and the token.
pub const UNIT_DECIMALS: u32 = 18;

/// Price ratios are scaled to 5 decimal digits before Decimal conversion.
pub const PRICE_SCALE: u32 = 5;

/// Convert a raw integer with the given decimal scale to a `Decimal`.
///
/// Values beyond the 96-bit `Decimal` mantissa clamp to `Decimal::MAX`.
fn decimal_from_raw(raw: u128, scale: u32) -> Decimal {
    let clamped = raw.min(i128::MAX as u128) as i128;
    Decimal::try_from_i128_with_scale(clamped, scale).unwrap_or(Decimal::MAX)
}

/// Price of a token in native-asset units: `native_raw / token_raw`,
/// computed as an integer ratio scaled to [`PRICE_SCALE`] digits.
///
/// A zero token amount yields a zero price rather than dividing by zero;
/// such an order is unpriceable but must not poison the whole view.
pub fn ratio_price(native_raw: u128, token_raw: u128) -> Decimal {
    if token_raw == 0 {
        return Decimal::ZERO;
    }

    let factor = 10u128.pow(PRICE_SCALE);
    let scaled = match native_raw.checked_mul(factor) {
        Some(n) => n / token_raw,
        // Astronomical native amounts: divide first, accepting the ratio
        // truncation instead of overflowing.
        None => (native_raw / token_raw).saturating_mul(factor),
    };

    decimal_from_raw(scaled, PRICE_SCALE).normalize()
}

/// Convert a raw smallest-unit amount to display units.
pub fn to_display(raw: u128) -> Decimal {
    decimal_from_raw(raw, UNIT_DECIMALS).normalize()
}

/// Convert a display-unit amount to a raw smallest-unit integer, truncating
/// any fraction below the smallest unit. Returns `None` for negative input
/// or amounts too large for `u128`.
pub fn to_raw(display: Decimal) -> Option<u128> {
    if display.is_sign_negative() {
        return None;
    }
    let unit = Decimal::from(10u64.pow(UNIT_DECIMALS));
    display.checked_mul(unit)?.trunc().to_u128()
}
