//! Shared numeric helpers.
//!
//! - `round_dp`: round an f64 to a fixed number of decimals (display parity)
//! - `f64_to_money`: convert an f64 amount to a `Decimal` rounded to cents
//!
//! Non-finite inputs are logged and mapped to zero.

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Round to `dp` decimal places, half away from zero.
pub(crate) fn round_dp(v: f64, dp: u32) -> f64 {
    let factor = 10f64.powi(dp as i32);
    (v * factor).round() / factor
}

/// Convert a currency amount to a `Decimal` rounded to cents.
pub(crate) fn f64_to_money(v: f64) -> Decimal {
    if !v.is_finite() {
        tracing::warn!("f64_to_money received non-finite value {}, defaulting to 0", v);
        return Decimal::ZERO;
    }
    Decimal::from_f64(v)
        .unwrap_or_default()
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Linear interpolation between `a` and `b`; `t` is not clamped.
pub(crate) fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}
