//! Shared fixed-point helpers for the rebalancer workspace.

use alloy::primitives::U256;

/// One unit in 18-decimal fixed point.
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

/// Converts a U256 value to f64, accounting for token decimals.
///
/// Values larger than `u128::MAX` saturate; this is acceptable for f64 precision.
pub fn u256_to_f64(value: U256, decimals: u32) -> f64 {
    let value_u128 = value.saturating_to::<u128>();
    let divisor = 10_u128.pow(decimals);
    let whole_part = value_u128 / divisor;
    let fractional_part = value_u128 % divisor;
    whole_part as f64 + (fractional_part as f64 / divisor as f64)
}

/// Renders an 18-decimal fixed-point value as `integer.fraction` with trailing zeros trimmed.
pub fn format_wad(value: U256) -> String {
    let (integer, frac) = value.div_rem(WAD);
    if frac.is_zero() {
        return integer.to_string();
    }
    let frac = format!("{:0>18}", frac);
    format!("{}.{}", integer, frac.trim_end_matches('0'))
}
