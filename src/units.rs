// src/units.rs
use alloy::primitives::U256;
use std::str::FromStr;

const WEI_PER_ETHER: u64 = 1_000_000_000_000_000_000;
const WEI_PER_GWEI: u64 = 1_000_000_000;

/// Render `value / 10^decimals` with trailing fraction zeros trimmed,
/// always keeping at least one fractional digit ("1.0", "0.5").
fn format_scaled(value: U256, unit: u64, decimals: usize) -> String {
    let unit = U256::from(unit);
    let whole = value / unit;
    // remainder < unit <= u64::MAX, so the low limb holds all of it
    let frac = (value % unit).as_limbs()[0];

    let mut frac = format!("{:0width$}", frac, width = decimals);
    while frac.len() > 1 && frac.ends_with('0') {
        frac.pop();
    }
    format!("{}.{}", whole, frac)
}

/// Wei → ether display string, 18 decimals regardless of the token.
pub fn format_ether(wei: U256) -> String {
    format_scaled(wei, WEI_PER_ETHER, 18)
}

/// Wei → gwei display string.
pub fn format_gwei(wei: U256) -> String {
    format_scaled(wei, WEI_PER_GWEI, 9)
}

/// Decimal string (as returned by explorer APIs) → ether display string.
/// Unparseable input is returned unchanged.
pub fn format_ether_str(wei: &str) -> String {
    match U256::from_str(wei.trim()) {
        Ok(v) => format_ether(v),
        Err(_) => wei.to_string(),
    }
}

/// Parse a `0x` quantity as returned by JSON-RPC.
pub fn parse_quantity(hex_quantity: &str) -> Option<U256> {
    let digits = hex_quantity.trim_start_matches("0x");
    if digits.is_empty() {
        return Some(U256::ZERO);
    }
    U256::from_str_radix(digits, 16).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ether_keeps_one_fraction_digit() {
        assert_eq!(format_ether(U256::from(WEI_PER_ETHER)), "1.0");
        assert_eq!(format_ether(U256::ZERO), "0.0");
        assert_eq!(format_ether(U256::from(2 * WEI_PER_ETHER)), "2.0");
    }

    #[test]
    fn ether_trims_trailing_zeros() {
        assert_eq!(format_ether(U256::from(500_000_000_000_000_000u64)), "0.5");
        assert_eq!(format_ether(U256::from(1u64)), "0.000000000000000001");
        assert_eq!(
            format_ether(U256::from(1_234_500_000_000_000_000u64)),
            "1.2345"
        );
    }

    #[test]
    fn ether_handles_values_beyond_u128() {
        let max = U256::MAX;
        let rendered = format_ether(max);
        let integer_part = "115792089237316195423570985008687907853269984665640564039457.";
        assert!(rendered.starts_with(integer_part));
    }

    #[test]
    fn gwei_scaling() {
        assert_eq!(format_gwei(U256::from(20_000_000_000u64)), "20.0");
        assert_eq!(format_gwei(U256::from(1_500_000_000u64)), "1.5");
    }

    #[test]
    fn ether_from_decimal_string() {
        assert_eq!(format_ether_str("500000000000000000"), "0.5");
        assert_eq!(format_ether_str("not a number"), "not a number");
    }

    #[test]
    fn quantities() {
        assert_eq!(parse_quantity("0x0"), Some(U256::ZERO));
        assert_eq!(parse_quantity("0x"), Some(U256::ZERO));
        assert_eq!(parse_quantity("0x11c37937e08000"), Some(U256::from(5_000_000_000_000_000u64)));
        assert_eq!(parse_quantity("0xzz"), None);
    }
}
