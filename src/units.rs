//! Exact conversion between human amounts and integer minor units.
//!
//! On-chain amounts are `U256` minor units end to end. Floating point is
//! allowed only on the way out, for the USD comparison, never on an amount
//! that gets sent on-chain. Conversions that would require rounding are
//! rejected rather than truncated.

use crate::schemas::PriceInput;
use ethers::types::U256;

/// Minor-unit exponent of the native currency.
pub const NATIVE_DECIMALS: u32 = 18;

// 10^78 > 2^256, so no nonzero 256-bit value survives a shift this far.
const MAX_POW10: i64 = 77;

/// Normalize a request price to exact integer minor units.
pub fn normalize_price(price: &PriceInput, decimals: u32) -> Result<U256, String> {
    match price {
        PriceInput::Text(s) => {
            if s.contains('.') || s.contains(['e', 'E']) {
                parse_units_exact(s, decimals)
            } else {
                parse_minor_units(s)
            }
        }
        PriceInput::Number(n) => {
            if let Some(u) = n.as_u64() {
                return Ok(U256::from(u));
            }
            if n.is_i64() {
                return Err("price must not be negative".into());
            }
            let f = n.as_f64().unwrap_or(f64::NAN);
            if !f.is_finite() || f < 0.0 {
                return Err(format!("invalid price {n}"));
            }
            if f.fract() == 0.0 {
                // An integer this large arrived as a float and has already
                // lost precision; only a string can carry it exactly.
                return Err("integer price too large for a JSON number, send it as a string".into());
            }
            parse_units_exact(&n.to_string(), decimals)
        }
    }
}

/// Parse a decimal amount in whole asset units into minor units.
///
/// Accepts optional scientific notation (`1.5e-2`). Fails if the amount has
/// more fractional digits than the asset can represent (unless the excess is
/// all zeros), or does not fit in 256 bits.
pub fn parse_units_exact(s: &str, decimals: u32) -> Result<U256, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("empty amount".into());
    }
    if trimmed.starts_with('-') {
        return Err("amount must not be negative".into());
    }
    let trimmed = trimmed.strip_prefix('+').unwrap_or(trimmed);

    let (mantissa, exp) = match trimmed.find(['e', 'E']) {
        Some(i) => {
            let exp: i32 = trimmed[i + 1..]
                .parse()
                .map_err(|_| format!("invalid exponent in amount {s:?}"))?;
            (&trimmed[..i], exp)
        }
        None => (trimmed, 0),
    };

    let (int_part, frac_part) = match mantissa.find('.') {
        Some(i) => (&mantissa[..i], &mantissa[i + 1..]),
        None => (mantissa, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(format!("invalid amount {s:?}"));
    }
    if !int_part.bytes().all(|b| b.is_ascii_digit())
        || !frac_part.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(format!("invalid amount {s:?}"));
    }

    let mut digits = String::with_capacity(int_part.len() + frac_part.len());
    digits.push_str(int_part);
    digits.push_str(frac_part);
    let digits = digits.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(U256::zero());
    }
    let mut value = U256::from_dec_str(digits)
        .map_err(|_| format!("amount {s:?} does not fit in 256 bits"))?;

    // Powers of ten separating the written digits from one minor unit.
    let scale = i64::from(decimals as i32) + i64::from(exp) - frac_part.len() as i64;

    if scale >= 0 {
        if scale > MAX_POW10 {
            return Err(format!("amount {s:?} does not fit in 256 bits"));
        }
        for _ in 0..scale {
            value = value
                .checked_mul(U256::from(10u64))
                .ok_or_else(|| format!("amount {s:?} does not fit in 256 bits"))?;
        }
        Ok(value)
    } else {
        // More fractional digits than the asset resolves. Exact only when
        // the excess digits are all zero; anything else is rejected, never
        // rounded.
        let excess = -scale;
        if excess > MAX_POW10 {
            return Err(precision_error(s, decimals));
        }
        let mut divisor = U256::one();
        for _ in 0..excess {
            divisor = divisor
                .checked_mul(U256::from(10u64))
                .ok_or_else(|| precision_error(s, decimals))?;
        }
        let (quot, rem) = value.div_mod(divisor);
        if !rem.is_zero() {
            return Err(precision_error(s, decimals));
        }
        Ok(quot)
    }
}

/// Parse an amount that is already in minor units.
pub fn parse_minor_units(s: &str) -> Result<U256, String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Err("empty amount".into());
    }
    if trimmed.starts_with('-') {
        return Err("amount must not be negative".into());
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("invalid amount {s:?}"));
    }
    U256::from_dec_str(trimmed).map_err(|_| format!("amount {s:?} does not fit in 256 bits"))
}

/// Minor units to a decimal whole-unit amount, for the USD comparison only.
pub fn to_decimal_units(amount: U256, decimals: u32) -> f64 {
    ethers::utils::format_units(amount, decimals)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.0)
}

fn precision_error(s: &str, decimals: u32) -> String {
    format!("amount {s:?} has more than {decimals} fractional digits")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(s: &str) -> PriceInput {
        PriceInput::Text(s.to_string())
    }

    fn number(v: serde_json::Value) -> PriceInput {
        match v {
            serde_json::Value::Number(n) => PriceInput::Number(n),
            other => panic!("not a number: {other}"),
        }
    }

    fn wei(s: &str) -> U256 {
        U256::from_dec_str(s).unwrap()
    }

    #[test]
    fn decimal_string_converts_exactly() {
        assert_eq!(
            normalize_price(&text("0.01"), 18).unwrap(),
            wei("10000000000000000")
        );
        assert_eq!(
            normalize_price(&text("1.0"), 18).unwrap(),
            wei("1000000000000000000")
        );
    }

    #[test]
    fn trailing_zeros_do_not_change_the_value() {
        let bare = normalize_price(&text("0.01"), 18).unwrap();
        assert_eq!(normalize_price(&text("0.010"), 18).unwrap(), bare);
        assert_eq!(normalize_price(&text("0.0100000"), 18).unwrap(), bare);
        assert_eq!(normalize_price(&text("00.01"), 18).unwrap(), bare);
    }

    #[test]
    fn scientific_notation_round_trips() {
        assert_eq!(
            normalize_price(&text("1e-2"), 18).unwrap(),
            wei("10000000000000000")
        );
        assert_eq!(
            normalize_price(&text("1.5e1"), 18).unwrap(),
            wei("15000000000000000000")
        );
        assert_eq!(
            normalize_price(&text("2.5E-3"), 18).unwrap(),
            wei("2500000000000000")
        );
        assert_eq!(
            normalize_price(&text("1e-2"), 18).unwrap(),
            normalize_price(&text("0.01"), 18).unwrap()
        );
    }

    #[test]
    fn bare_integer_string_is_minor_units() {
        assert_eq!(normalize_price(&text("1"), 18).unwrap(), U256::one());
        assert_eq!(
            normalize_price(&text("10000000000000000"), 18).unwrap(),
            wei("10000000000000000")
        );
    }

    #[test]
    fn json_integer_is_minor_units() {
        assert_eq!(
            normalize_price(&number(serde_json::json!(2500000)), 6).unwrap(),
            U256::from(2_500_000u64)
        );
    }

    #[test]
    fn json_float_is_whole_units() {
        assert_eq!(
            normalize_price(&number(serde_json::json!(0.01)), 18).unwrap(),
            wei("10000000000000000")
        );
    }

    #[test]
    fn negative_prices_are_rejected() {
        assert!(normalize_price(&text("-0.01"), 18).is_err());
        assert!(normalize_price(&number(serde_json::json!(-5)), 18).is_err());
        assert!(normalize_price(&number(serde_json::json!(-0.5)), 18).is_err());
    }

    #[test]
    fn excess_fractional_digits_are_rejected_not_truncated() {
        // 19 fractional digits, last one nonzero.
        assert!(parse_units_exact("0.1234567890123456789", 18).is_err());
        // Excess digits that are all zero stay exact.
        assert_eq!(
            parse_units_exact("0.1000000000000000000", 18).unwrap(),
            wei("100000000000000000")
        );
    }

    #[test]
    fn six_decimal_assets_resolve_differently() {
        assert_eq!(
            parse_units_exact("2.50", 6).unwrap(),
            U256::from(2_500_000u64)
        );
        assert!(parse_units_exact("0.0000001", 6).is_err());
        assert_eq!(parse_units_exact("0.000001", 6).unwrap(), U256::one());
    }

    #[test]
    fn garbage_is_rejected() {
        for bad in ["", " ", "abc", "1.2.3", "1e2e3", "0.5e", "0x10", "1,5"] {
            assert!(parse_units_exact(bad, 18).is_err(), "accepted {bad:?}");
        }
        assert!(parse_minor_units("1.5").is_err());
        assert!(parse_minor_units("-1").is_err());
    }

    #[test]
    fn overflow_is_rejected() {
        assert!(parse_units_exact("1e100", 18).is_err());
        // 2^256 itself in minor units.
        assert!(parse_minor_units(
            "115792089237316195423570985008687907853269984665640564039457584007913129639936"
        )
        .is_err());
    }

    #[test]
    fn zero_in_any_spelling_is_zero() {
        for z in ["0", "0.0", "0e5", "0.000", ".0"] {
            assert_eq!(parse_units_exact(z, 18).unwrap(), U256::zero(), "{z:?}");
        }
    }

    #[test]
    fn decimal_round_trip_for_usd_comparison() {
        let one_eth = wei("1000000000000000000");
        assert!((to_decimal_units(one_eth, 18) - 1.0).abs() < 1e-12);
        assert!((to_decimal_units(wei("10000000000000000"), 18) - 0.01).abs() < 1e-12);
    }
}
