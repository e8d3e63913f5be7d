// Wei/Shannon conversions and the external display helper.
//
// 1 wei = 1e-18 ether; 1 Shannon = 1e9 wei. Truncation toward zero happens
// exactly once, at the wei -> Shannon boundary, when a rational reward
// share is folded into the persisted integer credit ledger.

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{ToPrimitive, Zero};

pub const WEI_PER_SHANNON: i64 = 1_000_000_000;

/// Converts a wei amount to Shannon, truncating toward zero.
pub fn wei_to_shannon(wei: &BigInt) -> BigInt {
    wei / BigInt::from(WEI_PER_SHANNON)
}

/// Converts an exact rational wei amount to Shannon, truncating toward zero.
pub fn rational_wei_to_shannon(wei: &BigRational) -> BigInt {
    let shannon = wei / BigRational::from_integer(BigInt::from(WEI_PER_SHANNON));
    shannon.to_integer()
}

/// Renders a Shannon amount the way an operator dashboard would: Shannon
/// scaled by 1e-7, with eight fractional digits. This is a presentation
/// helper only — nothing in the core persists or compares on this form.
pub fn format_shannon_display(shannon: &BigInt) -> String {
    if shannon.is_zero() {
        return "0.00000000".to_string();
    }
    let negative = shannon.sign() == num_bigint::Sign::Minus;
    let magnitude = BigInt::from_biguint(num_bigint::Sign::Plus, shannon.magnitude().clone());
    // value = shannon * 1e-7 = (shannon * 10) * 1e-8; scale to 8 fractional digits.
    let scaled = magnitude * BigInt::from(10);
    let divisor = BigInt::from(100_000_000u64);
    let whole = &scaled / &divisor;
    let frac = &scaled % &divisor;
    let frac_val = frac.to_u64().unwrap_or(0);
    let sign = if negative { "-" } else { "" };
    format!("{sign}{whole}.{frac_val:08}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_toward_zero() {
        let wei = BigInt::from(1_999_999_999i64);
        assert_eq!(wei_to_shannon(&wei), BigInt::from(1));
    }

    #[test]
    fn rational_floor_matches_integer_division() {
        let r = BigRational::new(BigInt::from(2_999_999_999i64), BigInt::from(1));
        assert_eq!(rational_wei_to_shannon(&r), BigInt::from(2));
    }

    #[test]
    fn display_formats_eight_fractional_digits() {
        let shannon = BigInt::from(12_345_678i64);
        assert_eq!(format_shannon_display(&shannon), "1.23456780");
    }

    #[test]
    fn display_handles_zero() {
        assert_eq!(format_shannon_display(&BigInt::zero()), "0.00000000");
    }
}
