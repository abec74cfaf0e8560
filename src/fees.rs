//! Fee engine: pure arithmetic turning a gross deposit into the net amount
//! actually credited to the driver.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use std::str::FromStr;

/// Normalize a raw configured fee value to an effective rate in `[0, 1]`.
/// Values above 1 are read as percentages (5 means 5%); unparseable or
/// absent input means no fee.
pub fn normalize_fee_rate(raw: Option<&str>) -> Decimal {
    let Some(raw) = raw else {
        return Decimal::ZERO;
    };
    let Ok(mut rate) = Decimal::from_str(raw.trim()) else {
        return Decimal::ZERO;
    };
    if rate > Decimal::ONE {
        rate /= dec!(100);
    }
    rate.clamp(Decimal::ZERO, Decimal::ONE)
}

/// Net payout = gross * (1 - rate), rounded to 2 fractional digits with
/// round-half-up. The rounding rule is load-bearing: financial totals must
/// match it exactly.
pub fn net_amount(gross: Decimal, fee_rate_raw: Option<&str>) -> Decimal {
    let rate = normalize_fee_rate(fee_rate_raw);
    (gross * (Decimal::ONE - rate))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_and_fraction_are_equivalent() {
        assert_eq!(net_amount(dec!(1000), Some("5")), dec!(950.00));
        assert_eq!(net_amount(dec!(1000), Some("0.05")), dec!(950.00));
    }

    #[test]
    fn zero_rate_is_identity() {
        assert_eq!(net_amount(dec!(1234.56), Some("0")), dec!(1234.56));
        assert_eq!(net_amount(dec!(1234.56), None), dec!(1234.56));
    }

    #[test]
    fn net_is_monotone_non_increasing_in_rate() {
        let gross = dec!(1000);
        let rates = ["0", "0.01", "0.03", "0.5", "0.99", "1"];
        let nets: Vec<Decimal> = rates
            .iter()
            .map(|r| net_amount(gross, Some(r)))
            .collect();
        assert!(nets.windows(2).all(|w| w[0] >= w[1]), "nets: {nets:?}");
        assert_eq!(nets[0], gross);
    }

    #[test]
    fn rounds_half_up_to_two_digits() {
        // 333.335 sits exactly on the midpoint
        assert_eq!(net_amount(dec!(333.335), Some("0")), dec!(333.34));
        // 1000 * 0.97 with a third digit
        assert_eq!(net_amount(dec!(103.09), Some("0.03")), dec!(100.00));
    }

    #[test]
    fn rate_is_clamped() {
        // 150 -> 1.5 after percentage normalization -> clamped to 1
        assert_eq!(net_amount(dec!(1000), Some("150")), dec!(0.00));
        assert_eq!(net_amount(dec!(1000), Some("-0.5")), dec!(1000.00));
    }

    #[test]
    fn garbage_rate_means_no_fee() {
        assert_eq!(net_amount(dec!(500), Some("abc")), dec!(500.00));
        assert_eq!(net_amount(dec!(500), Some("")), dec!(500.00));
    }
}
