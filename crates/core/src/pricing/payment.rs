use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;
use crate::pricing::bundle::floor_percent;

/// Percentage of the price kept when paying in full upfront.
pub const FULL_PAYMENT_PERCENT: i64 = 90;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Full,
    #[default]
    Monthly,
}

impl std::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().replace([' ', '-', '_'], "").as_str() {
            "full" | "upfront" | "payinfull" | "fullpayment" => Ok(Self::Full),
            "monthly" | "finance" | "0%apr" | "0apr" | "interestfree" => Ok(Self::Monthly),
            other => Err(DomainError::InvariantViolation(format!(
                "unsupported payment method `{other}` (expected full|monthly)"
            ))),
        }
    }
}

/// Full payment takes 10% off (floored); monthly and 0% APR plans pay the list price.
pub fn apply_payment_discount(price: i64, method: PaymentMethod) -> i64 {
    match method {
        PaymentMethod::Full => floor_percent(price, FULL_PAYMENT_PERCENT),
        PaymentMethod::Monthly => price,
    }
}

/// Even installment for a plan of `years`. The term length cancels out of the formula, so
/// every term yields `ceil(annual_price / 12)`; downstream figures rely on that.
pub fn calculate_monthly_payment(annual_price: Decimal, years: u32) -> Decimal {
    let months = Decimal::from(years.max(1).saturating_mul(12));
    match annual_price.checked_mul(months) {
        Some(term_total) => (term_total / (Decimal::from(12) * months)).ceil(),
        None => (annual_price / Decimal::from(12)).ceil(),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{apply_payment_discount, calculate_monthly_payment, PaymentMethod};

    #[test]
    fn full_payment_takes_ten_percent_off_rounded_down() {
        assert_eq!(apply_payment_discount(349, PaymentMethod::Full), 314);
        assert_eq!(apply_payment_discount(646, PaymentMethod::Full), 581);
        assert_eq!(apply_payment_discount(993, PaymentMethod::Monthly), 993);
    }

    #[test]
    fn parses_payment_method_spellings() {
        assert_eq!("Full".parse::<PaymentMethod>(), Ok(PaymentMethod::Full));
        assert_eq!("pay-in-full".parse::<PaymentMethod>(), Ok(PaymentMethod::Full));
        assert_eq!("0% APR".parse::<PaymentMethod>(), Ok(PaymentMethod::Monthly));
        assert!("cheque".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn monthly_payment_ignores_term_length() {
        let annual = Decimal::from(349);
        let one = calculate_monthly_payment(annual, 1);
        assert_eq!(one, Decimal::from(30));
        assert_eq!(calculate_monthly_payment(annual, 2), one);
        assert_eq!(calculate_monthly_payment(annual, 3), one);
        assert_eq!(calculate_monthly_payment(annual, 0), one);
        assert_eq!(calculate_monthly_payment(Decimal::from(600), 3), Decimal::from(50));
    }

    #[test]
    fn extreme_inputs_do_not_overflow() {
        assert_eq!(calculate_monthly_payment(Decimal::from(349), u32::MAX), Decimal::from(30));
        assert_eq!(
            calculate_monthly_payment(Decimal::MAX, 3),
            (Decimal::MAX / Decimal::from(12)).ceil()
        );
        assert_eq!(apply_payment_discount(i64::MAX, PaymentMethod::Full), i64::MAX / 100);
    }
}
