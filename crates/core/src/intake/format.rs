use rust_decimal::{Decimal, RoundingStrategy};

use crate::intake::schema::DisplayFormat;

/// `$50,000` for whole amounts, `$1,234.50` otherwise.
pub fn currency(amount: Decimal) -> String {
    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "" };
    let magnitude = rounded.abs();
    let whole = magnitude.trunc();
    let cents = ((magnitude - whole) * Decimal::from(100)).trunc();

    let grouped = group_thousands(&whole.to_string());
    if cents.is_zero() {
        format!("{sign}${grouped}")
    } else {
        format!("{sign}${grouped}.{:0>2}", cents.to_string())
    }
}

pub fn months(term: Decimal) -> String {
    let term = term.normalize();
    if term == Decimal::ONE {
        "1 month".to_owned()
    } else {
        format!("{term} months")
    }
}

pub fn number(value: Decimal, display: DisplayFormat) -> String {
    match display {
        DisplayFormat::Currency => currency(value),
        DisplayFormat::Months => months(value),
        DisplayFormat::Plain => value.normalize().to_string(),
    }
}

fn group_thousands(digits: &str) -> String {
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}
