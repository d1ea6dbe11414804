//! Balance presentation
//!
//! Dust is shown as `<0.0001` / `>-0.0001`, sub-unit amounts with four decimals and
//! everything else rounded to two decimals with thousands separators.

use rust_decimal::{Decimal, RoundingStrategy};

/// Smallest magnitude shown as a figure (0.0001).
pub fn dust() -> Decimal {
    Decimal::new(1, 4)
}

pub fn format_amount(amount: &Decimal) -> String {
    let abs = amount.abs();

    if !abs.is_zero() && abs < Decimal::ONE {
        if abs < dust() {
            return if amount.is_sign_positive() { "<0.0001".to_string() } else { ">-0.0001".to_string() };
        }
        return amount
            .round_dp_with_strategy(4, RoundingStrategy::MidpointAwayFromZero)
            .normalize()
            .to_string();
    }

    let rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero).normalize();
    group_thousands(&rounded.to_string())
}

/// Inserts `,` every three integer digits of a plain decimal string.
fn group_thousands(plain: &str) -> String {
    let (sign, unsigned) = match plain.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", plain),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (unsigned, None),
    };

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    match frac_part {
        Some(f) => format!("{}{}.{}", sign, grouped, f),
        None => format!("{}{}", sign, grouped),
    }
}
