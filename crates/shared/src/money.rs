//! Currency helpers for fixed-point amounts.

use rust_decimal::{Decimal, RoundingStrategy};

/// Number of minor-unit digits kept for money amounts (cents).
pub const CURRENCY_SCALE: u32 = 2;

/// Rounds an amount to cents, half away from zero.
pub fn round_to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Formats an amount as US currency, e.g. `$1,234.50` or `-$20.00`.
pub fn format_currency(amount: Decimal) -> String {
    let rounded = round_to_cents(amount);
    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };

    let text = format!("{:.2}", rounded.abs());
    let (whole, cents) = text.split_once('.').unwrap_or((text.as_str(), "00"));

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    format!("{}${}.{}", sign, grouped, cents)
}
