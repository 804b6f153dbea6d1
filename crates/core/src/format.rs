//! Number and text formatting used by chat summaries and the dashboard.

use rust_decimal::{Decimal, RoundingStrategy};

/// Formats `value` rounded half-to-even to `dp` places with `,` thousands separators.
pub fn money(value: Decimal, dp: u32) -> String {
    render_decimal(value, dp, false)
}

/// Like [`money`] but always carries a leading sign.
pub fn signed_money(value: Decimal, dp: u32) -> String {
    render_decimal(value, dp, true)
}

pub fn count(value: i64) -> String {
    render_integer(value, false)
}

pub fn signed_count(value: i64) -> String {
    render_integer(value, true)
}

/// Fixed-point without grouping, e.g. `12.30`.
pub fn fixed(value: Decimal, dp: u32) -> String {
    let rounded = value.round_dp_with_strategy(dp, RoundingStrategy::MidpointNearestEven);
    let mut out = format!("{rounded:.prec$}", prec = dp as usize);
    if out.starts_with('-') && out[1..].chars().all(|c| c == '0' || c == '.') {
        out.remove(0);
    }
    out
}

/// Percentage change from `previous` to `current`; zero when there is no previous value.
pub fn pct_change(current: Decimal, previous: Decimal) -> Decimal {
    if previous.is_zero() {
        return Decimal::ZERO;
    }
    (current - previous) / previous * Decimal::ONE_HUNDRED
}

/// Capitalises the first letter of every alphabetic run and lowercases the rest.
pub fn title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut previous_alpha = false;
    for ch in value.chars() {
        if ch.is_alphabetic() {
            if previous_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            previous_alpha = true;
        } else {
            out.push(ch);
            previous_alpha = false;
        }
    }
    out
}

fn render_decimal(value: Decimal, dp: u32, signed: bool) -> String {
    let fixed = fixed(value, dp);
    let (negative, unsigned) = match fixed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, fixed.as_str()),
    };
    let (integer, fraction) = match unsigned.split_once('.') {
        Some((integer, fraction)) => (integer, Some(fraction)),
        None => (unsigned, None),
    };

    let mut out = String::new();
    if negative {
        out.push('-');
    } else if signed {
        out.push('+');
    }
    out.push_str(&group_thousands(integer));
    if let Some(fraction) = fraction {
        out.push('.');
        out.push_str(fraction);
    }
    out
}

fn render_integer(value: i64, signed: bool) -> String {
    let digits = value.unsigned_abs().to_string();
    let mut out = String::new();
    if value < 0 {
        out.push('-');
    } else if signed {
        out.push('+');
    }
    out.push_str(&group_thousands(&digits));
    out
}

fn group_thousands(digits: &str) -> String {
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
