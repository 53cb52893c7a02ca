//! Indian-rupee amounts. All prices in the system are whole rupees held in `i64`;
//! phrase parsing and formatting go through `Decimal` so `1.3 cr` is exact.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

pub const THOUSAND: i64 = 1_000;
pub const LAKH: i64 = 100_000;
pub const CRORE: i64 = 10_000_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AmountUnit {
    Crore,
    Lakh,
    Thousand,
}

impl AmountUnit {
    pub fn parse(token: &str) -> Option<Self> {
        match token.trim().trim_end_matches('.').to_ascii_lowercase().as_str() {
            "cr" | "crs" | "crore" | "crores" => Some(Self::Crore),
            "l" | "lakh" | "lakhs" | "lac" | "lacs" | "lk" | "lkh" => Some(Self::Lakh),
            "k" | "thousand" => Some(Self::Thousand),
            _ => None,
        }
    }

    pub fn multiplier(self) -> i64 {
        match self {
            Self::Crore => CRORE,
            Self::Lakh => LAKH,
            Self::Thousand => THOUSAND,
        }
    }
}

/// `number` is a plain decimal literal (`"1.3"`, `"80"`). Returns `None` for
/// non-positive or unrepresentable amounts.
pub fn amount_in_rupees(number: &str, unit: AmountUnit) -> Option<i64> {
    let value = Decimal::from_str(number.trim()).ok()?;
    rupees_from_decimal(value.checked_mul(Decimal::from(unit.multiplier()))?)
}

pub fn rupees_from_decimal(value: Decimal) -> Option<i64> {
    if value <= Decimal::ZERO {
        return None;
    }
    value.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero).to_i64()
}

/// Parses a standalone amount phrase such as `"1.5cr"`, `"80 lakh"`,
/// `"₹95,00,000"` or `"rs 9500000"`. Bare numbers without a unit or a currency
/// marker are rejected as ambiguous.
pub fn parse_amount(phrase: &str) -> Option<i64> {
    let lowered = phrase.trim().to_ascii_lowercase();
    let (has_currency_marker, rest) = strip_currency_marker(&lowered);
    let compact: String = rest.chars().filter(|ch| !ch.is_whitespace()).collect();

    let split_at = compact.find(|ch: char| ch.is_ascii_alphabetic()).unwrap_or(compact.len());
    let (grouped, unit) = compact.split_at(split_at);
    let number = ungroup_digits(grouped)?;
    let number = number.as_str();
    if number.is_empty() {
        return None;
    }

    if unit.is_empty() {
        if !has_currency_marker {
            return None;
        }
        return rupees_from_decimal(Decimal::from_str(number).ok()?);
    }

    amount_in_rupees(number, AmountUnit::parse(unit)?)
}

/// Accepts Indian (`95,00,000`) and western (`9,500,000`) digit grouping.
/// Any other comma placement, such as `1,5`, is ambiguous.
fn ungroup_digits(number: &str) -> Option<String> {
    let mut groups = number.split(',');
    let mut digits = groups.next()?.to_string();
    for group in groups {
        let well_formed =
            matches!(group.len(), 2 | 3) && group.chars().all(|ch| ch.is_ascii_digit());
        if digits.is_empty() || !well_formed {
            return None;
        }
        digits.push_str(group);
    }
    Some(digits)
}

fn strip_currency_marker(input: &str) -> (bool, &str) {
    for marker in ["₹", "rs.", "rs", "inr"] {
        if let Some(rest) = input.strip_prefix(marker) {
            return (true, rest.trim_start());
        }
    }
    (false, input)
}

/// `₹1.3Cr`, `₹91L`, `₹45,000` style rendering used in bullets and logs.
pub fn format_inr(amount: i64) -> String {
    let value = Decimal::from(amount);
    if amount.abs() >= CRORE {
        format!("₹{}Cr", scaled(value, CRORE))
    } else if amount.abs() >= LAKH {
        format!("₹{}L", scaled(value, LAKH))
    } else {
        format!("₹{}", group_thousands(amount))
    }
}

fn scaled(value: Decimal, unit: i64) -> Decimal {
    (value / Decimal::from(unit))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .normalize()
}

fn group_thousands(amount: i64) -> String {
    let digits = amount.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + 4);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    if amount < 0 {
        format!("-{grouped}")
    } else {
        grouped
    }
}
