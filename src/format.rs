//! Storage/display conversions and currency rendering.
//!
//! The storage date (`YYYY-MM-DD`) and the display date (`DD-MM-YYYY`) are kept as
//! two separate conversions. The display conversion only rearranges the three
//! components of the string and never goes through a date-time parser, so no
//! timezone can shift the day.

use chrono::NaiveDate;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

const STORAGE_FORMAT: &str = "%Y-%m-%d";

pub fn to_storage_date(date: NaiveDate) -> String {
    date.format(STORAGE_FORMAT).to_string()
}

/// Parses the calendar date at the start of `raw`.
///
/// Accepts a bare `YYYY-MM-DD` or any timestamp that begins with one
/// (`2024-01-05T03:00:00.000Z`); the time part is ignored, not converted.
pub fn parse_storage_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let prefix = raw.get(..10)?;
    if raw.len() > 10 && !raw[10..].starts_with(['T', ' ']) {
        return None;
    }
    NaiveDate::parse_from_str(prefix, STORAGE_FORMAT).ok()
}

/// `YYYY-MM-DD` -> `DD-MM-YYYY`. Empty input gives an empty string.
pub fn to_display_date(storage: &str) -> String {
    if storage.is_empty() {
        return String::new();
    }
    let mut parts = storage.splitn(3, '-');
    let year = parts.next().unwrap_or_default();
    let month = parts.next().unwrap_or_default();
    let day = parts.next().unwrap_or_default();
    format!("{}-{}-{}", day, month, year)
}

pub fn display_date(date: NaiveDate) -> String {
    to_display_date(&to_storage_date(date))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct CurrencyFormat {
    pub symbol: String,
    pub thousands_separator: char,
    pub decimal_separator: char,
}

impl Default for CurrencyFormat {
    /// Argentine peso rendering, e.g. `$ 1.234,56`.
    fn default() -> Self {
        Self {
            symbol: "$".to_string(),
            thousands_separator: '.',
            decimal_separator: ',',
        }
    }
}

impl CurrencyFormat {
    /// Two decimals, symbol first, sign before the symbol. Non-finite amounts, and
    /// amounts whose cents do not fit in a `u128`, render empty.
    pub fn format(&self, amount: f64) -> String {
        if !amount.is_finite() {
            return String::new();
        }

        let scaled = (amount.abs() * 100.0).round();
        if scaled >= u128::MAX as f64 {
            return String::new();
        }
        let cents = scaled as u128;
        let units = (cents / 100).to_string();
        let fraction = cents % 100;

        let mut grouped = String::with_capacity(units.len() + units.len() / 3);
        for (i, digit) in units.chars().enumerate() {
            if i > 0 && (units.len() - i) % 3 == 0 {
                grouped.push(self.thousands_separator);
            }
            grouped.push(digit);
        }

        let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
        format!(
            "{}{} {}{}{:02}",
            sign, self.symbol, grouped, self.decimal_separator, fraction
        )
    }
}

pub fn format_currency(amount: f64) -> String {
    CurrencyFormat::default().format(amount)
}
