use crate::error::{LedgerError, Result};
use crate::format::CurrencyFormat;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone};
use serde::{Deserialize, Serialize};

pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/api";

/// Offset the store expects on sale timestamps (Argentina, no DST).
pub const DEFAULT_SALE_UTC_OFFSET: &str = "-03:00";

pub const ENV_BASE_URL: &str = "LEDGER_BASE_URL";
pub const ENV_SALE_UTC_OFFSET: &str = "LEDGER_SALE_UTC_OFFSET";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Root of the record store API, without a trailing slash.
    pub base_url: String,

    /// `±HH:MM` offset used to anchor a new sale's date to local midnight.
    pub sale_utc_offset: String,

    pub currency: CurrencyFormat,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            sale_utc_offset: DEFAULT_SALE_UTC_OFFSET.to_string(),
            currency: CurrencyFormat::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup; unset keys keep their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(url) = lookup(ENV_BASE_URL) {
            config.base_url = url;
        }
        if let Some(offset) = lookup(ENV_SALE_UTC_OFFSET) {
            config.sale_utc_offset = offset;
        }
        config.base_url = config.base_url.trim().trim_end_matches('/').to_string();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(LedgerError::Config(format!(
                "base_url '{}' must start with http:// or https://",
                self.base_url
            )));
        }
        self.sale_offset()?;
        Ok(())
    }

    pub fn sale_offset(&self) -> Result<FixedOffset> {
        parse_utc_offset(&self.sale_utc_offset)
    }

    /// Midnight of `date` at the configured sale offset.
    pub fn sale_timestamp(&self, date: NaiveDate) -> Result<DateTime<FixedOffset>> {
        let offset = self.sale_offset()?;
        offset
            .from_local_datetime(&date.and_time(NaiveTime::MIN))
            .single()
            .ok_or_else(|| LedgerError::Config(format!("no local midnight for {}", date)))
    }
}

/// Parses `Z`, `+HH:MM` or `-HH:MM`.
pub fn parse_utc_offset(raw: &str) -> Result<FixedOffset> {
    let raw = raw.trim();
    let invalid = || LedgerError::Config(format!("invalid UTC offset '{}', expected ±HH:MM", raw));

    if raw == "Z" {
        return FixedOffset::east_opt(0).ok_or_else(invalid);
    }

    let (sign, rest) = if let Some(rest) = raw.strip_prefix('+') {
        (1, rest)
    } else if let Some(rest) = raw.strip_prefix('-') {
        (-1, rest)
    } else {
        return Err(invalid());
    };
    let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
    let two_digits = |part: &str| part.len() == 2 && part.bytes().all(|b| b.is_ascii_digit());
    if !two_digits(hours) || !two_digits(minutes) {
        return Err(invalid());
    }
    let hours: i32 = hours.parse().map_err(|_| invalid())?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
    if hours > 14 || minutes > 59 {
        return Err(invalid());
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(invalid)
}
