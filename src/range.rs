use crate::error::{LedgerError, Result};
use crate::format::parse_storage_date;
use crate::schema::DateRange;
use chrono::{Datelike, Days, Local, NaiveDate};
use serde::{Deserialize, Serialize};

/// The canonical named windows offered by the dashboards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RangeWindow {
    Today,
    ThisWeek,
    ThisMonth,
}

impl RangeWindow {
    /// Resolves the window against the local clock, read once.
    pub fn resolve(self) -> DateRange {
        self.resolve_at(local_today())
    }

    pub fn resolve_at(self, today: NaiveDate) -> DateRange {
        match self {
            RangeWindow::Today => DateRange::single(today),
            RangeWindow::ThisWeek => DateRange::new(week_start(today), today),
            RangeWindow::ThisMonth => DateRange::new(month_start(today), today),
        }
    }
}

pub fn local_today() -> NaiveDate {
    Local::now().date_naive()
}

pub fn today() -> DateRange {
    RangeWindow::Today.resolve()
}

/// Sunday of the current week through today.
pub fn this_week() -> DateRange {
    RangeWindow::ThisWeek.resolve()
}

/// First day of the current month through today.
pub fn this_month() -> DateRange {
    RangeWindow::ThisMonth.resolve()
}

/// Sunday on or before `date`. Weeks start on Sunday.
pub fn week_start(date: NaiveDate) -> NaiveDate {
    let offset = date.weekday().num_days_from_sunday() as u64;
    date.checked_sub_days(Days::new(offset)).unwrap_or(date)
}

pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

impl DateRange {
    /// Parses `from`/`to` as `YYYY-MM-DD`. A missing or malformed bound is an
    /// `InvalidRange`; `from > to` is accepted and yields empty reports.
    pub fn parse(from: &str, to: &str) -> Result<DateRange> {
        let from = parse_bound("from", from)?;
        let to = parse_bound("to", to)?;
        Ok(DateRange::new(from, to))
    }
}

fn parse_bound(label: &str, raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::InvalidRange(format!(
            "missing '{}' date",
            label
        )));
    }
    if trimmed.len() != 10 {
        return Err(LedgerError::InvalidRange(format!(
            "'{}' date '{}' is not in YYYY-MM-DD format",
            label, trimmed
        )));
    }
    parse_storage_date(trimmed).ok_or_else(|| {
        LedgerError::InvalidRange(format!(
            "'{}' date '{}' is not in YYYY-MM-DD format",
            label, trimmed
        ))
    })
}
