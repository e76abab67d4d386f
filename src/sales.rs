//! Sales aggregation: significance filter, ordering, totals and chart series
//! for the sales dashboard.

use crate::report::{extremes, CategoryAmount};
use crate::schema::{DateRange, SalesAmounts, SalesRecord};
use chrono::NaiveDate;
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A significant sales record with its sale total derived once at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesDay {
    #[serde(flatten)]
    pub record: SalesRecord,

    #[serde(rename = "ventaTotal")]
    pub sale_total: f64,
}

impl SalesDay {
    fn from_record(record: &SalesRecord) -> Self {
        Self {
            sale_total: record.amounts.sale_total(),
            record: record.clone(),
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.record.date
    }
}

/// Field-wise sums over a multi-day series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesTotals {
    #[serde(flatten)]
    pub amounts: SalesAmounts,

    #[serde(rename = "ventaTotal")]
    pub sale_total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesMetrics {
    pub total: f64,
    pub average: f64,
    pub best: SalesDay,
    pub worst: SalesDay,
}

/// One point of the per-day sales line charts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesPoint {
    pub date: NaiveDate,
    pub sale_total: f64,
    pub cash_sales: f64,
    pub debit: f64,
    pub transfers: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesReport {
    pub range: DateRange,

    /// Significant days, ascending by date.
    pub days: Vec<SalesDay>,

    /// Only present when the series has more than one day.
    pub totals: Option<SalesTotals>,

    /// Only present when the series is not empty.
    pub metrics: Option<SalesMetrics>,

    pub daily_series: Vec<SalesPoint>,

    /// Cash / Debit / Transfers, empty when there are no days.
    pub payment_methods: Vec<CategoryAmount>,
}

impl SalesReport {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(SalesReport))
    }
}

pub struct SalesAggregator;

impl SalesAggregator {
    pub fn build(records: &[SalesRecord], range: DateRange) -> SalesReport {
        let mut days: Vec<SalesDay> = records
            .iter()
            .filter(|record| {
                let keep = record.is_significant();
                if !keep {
                    debug!("Dropping sales record for {} with no activity", record.date);
                }
                keep
            })
            .map(SalesDay::from_record)
            .collect();

        // stable: same-day records keep their input order
        days.sort_by_key(SalesDay::date);

        let totals = Self::totals(&days);
        let metrics = Self::metrics(&days);
        let daily_series = days
            .iter()
            .map(|day| SalesPoint {
                date: day.date(),
                sale_total: day.sale_total,
                cash_sales: day.record.amounts.cash_sales,
                debit: day.record.amounts.debit,
                transfers: day.record.amounts.transfers,
            })
            .collect();
        let payment_methods = Self::payment_methods(&days);

        info!(
            "Built sales report for {}..{}: {} of {} records significant",
            range.from,
            range.to,
            days.len(),
            records.len()
        );

        SalesReport {
            range,
            days,
            totals,
            metrics,
            daily_series,
            payment_methods,
        }
    }

    fn totals(days: &[SalesDay]) -> Option<SalesTotals> {
        if days.len() <= 1 {
            return None;
        }

        let mut totals = SalesTotals::default();
        for day in days {
            totals.amounts.accumulate(&day.record.amounts);
            totals.sale_total += day.sale_total;
        }
        Some(totals)
    }

    fn metrics(days: &[SalesDay]) -> Option<SalesMetrics> {
        let (best, worst) = extremes(days, |day| day.sale_total)?;
        let total: f64 = days.iter().map(|day| day.sale_total).sum();

        Some(SalesMetrics {
            total,
            average: total / days.len() as f64,
            best: best.clone(),
            worst: worst.clone(),
        })
    }

    fn payment_methods(days: &[SalesDay]) -> Vec<CategoryAmount> {
        if days.is_empty() {
            return Vec::new();
        }

        let sum = |pick: fn(&SalesAmounts) -> f64| -> f64 {
            days.iter().map(|day| pick(&day.record.amounts)).sum()
        };

        vec![
            CategoryAmount::new("Cash", sum(|a| a.cash_sales)),
            CategoryAmount::new("Debit", sum(|a| a.debit)),
            CategoryAmount::new("Transfers", sum(|a| a.transfers)),
        ]
    }
}

pub fn build_sales_report(records: &[SalesRecord], range: DateRange) -> SalesReport {
    SalesAggregator::build(records, range)
}
