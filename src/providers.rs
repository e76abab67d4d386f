use crate::report::{extremes, CategoryAmount};
use crate::schema::{DateRange, ProviderExpenseDay, ProviderFilter, ProviderMap};
use chrono::NaiveDate;
use log::{debug, info};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A provider expense day with its total recomputed from cash and transfer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderDay {
    pub date: NaiveDate,
    pub total_cash: f64,
    pub total_transfer: f64,
    pub total: f64,
    pub providers: ProviderMap,
}

impl ProviderDay {
    fn from_expense_day(day: &ProviderExpenseDay) -> Self {
        Self {
            date: day.date,
            total_cash: day.total_cash,
            total_transfer: day.total_transfer,
            total: day.total_cash + day.total_transfer,
            providers: day.providers.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderMetrics {
    pub total_paid: f64,
    pub average: f64,
    pub highest: ProviderDay,
    pub lowest: ProviderDay,
    pub active_days: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DailyTotal {
    pub date: NaiveDate,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderReport {
    pub range: DateRange,
    pub filter: ProviderFilter,
    pub days: Vec<ProviderDay>,
    pub metrics: Option<ProviderMetrics>,
    pub daily_series: Vec<DailyTotal>,

    /// Always the two buckets Cash and Transfer.
    pub payment_types: Vec<CategoryAmount>,

    /// Per-provider totals in first-seen order. Empty unless the filter is `All`.
    pub provider_breakdown: Vec<CategoryAmount>,
}

impl ProviderReport {
    pub fn is_empty(&self) -> bool {
        self.days.is_empty()
    }

    pub fn schema_as_json() -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&schemars::schema_for!(ProviderReport))
    }
}

/// Reduces a day to one provider's contribution, recomputing its totals.
/// A provider with no entry that day contributes zero.
pub fn narrow_to_provider(day: &ProviderDay, provider: &str) -> ProviderDay {
    let amounts = day.providers.get(provider).copied().unwrap_or_default();
    let mut providers = ProviderMap::new();
    providers.insert(provider, amounts);

    ProviderDay {
        date: day.date,
        total_cash: amounts.cash,
        total_transfer: amounts.transfer,
        total: amounts.total(),
        providers,
    }
}

pub struct ProviderAggregator;

impl ProviderAggregator {
    pub fn build(
        records: &[ProviderExpenseDay],
        range: DateRange,
        filter: &ProviderFilter,
    ) -> ProviderReport {
        let mut days: Vec<ProviderDay> = records.iter().map(ProviderDay::from_expense_day).collect();

        if let ProviderFilter::Only(provider) = filter {
            debug!("Narrowing {} provider days to '{}'", days.len(), provider);
            days = days
                .iter()
                .map(|day| narrow_to_provider(day, provider))
                .collect();
        }

        days.sort_by_key(|day| day.date);

        let metrics = Self::metrics(&days);
        let daily_series = days
            .iter()
            .map(|day| DailyTotal {
                date: day.date,
                total: day.total,
            })
            .collect();
        let payment_types = vec![
            CategoryAmount::new("Cash", days.iter().map(|d| d.total_cash).sum()),
            CategoryAmount::new("Transfer", days.iter().map(|d| d.total_transfer).sum()),
        ];
        let provider_breakdown = if filter.is_all() {
            Self::breakdown(&days)
        } else {
            Vec::new()
        };

        info!(
            "Built provider report for {}..{} (filter: {}): {} days, {} providers",
            range.from,
            range.to,
            filter,
            days.len(),
            provider_breakdown.len()
        );

        ProviderReport {
            range,
            filter: filter.clone(),
            days,
            metrics,
            daily_series,
            payment_types,
            provider_breakdown,
        }
    }

    fn metrics(days: &[ProviderDay]) -> Option<ProviderMetrics> {
        let (highest, lowest) = extremes(days, |day| day.total)?;
        let total_paid: f64 = days.iter().map(|day| day.total).sum();

        Some(ProviderMetrics {
            total_paid,
            average: total_paid / days.len() as f64,
            highest: highest.clone(),
            lowest: lowest.clone(),
            active_days: days.len(),
        })
    }

    fn breakdown(days: &[ProviderDay]) -> Vec<CategoryAmount> {
        let mut running: Vec<CategoryAmount> = Vec::new();
        for day in days {
            for (name, amounts) in day.providers.iter() {
                match running.iter_mut().find(|entry| entry.name == name) {
                    Some(entry) => entry.value += amounts.total(),
                    None => running.push(CategoryAmount::new(name, amounts.total())),
                }
            }
        }
        running
    }
}

pub fn build_provider_report(
    records: &[ProviderExpenseDay],
    range: DateRange,
    filter: &ProviderFilter,
) -> ProviderReport {
    ProviderAggregator::build(records, range, filter)
}
