use chrono::NaiveDate;
use log::warn;
use schemars::JsonSchema;
use serde::de::{DeserializeOwned, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// Sentinel used by the store and the UI for "every provider".
pub const ALL_PROVIDERS: &str = "All";

/// The ten tracked amounts of a business day.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesAmounts {
    #[serde(rename = "caja", alias = "cashRegister", default, deserialize_with = "lenient::amount")]
    #[schemars(description = "Cash counted in the register at close")]
    pub cash_register: f64,

    #[serde(rename = "ventaEfectivo", alias = "cashSales", default, deserialize_with = "lenient::amount")]
    pub cash_sales: f64,

    #[serde(rename = "debito", alias = "debit", default, deserialize_with = "lenient::amount")]
    pub debit: f64,

    #[serde(rename = "transferencias", alias = "transfers", default, deserialize_with = "lenient::amount")]
    pub transfers: f64,

    #[serde(rename = "agua", alias = "water", default, deserialize_with = "lenient::amount")]
    pub water: f64,

    #[serde(rename = "alquiler", alias = "rent", default, deserialize_with = "lenient::amount")]
    pub rent: f64,

    #[serde(rename = "sueldos", alias = "payroll", default, deserialize_with = "lenient::amount")]
    pub payroll: f64,

    #[serde(rename = "varios", alias = "misc", default, deserialize_with = "lenient::amount")]
    pub misc: f64,

    #[serde(rename = "proveedoresEfectivo", alias = "providerCash", default, deserialize_with = "lenient::amount")]
    #[schemars(description = "Provider payments made in cash that day")]
    pub provider_cash: f64,

    #[serde(rename = "proveedoresTransferencia", alias = "providerTransfer", default, deserialize_with = "lenient::amount")]
    #[schemars(description = "Provider payments made by transfer that day")]
    pub provider_transfer: f64,
}

impl SalesAmounts {
    /// Sum of all ten tracked fields. A day is significant when this is above zero.
    pub fn activity_sum(&self) -> f64 {
        self.cash_register
            + self.cash_sales
            + self.debit
            + self.transfers
            + self.water
            + self.rent
            + self.payroll
            + self.misc
            + self.provider_cash
            + self.provider_transfer
    }

    pub fn sale_total(&self) -> f64 {
        self.cash_sales + self.debit + self.transfers
    }

    pub fn accumulate(&mut self, other: &SalesAmounts) {
        self.cash_register += other.cash_register;
        self.cash_sales += other.cash_sales;
        self.debit += other.debit;
        self.transfers += other.transfers;
        self.water += other.water;
        self.rent += other.rent;
        self.payroll += other.payroll;
        self.misc += other.misc;
        self.provider_cash += other.provider_cash;
        self.provider_transfer += other.provider_transfer;
    }
}

/// One business day of sales as returned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SalesRecord {
    /// Present only for persisted records.
    #[serde(rename = "_id", alias = "id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "fecha", alias = "date", deserialize_with = "lenient::calendar_date")]
    pub date: NaiveDate,

    #[serde(flatten)]
    pub amounts: SalesAmounts,
}

impl SalesRecord {
    pub fn new(date: NaiveDate, amounts: SalesAmounts) -> Self {
        Self {
            id: None,
            date,
            amounts,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn is_significant(&self) -> bool {
        self.amounts.activity_sum() > 0.0
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderAmounts {
    #[serde(rename = "efectivo", alias = "cash", default, deserialize_with = "lenient::amount")]
    pub cash: f64,

    #[serde(rename = "transferencia", alias = "transfer", default, deserialize_with = "lenient::amount")]
    pub transfer: f64,
}

impl ProviderAmounts {
    pub fn new(cash: f64, transfer: f64) -> Self {
        Self { cash, transfer }
    }

    pub fn total(&self) -> f64 {
        self.cash + self.transfer
    }
}

/// Provider name -> amounts, iterated in insertion order.
///
/// Serialized as a JSON object; decoding keeps the document's key order. Inserting
/// an existing name replaces its amounts without moving it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProviderMap {
    entries: Vec<(String, ProviderAmounts)>,
}

impl ProviderMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&ProviderAmounts> {
        self.entries
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, amounts)| amounts)
    }

    pub fn insert(&mut self, name: impl Into<String>, amounts: ProviderAmounts) -> Option<ProviderAmounts> {
        let name = name.into();
        match self.entries.iter_mut().find(|(key, _)| *key == name) {
            Some((_, existing)) => Some(std::mem::replace(existing, amounts)),
            None => {
                self.entries.push((name, amounts));
                None
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ProviderAmounts)> {
        self.entries.iter().map(|(name, amounts)| (name.as_str(), amounts))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, ProviderAmounts)> for ProviderMap {
    fn from_iter<I: IntoIterator<Item = (String, ProviderAmounts)>>(iter: I) -> Self {
        let mut map = ProviderMap::new();
        for (name, amounts) in iter {
            map.insert(name, amounts);
        }
        map
    }
}

impl Serialize for ProviderMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter())
    }
}

impl<'de> Deserialize<'de> for ProviderMap {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        struct ProviderMapVisitor;

        impl<'de> Visitor<'de> for ProviderMapVisitor {
            type Value = ProviderMap;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of provider name to amounts")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> std::result::Result<ProviderMap, A::Error> {
                let mut map = ProviderMap::new();
                while let Some((name, amounts)) = access.next_entry::<String, ProviderAmounts>()? {
                    map.insert(name, amounts);
                }
                Ok(map)
            }
        }

        deserializer.deserialize_map(ProviderMapVisitor)
    }
}

impl JsonSchema for ProviderMap {
    fn schema_name() -> String {
        "ProviderMap".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        <std::collections::BTreeMap<String, ProviderAmounts>>::json_schema(gen)
    }
}

/// One day of provider payments, broken down per provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderExpenseDay {
    #[serde(rename = "fecha", alias = "date", deserialize_with = "lenient::calendar_date")]
    pub date: NaiveDate,

    #[serde(rename = "totalEfectivo", alias = "totalCash", default, deserialize_with = "lenient::amount")]
    pub total_cash: f64,

    #[serde(rename = "totalTransferencia", alias = "totalTransfer", default, deserialize_with = "lenient::amount")]
    pub total_transfer: f64,

    #[serde(rename = "proveedores", alias = "providers", default, deserialize_with = "lenient::providers")]
    pub providers: ProviderMap,
}

impl ProviderExpenseDay {
    /// Builds a day whose totals are the sums over `providers`.
    pub fn from_providers(date: NaiveDate, providers: ProviderMap) -> Self {
        let total_cash = providers.iter().map(|(_, a)| a.cash).sum();
        let total_transfer = providers.iter().map(|(_, a)| a.transfer).sum();
        Self {
            date,
            total_cash,
            total_transfer,
            providers,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Provider {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,

    #[serde(rename = "nombre", alias = "name")]
    pub name: String,

    #[serde(rename = "esAdelantoCaja", alias = "cashAdvance", default)]
    #[schemars(description = "The reserved cash-advance provider seeded by the store")]
    pub cash_advance: bool,

    #[serde(rename = "esProveedorProtegido", alias = "protected", default)]
    pub protected_flag: bool,
}

impl Provider {
    pub fn is_protected(&self) -> bool {
        self.cash_advance || self.protected_flag
    }
}

/// Inclusive calendar range. `from > to` is allowed and simply matches nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    pub fn new(from: NaiveDate, to: NaiveDate) -> Self {
        Self { from, to }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { from: day, to: day }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }

    pub fn is_empty(&self) -> bool {
        self.from > self.to
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProviderFilter {
    #[default]
    All,
    Only(String),
}

impl ProviderFilter {
    pub fn only(name: impl Into<String>) -> Self {
        Self::Only(name.into())
    }

    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

impl FromStr for ProviderFilter {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim();
        // "Todos" is the sentinel the store's web client sends.
        if trimmed.is_empty() || trimmed == ALL_PROVIDERS || trimmed == "Todos" {
            Ok(Self::All)
        } else {
            Ok(Self::Only(trimmed.to_string()))
        }
    }
}

impl fmt::Display for ProviderFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All => f.write_str(ALL_PROVIDERS),
            Self::Only(name) => f.write_str(name),
        }
    }
}

impl Serialize for ProviderFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ProviderFilter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(raw.parse().unwrap_or_default())
    }
}

impl JsonSchema for ProviderFilter {
    fn schema_name() -> String {
        "ProviderFilter".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum PaymentMethod {
    #[serde(rename = "Efectivo", alias = "Cash")]
    Cash,
    #[serde(rename = "Transferencia", alias = "Transfer")]
    Transfer,
}

/// A day's sale as entered by the user. Provider totals are filled in by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewSale {
    pub date: NaiveDate,
    pub cash_register: f64,
    pub cash_sales: f64,
    pub debit: f64,
    pub transfers: f64,
    pub water: f64,
    pub rent: f64,
    pub payroll: f64,
    pub misc: f64,
}

impl NewSale {
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("cash register", self.cash_register),
            ("cash sales", self.cash_sales),
            ("debit", self.debit),
            ("transfers", self.transfers),
            ("water", self.water),
            ("rent", self.rent),
            ("payroll", self.payroll),
            ("misc", self.misc),
        ];
        for (label, value) in fields {
            if !value.is_finite() || value < 0.0 {
                return Err(LedgerError::InvalidInput(format!(
                    "{} must be a non-negative amount, got {}",
                    label, value
                )));
            }
        }
        Ok(())
    }

    pub fn amounts(&self) -> SalesAmounts {
        SalesAmounts {
            cash_register: self.cash_register,
            cash_sales: self.cash_sales,
            debit: self.debit,
            transfers: self.transfers,
            water: self.water,
            rent: self.rent,
            payroll: self.payroll,
            misc: self.misc,
            ..SalesAmounts::default()
        }
    }
}

/// A single payment to a provider.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub provider_id: String,
    pub amount: f64,
    pub method: PaymentMethod,
}

impl NewExpense {
    pub fn validate(&self) -> Result<()> {
        if self.provider_id.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "an expense needs a provider".to_string(),
            ));
        }
        if !self.amount.is_finite() || self.amount < 0.0 {
            return Err(LedgerError::InvalidInput(format!(
                "expense amount must be a non-negative number, got {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Decodes a store listing one row at a time. A row that cannot be decoded
/// (no usable `fecha`, not an object) is logged and skipped; the rest are kept.
pub fn decode_rows<T: DeserializeOwned>(rows: Vec<Value>, what: &str) -> Vec<T> {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .enumerate()
        .filter_map(|(index, row)| match serde_json::from_value(row) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Skipping {} row {}: {}", what, index, e);
                None
            }
        })
        .collect();
    if decoded.len() < total {
        warn!("Kept {} of {} {} rows", decoded.len(), total, what);
    }
    decoded
}

/// Decoders that coerce bad data instead of failing the whole payload.
pub(crate) mod lenient {
    use chrono::NaiveDate;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::ProviderMap;
    use crate::format::parse_storage_date;

    pub fn amount<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(coerce_amount(&value))
    }

    pub fn coerce_amount(value: &Value) -> f64 {
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        };
        parsed.filter(|v| v.is_finite()).unwrap_or(0.0)
    }

    pub fn calendar_date<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_storage_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date '{}'", raw)))
    }

    pub fn providers<'de, D: Deserializer<'de>>(deserializer: D) -> Result<ProviderMap, D::Error> {
        Ok(Option::<ProviderMap>::deserialize(deserializer)?.unwrap_or_default())
    }
}
