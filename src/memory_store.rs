use crate::schema::{
    DateRange, NewExpense, NewSale, PaymentMethod, Provider, ProviderExpenseDay,
    ProviderMap, SalesAmounts, SalesRecord,
};
use crate::store::{RecordStore, Rejection, RejectionReason, Session, StoreError, StoreResult};
use chrono::NaiveDate;
use log::debug;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

pub const CASH_ADVANCE_PROVIDER: &str = "Adelanto caja";

#[derive(Debug, Clone)]
struct ExpenseEntry {
    date: NaiveDate,
    provider_id: String,
    amount: f64,
    method: PaymentMethod,
}

#[derive(Debug, Default)]
struct State {
    sales: Vec<SalesRecord>,
    providers: Vec<Provider>,
    expenses: Vec<ExpenseEntry>,
    next_id: u64,
    unavailable: bool,
}

impl State {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }

    fn provider_name(&self, id: &str) -> Option<&str> {
        self.providers
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.as_str())
    }

    /// Provider payments per day in `range`, keyed by provider name in entry order.
    fn expense_days(&self, range: &DateRange) -> BTreeMap<NaiveDate, ProviderMap> {
        let mut days: BTreeMap<NaiveDate, ProviderMap> = BTreeMap::new();
        for entry in self.expenses.iter().filter(|e| range.contains(e.date)) {
            let Some(name) = self.provider_name(&entry.provider_id) else {
                continue;
            };
            let providers = days.entry(entry.date).or_default();
            let mut amounts = providers.get(name).copied().unwrap_or_default();
            match entry.method {
                PaymentMethod::Cash => amounts.cash += entry.amount,
                PaymentMethod::Transfer => amounts.transfer += entry.amount,
            }
            providers.insert(name, amounts);
        }
        days
    }
}

/// In-process record store applying the same rules as the remote one: a seeded,
/// protected cash-advance provider, no deletion of providers with expenses, and
/// sales days that also carry that day's provider payments.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    token: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Only sessions carrying `token` are accepted.
    pub fn with_token(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
            ..Self::default()
        }
    }

    /// Inserts raw sales records as-is, bypassing validation.
    pub fn seed_sales(&self, records: impl IntoIterator<Item = SalesRecord>) {
        self.lock().sales.extend(records);
    }

    pub fn add_provider(&self, name: &str, protected_flag: bool) -> String {
        let mut state = self.lock();
        let id = state.next_id("prov");
        state.providers.push(Provider {
            id: id.clone(),
            name: name.to_string(),
            cash_advance: false,
            protected_flag,
        });
        id
    }

    /// Makes every subsequent call fail as if the store were unreachable.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.lock().unavailable = unavailable;
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn open(&self, session: &Session) -> StoreResult<MutexGuard<'_, State>> {
        if let Some(expected) = &self.token {
            if session.token() != expected {
                return Err(StoreError::Unavailable("invalid session".to_string()));
            }
        }
        let state = self.lock();
        if state.unavailable {
            return Err(StoreError::Unavailable("connection refused".to_string()));
        }
        Ok(state)
    }
}

impl RecordStore for MemoryStore {
    async fn fetch_sales(&self, session: &Session, range: &DateRange) -> StoreResult<Vec<SalesRecord>> {
        let state = self.open(session)?;
        let mut expense_days = state.expense_days(range);

        let mut records: Vec<SalesRecord> = state
            .sales
            .iter()
            .filter(|r| range.contains(r.date))
            .cloned()
            .map(|mut record| {
                if let Some(providers) = expense_days.remove(&record.date) {
                    let day = ProviderExpenseDay::from_providers(record.date, providers);
                    record.amounts.provider_cash = day.total_cash;
                    record.amounts.provider_transfer = day.total_transfer;
                }
                record
            })
            .collect();

        // days with provider payments but no sale are reported without an id
        for (date, providers) in expense_days {
            let day = ProviderExpenseDay::from_providers(date, providers);
            records.push(SalesRecord::new(
                date,
                SalesAmounts {
                    provider_cash: day.total_cash,
                    provider_transfer: day.total_transfer,
                    ..SalesAmounts::default()
                },
            ));
        }

        Ok(records)
    }

    async fn fetch_provider_expenses(
        &self,
        session: &Session,
        range: &DateRange,
    ) -> StoreResult<Vec<ProviderExpenseDay>> {
        let state = self.open(session)?;
        Ok(state
            .expense_days(range)
            .into_iter()
            .map(|(date, providers)| ProviderExpenseDay::from_providers(date, providers))
            .collect())
    }

    async fn fetch_providers(&self, session: &Session) -> StoreResult<Vec<Provider>> {
        Ok(self.open(session)?.providers.clone())
    }

    async fn ensure_cash_advance_provider(&self, session: &Session) -> StoreResult<()> {
        let mut state = self.open(session)?;
        if state.providers.iter().any(|p| p.cash_advance) {
            return Ok(());
        }
        let id = state.next_id("prov");
        debug!("Seeding cash advance provider as {}", id);
        state.providers.insert(
            0,
            Provider {
                id,
                name: CASH_ADVANCE_PROVIDER.to_string(),
                cash_advance: true,
                protected_flag: false,
            },
        );
        Ok(())
    }

    async fn delete_sale(&self, session: &Session, id: &str) -> StoreResult<()> {
        let mut state = self.open(session)?;
        let before = state.sales.len();
        state.sales.retain(|r| r.id.as_deref() != Some(id));
        if state.sales.len() == before {
            return Err(StoreError::Rejected(Rejection::new(
                RejectionReason::Other,
                "Venta no encontrada",
            )));
        }
        Ok(())
    }

    async fn create_sale(&self, session: &Session, sale: &NewSale) -> StoreResult<()> {
        let mut state = self.open(session)?;
        if state.sales.iter().any(|r| r.date == sale.date) {
            return Err(StoreError::Rejected(Rejection::new(
                RejectionReason::Other,
                "Ya existe una venta para esa fecha",
            )));
        }
        let id = state.next_id("sale");
        state
            .sales
            .push(SalesRecord::new(sale.date, sale.amounts()).with_id(id));
        Ok(())
    }

    async fn create_provider(&self, session: &Session, name: &str) -> StoreResult<()> {
        let mut state = self.open(session)?;
        let name = name.trim();
        if name.is_empty() {
            return Err(StoreError::Rejected(Rejection::new(
                RejectionReason::Other,
                "Nombre requerido",
            )));
        }
        if state
            .providers
            .iter()
            .any(|p| p.name.eq_ignore_ascii_case(name))
        {
            return Err(StoreError::Rejected(Rejection::new(
                RejectionReason::Other,
                "El proveedor ya existe",
            )));
        }
        let id = state.next_id("prov");
        state.providers.push(Provider {
            id,
            name: name.to_string(),
            cash_advance: false,
            protected_flag: false,
        });
        Ok(())
    }

    async fn delete_provider(&self, session: &Session, id: &str) -> StoreResult<()> {
        let mut state = self.open(session)?;
        let Some(position) = state.providers.iter().position(|p| p.id == id) else {
            return Err(StoreError::Rejected(Rejection::new(
                RejectionReason::Other,
                "Proveedor no encontrado",
            )));
        };
        if state.providers[position].is_protected() {
            return Err(StoreError::Rejected(Rejection::new(
                RejectionReason::Protected,
                "No se puede eliminar un proveedor protegido",
            )));
        }
        if state.expenses.iter().any(|e| e.provider_id == id) {
            return Err(StoreError::Rejected(Rejection::new(
                RejectionReason::HasRecords,
                "No se puede eliminar: el proveedor tiene gastos registrados",
            )));
        }
        state.providers.remove(position);
        Ok(())
    }

    async fn create_expense(&self, session: &Session, expense: &NewExpense) -> StoreResult<()> {
        let mut state = self.open(session)?;
        if state.provider_name(&expense.provider_id).is_none() {
            return Err(StoreError::Rejected(Rejection::new(
                RejectionReason::Other,
                "Proveedor no encontrado",
            )));
        }
        state.expenses.push(ExpenseEntry {
            date: expense.date,
            provider_id: expense.provider_id.clone(),
            amount: expense.amount,
            method: expense.method,
        });
        Ok(())
    }
}
