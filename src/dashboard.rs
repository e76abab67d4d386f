//! Report views over a [`RecordStore`].
//!
//! A dashboard validates the range, fetches the raw records and hands them to the
//! matching aggregator. Loads may overlap; every load takes a ticket and only the
//! latest ticket may update the view, so a slow early response cannot overwrite a
//! newer one. Mutations are followed by a full reload, never an incremental patch.

use crate::error::{LedgerError, Result};
use crate::providers::{build_provider_report, ProviderReport};
use crate::range::RangeWindow;
use crate::sales::{build_sales_report, SalesReport};
use crate::schema::{DateRange, NewExpense, NewSale, Provider, ProviderFilter};
use crate::store::{RecordStore, Rejection, RejectionReason, Session, StoreError};
use log::{debug, info, warn};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq)]
pub enum LoadOutcome<R> {
    /// The report became the current view.
    Applied(R),
    /// A newer load was issued while this one was in flight; its result was dropped.
    Superseded,
}

impl<R> LoadOutcome<R> {
    pub fn applied(self) -> Option<R> {
        match self {
            LoadOutcome::Applied(report) => Some(report),
            LoadOutcome::Superseded => None,
        }
    }
}

/// Hands out monotonically increasing tickets; only the last one issued is current.
#[derive(Debug, Default)]
pub struct RequestSequencer {
    latest: AtomicU64,
}

impl RequestSequencer {
    pub fn issue(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn is_latest(&self, ticket: u64) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Store message verbatim when there is one, `fallback` otherwise.
fn mutation_error(err: StoreError, fallback: &str) -> LedgerError {
    warn!("{}: {}", fallback, err);
    match err {
        StoreError::Rejected(Rejection {
            message: Some(message),
            ..
        }) => LedgerError::MutationRejected(message),
        _ => LedgerError::MutationRejected(fallback.to_string()),
    }
}

#[derive(Debug, Default)]
struct SalesView {
    range: Option<DateRange>,
    report: Option<SalesReport>,
}

pub struct SalesDashboard<S> {
    store: S,
    session: Session,
    requests: RequestSequencer,
    view: Mutex<SalesView>,
}

impl<S: RecordStore> SalesDashboard<S> {
    pub fn new(store: S, session: Session) -> Self {
        Self {
            store,
            session,
            requests: RequestSequencer::default(),
            view: Mutex::new(SalesView::default()),
        }
    }

    /// Loads `from..=to` given as `YYYY-MM-DD`. Bad bounds fail before the store is called.
    pub async fn load(&self, from: &str, to: &str) -> Result<LoadOutcome<SalesReport>> {
        let range = DateRange::parse(from, to)?;
        self.load_range(range).await
    }

    pub async fn load_window(&self, window: RangeWindow) -> Result<LoadOutcome<SalesReport>> {
        self.load_range(window.resolve()).await
    }

    pub async fn load_range(&self, range: DateRange) -> Result<LoadOutcome<SalesReport>> {
        let ticket = self.requests.issue();
        lock(&self.view).range = Some(range);

        let fetched = self.store.fetch_sales(&self.session, &range).await;

        if !self.requests.is_latest(ticket) {
            debug!("Dropping superseded sales response #{} for {}..{}", ticket, range.from, range.to);
            return Ok(LoadOutcome::Superseded);
        }

        match fetched {
            Ok(records) => {
                let report = build_sales_report(&records, range);
                lock(&self.view).report = Some(report.clone());
                Ok(LoadOutcome::Applied(report))
            }
            Err(source) => {
                warn!("Failed to load sales for {}..{}: {}", range.from, range.to, source);
                lock(&self.view).report = Some(build_sales_report(&[], range));
                Err(LedgerError::FetchFailed {
                    what: "sales report",
                    source,
                })
            }
        }
    }

    pub fn current(&self) -> Option<SalesReport> {
        lock(&self.view).report.clone()
    }

    pub fn current_range(&self) -> Option<DateRange> {
        lock(&self.view).range
    }

    /// Deletes a persisted sale, then recomputes the report for the current range.
    pub async fn delete_sale(&self, id: &str) -> Result<LoadOutcome<SalesReport>> {
        if id.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                "only persisted sales can be deleted".to_string(),
            ));
        }
        let range = self
            .current_range()
            .ok_or_else(|| LedgerError::InvalidRange("no range has been loaded".to_string()))?;

        self.store
            .delete_sale(&self.session, id)
            .await
            .map_err(|e| mutation_error(e, "could not delete the sale"))?;
        info!("Deleted sale {}", id);

        self.load_range(range).await
    }

    pub async fn record_sale(&self, sale: &NewSale) -> Result<()> {
        sale.validate()?;
        self.store
            .create_sale(&self.session, sale)
            .await
            .map_err(|e| mutation_error(e, "could not save the sale"))?;
        info!("Recorded sale for {}", sale.date);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct ProviderView {
    range: Option<DateRange>,
    filter: ProviderFilter,
    report: Option<ProviderReport>,
    providers: Vec<Provider>,
}

pub struct ProviderDashboard<S> {
    store: S,
    session: Session,
    requests: RequestSequencer,
    view: Mutex<ProviderView>,
}

impl<S: RecordStore> ProviderDashboard<S> {
    pub fn new(store: S, session: Session) -> Self {
        Self {
            store,
            session,
            requests: RequestSequencer::default(),
            view: Mutex::new(ProviderView::default()),
        }
    }

    pub async fn load(
        &self,
        from: &str,
        to: &str,
        filter: ProviderFilter,
    ) -> Result<LoadOutcome<ProviderReport>> {
        let range = DateRange::parse(from, to)?;
        self.load_range(range, filter).await
    }

    pub async fn load_window(
        &self,
        window: RangeWindow,
        filter: ProviderFilter,
    ) -> Result<LoadOutcome<ProviderReport>> {
        self.load_range(window.resolve(), filter).await
    }

    pub async fn load_range(
        &self,
        range: DateRange,
        filter: ProviderFilter,
    ) -> Result<LoadOutcome<ProviderReport>> {
        let ticket = self.requests.issue();
        {
            let mut view = lock(&self.view);
            view.range = Some(range);
            view.filter = filter.clone();
        }

        let fetched = self
            .store
            .fetch_provider_expenses(&self.session, &range)
            .await;

        if !self.requests.is_latest(ticket) {
            debug!("Dropping superseded provider response #{} for {}..{}", ticket, range.from, range.to);
            return Ok(LoadOutcome::Superseded);
        }

        match fetched {
            Ok(days) => {
                let report = build_provider_report(&days, range, &filter);
                lock(&self.view).report = Some(report.clone());
                Ok(LoadOutcome::Applied(report))
            }
            Err(source) => {
                warn!("Failed to load provider expenses for {}..{}: {}", range.from, range.to, source);
                lock(&self.view).report = Some(build_provider_report(&[], range, &filter));
                Err(LedgerError::FetchFailed {
                    what: "provider report",
                    source,
                })
            }
        }
    }

    /// Loads the report and the provider list concurrently. A failed provider
    /// listing is logged and leaves the previous list in place.
    pub async fn load_with_providers(
        &self,
        range: DateRange,
        filter: ProviderFilter,
    ) -> Result<LoadOutcome<ProviderReport>> {
        let (report, providers) = futures::join!(
            self.load_range(range, filter),
            self.store.fetch_providers(&self.session)
        );

        match providers {
            Ok(providers) => lock(&self.view).providers = providers,
            Err(e) => warn!("Failed to load provider list: {}", e),
        }

        report
    }

    /// Re-runs the current range with a different provider filter.
    pub async fn set_filter(&self, filter: ProviderFilter) -> Result<LoadOutcome<ProviderReport>> {
        let range = lock(&self.view)
            .range
            .ok_or_else(|| LedgerError::InvalidRange("no range has been loaded".to_string()))?;
        self.load_range(range, filter).await
    }

    pub fn current(&self) -> Option<ProviderReport> {
        lock(&self.view).report.clone()
    }

    pub fn filter(&self) -> ProviderFilter {
        lock(&self.view).filter.clone()
    }

    pub fn providers(&self) -> Vec<Provider> {
        lock(&self.view).providers.clone()
    }
}

/// Provider management and expense entry.
pub struct ProviderDirectory<S> {
    store: S,
    session: Session,
}

impl<S: RecordStore> ProviderDirectory<S> {
    pub fn new(store: S, session: Session) -> Self {
        Self { store, session }
    }

    /// Lists providers, seeding the reserved cash-advance provider first.
    pub async fn list(&self) -> Result<Vec<Provider>> {
        if let Err(e) = self.store.ensure_cash_advance_provider(&self.session).await {
            warn!("Could not initialise the cash advance provider: {}", e);
        }
        self.fetch().await
    }

    async fn fetch(&self) -> Result<Vec<Provider>> {
        self.store
            .fetch_providers(&self.session)
            .await
            .map_err(|source| LedgerError::FetchFailed {
                what: "providers",
                source,
            })
    }

    /// Creates a provider and returns the refreshed list.
    pub async fn create(&self, name: &str) -> Result<Vec<Provider>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::InvalidInput(
                "provider name cannot be empty".to_string(),
            ));
        }
        self.store
            .create_provider(&self.session, name)
            .await
            .map_err(|e| mutation_error(e, "could not add the provider"))?;
        info!("Created provider '{}'", name);
        self.fetch().await
    }

    /// Asks the store to delete `provider` and returns the refreshed list.
    ///
    /// Protection and referential checks belong to the store; a rejection for a
    /// protected provider is reported with the provider's name.
    pub async fn delete(&self, provider: &Provider) -> Result<Vec<Provider>> {
        match self.store.delete_provider(&self.session, &provider.id).await {
            Ok(()) => {
                info!("Deleted provider '{}'", provider.name);
                self.fetch().await
            }
            Err(StoreError::Rejected(rejection))
                if rejection.reason == RejectionReason::Protected || provider.is_protected() =>
            {
                warn!("Refused to delete protected provider '{}'", provider.name);
                Err(LedgerError::ProtectedProvider {
                    name: provider.name.clone(),
                    message: rejection.message,
                })
            }
            Err(e) => Err(mutation_error(e, "could not delete the provider")),
        }
    }

    pub async fn record_expense(&self, expense: &NewExpense) -> Result<()> {
        expense.validate()?;
        self.store
            .create_expense(&self.session, expense)
            .await
            .map_err(|e| mutation_error(e, "could not save the expense"))?;
        info!(
            "Recorded {:?} expense of {} for provider {} on {}",
            expense.method, expense.amount, expense.provider_id, expense.date
        );
        Ok(())
    }
}
