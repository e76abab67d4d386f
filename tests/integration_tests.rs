use chrono::{Datelike, NaiveDate, Weekday};
use daily_ledger::*;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::Notify;

fn ymd(year: i32, month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, day).unwrap()
}

fn new_sale(date: NaiveDate, cash_sales: f64, debit: f64, transfers: f64) -> NewSale {
    NewSale {
        date,
        cash_register: 0.0,
        cash_sales,
        debit,
        transfers,
        water: 0.0,
        rent: 0.0,
        payroll: 0.0,
        misc: 0.0,
    }
}

fn expense(date: NaiveDate, provider_id: &str, amount: f64, method: PaymentMethod) -> NewExpense {
    NewExpense {
        date,
        provider_id: provider_id.to_string(),
        amount,
        method,
    }
}

/// Delegates to a [`MemoryStore`] but holds sales fetches starting on `slow_from`
/// until `release` is notified.
struct GatedStore {
    inner: MemoryStore,
    slow_from: NaiveDate,
    release: Arc<Notify>,
}

impl RecordStore for GatedStore {
    async fn fetch_sales(&self, session: &Session, range: &DateRange) -> StoreResult<Vec<SalesRecord>> {
        if range.from == self.slow_from {
            self.release.notified().await;
        }
        self.inner.fetch_sales(session, range).await
    }

    async fn fetch_provider_expenses(
        &self,
        session: &Session,
        range: &DateRange,
    ) -> StoreResult<Vec<ProviderExpenseDay>> {
        self.inner.fetch_provider_expenses(session, range).await
    }

    async fn fetch_providers(&self, session: &Session) -> StoreResult<Vec<Provider>> {
        self.inner.fetch_providers(session).await
    }

    async fn ensure_cash_advance_provider(&self, session: &Session) -> StoreResult<()> {
        self.inner.ensure_cash_advance_provider(session).await
    }

    async fn delete_sale(&self, session: &Session, id: &str) -> StoreResult<()> {
        self.inner.delete_sale(session, id).await
    }

    async fn create_sale(&self, session: &Session, sale: &NewSale) -> StoreResult<()> {
        self.inner.create_sale(session, sale).await
    }

    async fn create_provider(&self, session: &Session, name: &str) -> StoreResult<()> {
        self.inner.create_provider(session, name).await
    }

    async fn delete_provider(&self, session: &Session, id: &str) -> StoreResult<()> {
        self.inner.delete_provider(session, id).await
    }

    async fn create_expense(&self, session: &Session, expense: &NewExpense) -> StoreResult<()> {
        self.inner.create_expense(session, expense).await
    }
}

#[tokio::test]
async fn test_zero_day_dropped_and_single_day_has_no_totals() {
    let store = MemoryStore::new();
    store.seed_sales([
        SalesRecord::new(
            ymd(2024, 1, 1),
            SalesAmounts {
                cash_sales: 100.0,
                ..SalesAmounts::default()
            },
        )
        .with_id("s1"),
        SalesRecord::new(ymd(2024, 1, 2), SalesAmounts::default()).with_id("s2"),
    ]);
    let dashboard = SalesDashboard::new(&store, Session::new("token"));

    let report = dashboard
        .load("2024-01-01", "2024-01-02")
        .await
        .unwrap()
        .applied()
        .unwrap();

    assert_eq!(report.days.len(), 1);
    assert_eq!(report.days[0].date(), ymd(2024, 1, 1));
    assert!(report.totals.is_none());
    assert_eq!(report.metrics.as_ref().unwrap().total, 100.0);
    assert_eq!(dashboard.current(), Some(report));
}

#[tokio::test]
async fn test_sales_totals_match_components() {
    let store = MemoryStore::new();
    let session = Session::new("token");
    let dashboard = SalesDashboard::new(&store, session.clone());

    dashboard.record_sale(&new_sale(ymd(2024, 1, 3), 120.0, 30.0, 0.0)).await.unwrap();
    dashboard.record_sale(&new_sale(ymd(2024, 1, 1), 40.0, 0.0, 60.0)).await.unwrap();
    dashboard.record_sale(&new_sale(ymd(2024, 1, 2), 10.0, 5.0, 5.0)).await.unwrap();

    let report = dashboard
        .load_range(DateRange::new(ymd(2024, 1, 1), ymd(2024, 1, 31)))
        .await
        .unwrap()
        .applied()
        .unwrap();

    let dates: Vec<_> = report.days.iter().map(|d| d.date()).collect();
    assert_eq!(dates, vec![ymd(2024, 1, 1), ymd(2024, 1, 2), ymd(2024, 1, 3)]);

    let series_sum: f64 = report.days.iter().map(|d| d.sale_total).sum();
    let totals = report.totals.as_ref().unwrap();
    assert_eq!(series_sum, totals.amounts.cash_sales + totals.amounts.debit + totals.amounts.transfers);
    assert_eq!(totals.sale_total, 270.0);

    let metrics = report.metrics.as_ref().unwrap();
    assert_eq!(metrics.best.date(), ymd(2024, 1, 3));
    assert_eq!(metrics.worst.date(), ymd(2024, 1, 2));
    assert_eq!(metrics.average, 90.0);

    let methods: Vec<_> = report.payment_methods.iter().map(|c| (c.name.as_str(), c.value)).collect();
    assert_eq!(methods, vec![("Cash", 170.0), ("Debit", 35.0), ("Transfers", 65.0)]);
}

#[tokio::test]
async fn test_duplicate_sale_message_is_surfaced() {
    let store = MemoryStore::new();
    let dashboard = SalesDashboard::new(&store, Session::new("token"));
    let sale = new_sale(ymd(2024, 1, 1), 10.0, 0.0, 0.0);

    dashboard.record_sale(&sale).await.unwrap();
    let err = dashboard.record_sale(&sale).await.unwrap_err();
    assert_eq!(err.to_string(), "Ya existe una venta para esa fecha");

    let negative = new_sale(ymd(2024, 1, 2), -1.0, 0.0, 0.0);
    assert!(matches!(
        dashboard.record_sale(&negative).await,
        Err(LedgerError::InvalidInput(_))
    ));
}

#[tokio::test]
async fn test_provider_breakdown_in_first_seen_order() {
    let store = MemoryStore::new();
    let session = Session::new("token");
    let a = store.add_provider("A", false);
    let b = store.add_provider("B", false);
    let directory = ProviderDirectory::new(&store, session.clone());

    let day = ymd(2024, 2, 1);
    directory.record_expense(&expense(day, &a, 50.0, PaymentMethod::Cash)).await.unwrap();
    directory.record_expense(&expense(day, &b, 30.0, PaymentMethod::Transfer)).await.unwrap();

    let dashboard = ProviderDashboard::new(&store, session);
    let report = dashboard
        .load("2024-02-01", "2024-02-29", ProviderFilter::All)
        .await
        .unwrap()
        .applied()
        .unwrap();

    assert_eq!(
        report.provider_breakdown,
        vec![CategoryAmount::new("A", 50.0), CategoryAmount::new("B", 30.0)]
    );
    assert_eq!(
        report.payment_types,
        vec![CategoryAmount::new("Cash", 50.0), CategoryAmount::new("Transfer", 30.0)]
    );
    assert_eq!(report.days[0].total, 80.0);
}

#[tokio::test]
async fn test_provider_filter_narrows_days() {
    let store = MemoryStore::new();
    let session = Session::new("token");
    let a = store.add_provider("A", false);
    let b = store.add_provider("B", false);
    let directory = ProviderDirectory::new(&store, session.clone());

    directory.record_expense(&expense(ymd(2024, 2, 1), &a, 50.0, PaymentMethod::Cash)).await.unwrap();
    directory.record_expense(&expense(ymd(2024, 2, 1), &a, 5.0, PaymentMethod::Transfer)).await.unwrap();
    directory.record_expense(&expense(ymd(2024, 2, 2), &b, 30.0, PaymentMethod::Transfer)).await.unwrap();

    let dashboard = ProviderDashboard::new(&store, session);
    let report = dashboard
        .load("2024-02-01", "2024-02-29", "A".parse().unwrap())
        .await
        .unwrap()
        .applied()
        .unwrap();

    let totals: Vec<_> = report.days.iter().map(|d| (d.date, d.total)).collect();
    assert_eq!(totals, vec![(ymd(2024, 2, 1), 55.0), (ymd(2024, 2, 2), 0.0)]);
    assert!(report.provider_breakdown.is_empty());

    let metrics = report.metrics.unwrap();
    assert_eq!(metrics.total_paid, 55.0);
    assert_eq!(metrics.lowest.date, ymd(2024, 2, 2));
}

#[tokio::test]
async fn test_protected_provider_cannot_be_deleted() {
    let store = MemoryStore::new();
    store.add_provider("Distribuidora Norte", true);
    let directory = ProviderDirectory::new(&store, Session::new("token"));

    let before = directory.list().await.unwrap();
    let protected = before
        .iter()
        .find(|p| p.name == "Distribuidora Norte")
        .unwrap()
        .clone();

    let err = directory.delete(&protected).await.unwrap_err();
    assert!(matches!(err, LedgerError::ProtectedProvider { .. }));
    let message = err.to_string();
    assert!(message.contains("Distribuidora Norte"));
    assert!(message.contains("No se puede eliminar un proveedor protegido"));

    assert_eq!(directory.list().await.unwrap(), before);
}

#[tokio::test]
async fn test_cash_advance_provider_is_seeded_once() {
    let store = MemoryStore::new();
    store.add_provider("A", false);
    let directory = ProviderDirectory::new(&store, Session::new("token"));

    let providers = directory.list().await.unwrap();
    let providers_again = directory.list().await.unwrap();
    assert_eq!(providers, providers_again);

    assert_eq!(providers[0].name, CASH_ADVANCE_PROVIDER);
    assert!(providers[0].is_protected());
    assert_eq!(providers.iter().filter(|p| p.cash_advance).count(), 1);

    let err = directory.delete(&providers[0]).await.unwrap_err();
    assert!(err.to_string().contains(CASH_ADVANCE_PROVIDER));
}

#[tokio::test]
async fn test_provider_with_expenses_keeps_store_message() {
    let store = MemoryStore::new();
    let session = Session::new("token");
    let directory = ProviderDirectory::new(&store, session);

    let providers = directory.create("Lácteos Sur").await.unwrap();
    let provider = providers.iter().find(|p| p.name == "Lácteos Sur").unwrap().clone();
    directory
        .record_expense(&expense(ymd(2024, 3, 1), &provider.id, 12.5, PaymentMethod::Cash))
        .await
        .unwrap();

    let err = directory.delete(&provider).await.unwrap_err();
    assert!(matches!(err, LedgerError::MutationRejected(_)));
    assert_eq!(
        err.to_string(),
        "No se puede eliminar: el proveedor tiene gastos registrados"
    );

    let duplicate = directory.create("lácteos sur").await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_provider_payments_appear_on_sales_days() {
    let store = MemoryStore::new();
    let session = Session::new("token");
    let a = store.add_provider("A", false);

    let sales = SalesDashboard::new(&store, session.clone());
    let directory = ProviderDirectory::new(&store, session);
    sales.record_sale(&new_sale(ymd(2024, 4, 1), 100.0, 0.0, 0.0)).await.unwrap();
    directory.record_expense(&expense(ymd(2024, 4, 1), &a, 20.0, PaymentMethod::Cash)).await.unwrap();
    directory.record_expense(&expense(ymd(2024, 4, 2), &a, 15.0, PaymentMethod::Transfer)).await.unwrap();

    let report = sales.load("2024-04-01", "2024-04-30").await.unwrap().applied().unwrap();

    assert_eq!(report.days.len(), 2);
    assert_eq!(report.days[0].record.amounts.provider_cash, 20.0);
    // an expense-only day is significant but has no sale and cannot be deleted
    assert_eq!(report.days[1].sale_total, 0.0);
    assert_eq!(report.days[1].record.amounts.provider_transfer, 15.0);
    assert!(report.days[1].record.id.is_none());
}

#[tokio::test]
async fn test_stale_response_is_discarded() {
    let release = Arc::new(Notify::new());
    let store = GatedStore {
        inner: MemoryStore::new(),
        slow_from: ymd(2024, 1, 1),
        release: release.clone(),
    };
    store.inner.seed_sales([
        SalesRecord::new(
            ymd(2024, 1, 5),
            SalesAmounts {
                debit: 10.0,
                ..SalesAmounts::default()
            },
        ),
        SalesRecord::new(
            ymd(2024, 2, 5),
            SalesAmounts {
                debit: 99.0,
                ..SalesAmounts::default()
            },
        ),
    ]);
    let dashboard = SalesDashboard::new(&store, Session::new("token"));

    let (slow, fast, ()) = futures::join!(
        dashboard.load("2024-01-01", "2024-01-31"),
        dashboard.load("2024-02-01", "2024-02-29"),
        async { release.notify_one() }
    );

    assert_eq!(slow.unwrap(), LoadOutcome::Superseded);
    let fast = fast.unwrap().applied().unwrap();
    assert_eq!(fast.metrics.as_ref().unwrap().total, 99.0);

    let current = dashboard.current().unwrap();
    assert_eq!(current.range, DateRange::new(ymd(2024, 2, 1), ymd(2024, 2, 29)));
    assert_eq!(current, fast);
}

#[tokio::test]
async fn test_load_with_providers() {
    let store = MemoryStore::new();
    store.add_provider("A", false);
    store.add_provider("B", true);
    let dashboard = ProviderDashboard::new(&store, Session::new("token"));

    let outcome = dashboard
        .load_with_providers(DateRange::single(ymd(2024, 5, 1)), ProviderFilter::All)
        .await
        .unwrap();

    assert!(outcome.applied().unwrap().is_empty());
    let names: Vec<_> = dashboard.providers().into_iter().map(|p| p.name).collect();
    assert_eq!(names, vec!["A", "B"]);
}

#[tokio::test]
async fn test_wrong_session_is_a_fetch_failure() {
    let store = MemoryStore::with_token("right");
    let dashboard = ProviderDashboard::new(&store, Session::new("wrong"));

    let err = dashboard
        .load("2024-01-01", "2024-01-31", ProviderFilter::All)
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::FetchFailed { what: "provider report", .. }));
    assert!(dashboard.current().unwrap().is_empty());
}

#[tokio::test]
async fn test_malformed_ranges_rejected() {
    let store = MemoryStore::new();
    let dashboard = SalesDashboard::new(&store, Session::new("token"));

    for (from, to) in [("", "2024-01-01"), ("2024-01-01", ""), ("2024-1-1", "2024-01-02"), ("2024-13-01", "2024-12-31")] {
        let result = dashboard.load(from, to).await;
        assert!(matches!(result, Err(LedgerError::InvalidRange(_))), "{from}..{to}");
    }
    assert!(dashboard.current().is_none());
}

#[test]
fn test_wire_payloads_build_reports() {
    let records: Vec<SalesRecord> = serde_json::from_value(json!([
        {"_id": "b", "fecha": "2024-01-02T03:00:00.000Z", "ventaEfectivo": "50", "debito": 25},
        {"_id": "a", "fecha": "2024-01-01T03:00:00.000Z", "ventaEfectivo": 100, "transferencias": null},
        {"_id": "c", "fecha": "2024-01-03", "caja": 0, "agua": "abc"}
    ]))
    .unwrap();
    let report = build_sales_report(&records, DateRange::new(ymd(2024, 1, 1), ymd(2024, 1, 3)));

    assert_eq!(report.days.len(), 2);
    assert_eq!(report.days[0].record.id.as_deref(), Some("a"));
    assert_eq!(report.totals.unwrap().sale_total, 175.0);

    // raw text keeps the provider keys in payload order
    let days: Vec<ProviderExpenseDay> = serde_json::from_str(
        r#"[
            {
                "fecha": "2024-02-01",
                "totalEfectivo": 50,
                "totalTransferencia": 30,
                "proveedores": {
                    "B": {"efectivo": 0, "transferencia": 30},
                    "A": {"efectivo": 50, "transferencia": 0}
                }
            },
            {"fecha": "2024-02-02", "totalEfectivo": 0, "totalTransferencia": 0, "proveedores": null}
        ]"#,
    )
    .unwrap();
    let report = build_provider_report(&days, DateRange::new(ymd(2024, 2, 1), ymd(2024, 2, 2)), &ProviderFilter::All);

    let names: Vec<_> = report.provider_breakdown.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["B", "A"]);
    assert_eq!(report.metrics.unwrap().active_days, 2);
}

#[test]
fn test_bad_row_does_not_sink_the_listing() {
    let rows: Vec<serde_json::Value> = serde_json::from_str(
        r#"[
            {"_id": "a", "fecha": "2024-01-01T03:00:00.000Z", "ventaEfectivo": 100},
            {"_id": "b", "ventaEfectivo": 5},
            {"_id": "c", "fecha": "2024-01-02", "debito": 40}
        ]"#,
    )
    .unwrap();
    let records: Vec<SalesRecord> = decode_rows(rows, "sales");
    let report = build_sales_report(&records, DateRange::new(ymd(2024, 1, 1), ymd(2024, 1, 2)));

    let ids: Vec<_> = report.days.iter().map(|d| d.record.id.as_deref()).collect();
    assert_eq!(ids, vec![Some("a"), Some("c")]);
    assert_eq!(report.totals.unwrap().sale_total, 140.0);
}

#[test]
fn test_range_windows() {
    let today = ymd(2024, 5, 16);
    assert_eq!(RangeWindow::Today.resolve_at(today), DateRange::single(today));

    let week = RangeWindow::ThisWeek.resolve_at(today);
    assert_eq!(week.from.weekday(), Weekday::Sun);
    assert_eq!(week.from, ymd(2024, 5, 12));
    assert_eq!(week.to, today);

    let month = RangeWindow::ThisMonth.resolve_at(today);
    assert_eq!(month.from.day(), 1);
    assert_eq!(month.to, today);

    let live = this_week();
    assert_eq!(live.from.weekday(), Weekday::Sun);
    assert!(live.from <= live.to);
}

#[test]
fn test_formatting() {
    assert_eq!(to_display_date("2024-03-09"), "09-03-2024");
    assert_eq!(to_display_date(""), "");
    assert_eq!(to_storage_date(ymd(2024, 3, 9)), "2024-03-09");
    assert_eq!(format_currency(1234.567), "$ 1.234,57");
}

#[test]
fn test_schema_generation() {
    let sales = SalesReport::schema_as_json().unwrap();
    assert!(sales.contains("payment_methods"));

    let providers = ProviderReport::schema_as_json().unwrap();
    assert!(providers.contains("provider_breakdown"));
}
