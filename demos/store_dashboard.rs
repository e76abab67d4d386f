use daily_ledger::{
    display_date, HttpStore, LedgerConfig, LoadOutcome, ProviderDashboard, ProviderDirectory,
    ProviderFilter, RangeWindow, SalesDashboard, Session,
};
use dotenv::dotenv;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    let token = std::env::var("LEDGER_TOKEN").expect("LEDGER_TOKEN must be set");

    let config = LedgerConfig::from_env()?;
    let currency = config.currency.clone();
    println!("Connecting to {}\n", config.base_url);

    let store = HttpStore::new(config)?;
    let session = Session::new(token);

    let sales = SalesDashboard::new(&store, session.clone());
    if let LoadOutcome::Applied(report) = sales.load_window(RangeWindow::ThisMonth).await? {
        println!("Sales {} .. {}", display_date(report.range.from), display_date(report.range.to));
        for day in &report.days {
            println!("  {}  {:>16}", display_date(day.date()), currency.format(day.sale_total));
        }
        if let Some(metrics) = &report.metrics {
            println!("  total   {}", currency.format(metrics.total));
            println!("  average {}", currency.format(metrics.average));
            println!(
                "  best    {} ({})",
                display_date(metrics.best.date()),
                currency.format(metrics.best.sale_total)
            );
        }
        for method in &report.payment_methods {
            println!("  {:<10} {}", method.name, currency.format(method.value));
        }
        println!();
    }

    let directory = ProviderDirectory::new(&store, session.clone());
    let providers = directory.list().await?;
    println!("Providers:");
    for provider in &providers {
        let marker = if provider.is_protected() { " (protected)" } else { "" };
        println!("  {}{}", provider.name, marker);
    }
    println!();

    let expenses = ProviderDashboard::new(&store, session);
    if let LoadOutcome::Applied(report) = expenses
        .load_window(RangeWindow::ThisMonth, ProviderFilter::All)
        .await?
    {
        println!("Provider payments this month:");
        for entry in &report.provider_breakdown {
            println!("  {:<24} {}", entry.name, currency.format(entry.value));
        }
        if let Some(metrics) = &report.metrics {
            println!("  total paid {}", currency.format(metrics.total_paid));
        }
    }

    Ok(())
}
