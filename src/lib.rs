//! # Daily Ledger
//!
//! Reporting core for a small retail business that keeps one sales record per day
//! and a log of payments made to its providers.
//!
//! ## Core Concepts
//!
//! - **Sales record**: one business day with ten tracked amounts (register, cash sales,
//!   debit, transfers, water, rent, payroll, misc, provider cash, provider transfers)
//! - **Sale total**: cash sales + debit + transfers, always recomputed locally
//! - **Provider expense day**: a day's payments broken down per provider, split into
//!   cash and transfer
//! - **Reports**: pure aggregations ([`build_sales_report`], [`build_provider_report`])
//!   producing totals, metrics, a daily series and category breakdowns
//! - **Record store**: the external persistence boundary ([`RecordStore`]); an
//!   in-process [`MemoryStore`] and, with the `http` feature, an [`HttpStore`]
//!
//! ## Example
//!
//! ```rust,ignore
//! use daily_ledger::*;
//!
//! let store = MemoryStore::new();
//! let dashboard = SalesDashboard::new(&store, Session::new("token"));
//!
//! if let LoadOutcome::Applied(report) = dashboard.load("2024-01-01", "2024-01-31").await? {
//!     for day in &report.days {
//!         println!("{} {}", display_date(day.date()), format_currency(day.sale_total));
//!     }
//! }
//! ```

pub mod config;
pub mod dashboard;
pub mod error;
pub mod format;
pub mod memory_store;
pub mod providers;
pub mod range;
pub mod report;
pub mod sales;
pub mod schema;
pub mod store;

#[cfg(feature = "http")]
pub mod client;

#[cfg(feature = "http")]
pub use client::HttpStore;
pub use config::LedgerConfig;
pub use dashboard::{LoadOutcome, ProviderDashboard, ProviderDirectory, RequestSequencer, SalesDashboard};
pub use error::{LedgerError, Result};
pub use format::*;
pub use memory_store::{MemoryStore, CASH_ADVANCE_PROVIDER};
pub use providers::*;
pub use range::*;
pub use report::CategoryAmount;
pub use sales::*;
pub use schema::*;
pub use store::{RecordStore, Rejection, RejectionReason, Session, StoreError, StoreResult};
