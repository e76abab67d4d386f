//! The record store boundary.
//!
//! Everything behind [`RecordStore`] is external: persistence, authentication,
//! protection rules and referential integrity. Each call carries an explicit
//! [`Session`] instead of reading credentials from ambient state.

use crate::schema::{
    DateRange, NewExpense, NewSale, Provider, ProviderExpenseDay, SalesRecord,
};
use std::fmt;
use thiserror::Error;

/// Credential passed to every store call.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    token: String,
}

impl Session {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("token", &"<redacted>").finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionReason {
    /// The provider is protected by the store.
    Protected,
    /// The provider still has expense records.
    HasRecords,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub reason: RejectionReason,
    pub message: Option<String>,
}

impl Rejection {
    pub fn new(reason: RejectionReason, message: impl Into<String>) -> Self {
        Self {
            reason,
            message: Some(message.into()),
        }
    }

    pub fn without_message(reason: RejectionReason) -> Self {
        Self {
            reason,
            message: None,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("store rejected the request: {}", .0.message.as_deref().unwrap_or("no reason given"))]
    Rejected(Rejection),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Query-by-range and mutation API of the remote record store.
#[allow(async_fn_in_trait)]
pub trait RecordStore {
    async fn fetch_sales(&self, session: &Session, range: &DateRange) -> StoreResult<Vec<SalesRecord>>;

    async fn fetch_provider_expenses(
        &self,
        session: &Session,
        range: &DateRange,
    ) -> StoreResult<Vec<ProviderExpenseDay>>;

    async fn fetch_providers(&self, session: &Session) -> StoreResult<Vec<Provider>>;

    /// Seeds the reserved cash-advance provider if the store does not have it yet.
    async fn ensure_cash_advance_provider(&self, session: &Session) -> StoreResult<()>;

    async fn delete_sale(&self, session: &Session, id: &str) -> StoreResult<()>;

    async fn create_sale(&self, session: &Session, sale: &NewSale) -> StoreResult<()>;

    async fn create_provider(&self, session: &Session, name: &str) -> StoreResult<()>;

    async fn delete_provider(&self, session: &Session, id: &str) -> StoreResult<()>;

    async fn create_expense(&self, session: &Session, expense: &NewExpense) -> StoreResult<()>;
}

impl<S: RecordStore> RecordStore for &S {
    async fn fetch_sales(&self, session: &Session, range: &DateRange) -> StoreResult<Vec<SalesRecord>> {
        (**self).fetch_sales(session, range).await
    }

    async fn fetch_provider_expenses(
        &self,
        session: &Session,
        range: &DateRange,
    ) -> StoreResult<Vec<ProviderExpenseDay>> {
        (**self).fetch_provider_expenses(session, range).await
    }

    async fn fetch_providers(&self, session: &Session) -> StoreResult<Vec<Provider>> {
        (**self).fetch_providers(session).await
    }

    async fn ensure_cash_advance_provider(&self, session: &Session) -> StoreResult<()> {
        (**self).ensure_cash_advance_provider(session).await
    }

    async fn delete_sale(&self, session: &Session, id: &str) -> StoreResult<()> {
        (**self).delete_sale(session, id).await
    }

    async fn create_sale(&self, session: &Session, sale: &NewSale) -> StoreResult<()> {
        (**self).create_sale(session, sale).await
    }

    async fn create_provider(&self, session: &Session, name: &str) -> StoreResult<()> {
        (**self).create_provider(session, name).await
    }

    async fn delete_provider(&self, session: &Session, id: &str) -> StoreResult<()> {
        (**self).delete_provider(session, id).await
    }

    async fn create_expense(&self, session: &Session, expense: &NewExpense) -> StoreResult<()> {
        (**self).create_expense(session, expense).await
    }
}
