use crate::config::LedgerConfig;
use crate::error::Result;
use crate::format::to_storage_date;
use crate::schema::{
    decode_rows, DateRange, NewExpense, NewSale, Provider, ProviderExpenseDay, SalesRecord,
};
use crate::store::{RecordStore, Rejection, RejectionReason, Session, StoreError, StoreResult};
use log::{debug, warn};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};

/// [`RecordStore`] over the ledger REST API, authenticated with a bearer token.
#[derive(Clone)]
pub struct HttpStore {
    client: Client,
    config: LedgerConfig,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

impl HttpStore {
    pub fn new(config: LedgerConfig) -> Result<Self> {
        let client = Client::builder().build()?;
        Self::with_client(client, config)
    }

    pub fn with_client(client: Client, config: LedgerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { client, config })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url, path)
    }

    fn range_query(range: &DateRange) -> [(&'static str, String); 2] {
        [
            ("desde", to_storage_date(range.from)),
            ("hasta", to_storage_date(range.to)),
        ]
    }

    async fn send(request: RequestBuilder, session: &Session) -> StoreResult<Response> {
        request
            .bearer_auth(session.token())
            .send()
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))
    }

    async fn fetch<T: DeserializeOwned>(&self, request: RequestBuilder, session: &Session) -> StoreResult<T> {
        let res = Self::send(request, session).await?;
        let status = res.status();

        if !status.is_success() {
            let error_text = res.text().await.unwrap_or_default();
            warn!("Store query failed (status {}): {}", status, error_text);
            return Err(StoreError::Unavailable(format!(
                "status {}: {}",
                status, error_text
            )));
        }

        res.json::<T>()
            .await
            .map_err(|e| StoreError::Unavailable(format!("invalid response body: {}", e)))
    }

    async fn mutate(&self, request: RequestBuilder, session: &Session) -> StoreResult<()> {
        let res = Self::send(request, session).await?;
        let status = res.status();

        if status.is_success() {
            return Ok(());
        }

        let message = res
            .json::<ErrorBody>()
            .await
            .ok()
            .and_then(|body| body.message)
            .filter(|m| !m.trim().is_empty());
        debug!("Store rejected mutation (status {}): {:?}", status, message);

        // The API signals protection with 403 and referential integrity with 409.
        let reason = match status {
            StatusCode::FORBIDDEN => RejectionReason::Protected,
            StatusCode::CONFLICT => RejectionReason::HasRecords,
            _ => RejectionReason::Other,
        };
        Err(StoreError::Rejected(Rejection { reason, message }))
    }
}

impl RecordStore for HttpStore {
    async fn fetch_sales(&self, session: &Session, range: &DateRange) -> StoreResult<Vec<SalesRecord>> {
        let request = self
            .client
            .get(self.url("dashboard"))
            .query(&Self::range_query(range));
        let rows: Vec<Value> = self.fetch(request, session).await?;
        Ok(decode_rows(rows, "sales"))
    }

    async fn fetch_provider_expenses(
        &self,
        session: &Session,
        range: &DateRange,
    ) -> StoreResult<Vec<ProviderExpenseDay>> {
        let request = self
            .client
            .get(self.url("proveedores/dashboard"))
            .query(&Self::range_query(range));
        let rows: Vec<Value> = self.fetch(request, session).await?;
        Ok(decode_rows(rows, "provider expense"))
    }

    async fn fetch_providers(&self, session: &Session) -> StoreResult<Vec<Provider>> {
        let request = self.client.get(self.url("proveedores"));
        self.fetch(request, session).await
    }

    async fn ensure_cash_advance_provider(&self, session: &Session) -> StoreResult<()> {
        let request = self
            .client
            .post(self.url("proveedores/init-adelanto-caja"))
            .json(&json!({}));
        self.mutate(request, session).await
    }

    async fn delete_sale(&self, session: &Session, id: &str) -> StoreResult<()> {
        let request = self.client.delete(self.url(&format!("ventas/{}", id)));
        self.mutate(request, session).await
    }

    async fn create_sale(&self, session: &Session, sale: &NewSale) -> StoreResult<()> {
        let stamp = self
            .config
            .sale_timestamp(sale.date)
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;

        let payload = json!({
            "fecha": stamp.to_rfc3339(),
            "caja": sale.cash_register,
            "ventaEfectivo": sale.cash_sales,
            "debito": sale.debit,
            "transferencias": sale.transfers,
            "agua": sale.water,
            "alquiler": sale.rent,
            "sueldos": sale.payroll,
            "varios": sale.misc,
        });
        let request = self.client.post(self.url("ventas")).json(&payload);
        self.mutate(request, session).await
    }

    async fn create_provider(&self, session: &Session, name: &str) -> StoreResult<()> {
        let request = self
            .client
            .post(self.url("proveedores"))
            .json(&json!({ "nombre": name }));
        self.mutate(request, session).await
    }

    async fn delete_provider(&self, session: &Session, id: &str) -> StoreResult<()> {
        let request = self.client.delete(self.url(&format!("proveedores/{}", id)));
        self.mutate(request, session).await
    }

    async fn create_expense(&self, session: &Session, expense: &NewExpense) -> StoreResult<()> {
        let payload = json!({
            "fecha": to_storage_date(expense.date),
            "proveedor": expense.provider_id,
            "monto": expense.amount,
            "tipo": expense.method,
        });
        let request = self
            .client
            .post(self.url("proveedores/gastos"))
            .json(&payload);
        self.mutate(request, session).await
    }
}
