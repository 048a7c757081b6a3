//! Remote Data Gateway - per-table read/upsert/insert over the hosted
//! REST interface.
//!
//! Each table exposes a pull, plus an upsert keyed by its natural key, or
//! a plain insert for the two append-only audit tables. The HTTP
//! implementation speaks the PostgREST dialect: `on_conflict` selects the
//! upsert key and `Prefer: resolution=merge-duplicates` makes a repeated
//! submission update the existing row instead of duplicating it.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

use crate::error::{Result, SyncError};
use crate::rows::*;

/// Remote table names.
pub mod tables {
    pub const TIRE_MODELS: &str = "tire_models";
    pub const CONTAINERS: &str = "containers";
    pub const STOCK_ENTRIES: &str = "stock_entries";
    pub const TIRE_MOVEMENTS: &str = "tire_movements";
    pub const TIRE_CONSUMPTION: &str = "tire_consumption";
    pub const TIRE_STATUS: &str = "tire_status";

    /// All six tables, in cycle order.
    pub const ALL: [&str; 6] = [
        TIRE_MODELS,
        CONTAINERS,
        STOCK_ENTRIES,
        TIRE_MOVEMENTS,
        TIRE_CONSUMPTION,
        TIRE_STATUS,
    ];
}

/// Table-scoped access to the hosted relational store.
///
/// Every method fails with [`SyncError::Remote`] carrying the table name;
/// no call fails silently. Upserts are idempotent on the table's natural
/// key and refresh `updated_at`.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn fetch_models(&self) -> Result<Vec<TireModelRow>>;
    async fn fetch_containers(&self) -> Result<Vec<ContainerRow>>;
    async fn fetch_entries(&self) -> Result<Vec<StockEntryRow>>;
    async fn fetch_movements(&self) -> Result<Vec<MovementRow>>;
    async fn fetch_consumption(&self) -> Result<Vec<ConsumptionRow>>;
    async fn fetch_status(&self) -> Result<Vec<StatusRow>>;

    async fn upsert_models(&self, rows: Vec<TireModelUpsert>) -> Result<()>;
    async fn upsert_containers(&self, rows: Vec<ContainerUpsert>) -> Result<()>;
    async fn upsert_entries(&self, rows: Vec<StockEntryUpsert>) -> Result<()>;
    async fn upsert_status(&self, rows: Vec<StatusUpsert>) -> Result<()>;

    async fn insert_movements(&self, rows: Vec<MovementInsert>) -> Result<()>;
    async fn insert_consumption(&self, rows: Vec<ConsumptionInsert>) -> Result<()>;
}

/// Default timeout for gateway requests.
const DEFAULT_TIMEOUT_SECS: u64 = 30;
/// Truncation limit when logging error bodies.
const MAX_LOG_BODY_CHARS: usize = 512;

/// PostgREST-style HTTP implementation of [`RemoteStore`].
#[derive(Debug, Clone)]
pub struct HttpRemoteStore {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl HttpRemoteStore {
    pub fn new(base_url: &str, api_key: &str, access_token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token,
        }
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn headers(&self, table: &'static str) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.api_key)
                .map_err(|_| SyncError::remote(table, "invalid api key format"))?,
        );
        if let Some(token) = &self.access_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| SyncError::remote(table, "invalid access token format"))?;
            headers.insert(AUTHORIZATION, value);
        }
        Ok(headers)
    }

    async fn check_status(table: &'static str, response: reqwest::Response) -> Result<String> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| SyncError::remote(table, e.to_string()))?;

        if status.is_success() {
            return Ok(body);
        }

        let mut preview: String = body.chars().take(MAX_LOG_BODY_CHARS).collect();
        if body.chars().count() > MAX_LOG_BODY_CHARS {
            preview.push_str("...");
        }
        tracing::debug!(%table, %status, body = %preview, "remote call failed");
        Err(SyncError::remote(table, format!("{status}: {preview}")))
    }

    /// `GET {table}?select=*&order=created_at.desc`
    async fn select<T: DeserializeOwned>(&self, table: &'static str) -> Result<Vec<T>> {
        let response = self
            .client
            .get(self.table_url(table))
            .headers(self.headers(table)?)
            .query(&[("select", "*"), ("order", "created_at.desc")])
            .send()
            .await
            .map_err(|e| SyncError::remote(table, e.to_string()))?;

        let body = Self::check_status(table, response).await?;
        serde_json::from_str(&body)
            .map_err(|e| SyncError::remote(table, format!("unexpected response shape: {e}")))
    }

    /// `POST {table}?on_conflict={key}` with merge-duplicates resolution.
    async fn upsert<T: Serialize + Sync>(
        &self,
        table: &'static str,
        conflict_key: &'static str,
        rows: &[T],
    ) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers(table)?)
            .header("Prefer", "resolution=merge-duplicates")
            .query(&[("on_conflict", conflict_key)])
            .json(rows)
            .send()
            .await
            .map_err(|e| SyncError::remote(table, e.to_string()))?;

        Self::check_status(table, response).await.map(|_| ())
    }

    /// Plain `POST {table}` for append-only tables.
    async fn insert<T: Serialize + Sync>(&self, table: &'static str, rows: &[T]) -> Result<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let response = self
            .client
            .post(self.table_url(table))
            .headers(self.headers(table)?)
            .json(rows)
            .send()
            .await
            .map_err(|e| SyncError::remote(table, e.to_string()))?;

        Self::check_status(table, response).await.map(|_| ())
    }
}

#[async_trait]
impl RemoteStore for HttpRemoteStore {
    async fn fetch_models(&self) -> Result<Vec<TireModelRow>> {
        self.select(tables::TIRE_MODELS).await
    }

    async fn fetch_containers(&self) -> Result<Vec<ContainerRow>> {
        self.select(tables::CONTAINERS).await
    }

    async fn fetch_entries(&self) -> Result<Vec<StockEntryRow>> {
        self.select(tables::STOCK_ENTRIES).await
    }

    async fn fetch_movements(&self) -> Result<Vec<MovementRow>> {
        self.select(tables::TIRE_MOVEMENTS).await
    }

    async fn fetch_consumption(&self) -> Result<Vec<ConsumptionRow>> {
        self.select(tables::TIRE_CONSUMPTION).await
    }

    async fn fetch_status(&self) -> Result<Vec<StatusRow>> {
        self.select(tables::TIRE_STATUS).await
    }

    async fn upsert_models(&self, rows: Vec<TireModelUpsert>) -> Result<()> {
        self.upsert(tables::TIRE_MODELS, "code", &rows).await
    }

    async fn upsert_containers(&self, rows: Vec<ContainerUpsert>) -> Result<()> {
        self.upsert(tables::CONTAINERS, "name", &rows).await
    }

    async fn upsert_entries(&self, rows: Vec<StockEntryUpsert>) -> Result<()> {
        self.upsert(tables::STOCK_ENTRIES, "barcode", &rows).await
    }

    async fn upsert_status(&self, rows: Vec<StatusUpsert>) -> Result<()> {
        self.upsert(tables::TIRE_STATUS, "name", &rows).await
    }

    async fn insert_movements(&self, rows: Vec<MovementInsert>) -> Result<()> {
        self.insert(tables::TIRE_MOVEMENTS, &rows).await
    }

    async fn insert_consumption(&self, rows: Vec<ConsumptionInsert>) -> Result<()> {
        self.insert(tables::TIRE_CONSUMPTION, &rows).await
    }
}
