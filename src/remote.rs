use crate::errors::RemoteError;
use crate::models::{MonthDataset, PartialDataset, Period, Scope};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info};

// Both tables are keyed by (owner, year, month).
pub const DEVICE_TABLE: &str = "device_snapshots";
pub const USER_TABLE: &str = "user_snapshots";

/// Who a snapshot belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Owner {
    Device(String),
    User(String),
}

impl Owner {
    pub fn scope(&self) -> Scope {
        match self {
            Owner::Device(_) => Scope::Device,
            Owner::User(_) => Scope::User,
        }
    }

    pub fn key(&self) -> &str {
        match self {
            Owner::Device(key) | Owner::User(key) => key,
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Owner::Device(_) => DEVICE_TABLE,
            Owner::User(_) => USER_TABLE,
        }
    }

    fn column(&self) -> &'static str {
        match self {
            Owner::Device(_) => "device_id",
            Owner::User(_) => "user_id",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRow {
    pub year: i32,
    pub month: u32,
    pub payload: Value,
}

impl SnapshotRow {
    pub fn period(&self) -> Period {
        Period {
            year: self.year,
            month: self.month,
        }
    }
}

/// Storage primitives the snapshot client is built on.
#[async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Inserts or overwrites rows keyed by `(owner, year, month)`.
    async fn upsert(&self, owner: &Owner, rows: Vec<SnapshotRow>) -> Result<(), RemoteError>;

    async fn select_one(&self, owner: &Owner, period: Period) -> Result<Option<Value>, RemoteError>;

    async fn select_all(&self, owner: &Owner) -> Result<Vec<SnapshotRow>, RemoteError>;

    /// Credentials for user-scoped requests; `None` reverts to anonymous access.
    fn set_access_token(&self, _token: Option<String>) {}
}

#[derive(Clone)]
pub struct SnapshotClient {
    backend: Arc<dyn SnapshotBackend>,
}

impl SnapshotClient {
    pub fn new(backend: Arc<dyn SnapshotBackend>) -> Self {
        Self { backend }
    }

    pub fn backend(&self) -> &Arc<dyn SnapshotBackend> {
        &self.backend
    }

    pub async fn save_snapshot(&self, owner: &Owner, dataset: &MonthDataset) -> Result<(), RemoteError> {
        let payload = serde_json::to_value(dataset)?;
        self.save_payload(owner, dataset.period(), payload).await
    }

    pub async fn save_payload(&self, owner: &Owner, period: Period, payload: Value) -> Result<(), RemoteError> {
        debug!(scope = ?owner.scope(), %period, "saving snapshot");
        self.backend
            .upsert(
                owner,
                vec![SnapshotRow {
                    year: period.year,
                    month: period.month,
                    payload,
                }],
            )
            .await
    }

    /// Raw stored payload; `None` when no snapshot exists for the period.
    pub async fn load_payload(&self, owner: &Owner, period: Period) -> Result<Option<Value>, RemoteError> {
        self.backend.select_one(owner, period).await
    }

    pub async fn load_snapshot(
        &self,
        owner: &Owner,
        period: Period,
    ) -> Result<Option<PartialDataset>, RemoteError> {
        let Some(payload) = self.load_payload(owner, period).await? else {
            return Ok(None);
        };
        PartialDataset::from_value(&payload)
            .map(Some)
            .ok_or_else(|| RemoteError::Decode(format!("snapshot for {period} is not an object")))
    }

    /// Copies every device snapshot to the user. Device rows are left in place.
    pub async fn migrate_device_to_user(&self, device_id: &str, user_id: &str) -> Result<usize, RemoteError> {
        let rows = self
            .backend
            .select_all(&Owner::Device(device_id.to_string()))
            .await?;
        if rows.is_empty() {
            return Ok(0);
        }
        let count = rows.len();
        self.backend
            .upsert(&Owner::User(user_id.to_string()), rows)
            .await?;
        info!(count, "copied device snapshots to user");
        Ok(count)
    }
}

/// Snapshots kept in process memory, used when no hosted backend is configured.
#[derive(Default)]
pub struct MemoryBackend {
    rows: Mutex<BTreeMap<(Owner, Period), Value>>,
}

impl MemoryBackend {
    pub async fn len(&self) -> usize {
        self.rows.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rows.lock().await.is_empty()
    }
}

#[async_trait]
impl SnapshotBackend for MemoryBackend {
    async fn upsert(&self, owner: &Owner, rows: Vec<SnapshotRow>) -> Result<(), RemoteError> {
        let mut stored = self.rows.lock().await;
        for row in rows {
            stored.insert((owner.clone(), row.period()), row.payload);
        }
        Ok(())
    }

    async fn select_one(&self, owner: &Owner, period: Period) -> Result<Option<Value>, RemoteError> {
        Ok(self.rows.lock().await.get(&(owner.clone(), period)).cloned())
    }

    async fn select_all(&self, owner: &Owner) -> Result<Vec<SnapshotRow>, RemoteError> {
        Ok(self
            .rows
            .lock()
            .await
            .iter()
            .filter(|((row_owner, _), _)| row_owner == owner)
            .map(|((_, period), payload)| SnapshotRow {
                year: period.year,
                month: period.month,
                payload: payload.clone(),
            })
            .collect())
    }
}

/// PostgREST-style backend (`/rest/v1/<table>`).
pub struct RestBackend {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    access_token: RwLock<Option<String>>,
}

#[derive(Deserialize)]
struct PayloadRow {
    payload: Value,
}

impl RestBackend {
    pub fn new(http: reqwest::Client, base_url: &str, api_key: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            access_token: RwLock::new(None),
        }
    }

    fn table_url(&self, owner: &Owner) -> String {
        format!("{}/rest/v1/{}", self.base_url, owner.table())
    }

    fn bearer(&self) -> String {
        let token = self
            .access_token
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone();
        token.unwrap_or_else(|| self.api_key.clone())
    }

    fn request(&self, method: reqwest::Method, url: String) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(self.bearer())
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl SnapshotBackend for RestBackend {
    async fn upsert(&self, owner: &Owner, rows: Vec<SnapshotRow>) -> Result<(), RemoteError> {
        let body: Vec<Value> = rows
            .into_iter()
            .map(|row| {
                let mut record = Map::new();
                record.insert(owner.column().to_string(), Value::from(owner.key()));
                record.insert("year".to_string(), Value::from(row.year));
                record.insert("month".to_string(), Value::from(row.month));
                record.insert("payload".to_string(), row.payload);
                Value::Object(record)
            })
            .collect();
        let on_conflict = format!("{},year,month", owner.column());

        let response = self
            .request(reqwest::Method::POST, self.table_url(owner))
            .query(&[("on_conflict", on_conflict.as_str())])
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&body)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn select_one(&self, owner: &Owner, period: Period) -> Result<Option<Value>, RemoteError> {
        let owner_filter = format!("eq.{}", owner.key());
        let year_filter = format!("eq.{}", period.year);
        let month_filter = format!("eq.{}", period.month);
        let response = self
            .request(reqwest::Method::GET, self.table_url(owner))
            .query(&[
                ("select", "payload"),
                (owner.column(), owner_filter.as_str()),
                ("year", year_filter.as_str()),
                ("month", month_filter.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await?;
        let rows: Vec<PayloadRow> = Self::check(response).await?.json().await?;
        Ok(rows.into_iter().next().map(|row| row.payload))
    }

    async fn select_all(&self, owner: &Owner) -> Result<Vec<SnapshotRow>, RemoteError> {
        let owner_filter = format!("eq.{}", owner.key());
        let response = self
            .request(reqwest::Method::GET, self.table_url(owner))
            .query(&[
                ("select", "year,month,payload"),
                (owner.column(), owner_filter.as_str()),
            ])
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    fn set_access_token(&self, token: Option<String>) {
        *self
            .access_token
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token;
    }
}
