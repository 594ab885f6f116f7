use crate::auth::Session;
use crate::models::{Identity, MonthDataset, PartialDataset, Period};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Write-through cache of the most recently viewed month.
///
/// Holds exactly one dataset at a fixed path; it is not an archive of past months.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    path: PathBuf,
}

impl LocalStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Overwrites the stored dataset. Failures are logged, never returned.
    pub async fn save(&self, dataset: &MonthDataset) {
        let payload = match serde_json::to_vec_pretty(dataset) {
            Ok(payload) => payload,
            Err(err) => {
                error!("failed to serialize local dataset: {err}");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, payload).await {
            error!(path = %self.path.display(), "failed to write local dataset: {err}");
        }
    }

    /// Returns `None` when nothing usable is stored.
    pub async fn load(&self) -> Option<MonthDataset> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                error!("failed to read local dataset: {err}");
                return None;
            }
        };
        let value: Value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(err) => {
                error!("failed to parse local dataset: {err}");
                return None;
            }
        };
        let Some(partial) = PartialDataset::from_value(&value) else {
            warn!("local dataset is not a JSON object; ignoring it");
            return None;
        };
        Some(partial.into_dataset(Period::current()))
    }
}

/// The signed-in session, stored next to the device id.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub async fn load(&self) -> Option<Session> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                warn!("failed to read session: {err}");
                return None;
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(session) => Some(session),
            Err(err) => {
                warn!("ignoring unreadable session file: {err}");
                None
            }
        }
    }

    pub async fn save(&self, session: &Session) {
        let payload = match serde_json::to_vec(session) {
            Ok(payload) => payload,
            Err(err) => {
                error!("failed to serialize session: {err}");
                return;
            }
        };
        if let Err(err) = fs::write(&self.path, payload).await {
            warn!(path = %self.path.display(), "session will not survive a restart: {err}");
        }
    }

    pub async fn clear(&self) {
        match fs::remove_file(&self.path).await {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => error!(path = %self.path.display(), "failed to remove session: {err}"),
        }
    }
}

/// Reads the persisted device identifier, generating and storing one on first use.
///
/// If the identifier cannot be stored, a session-only identifier is returned.
pub async fn load_or_create_identity(path: &Path) -> Identity {
    match fs::read_to_string(path).await {
        Ok(contents) if !contents.trim().is_empty() => {
            return Identity::new(contents.trim());
        }
        Ok(_) => {}
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => warn!("failed to read device id: {err}"),
    }

    let device_id = Uuid::new_v4().to_string();
    if let Some(parent) = path.parent() {
        if let Err(err) = fs::create_dir_all(parent).await {
            warn!("failed to create device id directory: {err}");
        }
    }
    match fs::write(path, &device_id).await {
        Ok(()) => info!(%device_id, "generated device id"),
        Err(err) => warn!("device id will not survive a restart: {err}"),
    }
    Identity::new(device_id)
}
