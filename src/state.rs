use crate::auth::{IdentityProvider, RestIdentityProvider};
use crate::config::Config;
use crate::models::{MonthDataset, Period};
use crate::remote::{MemoryBackend, RestBackend, SnapshotBackend, SnapshotClient};
use crate::storage::{LocalStorage, SessionStore, load_or_create_identity};
use crate::store::HabitStore;
use crate::sync::SyncOrchestrator;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<Mutex<HabitStore>>,
    pub sync: Arc<SyncOrchestrator>,
    pub identity_provider: Option<Arc<dyn IdentityProvider>>,
}

impl AppState {
    pub fn new(
        sync: Arc<SyncOrchestrator>,
        identity_provider: Option<Arc<dyn IdentityProvider>>,
    ) -> Self {
        Self {
            store: Arc::clone(sync.store()),
            sync,
            identity_provider,
        }
    }

    /// Restores the last viewed month and wires the configured backends.
    pub async fn bootstrap(config: &Config) -> std::io::Result<Self> {
        if let Some(parent) = config.data_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let identity = load_or_create_identity(&config.device_id_path).await;
        let local = LocalStorage::new(config.data_path.clone());
        let dataset = match local.load().await {
            Some(dataset) => dataset,
            None => MonthDataset::fresh(Period::current()),
        };
        info!(period = %dataset.period(), habits = dataset.habits.len(), "restored month");
        let store = Arc::new(Mutex::new(HabitStore::new(dataset, local)));

        let (backend, identity_provider): (Arc<dyn SnapshotBackend>, Option<Arc<dyn IdentityProvider>>) =
            match &config.remote {
                Some(remote) => {
                    let http = reqwest::Client::new();
                    let backend: Arc<dyn SnapshotBackend> =
                        Arc::new(RestBackend::new(http.clone(), &remote.url, &remote.api_key));
                    let provider: Arc<dyn IdentityProvider> = Arc::new(RestIdentityProvider::new(
                        http,
                        &remote.url,
                        &remote.api_key,
                        remote.auth_redirect.clone(),
                    ));
                    info!(url = %remote.url, "using hosted snapshot backend");
                    (backend, Some(provider))
                }
                None => {
                    info!("no remote backend configured; snapshots stay in memory");
                    let backend: Arc<dyn SnapshotBackend> = Arc::new(MemoryBackend::default());
                    (backend, None)
                }
            };

        let sync = SyncOrchestrator::new(identity, SnapshotClient::new(backend), store)
            .with_session_store(SessionStore::new(config.session_path.clone()));
        if identity_provider.is_some() && sync.restore_session().await {
            info!("signed in from previous run");
        }
        Ok(Self::new(Arc::new(sync), identity_provider))
    }
}
